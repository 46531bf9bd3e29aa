use crate::job::{DeviceSummary, JobState};
use crate::scanner::PackageFile;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Live progress hooks. Calls for one device always come from that device's
/// worker, in queue order; calls for different devices interleave freely.
pub trait InstallReporter: Send + Sync {
    fn on_batch_start(&self, _batch_id: &str, _serials: &[String], _packages: &[PackageFile]) {}
    fn on_job_start(&self, serial: &str, index: usize, total: usize, package: &PackageFile);
    fn on_job_finish(&self, serial: &str, index: usize, total: usize, package: &PackageFile, state: &JobState);
    fn on_device_complete(&self, summary: &DeviceSummary);
    fn on_warning(&self, serial: &str, msg: String);
}

pub struct NullReporter;

impl InstallReporter for NullReporter {
    fn on_job_start(&self, _: &str, _: usize, _: usize, _: &PackageFile) {}
    fn on_job_finish(&self, _: &str, _: usize, _: usize, _: &PackageFile, _: &JobState) {}
    fn on_device_complete(&self, _: &DeviceSummary) {}
    fn on_warning(&self, _: &str, _: String) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstallEvent {
    BatchStarted {
        batch_id: String,
        serials: Vec<String>,
        packages: Vec<String>,
    },
    JobStarted {
        serial: String,
        index: usize,
        total: usize,
        package: String,
    },
    JobFinished {
        serial: String,
        index: usize,
        total: usize,
        package: String,
        state: JobState,
    },
    DeviceFinished {
        serial: String,
        success: usize,
        failed: usize,
        skipped: usize,
    },
    Warning {
        serial: String,
        message: String,
    },
}

impl InstallEvent {
    pub fn serial(&self) -> Option<&str> {
        match self {
            InstallEvent::BatchStarted { .. } => None,
            InstallEvent::JobStarted { serial, .. }
            | InstallEvent::JobFinished { serial, .. }
            | InstallEvent::DeviceFinished { serial, .. }
            | InstallEvent::Warning { serial, .. } => Some(serial),
        }
    }
}

/// Turns reporter calls into an [`InstallEvent`] stream.
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<InstallEvent>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<InstallEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: InstallEvent) {
        // A dropped receiver only means nobody is watching.
        let _ = self.tx.send(event);
    }
}

impl InstallReporter for ChannelReporter {
    fn on_batch_start(&self, batch_id: &str, serials: &[String], packages: &[PackageFile]) {
        self.send(InstallEvent::BatchStarted {
            batch_id: batch_id.to_string(),
            serials: serials.to_vec(),
            packages: packages.iter().map(|p| p.name.clone()).collect(),
        });
    }

    fn on_job_start(&self, serial: &str, index: usize, total: usize, package: &PackageFile) {
        self.send(InstallEvent::JobStarted {
            serial: serial.to_string(),
            index,
            total,
            package: package.name.clone(),
        });
    }

    fn on_job_finish(&self, serial: &str, index: usize, total: usize, package: &PackageFile, state: &JobState) {
        self.send(InstallEvent::JobFinished {
            serial: serial.to_string(),
            index,
            total,
            package: package.name.clone(),
            state: state.clone(),
        });
    }

    fn on_device_complete(&self, summary: &DeviceSummary) {
        self.send(InstallEvent::DeviceFinished {
            serial: summary.serial.clone(),
            success: summary.success,
            failed: summary.failed,
            skipped: summary.skipped,
        });
    }

    fn on_warning(&self, serial: &str, msg: String) {
        self.send(InstallEvent::Warning {
            serial: serial.to_string(),
            message: msg,
        });
    }
}

/// Forwards every call to each inner reporter in order.
#[derive(Default)]
pub struct MultiReporter {
    reporters: Vec<Arc<dyn InstallReporter>>,
}

impl MultiReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reporter: Arc<dyn InstallReporter>) {
        self.reporters.push(reporter);
    }
}

impl InstallReporter for MultiReporter {
    fn on_batch_start(&self, batch_id: &str, serials: &[String], packages: &[PackageFile]) {
        for r in &self.reporters {
            r.on_batch_start(batch_id, serials, packages);
        }
    }

    fn on_job_start(&self, serial: &str, index: usize, total: usize, package: &PackageFile) {
        for r in &self.reporters {
            r.on_job_start(serial, index, total, package);
        }
    }

    fn on_job_finish(&self, serial: &str, index: usize, total: usize, package: &PackageFile, state: &JobState) {
        for r in &self.reporters {
            r.on_job_finish(serial, index, total, package, state);
        }
    }

    fn on_device_complete(&self, summary: &DeviceSummary) {
        for r in &self.reporters {
            r.on_device_complete(summary);
        }
    }

    fn on_warning(&self, serial: &str, msg: String) {
        for r in &self.reporters {
            r.on_warning(serial, msg.clone());
        }
    }
}
