//! Batch installs across devices.
//!
//! Every selected device gets its own worker task that walks the package list in
//! scan order, one install at a time. Devices never wait on each other; a job's
//! failure stays on that job.

use crate::bridge::{DeviceBridge, InstallOutcome};
use crate::error::{BatchError, BridgeError};
use crate::job::{BatchSummary, DeviceSummary, FailureReason, InstallJob, InstallOptions, JobState};
use crate::report::InstallReporter;
use crate::scanner::{PackageFile, PackageScanner};
use crate::signal::{BatchControl, Interrupt};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Target serials. Empty means "the only attached device".
    pub serials: Vec<String>,
    pub source_dir: PathBuf,
    pub options: InstallOptions,
    /// File names to install. Empty means every package in `source_dir`.
    pub packages: Vec<String>,
}

impl BatchRequest {
    pub fn new(serials: Vec<String>, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            serials,
            source_dir: source_dir.into(),
            options: InstallOptions::default(),
            packages: Vec::new(),
        }
    }

    pub fn options(mut self, options: InstallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn only(mut self, packages: Vec<String>) -> Self {
        self.packages = packages;
        self
    }
}

pub struct BatchHandle {
    control: BatchControl,
    task: JoinHandle<BatchSummary>,
}

impl BatchHandle {
    pub fn control(&self) -> BatchControl {
        self.control.clone()
    }

    pub async fn wait(self) -> Result<BatchSummary, BatchError> {
        self.task
            .await
            .map_err(|e| BatchError::Aborted(e.to_string()))
    }
}

type DeviceQueue = Arc<Mutex<Vec<InstallJob>>>;

fn lock_queue(queue: &Mutex<Vec<InstallJob>>) -> MutexGuard<'_, Vec<InstallJob>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

struct BatchContext {
    batch_id: String,
    bridge: Arc<dyn DeviceBridge>,
    control: BatchControl,
    reporter: Arc<dyn InstallReporter>,
    options: InstallOptions,
    source_dir: PathBuf,
}

pub struct Orchestrator {
    bridge: Arc<dyn DeviceBridge>,
    running: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(bridge: Arc<dyn DeviceBridge>) -> Self {
        Self {
            bridge,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Explicit serials are kept as given (minus duplicates). With none given,
    /// a single attached device is picked automatically.
    pub async fn resolve_devices(&self, requested: &[String]) -> Result<Vec<String>, BatchError> {
        if !requested.is_empty() {
            let mut serials: Vec<String> = Vec::with_capacity(requested.len());
            for serial in requested {
                if !serials.contains(serial) {
                    serials.push(serial.clone());
                }
            }
            return Ok(serials);
        }

        let attached = self
            .bridge
            .list_devices()
            .await
            .map_err(BatchError::BridgeUnavailable)?;
        match attached.as_slice() {
            [] => Err(BatchError::NoDevices),
            [only] => {
                info!(serial = %only.serial, model = %only.model, "single device attached, selecting it");
                Ok(vec![only.serial.clone()])
            }
            many => Err(BatchError::AmbiguousDevices(
                many.iter().map(|d| d.serial.clone()).collect(),
            )),
        }
    }

    /// Validates the request and launches one worker per device.
    ///
    /// Only one batch runs at a time; a second call while one is active is
    /// rejected with [`BatchError::AlreadyRunning`]. Every error returned here
    /// means no job was attempted.
    pub async fn start(
        &self,
        request: BatchRequest,
        reporter: Arc<dyn InstallReporter>,
    ) -> Result<BatchHandle, BatchError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BatchError::AlreadyRunning);
        }
        let gate = scopeguard::guard(self.running.clone(), |running| {
            running.store(false, Ordering::SeqCst);
        });

        let version = self
            .bridge
            .probe()
            .await
            .map_err(BatchError::BridgeUnavailable)?;
        debug!(%version, "adb available");

        let serials = self.resolve_devices(&request.serials).await?;
        if serials.is_empty() {
            return Err(BatchError::NoDevices);
        }

        if !request.source_dir.is_dir() {
            return Err(BatchError::DirectoryMissing(request.source_dir));
        }
        let scanned = PackageScanner::scan(&request.source_dir);
        if scanned.is_empty() {
            return Err(BatchError::NoPackages(request.source_dir));
        }
        let packages = PackageScanner::select(scanned, &request.packages)?;

        let batch_id = Uuid::new_v4().to_string();
        let control = BatchControl::new(serials.iter().map(String::as_str));
        info!(
            batch_id = %batch_id,
            devices = serials.len(),
            packages = packages.len(),
            dir = %request.source_dir.display(),
            "starting install batch"
        );
        reporter.on_batch_start(&batch_id, &serials, &packages);

        let ctx = Arc::new(BatchContext {
            batch_id,
            bridge: self.bridge.clone(),
            control: control.clone(),
            reporter,
            options: request.options,
            source_dir: request.source_dir,
        });

        let task = tokio::spawn(async move {
            // Released when the batch task ends, however it ends.
            let _gate = gate;
            run_batch(ctx, serials, packages).await
        });

        Ok(BatchHandle { control, task })
    }

    /// [`Orchestrator::start`] followed by [`BatchHandle::wait`].
    pub async fn run(
        &self,
        request: BatchRequest,
        reporter: Arc<dyn InstallReporter>,
    ) -> Result<BatchSummary, BatchError> {
        self.start(request, reporter).await?.wait().await
    }
}

async fn run_batch(
    ctx: Arc<BatchContext>,
    serials: Vec<String>,
    packages: Vec<PackageFile>,
) -> BatchSummary {
    let started = Instant::now();
    let mut workers = JoinSet::new();

    // Each queue outlives its worker so a crashed worker's finished jobs survive.
    let queues: Vec<DeviceQueue> = serials
        .iter()
        .map(|serial| {
            let jobs: Vec<InstallJob> = packages
                .iter()
                .map(|package| InstallJob::new(serial.as_str(), package.clone(), ctx.options))
                .collect();
            Arc::new(Mutex::new(jobs))
        })
        .collect();

    for (slot, (serial, queue)) in serials.iter().zip(&queues).enumerate() {
        let ctx = ctx.clone();
        let serial = serial.clone();
        let queue = queue.clone();
        workers.spawn(async move { (slot, run_device(ctx, serial, queue).await) });
    }

    let mut slots: Vec<Option<DeviceSummary>> = vec![None; serials.len()];
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((slot, summary)) => slots[slot] = Some(summary),
            Err(e) => error!(batch_id = %ctx.batch_id, error = %e, "device worker stopped unexpectedly"),
        }
    }

    let devices: Vec<DeviceSummary> = serials
        .iter()
        .zip(slots)
        .zip(&queues)
        .map(|((serial, slot), queue)| slot.unwrap_or_else(|| abandoned(&ctx, serial, queue)))
        .collect();

    let summary = BatchSummary {
        batch_id: ctx.batch_id.clone(),
        devices,
        cancelled: ctx.control.is_cancelled(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    let (success, failed, skipped) = summary.totals();
    info!(
        batch_id = %summary.batch_id,
        success,
        failed,
        skipped,
        cancelled = summary.cancelled,
        "install batch finished"
    );
    summary
}

#[instrument(skip_all, fields(batch_id = %ctx.batch_id, serial = %serial))]
async fn run_device(
    ctx: Arc<BatchContext>,
    serial: String,
    queue: DeviceQueue,
) -> DeviceSummary {
    let packages: Vec<PackageFile> = lock_queue(&queue)
        .iter()
        .map(|job| job.package.clone())
        .collect();
    let total = packages.len();
    let interrupt = ctx.control.interrupt_for(&serial);
    let skip = ctx.control.skip_signal(&serial);
    let mut directory_gone = false;

    for (index, package) in packages.iter().enumerate() {
        let (state, raw_output) = if ctx.control.is_cancelled() {
            (JobState::Skipped, None)
        } else if skip.take() {
            debug!(package = %package.name, "skip requested before start");
            (JobState::Skipped, None)
        } else if directory_gone || !ctx.source_dir.is_dir() {
            if !directory_gone {
                warn!(dir = %ctx.source_dir.display(), "package folder disappeared");
                ctx.reporter.on_warning(
                    &serial,
                    format!("package folder {} no longer exists", ctx.source_dir.display()),
                );
                directory_gone = true;
            }
            (JobState::Failed(FailureReason::DirectoryMissing), None)
        } else {
            lock_queue(&queue)[index].start();
            ctx.reporter.on_job_start(&serial, index, total, package);
            install_one(&ctx, &serial, package, &interrupt).await
        };

        let state = {
            let mut jobs = lock_queue(&queue);
            jobs[index].finish(state, raw_output);
            jobs[index].state().clone()
        };
        ctx.reporter.on_job_finish(&serial, index, total, package, &state);
    }

    let jobs = lock_queue(&queue).clone();
    let summary = DeviceSummary::from_jobs(serial, jobs);
    debug!(
        success = summary.success,
        failed = summary.failed,
        skipped = summary.skipped,
        "device queue done"
    );
    ctx.reporter.on_device_complete(&summary);
    summary
}

async fn install_one(
    ctx: &BatchContext,
    serial: &str,
    package: &PackageFile,
    interrupt: &Interrupt,
) -> (JobState, Option<String>) {
    let result = ctx
        .bridge
        .install(serial, &package.path, &ctx.options, interrupt)
        .await;

    match result {
        Ok(InstallOutcome::Completed {
            succeeded: true,
            raw_output,
        }) => (JobState::Success, Some(raw_output)),
        Ok(InstallOutcome::Completed {
            succeeded: false,
            raw_output,
        }) => {
            let reason = FailureReason::classify(&raw_output);
            warn!(package = %package.name, %reason, "install failed");
            (JobState::Failed(reason), Some(raw_output))
        }
        Ok(InstallOutcome::Interrupted) => {
            info!(package = %package.name, "install interrupted");
            (JobState::Skipped, None)
        }
        Err(BridgeError::Timeout(limit)) => {
            warn!(package = %package.name, timeout_secs = limit.as_secs(), "install timed out");
            (JobState::Failed(FailureReason::Timeout), None)
        }
        Err(e) => {
            warn!(package = %package.name, error = %e, "adb invocation failed");
            (JobState::Failed(FailureReason::ProcessFailed(e.to_string())), None)
        }
    }
}

/// Summary for a device whose worker died. Finished jobs keep their outcome;
/// pending and running ones become `ProcessFailed`.
fn abandoned(ctx: &BatchContext, serial: &str, queue: &DeviceQueue) -> DeviceSummary {
    let mut jobs = lock_queue(queue).clone();
    let total = jobs.len();
    for (index, job) in jobs.iter_mut().enumerate() {
        let failed = JobState::Failed(FailureReason::ProcessFailed(
            "device worker stopped unexpectedly".to_string(),
        ));
        if job.finish(failed, None) {
            ctx.reporter
                .on_job_finish(serial, index, total, &job.package, job.state());
        }
    }
    let summary = DeviceSummary::from_jobs(serial, jobs);
    ctx.reporter.on_device_complete(&summary);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::INSTALL_TIMEOUT;
    use crate::device::Device;
    use crate::error::Result as BridgeResult;
    use crate::report::{ChannelReporter, InstallEvent, NullReporter};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc::UnboundedReceiver;

    #[derive(Debug, Clone)]
    enum Behavior {
        Succeed,
        Reject(&'static str),
        Hang,
        TimeOut,
        Broken(&'static str),
        Crash,
    }

    struct FakeBridge {
        available: bool,
        devices: Vec<Device>,
        delay: Duration,
        behaviors: HashMap<(String, String), Behavior>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl FakeBridge {
        fn new() -> Self {
            Self {
                available: true,
                devices: Vec::new(),
                delay: Duration::from_millis(10),
                behaviors: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn unavailable() -> Self {
            Self {
                available: false,
                ..Self::new()
            }
        }

        fn attached(mut self, serials: &[&str]) -> Self {
            self.devices = serials.iter().map(|s| Device::new(*s, "Pixel_7")).collect();
            self
        }

        fn on(mut self, serial: &str, package: &str, behavior: Behavior) -> Self {
            self.behaviors
                .insert((serial.to_string(), package.to_string()), behavior);
            self
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeviceBridge for FakeBridge {
        async fn probe(&self) -> BridgeResult<String> {
            if self.available {
                Ok("Android Debug Bridge version 1.0.41".to_string())
            } else {
                Err(BridgeError::BridgeNotFound("adb".to_string()))
            }
        }

        async fn list_devices(&self) -> BridgeResult<Vec<Device>> {
            Ok(self.devices.clone())
        }

        async fn install(
            &self,
            serial: &str,
            package: &Path,
            _options: &InstallOptions,
            interrupt: &Interrupt,
        ) -> BridgeResult<InstallOutcome> {
            let name = package.file_name().unwrap().to_string_lossy().to_string();
            self.calls.lock().unwrap().push((serial.to_string(), name.clone()));
            let behavior = self
                .behaviors
                .get(&(serial.to_string(), name))
                .cloned()
                .unwrap_or(Behavior::Succeed);

            match behavior {
                Behavior::Succeed => tokio::select! {
                    _ = tokio::time::sleep(self.delay) => Ok(InstallOutcome::Completed {
                        succeeded: true,
                        raw_output: "Performing Streamed Install\nSuccess\n".to_string(),
                    }),
                    _ = interrupt.fired() => Ok(InstallOutcome::Interrupted),
                },
                Behavior::Reject(text) => Ok(InstallOutcome::Completed {
                    succeeded: false,
                    raw_output: text.to_string(),
                }),
                Behavior::Hang => {
                    interrupt.fired().await;
                    Ok(InstallOutcome::Interrupted)
                }
                Behavior::Broken(message) => Err(BridgeError::ProcessFailed(message.to_string())),
                Behavior::Crash => panic!("bridge crashed while installing"),
                Behavior::TimeOut => tokio::select! {
                    _ = tokio::time::sleep(INSTALL_TIMEOUT) => Err(BridgeError::Timeout(INSTALL_TIMEOUT)),
                    _ = interrupt.fired() => Ok(InstallOutcome::Interrupted),
                },
            }
        }

        async fn query_property(&self, _serial: &str, key: &str) -> BridgeResult<String> {
            Ok(format!("value-of-{key}"))
        }
    }

    fn apk_folder(files: &[&str]) -> TempDir {
        let tmp = TempDir::new().expect("tmp");
        for name in files {
            fs::write(tmp.path().join(name), b"apk").expect("write apk");
        }
        tmp
    }

    fn serials(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn order(summary: &DeviceSummary) -> Vec<&str> {
        summary.jobs.iter().map(|j| j.package.name.as_str()).collect()
    }

    fn states(summary: &DeviceSummary) -> Vec<JobState> {
        summary.jobs.iter().map(|j| j.state().clone()).collect()
    }

    async fn wait_for_start(rx: &mut UnboundedReceiver<InstallEvent>, serial: &str, package: &str) {
        while let Some(event) = rx.recv().await {
            match event {
                InstallEvent::JobStarted {
                    serial: s,
                    package: p,
                    ..
                } if s == serial && p == package => return,
                _ => {}
            }
        }
        panic!("event stream ended before {serial}/{package} started");
    }

    #[tokio::test]
    async fn two_devices_all_success_keep_scan_order() {
        let dir = apk_folder(&["app2.apk", "app1.apk"]);
        let orchestrator = Orchestrator::new(Arc::new(FakeBridge::new()));
        let (reporter, mut rx) = ChannelReporter::new();

        let summary = orchestrator
            .run(
                BatchRequest::new(serials(&["DEV1", "DEV2"]), dir.path()),
                Arc::new(reporter),
            )
            .await
            .expect("batch");

        assert_eq!(summary.devices.len(), 2);
        for serial in ["DEV1", "DEV2"] {
            let device = summary.device(serial).expect("device summary");
            assert_eq!((device.success, device.failed, device.skipped), (2, 0, 0));
            assert_eq!(order(device), vec!["app1.apk", "app2.apk"]);
        }
        assert!(summary.all_succeeded());
        assert!(!summary.cancelled);

        let mut finished: HashMap<String, Vec<usize>> = HashMap::new();
        while let Ok(event) = rx.try_recv() {
            if let InstallEvent::JobFinished { serial, index, .. } = event {
                finished.entry(serial).or_default().push(index);
            }
        }
        assert_eq!(finished["DEV1"], vec![0, 1]);
        assert_eq!(finished["DEV2"], vec![0, 1]);
    }

    #[tokio::test]
    async fn insufficient_storage_fails_only_that_package() {
        let dir = apk_folder(&["app1.apk", "app2.apk"]);
        let bridge = FakeBridge::new().on(
            "DEV1",
            "app2.apk",
            Behavior::Reject("Performing Streamed Install\nadb: failed to install app2.apk: Failure [INSTALL_FAILED_INSUFFICIENT_STORAGE]"),
        );
        let orchestrator = Orchestrator::new(Arc::new(bridge));

        let summary = orchestrator
            .run(BatchRequest::new(serials(&["DEV1"]), dir.path()), Arc::new(NullReporter))
            .await
            .expect("batch");

        let device = summary.device("DEV1").expect("DEV1");
        assert_eq!(device.outcome_of("app1.apk"), Some(&JobState::Success));
        assert_eq!(
            device.outcome_of("app2.apk"),
            Some(&JobState::Failed(FailureReason::InsufficientStorage))
        );
        let failed_job = &device.jobs[1];
        assert!(failed_job.raw_output().unwrap().contains("INSUFFICIENT_STORAGE"));
    }

    #[tokio::test]
    async fn single_skip_affects_only_the_running_package() {
        let dir = apk_folder(&["a.apk", "b.apk", "c.apk"]);
        let bridge = Arc::new(FakeBridge::new().on("DEV1", "b.apk", Behavior::Hang));
        let orchestrator = Orchestrator::new(bridge.clone());
        let (reporter, mut rx) = ChannelReporter::new();

        let handle = orchestrator
            .start(BatchRequest::new(serials(&["DEV1"]), dir.path()), Arc::new(reporter))
            .await
            .expect("start");
        wait_for_start(&mut rx, "DEV1", "b.apk").await;
        assert!(handle.control().skip_current("DEV1"));

        let summary = handle.wait().await.expect("batch");
        let device = summary.device("DEV1").expect("DEV1");
        assert_eq!(
            states(device),
            vec![JobState::Success, JobState::Skipped, JobState::Success]
        );
        assert!(bridge.calls().contains(&("DEV1".to_string(), "c.apk".to_string())));
        assert!(!summary.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_on_one_device_does_not_hold_back_another() {
        let dir = apk_folder(&["app1.apk", "app2.apk"]);
        let bridge = FakeBridge::new().on("DEVA", "app1.apk", Behavior::TimeOut);
        let orchestrator = Orchestrator::new(Arc::new(bridge));
        let (reporter, mut rx) = ChannelReporter::new();

        let started = tokio::time::Instant::now();
        let handle = orchestrator
            .start(BatchRequest::new(serials(&["DEVA", "DEVB"]), dir.path()), Arc::new(reporter))
            .await
            .expect("start");

        let mut a_done = false;
        loop {
            match rx.recv().await.expect("events") {
                InstallEvent::DeviceFinished { serial, success, .. } if serial == "DEVB" => {
                    assert_eq!(success, 2);
                    assert!(started.elapsed() < Duration::from_secs(2));
                    break;
                }
                InstallEvent::DeviceFinished { serial, .. } if serial == "DEVA" => a_done = true,
                _ => {}
            }
        }
        assert!(!a_done, "DEVA should still be waiting on its timeout");

        let summary = handle.wait().await.expect("batch");
        let a = summary.device("DEVA").expect("DEVA");
        assert_eq!(a.outcome_of("app1.apk"), Some(&JobState::Failed(FailureReason::Timeout)));
        assert_eq!(a.outcome_of("app2.apk"), Some(&JobState::Success));
        let b = summary.device("DEVB").expect("DEVB");
        assert_eq!((b.success, b.failed, b.skipped), (2, 0, 0));
        assert!(started.elapsed() >= INSTALL_TIMEOUT);
    }

    #[tokio::test]
    async fn every_queued_package_gets_exactly_one_outcome() {
        let dir = apk_folder(&["a.apk", "b.apk", "c.apk", "d.apk"]);
        let bridge = FakeBridge::new()
            .on("DEV1", "b.apk", Behavior::Reject("Failure [INSTALL_FAILED_VERIFICATION_FAILURE]"))
            .on("DEV2", "a.apk", Behavior::Reject("Failure [INSTALL_FAILED_ALREADY_EXISTS]"))
            .on("DEV2", "d.apk", Behavior::Reject(""))
            .on("DEV3", "c.apk", Behavior::Hang);
        let orchestrator = Orchestrator::new(Arc::new(bridge));
        let (reporter, mut rx) = ChannelReporter::new();

        let handle = orchestrator
            .start(
                BatchRequest::new(serials(&["DEV1", "DEV2", "DEV3"]), dir.path()),
                Arc::new(reporter),
            )
            .await
            .expect("start");
        wait_for_start(&mut rx, "DEV3", "c.apk").await;
        handle.control().skip_current("DEV3");
        let summary = handle.wait().await.expect("batch");

        for device in &summary.devices {
            assert_eq!(device.success + device.failed + device.skipped, 4);
            assert_eq!(device.total(), 4);
        }
        let dev1 = summary.device("DEV1").unwrap();
        assert_eq!(
            dev1.outcome_of("b.apk"),
            Some(&JobState::Failed(FailureReason::VerificationFailure))
        );
        let dev2 = summary.device("DEV2").unwrap();
        assert!(matches!(
            dev2.outcome_of("a.apk"),
            Some(JobState::Failed(FailureReason::Unrecognized(_)))
        ));
        assert_eq!(summary.device("DEV3").unwrap().skipped, 1);
        assert_eq!(summary.totals(), (8, 3, 1));
    }

    #[tokio::test]
    async fn adb_error_fails_only_that_job() {
        let dir = apk_folder(&["a.apk", "b.apk", "c.apk"]);
        let bridge = Arc::new(FakeBridge::new().on(
            "DEV1",
            "b.apk",
            Behavior::Broken("error: device 'DEV1' not found"),
        ));
        let orchestrator = Orchestrator::new(bridge.clone());

        let summary = orchestrator
            .run(BatchRequest::new(serials(&["DEV1", "DEV2"]), dir.path()), Arc::new(NullReporter))
            .await
            .expect("batch");

        let dev1 = summary.device("DEV1").unwrap();
        assert_eq!(dev1.outcome_of("a.apk"), Some(&JobState::Success));
        match dev1.outcome_of("b.apk") {
            Some(JobState::Failed(FailureReason::ProcessFailed(detail))) => {
                assert!(detail.contains("not found"))
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(dev1.outcome_of("c.apk"), Some(&JobState::Success));
        let dev2 = summary.device("DEV2").unwrap();
        assert_eq!((dev2.success, dev2.failed, dev2.skipped), (3, 0, 0));
        assert!(bridge.calls().contains(&("DEV1".to_string(), "c.apk".to_string())));
    }

    #[tokio::test]
    async fn crashed_worker_keeps_finished_outcomes() {
        let dir = apk_folder(&["a.apk", "b.apk", "c.apk"]);
        let bridge = FakeBridge::new().on("DEV1", "b.apk", Behavior::Crash);
        let orchestrator = Orchestrator::new(Arc::new(bridge));
        let (reporter, mut rx) = ChannelReporter::new();

        let summary = orchestrator
            .run(BatchRequest::new(serials(&["DEV1", "DEV2"]), dir.path()), Arc::new(reporter))
            .await
            .expect("batch");

        let dev1 = summary.device("DEV1").unwrap();
        assert_eq!(dev1.outcome_of("a.apk"), Some(&JobState::Success));
        for name in ["b.apk", "c.apk"] {
            assert!(matches!(
                dev1.outcome_of(name),
                Some(JobState::Failed(FailureReason::ProcessFailed(_)))
            ));
        }
        assert_eq!((dev1.success, dev1.failed, dev1.skipped), (1, 2, 0));
        let dev2 = summary.device("DEV2").unwrap();
        assert_eq!((dev2.success, dev2.failed, dev2.skipped), (3, 0, 0));
        assert!(!orchestrator.is_running());

        let mut dev1_finished = Vec::new();
        let mut dev1_done = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                InstallEvent::JobFinished {
                    serial, package, state, ..
                } if serial == "DEV1" => dev1_finished.push((package, state)),
                InstallEvent::DeviceFinished {
                    serial,
                    success,
                    failed,
                    skipped,
                } if serial == "DEV1" => dev1_done = Some((success, failed, skipped)),
                _ => {}
            }
        }
        assert_eq!(dev1_finished.len(), 3);
        assert_eq!(dev1_finished[0], ("a.apk".to_string(), JobState::Success));
        assert_eq!(dev1_done, Some((1, 2, 0)));
    }

    #[tokio::test]
    async fn cancel_all_skips_everything_left() {
        let dir = apk_folder(&["a.apk", "b.apk", "c.apk"]);
        let bridge = FakeBridge::new()
            .on("DEV1", "a.apk", Behavior::Hang)
            .on("DEV2", "a.apk", Behavior::Hang);
        let orchestrator = Orchestrator::new(Arc::new(bridge));
        let (reporter, mut rx) = ChannelReporter::new();

        let handle = orchestrator
            .start(BatchRequest::new(serials(&["DEV1", "DEV2"]), dir.path()), Arc::new(reporter))
            .await
            .expect("start");
        wait_for_start(&mut rx, "DEV1", "a.apk").await;
        handle.control().cancel_all();

        let summary = handle.wait().await.expect("batch");
        assert!(summary.cancelled);
        for device in &summary.devices {
            assert_eq!((device.success, device.failed, device.skipped), (0, 0, 3));
        }
    }

    #[tokio::test]
    async fn bridge_unavailable_attempts_nothing() {
        let dir = apk_folder(&["app1.apk"]);
        let bridge = Arc::new(FakeBridge::unavailable());
        let orchestrator = Orchestrator::new(bridge.clone());

        let err = orchestrator
            .run(BatchRequest::new(serials(&["DEV1"]), dir.path()), Arc::new(NullReporter))
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::BridgeUnavailable(BridgeError::BridgeNotFound(_))));
        assert!(bridge.calls().is_empty());
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn second_batch_is_rejected_while_one_runs() {
        let dir = apk_folder(&["a.apk"]);
        let bridge = FakeBridge::new().on("DEV1", "a.apk", Behavior::Hang);
        let orchestrator = Orchestrator::new(Arc::new(bridge));
        let (reporter, mut rx) = ChannelReporter::new();

        let first = orchestrator
            .start(BatchRequest::new(serials(&["DEV1"]), dir.path()), Arc::new(reporter))
            .await
            .expect("first");
        wait_for_start(&mut rx, "DEV1", "a.apk").await;
        assert!(orchestrator.is_running());

        let second = orchestrator
            .start(BatchRequest::new(serials(&["DEV2"]), dir.path()), Arc::new(NullReporter))
            .await;
        assert!(matches!(second, Err(BatchError::AlreadyRunning)));

        first.control().cancel_all();
        first.wait().await.expect("first batch");
        assert!(!orchestrator.is_running());

        let third = orchestrator
            .run(BatchRequest::new(serials(&["DEV2"]), dir.path()), Arc::new(NullReporter))
            .await
            .expect("third");
        assert_eq!(third.device("DEV2").unwrap().success, 1);
    }

    #[tokio::test]
    async fn vanished_folder_fails_remaining_jobs() {
        let dir = apk_folder(&["a.apk", "b.apk", "c.apk"]);
        let bridge = FakeBridge::new().on("DEV1", "a.apk", Behavior::Hang);
        let orchestrator = Orchestrator::new(Arc::new(bridge));
        let (reporter, mut rx) = ChannelReporter::new();

        let handle = orchestrator
            .start(BatchRequest::new(serials(&["DEV1"]), dir.path()), Arc::new(reporter))
            .await
            .expect("start");
        wait_for_start(&mut rx, "DEV1", "a.apk").await;
        fs::remove_dir_all(dir.path()).expect("remove folder");
        handle.control().skip_current("DEV1");

        let summary = handle.wait().await.expect("batch");
        let device = summary.device("DEV1").unwrap();
        assert_eq!(
            states(device),
            vec![
                JobState::Skipped,
                JobState::Failed(FailureReason::DirectoryMissing),
                JobState::Failed(FailureReason::DirectoryMissing),
            ]
        );
    }

    #[tokio::test]
    async fn single_attached_device_is_selected_automatically() {
        let dir = apk_folder(&["app1.apk"]);
        let orchestrator = Orchestrator::new(Arc::new(FakeBridge::new().attached(&["ONLY1"])));
        assert_eq!(orchestrator.resolve_devices(&[]).await.unwrap(), vec!["ONLY1"]);

        let summary = orchestrator
            .run(BatchRequest::new(Vec::new(), dir.path()), Arc::new(NullReporter))
            .await
            .expect("batch");
        assert_eq!(summary.device("ONLY1").unwrap().success, 1);

        let none = Orchestrator::new(Arc::new(FakeBridge::new()));
        assert!(matches!(none.resolve_devices(&[]).await, Err(BatchError::NoDevices)));

        let many = Orchestrator::new(Arc::new(FakeBridge::new().attached(&["A", "B"])));
        match many.resolve_devices(&[]).await {
            Err(BatchError::AmbiguousDevices(found)) => assert_eq!(found, vec!["A", "B"]),
            other => panic!("unexpected {other:?}"),
        }

        let explicit = many
            .resolve_devices(&serials(&["B", "A", "B"]))
            .await
            .unwrap();
        assert_eq!(explicit, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn pre_start_errors_leave_no_jobs() {
        let empty = apk_folder(&["readme.txt"]);
        let bridge = Arc::new(FakeBridge::new());
        let orchestrator = Orchestrator::new(bridge.clone());

        let err = orchestrator
            .run(BatchRequest::new(serials(&["DEV1"]), empty.path()), Arc::new(NullReporter))
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::NoPackages(_)));

        let err = orchestrator
            .run(
                BatchRequest::new(serials(&["DEV1"]), empty.path().join("missing")),
                Arc::new(NullReporter),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::DirectoryMissing(_)));

        let dir = apk_folder(&["app1.apk"]);
        let err = orchestrator
            .run(
                BatchRequest::new(serials(&["DEV1"]), dir.path()).only(vec!["app9.apk".into()]),
                Arc::new(NullReporter),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::PackageNotFound(_)));

        assert!(bridge.calls().is_empty());
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn package_subset_installs_only_named_files() {
        let dir = apk_folder(&["app1.apk", "app2.apk", "app3.apk"]);
        let bridge = Arc::new(FakeBridge::new());
        let orchestrator = Orchestrator::new(bridge.clone());

        let summary = orchestrator
            .run(
                BatchRequest::new(serials(&["DEV1"]), dir.path()).only(vec!["app2.apk".into()]),
                Arc::new(NullReporter),
            )
            .await
            .expect("batch");
        assert_eq!(order(summary.device("DEV1").unwrap()), vec!["app2.apk"]);
        assert_eq!(bridge.calls(), vec![("DEV1".to_string(), "app2.apk".to_string())]);
    }
}
