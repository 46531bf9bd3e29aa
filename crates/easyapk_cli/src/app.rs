use crate::interrupt::InterruptHub;
use crate::reporter::{DeviceLogReporter, IndicatifReporter};
use crate::ui;
use colored::*;
use easyapk_core::{
    AdbClient, BatchRequest, BatchSummary, DeviceDetails, InstallReporter, JobState, MultiReporter,
    NullReporter, Orchestrator, Settings,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a command needs: the adb client, the orchestrator driving it and
/// the Ctrl-C routing.
pub struct App {
    pub settings: Settings,
    pub adb: Arc<AdbClient>,
    pub orchestrator: Orchestrator,
    pub interrupts: InterruptHub,
}

impl App {
    pub fn new(settings: Settings, interrupts: InterruptHub) -> Self {
        let adb = Arc::new(AdbClient::from_settings(&settings));
        tracing::debug!(adb = %adb.adb_path().display(), "using adb");
        let orchestrator = Orchestrator::new(adb.clone());
        Self {
            settings,
            adb,
            orchestrator,
            interrupts,
        }
    }

    pub fn log_dir(&self, flag: Option<PathBuf>) -> Option<PathBuf> {
        flag.or_else(|| self.settings.log_dir.clone())
    }

    /// Runs one batch to completion with progress bars (unless `quiet`) and
    /// optional per-device log files.
    pub async fn install(
        &self,
        request: BatchRequest,
        log_dir: Option<&Path>,
        quiet: bool,
    ) -> anyhow::Result<BatchSummary> {
        let mut reporters = MultiReporter::new();
        let progress = (!quiet).then(|| Arc::new(IndicatifReporter::new()));
        if let Some(progress) = &progress {
            reporters.push(progress.clone());
        }
        if let Some(dir) = log_dir {
            reporters.push(Arc::new(DeviceLogReporter::create(dir)?));
        }
        let reporter: Arc<dyn InstallReporter> = if quiet && log_dir.is_none() {
            Arc::new(NullReporter)
        } else {
            Arc::new(reporters)
        };

        let handle = self.orchestrator.start(request, reporter).await?;
        self.interrupts.attach(handle.control());
        let result = handle.wait().await;
        self.interrupts.detach();
        if let Some(progress) = progress {
            progress.finish();
        }
        Ok(result?)
    }
}

pub fn print_summary(summary: &BatchSummary) {
    println!();
    ui::divider(72);
    println!(
        "{} {} ({:.1}s)",
        "Batch".bright_white().bold(),
        summary.batch_id.bright_black(),
        summary.elapsed_ms as f64 / 1000.0
    );
    for device in &summary.devices {
        println!(
            "\n{}  {} {}  {} {}  {} {}",
            device.serial.cyan().bold(),
            "✔".green(),
            device.success,
            "✘".red(),
            device.failed,
            "⏭".yellow(),
            device.skipped
        );
        for job in &device.jobs {
            let outcome = match job.state() {
                JobState::Success => "installed".green(),
                JobState::Failed(reason) => reason.to_string().red(),
                JobState::Skipped => "skipped".yellow(),
                other => other.label().white(),
            };
            println!("    {:<40} {}", job.package.name, outcome);
        }
    }
    ui::divider(72);

    let (success, failed, skipped) = summary.totals();
    let line = format!("{success} installed, {failed} failed, {skipped} skipped");
    if summary.cancelled {
        ui::warn(&format!("Batch cancelled: {line}"));
    } else if failed == 0 && skipped == 0 {
        ui::ok(&line);
    } else {
        ui::err(&line);
    }
}

pub fn print_details(details: &DeviceDetails) {
    ui::divider(60);
    for (label, value) in details.rows() {
        println!("  {:<14} {}", format!("{label}:").bright_cyan(), value.bright_white());
    }
    ui::divider(60);
}
