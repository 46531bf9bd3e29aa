use anyhow::Context;
use chrono::Local;
use colored::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use easyapk_core::{DeviceSummary, InstallReporter, JobState, PackageFile};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One bar per device plus an overall bar across the whole batch.
pub struct IndicatifReporter {
    multi: MultiProgress,
    bars: DashMap<String, ProgressBar>,
    overall: ProgressBar,
}

impl IndicatifReporter {
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(0));
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}/{len:3} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
        overall.set_style(style);
        overall.set_message("total");
        Self {
            multi,
            bars: DashMap::new(),
            overall,
        }
    }

    fn device_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner} {prefix:>16.bold} [{wide_bar}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }

    fn println(&self, line: String) {
        let _ = self.multi.println(line);
    }

    pub fn finish(&self) {
        self.overall.finish_with_message("done");
    }
}

impl InstallReporter for IndicatifReporter {
    fn on_batch_start(&self, _batch_id: &str, serials: &[String], packages: &[PackageFile]) {
        self.overall
            .set_length((serials.len() * packages.len()) as u64);
        for serial in serials {
            let pb = self
                .multi
                .insert_before(&self.overall, ProgressBar::new(packages.len() as u64));
            pb.set_style(Self::device_style());
            pb.set_prefix(serial.clone());
            pb.set_message("waiting");
            self.bars.insert(serial.clone(), pb);
        }
    }

    fn on_job_start(&self, serial: &str, _index: usize, _total: usize, package: &PackageFile) {
        if let Some(pb) = self.bars.get(serial) {
            pb.set_message(format!("installing {}", package.name));
            pb.enable_steady_tick(std::time::Duration::from_millis(120));
        }
    }

    fn on_job_finish(&self, serial: &str, _index: usize, _total: usize, package: &PackageFile, state: &JobState) {
        let line = match state {
            JobState::Success => format!("{} {} {}", "✔".green().bold(), serial.cyan(), package.name.green()),
            JobState::Failed(reason) => format!(
                "{} {} {}: {}",
                "✘".red().bold(),
                serial.cyan(),
                package.name.red(),
                reason
            ),
            _ => format!("{} {} {} skipped", "⏭".yellow(), serial.cyan(), package.name.yellow()),
        };
        self.println(line);
        if let Some(pb) = self.bars.get(serial) {
            pb.inc(1);
        }
        self.overall.inc(1);
    }

    fn on_device_complete(&self, summary: &DeviceSummary) {
        if let Some(pb) = self.bars.get(&summary.serial) {
            pb.finish_with_message(format!(
                "{} ok, {} failed, {} skipped",
                summary.success, summary.failed, summary.skipped
            ));
        }
    }

    fn on_warning(&self, serial: &str, msg: String) {
        self.println(format!("{} {}: {}", "[warn]".yellow().bold(), serial, msg));
    }
}

/// Appends `[timestamp] [LEVEL] message` lines to one log file per device.
pub struct DeviceLogReporter {
    dir: PathBuf,
    stamp: String,
    files: DashMap<String, File>,
}

impl DeviceLogReporter {
    pub fn create(dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create log folder {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            stamp: Local::now().format("%Y-%m-%d_%H-%M-%S").to_string(),
            files: DashMap::new(),
        })
    }

    pub fn log_path(&self, serial: &str) -> PathBuf {
        // Network serials look like 192.168.0.7:5555.
        let safe: String = serial
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
            .collect();
        self.dir
            .join(format!("adb_installer_log_{}_{}.log", safe, self.stamp))
    }

    fn write(&self, serial: &str, level: &str, msg: &str) {
        let mut file = match self.files.entry(serial.to_string()) {
            Entry::Occupied(entry) => entry.into_ref(),
            Entry::Vacant(entry) => {
                let path = self.log_path(serial);
                match OpenOptions::new().create(true).append(true).open(&path) {
                    Ok(file) => entry.insert(file),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "cannot open device log");
                        return;
                    }
                }
            }
        };
        let line = format!(
            "[{}] [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level,
            msg
        );
        if let Err(e) = writeln!(file.value_mut(), "{line}") {
            tracing::warn!(serial, error = %e, "device log write failed");
        }
    }
}

impl InstallReporter for DeviceLogReporter {
    fn on_batch_start(&self, batch_id: &str, serials: &[String], packages: &[PackageFile]) {
        for serial in serials {
            self.write(
                serial,
                "INFO",
                &format!("Batch {batch_id}: {} package(s) queued for {serial}", packages.len()),
            );
        }
    }

    fn on_job_start(&self, serial: &str, index: usize, total: usize, package: &PackageFile) {
        self.write(
            serial,
            "INFO",
            &format!("Installing {} ({}/{})", package.path.display(), index + 1, total),
        );
    }

    fn on_job_finish(&self, serial: &str, _index: usize, _total: usize, package: &PackageFile, state: &JobState) {
        match state {
            JobState::Success => self.write(serial, "INFO", &format!("{} installed successfully", package.name)),
            JobState::Failed(reason) => {
                self.write(serial, "ERROR", &format!("{} failed: {}", package.name, reason))
            }
            _ => self.write(serial, "WARNING", &format!("{} skipped", package.name)),
        }
    }

    fn on_device_complete(&self, summary: &DeviceSummary) {
        self.write(
            &summary.serial,
            "INFO",
            &format!(
                "Finished: {} succeeded, {} failed, {} skipped",
                summary.success, summary.failed, summary.skipped
            ),
        );
    }

    fn on_warning(&self, serial: &str, msg: String) {
        self.write(serial, "WARNING", &msg);
    }
}
