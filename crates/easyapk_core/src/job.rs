use crate::constants::{INSUFFICIENT_STORAGE_CODE, VERIFICATION_FAILURE_CODE};
use crate::scanner::PackageFile;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallOptions {
    /// Pass `-r` so an already installed app is replaced instead of rejected.
    pub overwrite_existing: bool,
    /// Pass `-g` so every runtime permission is granted at install time.
    pub grant_all_permissions: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            overwrite_existing: true,
            grant_all_permissions: false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum FailureReason {
    #[error("installation timed out")]
    Timeout,

    #[error("adb process failed: {0}")]
    ProcessFailed(String),

    #[error("Verification Failure. Try disabling Google Play Protect or 'Verify apps over USB'.")]
    VerificationFailure,

    #[error("Insufficient Storage. The device does not have enough free space.")]
    InsufficientStorage,

    #[error("{}", summarize_unrecognized(.0))]
    Unrecognized(String),

    #[error("package folder no longer exists")]
    DirectoryMissing,
}

impl FailureReason {
    /// Maps adb's output for a failed install to a user-facing category.
    /// Only the displayed reason depends on this, never success or failure.
    pub fn classify(raw_output: &str) -> Self {
        if raw_output.contains(VERIFICATION_FAILURE_CODE) {
            FailureReason::VerificationFailure
        } else if raw_output.contains(INSUFFICIENT_STORAGE_CODE) {
            FailureReason::InsufficientStorage
        } else {
            FailureReason::Unrecognized(raw_output.trim().to_string())
        }
    }
}

/// The `INSTALL_FAILED_*` / `INSTALL_PARSE_FAILED_*` code in adb's output, if any.
pub fn failure_code(raw_output: &str) -> Option<String> {
    let re = Regex::new(r"INSTALL_(?:PARSE_)?FAILED_[A-Z0-9_]+").ok()?;
    re.find(raw_output).map(|m| m.as_str().to_string())
}

fn summarize_unrecognized(raw: &str) -> String {
    if let Some(code) = failure_code(raw) {
        return code;
    }
    match raw.lines().rev().find(|line| !line.trim().is_empty()) {
        Some(line) => line.trim().to_string(),
        None => "no output from adb".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason")]
pub enum JobState {
    Pending,
    Running,
    Success,
    Failed(FailureReason),
    Skipped,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Success | JobState::Failed(_) | JobState::Skipped
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Success => "SUCCESS",
            JobState::Failed(_) => "FAILED",
            JobState::Skipped => "SKIPPED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallJob {
    pub serial: String,
    pub package: PackageFile,
    pub options: InstallOptions,
    state: JobState,
    raw_output: Option<String>,
    elapsed_ms: Option<u64>,
    #[serde(skip)]
    started_at: Option<Instant>,
}

impl InstallJob {
    pub fn new(serial: impl Into<String>, package: PackageFile, options: InstallOptions) -> Self {
        Self {
            serial: serial.into(),
            package,
            options,
            state: JobState::Pending,
            raw_output: None,
            elapsed_ms: None,
            started_at: None,
        }
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn raw_output(&self) -> Option<&str> {
        self.raw_output.as_deref()
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed_ms.map(Duration::from_millis)
    }

    pub fn start(&mut self) {
        if self.state == JobState::Pending {
            self.state = JobState::Running;
            self.started_at = Some(Instant::now());
        }
    }

    /// Moves the job to a terminal state. Returns false if it already had one;
    /// the first outcome always wins.
    pub fn finish(&mut self, state: JobState, raw_output: Option<String>) -> bool {
        debug_assert!(state.is_terminal(), "finish() needs a terminal state");
        if self.state.is_terminal() {
            return false;
        }
        self.state = state;
        self.raw_output = raw_output.filter(|out| !out.trim().is_empty());
        self.elapsed_ms = self
            .started_at
            .map(|started| started.elapsed().as_millis() as u64);
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub serial: String,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub jobs: Vec<InstallJob>,
}

impl DeviceSummary {
    pub fn from_jobs(serial: impl Into<String>, jobs: Vec<InstallJob>) -> Self {
        let mut summary = Self {
            serial: serial.into(),
            success: 0,
            failed: 0,
            skipped: 0,
            jobs,
        };
        for job in &summary.jobs {
            match job.state() {
                JobState::Success => summary.success += 1,
                JobState::Failed(_) => summary.failed += 1,
                JobState::Skipped => summary.skipped += 1,
                JobState::Pending | JobState::Running => {}
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.jobs.len()
    }

    pub fn outcome_of(&self, package_name: &str) -> Option<&JobState> {
        self.jobs
            .iter()
            .find(|job| job.package.name == package_name)
            .map(InstallJob::state)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub devices: Vec<DeviceSummary>,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl BatchSummary {
    pub fn device(&self, serial: &str) -> Option<&DeviceSummary> {
        self.devices.iter().find(|d| d.serial == serial)
    }

    /// (success, failed, skipped) across every device.
    pub fn totals(&self) -> (usize, usize, usize) {
        self.devices.iter().fold((0, 0, 0), |acc, d| {
            (acc.0 + d.success, acc.1 + d.failed, acc.2 + d.skipped)
        })
    }

    pub fn all_succeeded(&self) -> bool {
        let (_, failed, skipped) = self.totals();
        failed == 0 && skipped == 0
    }
}
