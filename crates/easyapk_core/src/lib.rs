pub mod error;
pub mod device;
pub mod adb;
pub mod bridge;
pub mod config;

pub mod constants;
pub mod job;
pub mod orchestrator;
pub mod report;
pub mod scanner;
pub mod signal;

pub use error::{BatchError, BridgeError, ConfigError, Result};
pub use device::{Device, DeviceDetails};
pub use adb::{AdbClient, locate_adb};
pub use bridge::{DeviceBridge, InstallOutcome};
pub use config::Settings;
pub use job::{BatchSummary, DeviceSummary, FailureReason, InstallJob, InstallOptions, JobState};
pub use orchestrator::{BatchHandle, BatchRequest, Orchestrator};
pub use report::{ChannelReporter, InstallEvent, InstallReporter, MultiReporter, NullReporter};
pub use scanner::{PackageFile, PackageScanner};
pub use signal::BatchControl;
