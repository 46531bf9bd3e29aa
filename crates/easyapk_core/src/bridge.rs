use crate::device::Device;
use crate::error::Result;
use crate::job::InstallOptions;
use crate::signal::Interrupt;
use async_trait::async_trait;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Completed { succeeded: bool, raw_output: String },
    /// The skip signal or batch cancel fired and the install process was killed.
    Interrupted,
}

/// The three operations the orchestrator needs from adb, plus the availability probe.
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    async fn probe(&self) -> Result<String>;

    async fn list_devices(&self) -> Result<Vec<Device>>;

    async fn install(
        &self,
        serial: &str,
        package: &Path,
        options: &InstallOptions,
        interrupt: &Interrupt,
    ) -> Result<InstallOutcome>;

    async fn query_property(&self, serial: &str, key: &str) -> Result<String>;
}
