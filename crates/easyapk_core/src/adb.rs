use crate::bridge::{DeviceBridge, InstallOutcome};
use crate::config::Settings;
use crate::constants::{NOT_AVAILABLE, PLATFORM_TOOLS_DIR, SUCCESS_MARKER};
use crate::device::{self, Device, DeviceDetails};
use crate::error::{BridgeError, Result};
use crate::job::InstallOptions;
use crate::signal::Interrupt;
use async_trait::async_trait;
use std::env;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }

    fn failure_text(&self) -> String {
        let stderr = self.stderr.trim();
        let stdout = self.stdout.trim();
        if !stderr.is_empty() {
            stderr.to_string()
        } else if !stdout.is_empty() {
            stdout.to_string()
        } else {
            match self.exit_code {
                Some(code) => format!("exit code {code}"),
                None => "terminated by signal".to_string(),
            }
        }
    }
}

enum Execution {
    Completed(CommandOutput),
    Interrupted,
}

enum Ended {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct AdbClient {
    adb_path: PathBuf,
    leading_args: Vec<String>,
    install_timeout: Duration,
    query_timeout: Duration,
}

impl AdbClient {
    pub fn from_settings(settings: &Settings) -> Self {
        let adb_path = settings.adb_path.clone().unwrap_or_else(locate_adb);
        Self {
            adb_path,
            leading_args: Vec::new(),
            install_timeout: settings.install_timeout(),
            query_timeout: settings.query_timeout(),
        }
    }

    /// Runs `program leading_args... <adb args>` instead of adb itself, e.g. a
    /// wrapper script.
    pub fn with_program(program: impl Into<PathBuf>, leading_args: Vec<String>) -> Self {
        let defaults = Settings::default();
        Self {
            adb_path: program.into(),
            leading_args,
            install_timeout: defaults.install_timeout(),
            query_timeout: defaults.query_timeout(),
        }
    }

    pub fn with_timeouts(mut self, install: Duration, query: Duration) -> Self {
        self.install_timeout = install;
        self.query_timeout = query;
        self
    }

    pub fn adb_path(&self) -> &Path {
        &self.adb_path
    }

    fn command(&self, args: &[String]) -> Command {
        let mut std_cmd = std::process::Command::new(&self.adb_path);
        std_cmd
            .args(&self.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Keep adb out of the terminal's process group: Ctrl+C is handled by the
        // front-end as a skip request and must not kill installs directly.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_cmd.process_group(0);
        }
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            std_cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        let mut cmd = Command::from(std_cmd);
        cmd.kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, err: std::io::Error) -> BridgeError {
        if err.kind() == std::io::ErrorKind::NotFound {
            BridgeError::BridgeNotFound(self.adb_path.to_string_lossy().to_string())
        } else {
            BridgeError::Io(err)
        }
    }

    async fn execute(
        &self,
        args: &[String],
        timeout: Duration,
        interrupt: Option<&Interrupt>,
    ) -> Result<Execution> {
        debug!(adb = %self.adb_path.display(), args = ?args, "spawning adb");
        let mut child = self.command(args).spawn().map_err(|e| self.spawn_error(e))?;

        // Drain both pipes while waiting, otherwise a chatty install can fill the
        // pipe buffer and stall until the timeout.
        let stdout = tokio::spawn(drain(child.stdout.take()));
        let stderr = tokio::spawn(drain(child.stderr.take()));

        let interrupted = async {
            match interrupt {
                Some(interrupt) => {
                    interrupt.fired().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        let ended = tokio::select! {
            status = child.wait() => Ended::Exited(status),
            _ = tokio::time::sleep(timeout) => Ended::TimedOut,
            _ = interrupted => Ended::Interrupted,
        };

        match ended {
            Ended::Exited(status) => {
                let status = status?;
                let stdout = stdout.await.unwrap_or_default();
                let stderr = stderr.await.unwrap_or_default();
                Ok(Execution::Completed(CommandOutput {
                    stdout: String::from_utf8_lossy(&stdout).to_string(),
                    stderr: String::from_utf8_lossy(&stderr).to_string(),
                    exit_code: status.code(),
                }))
            }
            Ended::TimedOut => {
                terminate(&mut child).await;
                stdout.abort();
                stderr.abort();
                Err(BridgeError::Timeout(timeout))
            }
            Ended::Interrupted => {
                terminate(&mut child).await;
                stdout.abort();
                stderr.abort();
                Ok(Execution::Interrupted)
            }
        }
    }

    async fn capture(&self, args: &[&str]) -> Result<String> {
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        match self.execute(&args, self.query_timeout, None).await? {
            Execution::Completed(output) if output.success() => Ok(output.stdout.trim().to_string()),
            Execution::Completed(output) => Err(BridgeError::ProcessFailed(output.failure_text())),
            Execution::Interrupted => Err(BridgeError::ProcessFailed("interrupted".to_string())),
        }
    }

    pub async fn version(&self) -> Result<String> {
        let output = self.capture(&["version"]).await?;
        Ok(output.lines().next().unwrap_or_default().trim().to_string())
    }

    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        let output = self.capture(&["devices", "-l"]).await?;
        Ok(device::parse_device_list(&output))
    }

    pub async fn shell(&self, serial: &str, command: &[&str]) -> Result<String> {
        let mut args = vec!["-s", serial, "shell"];
        args.extend_from_slice(command);
        self.capture(&args).await
    }

    pub async fn get_prop(&self, serial: &str, prop: &str) -> Result<String> {
        let value = self.shell(serial, &["getprop", prop]).await?;
        if value.is_empty() {
            return Err(BridgeError::PropertyNotFound(prop.to_string()));
        }
        Ok(value)
    }

    pub fn install_args(serial: &str, package: &Path, options: &InstallOptions) -> Vec<String> {
        let mut args = vec!["-s".to_string(), serial.to_string(), "install".to_string()];
        if options.overwrite_existing {
            args.push("-r".to_string());
        }
        if options.grant_all_permissions {
            args.push("-g".to_string());
        }
        args.push(package.to_string_lossy().to_string());
        args
    }

    pub async fn install(
        &self,
        serial: &str,
        package: &Path,
        options: &InstallOptions,
        interrupt: &Interrupt,
    ) -> Result<InstallOutcome> {
        let args = Self::install_args(serial, package, options);
        match self.execute(&args, self.install_timeout, Some(interrupt)).await? {
            Execution::Completed(output) => {
                let raw_output = output.combined();
                // Some adb builds exit 0 on a rejected install; only the marker counts.
                let succeeded = output.success() && raw_output.contains(SUCCESS_MARKER);
                Ok(InstallOutcome::Completed {
                    succeeded,
                    raw_output,
                })
            }
            Execution::Interrupted => Ok(InstallOutcome::Interrupted),
        }
    }

    /// Informational snapshot; every field that cannot be read is `N/A`.
    pub async fn device_details(&self, serial: &str) -> DeviceDetails {
        let mut details = DeviceDetails::empty(serial);

        if let Ok(value) = self.get_prop(serial, "ro.product.manufacturer").await {
            details.manufacturer = value;
        }
        if let Ok(value) = self.get_prop(serial, "ro.product.model").await {
            details.model = value;
        }
        if let Ok(value) = self.get_prop(serial, "ro.build.display.id").await {
            details.build_id = value;
        }
        match self.shell(serial, &["cat", "/proc/meminfo"]).await {
            Ok(meminfo) => {
                details.ram_total =
                    device::parse_mem_total(&meminfo).unwrap_or_else(|| NOT_AVAILABLE.to_string())
            }
            Err(e) => warn!(serial, error = %e, "meminfo query failed"),
        }
        if let Ok(df) = self.shell(serial, &["df", "-h", "/data"]).await {
            details.storage = device::parse_data_size(&df).unwrap_or_else(|| NOT_AVAILABLE.to_string());
        }
        if let Ok(cpuinfo) = self.shell(serial, &["cat", "/proc/cpuinfo"]).await {
            details.cpu = device::parse_cpu_hardware(&cpuinfo).unwrap_or_else(|| NOT_AVAILABLE.to_string());
        }

        details
    }
}

#[async_trait]
impl DeviceBridge for AdbClient {
    async fn probe(&self) -> Result<String> {
        self.version().await
    }

    async fn list_devices(&self) -> Result<Vec<Device>> {
        AdbClient::list_devices(self).await
    }

    async fn install(
        &self,
        serial: &str,
        package: &Path,
        options: &InstallOptions,
        interrupt: &Interrupt,
    ) -> Result<InstallOutcome> {
        AdbClient::install(self, serial, package, options, interrupt).await
    }

    async fn query_property(&self, serial: &str, key: &str) -> Result<String> {
        self.get_prop(serial, key).await
    }
}

async fn drain<R: AsyncRead + Unpin>(reader: Option<R>) -> Vec<u8> {
    let mut buffer = Vec::new();
    if let Some(mut reader) = reader {
        if let Err(e) = reader.read_to_end(&mut buffer).await {
            warn!(error = %e, read = buffer.len(), "adb output truncated");
        }
    }
    buffer
}

async fn terminate(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill adb process");
    }
}

/// `platform-tools/adb` beside the working directory or the executable, then
/// `adb` on `PATH`. Falls back to the bare name so the probe reports it missing.
pub fn locate_adb() -> PathBuf {
    let exe_name = if cfg!(target_os = "windows") { "adb.exe" } else { "adb" };

    let mut candidates = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        candidates.push(cwd.join(PLATFORM_TOOLS_DIR).join(exe_name));
    }
    if let Ok(mut exe_path) = env::current_exe() {
        exe_path.pop();
        candidates.push(exe_path.join(PLATFORM_TOOLS_DIR).join(exe_name));
    }

    candidates
        .into_iter()
        .find(|path| path.is_file())
        .or_else(|| which::which("adb").ok())
        .unwrap_or_else(|| PathBuf::from(exe_name))
}
