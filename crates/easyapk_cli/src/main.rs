mod app;
mod interrupt;
mod menu;
mod reporter;
mod ui;
mod utils;

use crate::app::App;
use crate::interrupt::InterruptHub;
use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use easyapk_core::{BatchRequest, Settings};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[cfg(target_os = "windows")]
use windows_sys::Win32::System::Console::{
    GetStdHandle, GetConsoleMode, SetConsoleMode, SetConsoleOutputCP, GetConsoleScreenBufferInfo,
    SetConsoleScreenBufferSize, STD_OUTPUT_HANDLE, ENABLE_VIRTUAL_TERMINAL_PROCESSING,
    CONSOLE_SCREEN_BUFFER_INFO, COORD,
};
#[cfg(target_os = "windows")]
use windows_sys::Win32::Foundation::HANDLE;

#[derive(Parser, Debug)]
#[command(name = "easyapk", version, about = "Install a folder of APKs on many Android devices at once")]
struct Args {
    /// Settings file (default: easyapk.toml next to the working dir or the binary)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// adb executable to use
    #[arg(long, global = true, value_name = "PATH")]
    adb: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List attached devices
    Devices {
        /// Also read model, RAM, storage and CPU of each device
        #[arg(long)]
        details: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show detailed information for one device
    Info {
        #[arg(short, long)]
        serial: Option<String>,
    },
    /// Install every APK in a folder on the selected devices
    Install(InstallArgs),
    /// Interactive menu
    Menu,
}

#[derive(clap::Args, Debug)]
struct InstallArgs {
    /// Folder holding the APK files (default: package_dir from the settings)
    dir: Option<PathBuf>,

    /// Target device; repeat for several. Omit with a single device attached.
    #[arg(short, long = "serial", value_name = "SERIAL")]
    serials: Vec<String>,

    /// Target every attached device
    #[arg(long, conflicts_with = "serials")]
    all_devices: bool,

    /// Only install this file name from the folder; repeatable
    #[arg(short, long = "package", value_name = "NAME")]
    packages: Vec<String>,

    /// Grant all runtime permissions (adb install -g)
    #[arg(short, long)]
    grant: bool,

    /// Do not pass -r, so already installed apps fail
    #[arg(long)]
    no_reinstall: bool,

    /// Per-package install timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Write one log file per device into this folder
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Print the summary as JSON instead of progress bars
    #[arg(long)]
    json: bool,
}

#[cfg(target_os = "windows")]
fn set_console_window_properties() {
    unsafe {
        let console_handle: HANDLE = GetStdHandle(STD_OUTPUT_HANDLE);
        if console_handle.is_null() {
            return;
        }

        let mut mode: u32 = 0;
        if GetConsoleMode(console_handle, &mut mode) != 0 {
            let _ = SetConsoleMode(console_handle, mode | ENABLE_VIRTUAL_TERMINAL_PROCESSING);
        }

        SetConsoleOutputCP(65001);

        // Wide enough for the banner and the per-device progress bars.
        let mut info: CONSOLE_SCREEN_BUFFER_INFO = std::mem::zeroed();
        if GetConsoleScreenBufferInfo(console_handle, &mut info) == 0 {
            return;
        }
        if info.dwSize.X < 120 {
            let buf = COORD { X: 120, Y: info.dwSize.Y };
            let _ = SetConsoleScreenBufferSize(console_handle, buf);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_settings(args: &Args) -> anyhow::Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => match utils::path_resolver::find_config() {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading settings");
                Settings::load(&path)?
            }
            None => Settings::default(),
        },
    };
    if let Some(adb) = &args.adb {
        settings.adb_path = Some(adb.clone());
    }
    if let Some(Commands::Install(install)) = &args.command {
        if let Some(secs) = install.timeout {
            settings.install_timeout_secs = secs;
        }
        if install.grant {
            settings.grant_permissions = true;
        }
        if install.no_reinstall {
            settings.reinstall = false;
        }
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> ExitCode {
    #[cfg(target_os = "windows")]
    set_console_window_properties();

    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            ui::err(&format!("{e:#}"));
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let settings = load_settings(&args)?;
    let interrupts = InterruptHub::install()?;
    let app = App::new(settings, interrupts);

    match args.command.unwrap_or(Commands::Menu) {
        Commands::Devices { details, json } => cmd_devices(&app, details, json).await,
        Commands::Info { serial } => cmd_info(&app, serial).await,
        Commands::Install(install) => cmd_install(&app, install).await,
        Commands::Menu => {
            menu::run_interactive_loop(&app).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn cmd_devices(app: &App, details: bool, json: bool) -> anyhow::Result<ExitCode> {
    let devices = app
        .adb
        .list_devices()
        .await
        .context("cannot list devices")?;

    if json {
        let text = if details {
            let mut all = Vec::with_capacity(devices.len());
            for device in &devices {
                all.push(app.adb.device_details(&device.serial).await);
            }
            serde_json::to_string_pretty(&all)?
        } else {
            serde_json::to_string_pretty(&devices)?
        };
        println!("{text}");
        return Ok(ExitCode::SUCCESS);
    }

    if devices.is_empty() {
        ui::warn("No devices attached.");
        return Ok(ExitCode::SUCCESS);
    }
    ui::ok(&format!("{} device(s) attached", devices.len()));
    for device in &devices {
        if details {
            app::print_details(&app.adb.device_details(&device.serial).await);
        } else {
            println!("  {}  {}", device.serial.cyan(), device.model.bright_white());
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_info(app: &App, serial: Option<String>) -> anyhow::Result<ExitCode> {
    let requested: Vec<String> = serial.into_iter().collect();
    let serials = app.orchestrator.resolve_devices(&requested).await?;
    for serial in serials {
        ui::step(&format!("Reading {serial}..."));
        app::print_details(&app.adb.device_details(&serial).await);
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_install(app: &App, args: InstallArgs) -> anyhow::Result<ExitCode> {
    let dir = args
        .dir
        .or_else(|| app.settings.package_dir.clone())
        .context("no APK folder given (pass DIR or set package_dir in the settings)")?;

    let serials = if args.all_devices {
        app.adb
            .list_devices()
            .await
            .context("cannot list devices")?
            .into_iter()
            .map(|d| d.serial)
            .collect()
    } else {
        args.serials
    };

    let request = BatchRequest::new(serials, dir)
        .options(app.settings.install_options())
        .only(args.packages);
    let log_dir = app.log_dir(args.log_dir);

    if !args.json {
        ui::step("Starting installation (Ctrl+C skips the current APK, twice cancels)");
    }
    let summary = app.install(request, log_dir.as_deref(), args.json).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        app::print_summary(&summary);
    }
    Ok(if summary.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
