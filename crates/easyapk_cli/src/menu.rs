use crate::app::{self, App};
use crate::ui;
use colored::*;
use easyapk_core::constants::*;
use easyapk_core::{BatchRequest, InstallOptions, PackageScanner};
use figlet_rs::FIGfont;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Write};
use std::path::PathBuf;

/// What the interactive menu remembers between actions.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub devices: Vec<String>,
    pub package_dir: Option<PathBuf>,
    pub options: InstallOptions,
}

impl Session {
    pub fn from_app(app: &App) -> Self {
        Self {
            devices: Vec::new(),
            package_dir: app.settings.package_dir.clone(),
            options: app.settings.install_options(),
        }
    }

    pub fn toggle_grant(&mut self) -> bool {
        self.options.grant_all_permissions = !self.options.grant_all_permissions;
        self.options.grant_all_permissions
    }

    fn status_line(&self) -> String {
        let devices = if self.devices.is_empty() {
            "auto".to_string()
        } else {
            self.devices.join(", ")
        };
        let folder = self
            .package_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "not set".to_string());
        let grant = if self.options.grant_all_permissions { "on" } else { "off" };
        format!("Devices: {devices}  Folder: {folder}  Grant (-g): {grant}")
    }
}

pub async fn run_interactive_loop(app: &App) -> anyhow::Result<()> {
    let mut session = Session::from_app(app);
    let mut rl = DefaultEditor::new()?;
    loop {
        refresh_ui(&session);
        match rl.readline("> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);
                if input == "0" {
                    println!("{}", "\nGoodbye!".green());
                    break;
                }
                println!();
                handle_menu_action(input, app, &mut session).await;
                ui::pause_before_back();
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "\nExited with Ctrl+C".yellow());
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "\nExited on end of input".yellow());
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn refresh_ui(session: &Session) {
    print!("\x1b[2J\x1b[H");
    let _ = io::stdout().flush();

    println!();
    println!("{}", banner().cyan().bold());
    println!("Version: {}  Author: {}", VERSION.yellow(), AUTHOR.yellow());

    ui::divider(80);
    for warning in WARNING_TEXTS {
        println!("{}", warning.red().bold());
    }
    ui::divider(80);
    for info in INFO_TEXTS {
        println!("{}", info.green());
    }
    ui::divider(80);
    for (id, desc) in MENU_OPTIONS.iter() {
        println!("{}{}", format!("{:>2}. ", id).bright_cyan(), desc);
    }
    ui::divider(80);
    println!("{}", session.status_line().bright_black());
}

/// FIGlet rendering of the app name, or the plain name if the font fails to load.
fn banner() -> String {
    let font = FIGfont::standard().ok();
    match font.as_ref().and_then(|f| f.convert(APP_NAME)) {
        Some(art) => art.to_string(),
        None => APP_NAME.to_string(),
    }
}

async fn handle_menu_action(choice: &str, app: &App, session: &mut Session) {
    match choice {
        "1" => select_devices(app, session).await,
        "2" => set_package_dir(session),
        "3" => {
            let on = session.toggle_grant();
            ui::ok(&format!("Grant all permissions (-g) is now {}", if on { "ON" } else { "OFF" }));
        }
        "4" => install(app, session, Vec::new()).await,
        "5" => install_single(app, session).await,
        "6" => show_details(app, session).await,
        "7" => about(),
        _ => ui::warn(&format!("Unknown option: {choice}")),
    }
}

async fn select_devices(app: &App, session: &mut Session) {
    ui::step("Looking for devices...");
    let devices = match app.adb.list_devices().await {
        Ok(devices) => devices,
        Err(e) => {
            ui::err(&format!("Cannot list devices: {e}"));
            return;
        }
    };
    if devices.is_empty() {
        ui::err("No devices attached. Check the cable and USB debugging.");
        return;
    }

    ui::divider(60);
    for (i, device) in devices.iter().enumerate() {
        println!("{}{}", format!("{:>3}. ", i + 1).bright_cyan(), device.label().bright_white());
    }
    ui::divider(60);

    let Some(input) = ui::prompt("Numbers separated by commas, or 'a' for all:") else {
        return;
    };
    if input.eq_ignore_ascii_case("a") {
        session.devices = devices.into_iter().map(|d| d.serial).collect();
    } else if let Some(picked) = ui::parse_selection(&input, devices.len()) {
        session.devices = picked.into_iter().map(|i| devices[i].serial.clone()).collect();
    } else {
        ui::err("Invalid selection.");
        return;
    }
    ui::ok(&format!("Selected: {}", session.devices.join(", ")));
}

fn set_package_dir(session: &mut Session) {
    let Some(input) = ui::prompt("APK folder path:") else {
        return;
    };
    let path = PathBuf::from(input.trim_matches('"'));
    if !path.is_dir() {
        ui::err(&format!("Not a folder: {}", path.display()));
        return;
    }
    let count = PackageScanner::scan(&path).len();
    if count == 0 {
        ui::warn("The folder has no APK files yet.");
    } else {
        ui::ok(&format!("{count} APK file(s) found"));
    }
    session.package_dir = Some(path);
}

async fn install(app: &App, session: &Session, packages: Vec<String>) {
    let Some(dir) = session.package_dir.clone() else {
        ui::err("Set the APK folder first (option 2).");
        return;
    };
    let request = BatchRequest::new(session.devices.clone(), dir)
        .options(session.options)
        .only(packages);
    let log_dir = app.log_dir(None);

    let what = if request.packages.is_empty() {
        format!("every APK in {}", request.source_dir.display())
    } else {
        request.packages.join(", ")
    };
    if !ui::confirm(&format!("Install {what}?"), true) {
        ui::warn("Cancelled.");
        return;
    }
    ui::step("Starting installation...");
    match app.install(request, log_dir.as_deref(), false).await {
        Ok(summary) => app::print_summary(&summary),
        Err(e) => ui::err(&format!("{e:#}")),
    }
}

async fn install_single(app: &App, session: &Session) {
    let Some(dir) = session.package_dir.as_ref() else {
        ui::err("Set the APK folder first (option 2).");
        return;
    };
    let packages = PackageScanner::scan(dir);
    if packages.is_empty() {
        ui::err(&format!("No APK files in {}", dir.display()));
        return;
    }

    ui::divider(60);
    for (i, package) in packages.iter().enumerate() {
        println!("{}{}", format!("{:>3}. ", i + 1).bright_cyan(), package.name.bright_white());
    }
    ui::divider(60);

    let Some(input) = ui::prompt("APK number:") else {
        return;
    };
    match ui::parse_selection(&input, packages.len()).as_deref() {
        Some([index]) => {
            let name = packages[*index].name.clone();
            install(app, session, vec![name]).await;
        }
        _ => ui::err("Pick exactly one APK."),
    }
}

async fn show_details(app: &App, session: &Session) {
    let serials = match app.orchestrator.resolve_devices(&session.devices).await {
        Ok(serials) => serials,
        Err(e) => {
            ui::err(&e.to_string());
            return;
        }
    };
    for serial in serials {
        ui::step(&format!("Reading {serial}..."));
        let details = app.adb.device_details(&serial).await;
        app::print_details(&details);
    }
}

fn about() {
    ui::divider(60);
    println!("{} {}", APP_NAME.cyan().bold(), VERSION.yellow());
    println!("Installs every APK in a folder on one or many Android devices over adb.");
    println!("Author: {}", AUTHOR.yellow());
    println!("Homepage: {}", HOMEPAGE.blue());
    ui::divider(60);
}
