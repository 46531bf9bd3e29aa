use colored::*;
use rustyline::DefaultEditor;
use std::io::{self, Write};

pub fn step(msg: &str) {
    println!("{} {}", ">>".cyan().bold(), msg.bright_white());
}

pub fn ok(msg: &str) {
    println!("{} {}", "✔".green().bold(), msg.green());
}

pub fn warn(msg: &str) {
    println!("{} {}", "⚠️".yellow().bold(), msg.yellow());
}

pub fn err(msg: &str) {
    println!("{} {}", "[!]".red().bold(), msg.red());
}

pub fn divider(width: usize) {
    println!("{}", "=".repeat(width).white());
}

/// Reads one trimmed line; `None` on Ctrl-C, EOF or a dead terminal.
pub fn prompt(msg: &str) -> Option<String> {
    print!("{} ", msg.cyan());
    let _ = io::stdout().flush();
    let mut rl = DefaultEditor::new().ok()?;
    rl.readline("> ").ok().map(|line| line.trim().to_string())
}

pub fn confirm(msg: &str, default_yes: bool) -> bool {
    let hint = if default_yes { "[Y/n]" } else { "[y/N]" };
    match prompt(&format!("{msg} {hint}")) {
        Some(line) if line.is_empty() => default_yes,
        Some(line) => line.eq_ignore_ascii_case("y"),
        None => default_yes,
    }
}

pub fn pause_before_back() {
    print!("\n{}", "Press Enter to return to the main menu...".bright_black());
    let _ = io::stdout().flush();
    let mut unused = String::new();
    let _ = io::stdin().read_line(&mut unused);
}

/// Parses menu selections like `1,3, 4` (1-based) into 0-based indexes.
/// Out-of-range or non-numeric entries reject the whole selection.
pub fn parse_selection(input: &str, len: usize) -> Option<Vec<usize>> {
    let mut picked = Vec::new();
    for part in input.split([',', ' ']).filter(|p| !p.is_empty()) {
        let n: usize = part.parse().ok()?;
        if n == 0 || n > len {
            return None;
        }
        if !picked.contains(&(n - 1)) {
            picked.push(n - 1);
        }
    }
    if picked.is_empty() { None } else { Some(picked) }
}
