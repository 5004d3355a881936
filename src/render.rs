//! Terminal output: colours, section headers and dot-leader lines.

use tokio::process::Command;

pub const RED: &str = "\x1b[0;31m";
pub const GREEN: &str = "\x1b[0;32m";
pub const YELLOW: &str = "\x1b[0;33m";
pub const BLUE: &str = "\x1b[0;34m";
pub const CYAN: &str = "\x1b[0;36m";
pub const BOLD: &str = "\x1b[1m";
pub const RESET: &str = "\x1b[0m";

const DOT_LABEL_WIDTH: usize = 22;

/// Severity of a status line, mapped to a colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// Nothing to report.
    Ok,
    Caution,
    Alert,
    /// Plain informational value.
    Info,
}

impl Indicator {
    pub fn color(self) -> &'static str {
        match self {
            Indicator::Ok => GREEN,
            Indicator::Caution => YELLOW,
            Indicator::Alert => RED,
            Indicator::Info => BLUE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub label: String,
    pub indicator: Indicator,
    pub message: String,
}

impl StatusLine {
    pub fn new(label: impl Into<String>, indicator: Indicator, message: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            indicator,
            message: message.into(),
        }
    }

    pub fn info(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(label, Indicator::Info, message)
    }
}

pub fn dot_label(label: &str) -> String {
    let dots = DOT_LABEL_WIDTH.saturating_sub(label.chars().count());
    format!("{}{}: ", label, ".".repeat(dots))
}

pub fn format_line(line: &StatusLine) -> String {
    format!(
        "{}{}{}{}",
        dot_label(&line.label),
        line.indicator.color(),
        line.message,
        RESET
    )
}

pub fn print_lines(lines: &[StatusLine]) {
    for line in lines {
        println!("{}", format_line(line));
    }
}

pub fn print_section(title: &str) {
    println!("\n{}{}━━━ {} ━━━{}", BOLD, CYAN, title, RESET);
}

/// Prints the hostname banner, through figlet and lolcat when both exist.
pub async fn print_header() {
    println!();
    let hostname = hostname();

    if has_command("figlet") && has_command("lolcat") {
        let script = format!("figlet '{}' | lolcat -f", hostname.replace('\'', ""));
        if let Ok(out) = Command::new("sh").arg("-c").arg(script).output().await {
            print!("{}", String::from_utf8_lossy(&out.stdout));
        }
    } else {
        println!("{}{}╔══════════════════════════════════════╗{}", BOLD, CYAN, RESET);
        println!("{}{}║  Connected to: {:<20}  ║{}", BOLD, CYAN, hostname, RESET);
        println!("{}{}╚══════════════════════════════════════╝{}", BOLD, CYAN, RESET);
    }
    println!();
}

fn hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string())
}

/// Looks `name` up on `PATH`.
pub fn has_command(name: &str) -> bool {
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| {
        let candidate = dir.join(name);
        candidate.is_file() || (cfg!(windows) && candidate.with_extension("exe").is_file())
    })
}
