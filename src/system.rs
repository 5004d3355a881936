//! Host metrics. Each line comes from one external command; if the command
//! is missing or its output does not parse, the line is left out.

use chrono::Datelike;
use tokio::process::Command;

use crate::render::{Indicator, StatusLine};

const GIB: f64 = 1_073_741_824.0;
/// `df` reports 1K blocks.
const KIB_PER_GIB: f64 = 1_048_576.0;

/// Optional tools whose absence only hides a line.
pub const OPTIONAL_TOOLS: &[&str] = &["figlet", "lolcat", "vnstat", "docker", "sensors"];

async fn run(program: &str, args: &[&str]) -> Option<String> {
    match Command::new(program).args(args).output().await {
        Ok(out) if out.status.success() => Some(String::from_utf8_lossy(&out.stdout).into_owned()),
        Ok(out) => {
            tracing::debug!("{} exited with {}", program, out.status);
            None
        }
        Err(e) => {
            tracing::debug!("could not run {}: {}", program, e);
            None
        }
    }
}

async fn shell(script: &str) -> Option<String> {
    run("sh", &["-c", script]).await
}

pub async fn system_information() -> Vec<StatusLine> {
    let mut lines = vec![os_release()];
    if let Some(up) = run("uptime", &["-p"]).await {
        lines.push(StatusLine::info("Uptime", parse_uptime(&up)));
    }
    if let Some(out) = run("uptime", &[]).await {
        lines.push(StatusLine::info("CPU Load", parse_load(&out).unwrap_or_default()));
    }
    if let Some(mem) = run("free", &["-b"]).await.as_deref().and_then(parse_memory) {
        lines.push(StatusLine::info("Memory", mem));
    }
    if crate::render::has_command("vnstat") {
        if let Some(out) = run("vnstat", &["--oneline", "b"]).await {
            let day = chrono::Local::now().day();
            if let Some((rx, tx)) = parse_bandwidth(&out, day) {
                lines.push(StatusLine::info("Bandwidth (rx)", rx));
                lines.push(StatusLine::info("Bandwidth (tx)", tx));
            }
        }
    }
    lines
}

pub async fn services_and_resources(tank_mount: &str) -> Vec<StatusLine> {
    let mut lines = Vec::new();
    if let Some(users) = shell("who | awk '{print $1}' | sort -u | wc -l").await {
        lines.push(StatusLine::info("Logged in users", users.trim()));
    }
    if let Some(procs) = shell("ps -e --no-headers | wc -l").await {
        lines.push(StatusLine::info("Processes", procs.trim()));
    }
    if crate::render::has_command("docker") {
        if let Some(out) = run("docker", &["ps", "-q"]).await {
            lines.push(StatusLine::info(
                "Docker Containers",
                format!("{} running", count_lines(&out)),
            ));
        }
    }

    let mut mounts = vec!["/"];
    if !tank_mount.is_empty() {
        mounts.push(tank_mount);
    }
    for mount in mounts {
        if let Some(usage) = run("df", &[mount]).await.as_deref().and_then(parse_df) {
            lines.push(StatusLine::info(format!("Disk ({})", mount), usage));
        }
    }

    if crate::render::has_command("sensors") {
        if let Some(temp) = run("sensors", &[]).await.as_deref().and_then(parse_temperature) {
            lines.push(StatusLine::new("CPU Temperature", Indicator::Alert, temp));
        }
    }
    lines
}

/// Warns on stderr about each optional tool that is not installed.
pub fn warn_missing_tools() {
    for tool in OPTIONAL_TOOLS {
        if !crate::render::has_command(tool) {
            eprintln!("warning: optional dependency '{}' not found", tool);
        }
    }
}

fn os_release() -> StatusLine {
    let release = std::fs::read_to_string("/etc/os-release")
        .ok()
        .and_then(|text| parse_os_release(&text))
        .unwrap_or_else(|| "Unknown".to_string());
    StatusLine::info("OS Release", release)
}

fn parse_os_release(text: &str) -> Option<String> {
    text.lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|v| v.trim().trim_matches('"').to_string())
}

fn parse_uptime(out: &str) -> String {
    let out = out.trim();
    out.strip_prefix("up ").unwrap_or(out).to_string()
}

fn parse_load(out: &str) -> Option<String> {
    out.split("load average: ").nth(1).map(|s| s.trim().to_string())
}

fn parse_memory(out: &str) -> Option<String> {
    let line = out.lines().find(|l| l.starts_with("Mem:"))?;
    let fields: Vec<&str> = line.split_whitespace().collect();
    let total: f64 = fields.get(1)?.parse().ok()?;
    let used: f64 = fields.get(2)?.parse().ok()?;
    Some(format!("{:.2} GB / {:.2} GB", used / GIB, total / GIB))
}

/// `vnstat --oneline b` fields 4 and 5 are this month's rx/tx bytes; the
/// estimate scales them to a 30-day month.
fn parse_bandwidth(out: &str, day_of_month: u32) -> Option<(String, String)> {
    if out.contains("no data available") {
        return None;
    }
    let parts: Vec<&str> = out.trim().split(';').collect();
    let rx: f64 = parts.get(3)?.trim().parse().ok()?;
    let tx: f64 = parts.get(4)?.trim().parse().ok()?;
    let scale = 30.0 / f64::from(day_of_month.max(1));
    let fmt = |bytes: f64| format!("{:.2} GB / {:.2} GB est", bytes / GIB, bytes / GIB * scale);
    Some((fmt(rx), fmt(tx)))
}

fn count_lines(out: &str) -> usize {
    out.lines().filter(|l| !l.trim().is_empty()).count()
}

fn parse_df(out: &str) -> Option<String> {
    let fields: Vec<&str> = out.lines().nth(1)?.split_whitespace().collect();
    if fields.len() < 5 {
        return None;
    }
    let total: f64 = fields[1].parse().ok()?;
    let used: f64 = fields[2].parse().ok()?;
    let pct = fields[4].trim_end_matches('%');
    Some(format!(
        "{:.2} GB / {:.2} GB ({}% used)",
        used / KIB_PER_GIB,
        total / KIB_PER_GIB,
        pct
    ))
}

fn parse_temperature(out: &str) -> Option<String> {
    let line = out.lines().find(|l| l.contains("Package id 0:"))?;
    line.split_whitespace().nth(3).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_release_pretty_name() {
        let text = "NAME=\"Debian GNU/Linux\"\nPRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\nID=debian\n";
        assert_eq!(parse_os_release(text).as_deref(), Some("Debian GNU/Linux 12 (bookworm)"));
        assert_eq!(parse_os_release("ID=alpine\n"), None);
    }

    #[test]
    fn uptime_and_load() {
        assert_eq!(parse_uptime("up 3 days, 4 hours\n"), "3 days, 4 hours");
        assert_eq!(
            parse_load(" 10:00:01 up 3 days,  2 users,  load average: 0.15, 0.10, 0.05\n").as_deref(),
            Some("0.15, 0.10, 0.05")
        );
    }

    #[test]
    fn memory_from_free() {
        let out = "               total        used        free\nMem:     17179869184  4294967296  12884901888\nSwap:              0           0           0\n";
        assert_eq!(parse_memory(out).as_deref(), Some("4.00 GB / 16.00 GB"));
    }

    #[test]
    fn bandwidth_estimate_scales_by_day() {
        let out = "1;eth0;2024-06-15;2147483648;1073741824;3221225472;1.00 Mbit/s;x;y;z;w\n";
        let (rx, tx) = parse_bandwidth(out, 15).unwrap();
        assert_eq!(rx, "2.00 GB / 4.00 GB est");
        assert_eq!(tx, "1.00 GB / 2.00 GB est");
        assert!(parse_bandwidth("eth0: no data available", 1).is_none());
    }

    #[test]
    fn disk_usage_from_df() {
        let out = "Filesystem     1K-blocks     Used Available Use% Mounted on\n/dev/sda1      104857600 52428800  52428800  50% /\n";
        assert_eq!(parse_df(out).as_deref(), Some("50.00 GB / 100.00 GB (50% used)"));
        assert!(parse_df("Filesystem\n").is_none());
    }

    #[test]
    fn package_temperature() {
        let out = "coretemp-isa-0000\nAdapter: ISA adapter\nPackage id 0:  +45.0°C  (high = +80.0°C, crit = +100.0°C)\n";
        assert_eq!(parse_temperature(out).as_deref(), Some("+45.0°C"));
    }

    #[test]
    fn container_count_ignores_blank_output() {
        assert_eq!(count_lines(""), 0);
        assert_eq!(count_lines("abc\ndef\n"), 2);
    }
}
