use std::fs::{File, OpenOptions};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use crate::engine::RunResult;

/// Try to enable ANSI escape sequence support on Windows consoles.
#[cfg(windows)]
pub fn try_enable_ansi_on_windows() -> bool {
    enable_ansi_support::enable_ansi_support().is_ok()
}

#[cfg(not(windows))]
pub fn try_enable_ansi_on_windows() -> bool {
    true
}

/// Whether stdout should get colored output.
pub fn use_color() -> bool {
    std::io::stdout().is_terminal() && try_enable_ansi_on_windows()
}

/// Color the `[TAG]` prefix of an outcome line.
pub fn colorize_line(line: &str) -> String {
    let Some(end) = line.find(']') else {
        return line.to_string();
    };
    let (tag, rest) = line.split_at(end + 1);
    let tag = match tag {
        "[OK]" => tag.green().to_string(),
        "[SKIP]" => tag.cyan().to_string(),
        "[MISS]" => tag.yellow().to_string(),
        "[ERR]" => tag.red().to_string(),
        "[CANCEL]" => tag.magenta().to_string(),
        _ => tag.to_string(),
    };
    format!("{}{}", tag, rest)
}

/// Overall progress bar for a run. Hidden when nothing should be drawn.
pub fn init_progress(total: u64, hidden: bool) -> Result<ProgressBar> {
    if hidden {
        return Ok(ProgressBar::hidden());
    }
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ETA {msg}",
    )
    .context("invalid progress template")?
    .progress_chars("=> ");
    let pb = ProgressBar::new(total);
    pb.set_style(style);
    pb.set_message("--:--:--");
    Ok(pb)
}

/// Convert a byte count into a human readable string using IEC units.
pub fn human_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GiB", b / GB)
    } else if b >= MB {
        format!("{:.2} MiB", b / MB)
    } else if b >= KB {
        format!("{:.2} KiB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

pub fn summary_line(result: &RunResult) -> String {
    let secs = result.elapsed.as_secs_f64();
    let rate = if secs > 0.0 { result.outcomes.len() as f64 / secs } else { 0.0 };
    let head = if result.was_cancelled { "Cancelled" } else { "Done" };
    format!(
        "{}: {}/{} ok | skip {} | miss {} | err {} | cancel {} | {} in {:.2}s ({:.1} items/s)",
        head,
        result.succeeded,
        result.total,
        result.skipped,
        result.missing,
        result.failed,
        result.cancelled,
        human_bytes(result.bytes),
        secs,
        rate
    )
}

pub fn summary_json(result: &RunResult, log_path: Option<&Path>) -> serde_json::Value {
    serde_json::json!({
        "succeeded": result.succeeded,
        "total": result.total,
        "skipped": result.skipped,
        "missing": result.missing,
        "failed": result.failed,
        "cancelled": result.cancelled,
        "was_cancelled": result.was_cancelled,
        "bytes": result.bytes,
        "elapsed_secs": result.elapsed.as_secs_f64(),
        "log_path": log_path.map(|p| p.to_string_lossy().to_string()),
    })
}

/// Append-only outcome log kept next to the transferred files. Each run is
/// framed by UTC-timestamped start/end markers. Write errors are ignored so a
/// read-only log never fails a run.
pub struct RunLog {
    path: PathBuf,
    file: Option<File>,
}

impl RunLog {
    pub const FILE_NAME: &'static str = "romsync.log";

    pub fn open(dir: &Path, title: &str) -> Self {
        let path = dir.join(Self::FILE_NAME);
        let mut file = OpenOptions::new().create(true).append(true).open(&path).ok();
        if file.is_none() {
            tracing::warn!(path = %path.display(), "cannot open run log");
        }
        if let Some(f) = file.as_mut() {
            let _ = writeln!(
                f,
                "===== START {} (UTC {}) =====",
                title,
                Utc::now().format("%Y%m%dT%H%M%SZ")
            );
        }
        Self { path, file }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_line(&mut self, line: &str) {
        if let Some(f) = self.file.as_mut() {
            let _ = writeln!(f, "{}", line);
        }
    }

    pub fn finish(mut self, summary: &str) {
        if let Some(f) = self.file.as_mut() {
            let _ = writeln!(f, "{}", summary);
            let _ = writeln!(f, "===== END (UTC {}) =====", Utc::now().format("%Y%m%dT%H%M%SZ"));
        }
    }
}
