//! Start-up tasks
//!
//! Includes:
//! - Logger initialization
//! - Folder structure initialization
//! - Tesseract availability check

use crate::background::processors::recognize::resolve_binary;
use crate::config::AppConfig;
use anstyle::{AnsiColor, Color, Style};
use anyhow::{Context, Result};
use env_logger::{Builder, WriteStyle};
use log::kv::Key;
use log::{error, info};
use std::{io::Write, process::Command};

// ────────────────────────────────────────────────────────────────
// Logger Initialization
// ────────────────────────────────────────────────────────────────

const DIMMED: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack)));
const HIGHLIGHT: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan)));

/// Install the process-wide logger.
///
/// Every record prints a header line (timestamp, level, target) followed by the
/// message, prefixed with the `duration` and `job_id` key-values when present.
pub fn initialize_logger() -> Result<()> {
    Builder::new()
        .write_style(WriteStyle::Auto)
        .format(|buf, record| {
            let ts = buf.timestamp();
            let level_style = buf.default_level_style(record.level());

            writeln!(
                buf,
                "{}{}{} {}{}{} {}{}{}",
                DIMMED.render(),
                ts,
                DIMMED.render_reset(),
                level_style.render(),
                record.level(),
                level_style.render_reset(),
                DIMMED.render(),
                record.target(),
                DIMMED.render_reset(),
            )?;

            // Durations arrive as `Debug` output ("1.234567ms"); keep 2 decimals
            let dur_raw = record
                .key_values()
                .get(Key::from("duration"))
                .map(|v| {
                    let s = format!("{}", v);
                    if let Some(idx) = s.find(|c: char| c.is_alphabetic()) {
                        let (num, unit) = (&s[..idx], &s[idx..]);
                        if let Ok(val) = num.parse::<f32>() {
                            return format!("{:.2} {}", val, unit);
                        }
                    }
                    s
                })
                .unwrap_or_default();

            let dur = if dur_raw.is_empty() {
                " ".repeat(10)
            } else {
                format!(
                    "{}{:>10}{}",
                    HIGHLIGHT.render(),
                    dur_raw,
                    HIGHLIGHT.render_reset()
                )
            };

            let job = record
                .key_values()
                .get(Key::from("job_id"))
                .map(|v| format!("[{}] ", v))
                .unwrap_or_default();

            let message = format!("{}", record.args());
            let subsequent_indent = " ".repeat(11);
            let mut lines = message.lines();

            if let Some(first_line) = lines.next() {
                writeln!(buf, "{} {}{}", dur, job, first_line)?;
            }
            for line in lines {
                writeln!(buf, "{}{}", subsequent_indent, line)?;
            }

            Ok(())
        })
        // INFO+ globally, WARN+ for Rocket; RUST_LOG overrides both
        .filter(None, log::LevelFilter::Info)
        .filter(Some("rocket"), log::LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .context("failed to install logger")
}

// ────────────────────────────────────────────────────────────────
// Folder Initialization
// ────────────────────────────────────────────────────────────────

/// Create the directory that will hold the redb file.
pub fn initialize_folder(config: &AppConfig) -> Result<()> {
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .context(format!("failed to create directory {:?}", parent))?;
        }
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────
// Tesseract Check
// ────────────────────────────────────────────────────────────────

/// Log the engine version, or an error when it cannot be found.
///
/// A missing engine does not stop start-up: every job will then fail with
/// `EngineNotFound`, which is reported per job.
pub fn check_tesseract(config: &AppConfig) {
    let binary = match resolve_binary(config.tesseract_path.as_deref()) {
        Ok(binary) => binary,
        Err(err) => {
            error!("{}. Jobs will fail until it is installed.", err);
            return;
        }
    };

    match Command::new(&binary).arg("--version").output() {
        Ok(output) if output.status.success() => {
            // Older builds print the banner on stderr
            let banner = if output.stdout.is_empty() {
                String::from_utf8_lossy(&output.stderr).into_owned()
            } else {
                String::from_utf8_lossy(&output.stdout).into_owned()
            };
            let version = banner.lines().next().unwrap_or("Unknown version");
            info!("{} ({:?})", version, binary);
        }
        Ok(output) => {
            error!(
                "`{:?}` was found, but `--version` exited with {:?}. Please ensure it's correctly installed.",
                binary,
                output.status.code()
            );
        }
        Err(err) => {
            error!("`{:?}` could not be executed: {}", binary, err);
        }
    }
}
