//! File-backed tracing initialization for host applications.
//!
//! Embedders call [`init`] once at startup; the engine itself only emits
//! `tracing` events and never installs a subscriber on its own.

use std::fmt;
use std::sync::OnceLock;
use std::time::SystemTime;

use crate::config::EngineConfig;

struct WaymarkTimer;

impl tracing_subscriber::fmt::time::FormatTime for WaymarkTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let secs = match SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_secs()).unwrap_or(0),
            Err(_) => 0,
        };
        let s = crate::util::ts_to_date(Some(secs)); // "YYYY-MM-DD HH:MM:SS"
        let ts = s.replacen(' ', "-T", 1); // "YYYY-MM-DD-T HH:MM:SS"
        w.write_str(&ts)
    }
}

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// What: Initialize tracing with a non-blocking file writer under the engine data dir.
///
/// Inputs:
/// - `config`: Engine configuration whose `logs_dir()` receives `waymark.log`.
///
/// Output:
/// - Installs the global subscriber; falls back to stderr if the log file cannot be opened.
///
/// Details:
/// - Honors `RUST_LOG` via `EnvFilter`, defaulting to `info`.
/// - Safe to call once per process; subsequent calls are ignored by the subscriber.
pub fn init(config: &EngineConfig) {
    let mut log_path = config.logs_dir();
    log_path.push("waymark.log");
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_timer(WaymarkTimer)
                .try_init();
            let _ = LOG_GUARD.set(guard);
            tracing::info!(path = %log_path.display(), "logging initialized");
        }
        Err(e) => {
            // Fallback: init stderr logger to avoid blocking startup
            let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(true)
                .with_timer(WaymarkTimer)
                .try_init();
            tracing::warn!(error = %e, "failed to open log file; using stderr");
        }
    }
}
