//! Logging setup.
//!
//! All components log through `tracing`. The binary (or any embedder that
//! wants ringrpc's output format) calls `init()` once; later calls are
//! no-ops.
//!
//! # Environment Variables
//!
//! - `RINGRPC_LOG_LEVEL=<level>` - off, error, warn, info, debug, trace,
//!   or the numeric form 0=off .. 5=trace. Default: info.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::level_filters::LevelFilter;

pub const LOG_LEVEL_ENV: &str = "RINGRPC_LOG_LEVEL";

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Unknown names map to `Info`.
    pub fn parse(val: &str) -> Self {
        match val.trim().to_lowercase().as_str() {
            "off" | "0" => LogLevel::Off,
            "error" | "1" => LogLevel::Error,
            "warn" | "2" => LogLevel::Warn,
            "info" | "3" => LogLevel::Info,
            "debug" | "4" => LogLevel::Debug,
            "trace" | "5" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }

    pub fn from_env() -> Self {
        std::env::var(LOG_LEVEL_ENV)
            .map(|v| Self::parse(&v))
            .unwrap_or(LogLevel::Info)
    }

    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Install the stderr subscriber at the level from `RINGRPC_LOG_LEVEL`.
pub fn init() {
    init_with(LogLevel::from_env());
}

/// Install the stderr subscriber at `level`.
pub fn init_with(level: LogLevel) {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }
    // Another global subscriber may already be set by the embedder.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level.filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
