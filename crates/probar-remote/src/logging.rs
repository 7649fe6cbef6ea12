//! Diagnostics switches and optional `tracing` subscriber setup.
//!
//! Nothing here runs at load time. Wait expressions and pollers receive a
//! [`Diagnostics`] value from their caller, and a subscriber is installed only
//! when [`init_tracing`] is called.
//!
//! ## Environment Variables
//!
//! - `PROBAR_REMOTE_LOG` or `RUST_LOG`: filter directive
//!   (e.g. `probar_remote=debug,warn`)
//! - `PROBAR_REMOTE_LOG_FORMAT`: `compact` (default) or `json`

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter applied when none is supplied or the supplied one is invalid
pub const DEFAULT_FILTER: &str = "probar_remote=info,warn";

/// Per-wait diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Diagnostics {
    /// Log every poll tick at debug level instead of trace
    pub trace_ticks: bool,
    /// Emit `LOG.info` calls into compiled RC scripts
    pub script_console: bool,
}

impl Diagnostics {
    /// Everything off
    #[must_use]
    pub const fn new() -> Self {
        Self {
            trace_ticks: false,
            script_console: false,
        }
    }

    /// Everything on
    #[must_use]
    pub const fn verbose() -> Self {
        Self {
            trace_ticks: true,
            script_console: true,
        }
    }

    /// Toggle per-tick logging
    #[must_use]
    pub const fn with_trace_ticks(mut self, enabled: bool) -> Self {
        self.trace_ticks = enabled;
        self
    }

    /// Toggle in-browser console diagnostics
    #[must_use]
    pub const fn with_script_console(mut self, enabled: bool) -> Self {
        self.script_console = enabled;
        self
    }
}

/// Subscriber output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single-line human output
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Parse leniently; unknown names fall back to compact
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Compact
        }
    }
}

/// Filter directive from the environment, or [`DEFAULT_FILTER`]
#[must_use]
pub fn env_filter_directive() -> String {
    std::env::var("PROBAR_REMOTE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| DEFAULT_FILTER.to_string())
}

/// Install a global subscriber.
///
/// Returns `false` when a subscriber was already installed; calling twice
/// is harmless.
pub fn init_tracing(filter: &str, format: LogFormat) -> bool {
    let env_filter =
        EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true))
            .try_init()
            .is_ok(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().compact().with_target(true))
            .try_init()
            .is_ok(),
    }
}

/// [`init_tracing`] driven by environment variables
pub fn init_from_env() -> bool {
    let format = std::env::var("PROBAR_REMOTE_LOG_FORMAT")
        .map(|s| LogFormat::parse(&s))
        .unwrap_or_default();
    init_tracing(&env_filter_directive(), format)
}
