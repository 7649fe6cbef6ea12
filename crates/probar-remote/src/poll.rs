//! Polling driver for native wait expressions.
//!
//! The poller evaluates a check once per tick until it holds or the budget
//! is spent. It always makes at least `max(1, ceil(timeout / frequency))`
//! attempts, even when individual ticks are slow.
//!
//! Errors are triaged per tick: transient remote kinds count as "not yet",
//! everything else (including cancellation) ends the wait immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::browser::Browser;
use crate::logging::Diagnostics;
use crate::result::{RemoteError, RemoteResult};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default polling frequency (250ms)
pub const DEFAULT_POLL_FREQUENCY_MS: u64 = 250;

/// Default session timeout (16 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 16_000;

/// Attempts owed before a wait may time out
#[must_use]
pub fn min_attempts(timeout_ms: u64, frequency_ms: u64) -> u64 {
    timeout_ms.div_ceil(frequency_ms.max(1)).max(1)
}

// =============================================================================
// CANCELLATION
// =============================================================================

/// Shared flag a caller raises to abort an in-progress wait
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A lowered flag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Lower the flag so the handle can be reused
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Whether the flag is raised
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// =============================================================================
// POLL OPTIONS
// =============================================================================

/// Options for a polling wait
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Budget in milliseconds; `None` uses the browser's current timeout
    pub timeout_ms: Option<u64>,
    /// Sleep between ticks in milliseconds
    pub frequency_ms: u64,
    /// Tick logging
    pub diagnostics: Diagnostics,
    /// Caller-held cancellation flag
    pub cancel: Option<CancelFlag>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            frequency_ms: DEFAULT_POLL_FREQUENCY_MS,
            diagnostics: Diagnostics::default(),
            cancel: None,
        }
    }
}

impl PollOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Set polling frequency in milliseconds
    #[must_use]
    pub const fn with_frequency(mut self, frequency_ms: u64) -> Self {
        self.frequency_ms = frequency_ms;
        self
    }

    /// Set diagnostics
    #[must_use]
    pub const fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Attach a cancellation flag
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Get frequency as Duration
    #[must_use]
    pub const fn frequency(&self) -> Duration {
        Duration::from_millis(self.frequency_ms)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}

// =============================================================================
// STATE / RESULT
// =============================================================================

/// Lifecycle of a single wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollState {
    /// Not started
    #[default]
    Idle,
    /// Ticking
    Polling,
    /// The check held
    Satisfied,
    /// Budget spent without the check holding
    TimedOut,
}

/// Outcome of a wait
#[derive(Debug, Clone)]
pub struct WaitResult {
    /// Whether the condition was satisfied
    pub success: bool,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of evaluations made
    pub attempts: u64,
    /// Description of what was waited for
    pub waited_for: String,
}

impl WaitResult {
    /// Create a successful wait result
    #[must_use]
    pub fn success(elapsed: Duration, attempts: u64, waited_for: impl Into<String>) -> Self {
        Self {
            success: true,
            elapsed,
            attempts,
            waited_for: waited_for.into(),
        }
    }

    /// Create a timed-out wait result
    #[must_use]
    pub fn timeout(elapsed: Duration, attempts: u64, waited_for: impl Into<String>) -> Self {
        Self {
            success: false,
            elapsed,
            attempts,
            waited_for: waited_for.into(),
        }
    }

    /// Satisfied without contacting the browser
    #[must_use]
    pub fn immediate(waited_for: impl Into<String>) -> Self {
        Self::success(Duration::ZERO, 0, waited_for)
    }
}

// =============================================================================
// POLLER
// =============================================================================

/// Runs a check until it holds or the budget is spent
#[derive(Debug, Clone, Default)]
pub struct Poller {
    options: PollOptions,
    state: PollState,
}

impl Poller {
    /// Create a poller with default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom options
    #[must_use]
    pub fn with_options(options: PollOptions) -> Self {
        Self {
            options,
            state: PollState::Idle,
        }
    }

    /// State after the most recent wait
    #[must_use]
    pub const fn state(&self) -> PollState {
        self.state
    }

    /// Options in use
    #[must_use]
    pub const fn options(&self) -> &PollOptions {
        &self.options
    }

    /// Poll `check` against `browser`.
    ///
    /// A timeout is reported as `Ok` with `success == false`.
    ///
    /// # Errors
    ///
    /// Non-transient errors from `check`, and [`RemoteError::Interrupted`]
    /// when the cancellation flag is raised.
    pub fn poll<F>(
        &mut self,
        browser: &mut dyn Browser,
        waited_for: &str,
        mut check: F,
    ) -> RemoteResult<WaitResult>
    where
        F: FnMut(&mut dyn Browser) -> RemoteResult<bool>,
    {
        let timeout_ms = self
            .options
            .timeout_ms
            .unwrap_or_else(|| browser.current_timeout());
        let timeout = Duration::from_millis(timeout_ms);
        let frequency = self.options.frequency();
        let required = min_attempts(timeout_ms, self.options.frequency_ms);
        let start = Instant::now();
        let mut attempts = 0_u64;

        self.state = PollState::Polling;
        debug!(waited_for, timeout_ms, required, "wait started");

        loop {
            if self.options.is_cancelled() {
                self.state = PollState::Idle;
                return Err(RemoteError::Interrupted);
            }

            attempts += 1;
            let satisfied = match check(browser) {
                Ok(satisfied) => satisfied,
                Err(err) if err.is_transient() => {
                    self.log_tick(attempts, &format!("transient: {err}"));
                    false
                }
                Err(err) => {
                    self.state = PollState::Idle;
                    debug!(waited_for, attempts, error = %err, "wait aborted");
                    return Err(err);
                }
            };
            self.log_tick(attempts, if satisfied { "satisfied" } else { "pending" });

            if satisfied {
                self.state = PollState::Satisfied;
                debug!(waited_for, attempts, "wait satisfied");
                return Ok(WaitResult::success(start.elapsed(), attempts, waited_for));
            }

            if attempts >= required && start.elapsed() >= timeout {
                self.state = PollState::TimedOut;
                debug!(waited_for, attempts, timeout_ms, "wait timed out");
                return Ok(WaitResult::timeout(start.elapsed(), attempts, waited_for));
            }

            std::thread::sleep(frequency);
        }
    }

    fn log_tick(&self, attempt: u64, outcome: &str) {
        if self.options.diagnostics.trace_ticks {
            debug!(attempt, outcome, "poll tick");
        } else {
            trace!(attempt, outcome, "poll tick");
        }
    }
}
