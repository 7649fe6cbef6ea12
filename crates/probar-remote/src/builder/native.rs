//! Wait expressions evaluated as native WebDriver calls.
//!
//! Each verb appends a [`Clause`] to an expression tree. The tree is walked
//! once per poll tick, every clause costing one or two remote round-trips.

use std::mem;

use tracing::debug;

use super::{WaitDirective, WaitExpression};
use crate::browser::Browser;
use crate::clause::{AjaxFlavor, CallableClause, Clause, Comparison};
use crate::expression::Expression;
use crate::logging::Diagnostics;
use crate::poll::{PollOptions, Poller, WaitResult};
use crate::result::{RemoteError, RemoteResult};

/// Where the next clause goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildState {
    /// ANDed onto the root
    #[default]
    Conjunction,
    /// Right operand of an OR whose left operand is everything so far
    DisjunctionPending,
}

/// Native-call wait expression for the WebDriver back-end
#[derive(Debug, Clone)]
pub struct NativeWaitExpression {
    root: Expression,
    state: BuildState,
    flavor: AjaxFlavor,
    options: PollOptions,
    error: Option<RemoteError>,
}

impl Default for NativeWaitExpression {
    fn default() -> Self {
        Self {
            root: Expression::empty(),
            state: BuildState::Conjunction,
            flavor: AjaxFlavor::default(),
            options: PollOptions::default(),
            error: None,
        }
    }
}

impl NativeWaitExpression {
    /// Empty expression, vacuously satisfied
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another ajax library's counters
    #[must_use]
    pub const fn with_flavor(mut self, flavor: AjaxFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Polling options for [`NativeWaitExpression::wait`]
    #[must_use]
    pub fn with_poll_options(mut self, options: PollOptions) -> Self {
        self.options = options;
        self
    }

    /// Tick logging
    #[must_use]
    pub const fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.options.diagnostics = diagnostics;
        self
    }

    /// Append caller-supplied logic as a clause
    #[must_use]
    pub fn callable(self, callable: CallableClause) -> Self {
        self.append(Clause::Callable(callable))
    }

    /// Append a JS-truthiness clause
    #[must_use]
    pub fn script(self, expression: impl Into<String>) -> Self {
        self.append(Clause::Script(expression.into()))
    }

    /// Append any clause
    #[must_use]
    pub fn clause(self, clause: Clause) -> Self {
        self.append(clause)
    }

    /// The expression tree built so far
    #[must_use]
    pub const fn expression(&self) -> &Expression {
        &self.root
    }

    /// Current build state
    #[must_use]
    pub const fn state(&self) -> BuildState {
        self.state
    }

    /// Evaluate the tree once.
    ///
    /// # Errors
    ///
    /// The deferred builder error, or the first clause error.
    pub fn evaluate(&self, browser: &mut dyn Browser) -> RemoteResult<bool> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        self.root.evaluate(browser)
    }

    /// Poll until the expression holds; `false` on timeout.
    ///
    /// `timeout_ms` of `None` uses the poll options, then the browser's
    /// current timeout.
    ///
    /// # Errors
    ///
    /// Builder errors, non-transient remote errors and cancellation.
    pub fn wait(&self, browser: &mut dyn Browser, timeout_ms: Option<u64>) -> RemoteResult<bool> {
        self.wait_result(browser, timeout_ms)
            .map(|result| result.success)
    }

    /// [`NativeWaitExpression::wait`] with the full [`WaitResult`]
    ///
    /// # Errors
    ///
    /// As [`NativeWaitExpression::wait`].
    pub fn wait_result(
        &self,
        browser: &mut dyn Browser,
        timeout_ms: Option<u64>,
    ) -> RemoteResult<WaitResult> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let mut options = self.options.clone();
        if let Some(timeout_ms) = timeout_ms {
            options.timeout_ms = Some(timeout_ms);
        }
        let label = self.root.to_string();
        let mut poller = Poller::with_options(options);
        poller.poll(browser, &label, |browser| self.root.evaluate(browser))
    }

    fn append(mut self, clause: Clause) -> Self {
        match self.state {
            BuildState::Conjunction => self.root.push(clause.into()),
            BuildState::DisjunctionPending => {
                let left = mem::take(&mut self.root);
                self.root = Expression::And(vec![Expression::Or(vec![left, clause.into()])]);
                self.state = BuildState::Conjunction;
            }
        }
        self
    }
}

impl WaitExpression for NativeWaitExpression {
    fn apply(self, directive: WaitDirective) -> Self {
        match directive {
            WaitDirective::ElementPresent(finder) => {
                self.append(Clause::ElementPresent(finder.locator()))
            }
            WaitDirective::ElementNotPresent(finder) => {
                self.append(Clause::ElementNotPresent(finder.locator()))
            }
            WaitDirective::ElementVisible(finder) => {
                self.append(Clause::ElementVisible(finder.locator()))
            }
            WaitDirective::ElementNotVisible(finder) => {
                self.append(Clause::ElementNotVisible(finder.locator()))
            }
            WaitDirective::EvaluateElement {
                finder,
                attribute,
                reference,
                compare,
            } => self.append(Clause::AttributeEquals {
                finder,
                attribute,
                reference,
                compare: compare.unwrap_or_else(Comparison::equals),
            }),
            WaitDirective::AjaxPending => {
                let flavor = self.flavor;
                self.append(Clause::AjaxPending(flavor))
            }
            WaitDirective::AjaxComplete => {
                let flavor = self.flavor;
                self.append(Clause::AjaxComplete(flavor))
            }
            WaitDirective::PageLoading => self.append(Clause::PageLoading),
            WaitDirective::PageReady => self.append(Clause::PageReady),
            WaitDirective::Or => self.disjoin(),
        }
    }

    fn fail(mut self, error: RemoteError) -> Self {
        if self.error.is_none() {
            debug!(error = %error, "wait expression builder error deferred");
            self.error = Some(error);
        }
        self
    }

    fn error(&self) -> Option<&RemoteError> {
        self.error.as_ref()
    }
}

impl NativeWaitExpression {
    /// Leading OR on an empty tree is ignored; repeated OR collapses.
    fn disjoin(mut self) -> Self {
        if !self.root.is_empty() {
            self.state = BuildState::DisjunctionPending;
        }
        self
    }
}
