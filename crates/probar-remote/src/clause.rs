//! Predicate clauses: the atomic conditions of a wait expression.
//!
//! A clause evaluates to `Ok(false)` when its condition does not hold yet and
//! only returns `Err` for a genuine remote failure. Presence and visibility
//! lookups fold the "element missing" family into `false` themselves.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::browser::{is_truthy, Browser};
use crate::locator::{Finder, Locator};
use crate::result::{RemoteError, RemoteResult};
use crate::status::ErrorKind;

/// Window property set right before a navigating action
pub const PAGE_SENTINEL: &str = "__probar_remote_page__";

/// Wrap an expression so `execute` returns its value
#[must_use]
pub fn value_script(expression: &str) -> String {
    format!("return (function() {{ var value = {expression}; return value; }})()")
}

// =============================================================================
// AJAX FLAVOR
// =============================================================================

/// The AJAX library whose activity counter is inspected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AjaxFlavor {
    /// `jQuery.active`
    #[default]
    JQuery,
    /// `Ajax.activeRequestCount`
    Prototype,
    /// `dojo.io.XMLHTTPTransport.inFlight`
    Dojo,
}

impl AjaxFlavor {
    /// Global whose absence means "no ajax library on the page"
    #[must_use]
    pub const fn global(&self) -> &'static str {
        match self {
            Self::JQuery => "window.jQuery",
            Self::Prototype => "window.Ajax",
            Self::Dojo => "window.dojo",
        }
    }

    /// Number of in-flight requests, assuming the global exists
    #[must_use]
    pub const fn counter(&self) -> &'static str {
        match self {
            Self::JQuery => "window.jQuery.active",
            Self::Prototype => "window.Ajax.activeRequestCount",
            Self::Dojo => "window.dojo.io.XMLHTTPTransport.inFlight.length",
        }
    }

    /// True while requests are in flight; false without the library
    #[must_use]
    pub fn pending_expr(&self) -> String {
        format!("!!{} && {} != 0", self.global(), self.counter())
    }

    /// True when idle; vacuously true without the library
    #[must_use]
    pub fn complete_expr(&self) -> String {
        format!("!{} || {} == 0", self.global(), self.counter())
    }
}

impl std::str::FromStr for AjaxFlavor {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jquery" => Ok(Self::JQuery),
            "prototype" => Ok(Self::Prototype),
            "dojo" => Ok(Self::Dojo),
            other => Err(RemoteError::Config {
                message: format!("unknown ajax flavor '{other}'"),
            }),
        }
    }
}

// =============================================================================
// COMPARISON / CALLABLE
// =============================================================================

/// Comparison applied by `AttributeEquals` as `compare(value, reference)`
#[derive(Clone)]
pub struct Comparison {
    name: String,
    func: Arc<dyn Fn(&str, &str) -> bool + Send + Sync>,
}

impl Comparison {
    /// A named custom comparison
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Plain string equality
    #[must_use]
    pub fn equals() -> Self {
        Self::new("eq", |value, reference| value == reference)
    }

    /// Apply the comparison
    #[must_use]
    pub fn matches(&self, value: &str, reference: &str) -> bool {
        (self.func)(value, reference)
    }

    /// Name shown in diagnostics
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for Comparison {
    fn default() -> Self {
        Self::equals()
    }
}

impl fmt::Debug for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comparison")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

type CallableFn = dyn Fn(&mut dyn Browser) -> RemoteResult<bool> + Send + Sync;

/// Caller-supplied clause logic; bound arguments travel in the closure
#[derive(Clone)]
pub struct CallableClause {
    name: String,
    func: Arc<CallableFn>,
}

impl CallableClause {
    /// Wrap a closure
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut dyn Browser) -> RemoteResult<bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Invoke against the browser
    pub fn call(&self, browser: &mut dyn Browser) -> RemoteResult<bool> {
        (self.func)(browser)
    }

    /// Name shown in diagnostics
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CallableClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableClause")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// CLAUSE
// =============================================================================

/// A single atomic condition
#[derive(Debug, Clone)]
pub enum Clause {
    /// Lookup succeeds
    ElementPresent(Locator),
    /// Lookup fails
    ElementNotPresent(Locator),
    /// Lookup succeeds and the element is displayed
    ElementVisible(Locator),
    /// Element hidden or missing
    ElementNotVisible(Locator),
    /// `compare(element.attribute, reference)`, checked once per tick
    AttributeEquals {
        /// Element to resolve
        finder: Finder,
        /// Attribute to read
        attribute: String,
        /// Expected value
        reference: String,
        /// Comparison, equality by default
        compare: Comparison,
    },
    /// AJAX requests in flight
    AjaxPending(AjaxFlavor),
    /// No AJAX requests in flight
    AjaxComplete(AjaxFlavor),
    /// The page sentinel is still set: no reload happened yet
    PageLoading,
    /// The page sentinel is gone: a fresh document loaded
    PageReady,
    /// Script value is truthy
    Script(String),
    /// Caller-supplied logic
    Callable(CallableClause),
}

impl Clause {
    /// Human-readable label, in the `kind:target` form of condition strings
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::ElementPresent(loc) => format!("element:{loc}"),
            Self::ElementNotPresent(loc) => format!("!element:{loc}"),
            Self::ElementVisible(loc) => format!("visible:{loc}"),
            Self::ElementNotVisible(loc) => format!("!visible:{loc}"),
            Self::AttributeEquals {
                finder,
                attribute,
                reference,
                compare,
            } => format!(
                "evaluate_element({finder}, {attribute}, {reference}, {})",
                compare.name()
            ),
            Self::AjaxPending(flavor) => format!("js:{}", flavor.pending_expr()),
            Self::AjaxComplete(flavor) => format!("js:{}", flavor.complete_expr()),
            Self::PageLoading => format!("js:{}", page_loading_expr()),
            Self::PageReady => format!("js:{}", page_ready_expr()),
            Self::Script(js) => format!("js:{js}"),
            Self::Callable(callable) => callable.name().to_string(),
        }
    }

    /// Evaluate once against the browser
    pub fn evaluate(&self, browser: &mut dyn Browser) -> RemoteResult<bool> {
        match self {
            Self::ElementPresent(loc) => element_present(browser, loc),
            Self::ElementNotPresent(loc) => element_present(browser, loc).map(|found| !found),
            Self::ElementVisible(loc) => element_visible(browser, loc),
            Self::ElementNotVisible(loc) => element_visible(browser, loc).map(|shown| !shown),
            Self::AttributeEquals {
                finder,
                attribute,
                reference,
                compare,
            } => {
                let element = match browser.find_element(&finder.locator()) {
                    Ok(element) => element,
                    Err(err) if err.is_kind(ErrorKind::NoSuchElement) => {
                        return Err(RemoteError::UnknownPageElement {
                            value: finder.to_string(),
                        });
                    }
                    Err(err) => return Err(err),
                };
                let value = browser.element_attribute(&element, attribute)?;
                Ok(value.is_some_and(|value| compare.matches(&value, reference)))
            }
            Self::AjaxPending(flavor) => script_truthy(browser, &flavor.pending_expr()),
            Self::AjaxComplete(flavor) => script_truthy(browser, &flavor.complete_expr()),
            Self::PageLoading => script_truthy(browser, &page_loading_expr()),
            Self::PageReady => script_truthy(browser, &page_ready_expr()),
            Self::Script(js) => script_truthy(browser, js),
            Self::Callable(callable) => callable.call(browser),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// `window.<sentinel> === true`
#[must_use]
pub fn page_loading_expr() -> String {
    format!("window.{PAGE_SENTINEL} === true")
}

/// `window.<sentinel> === undefined`
#[must_use]
pub fn page_ready_expr() -> String {
    format!("window.{PAGE_SENTINEL} === undefined")
}

/// Statement that plants the sentinel before a navigating action
#[must_use]
pub fn mark_page_script() -> String {
    format!("window.{PAGE_SENTINEL} = true")
}

fn element_present(browser: &mut dyn Browser, locator: &Locator) -> RemoteResult<bool> {
    match browser.find_element(locator) {
        Ok(_) => Ok(true),
        Err(err) if err.is_kind(ErrorKind::NoSuchElement) => Ok(false),
        Err(err) => Err(err),
    }
}

fn element_visible(browser: &mut dyn Browser, locator: &Locator) -> RemoteResult<bool> {
    let shown = browser
        .find_element(locator)
        .and_then(|element| browser.is_element_displayed(&element));
    match shown {
        Ok(shown) => Ok(shown),
        Err(err)
            if err.is_kind(ErrorKind::ElementNotVisible)
                || err.is_kind(ErrorKind::NoSuchElement) =>
        {
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

fn script_truthy(browser: &mut dyn Browser, expression: &str) -> RemoteResult<bool> {
    browser
        .evaluate_script(&value_script(expression))
        .map(|value| is_truthy(&value))
}
