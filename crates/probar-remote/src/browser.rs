//! The browser handle consumed by clauses and the poller.
//!
//! Session creation, cookies and HTTP transport live behind this trait; the
//! wait engine only ever needs the handful of calls below.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::locator::Locator;
use crate::result::RemoteResult;

/// Opaque remote element reference returned by a lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub String);

impl ElementId {
    /// Create an element reference
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw reference string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A live, stateful browser session.
///
/// Calls are ordered request/response pairs against a single remote session,
/// hence `&mut self`.
pub trait Browser {
    /// Evaluate `script` in the page and return its value
    fn evaluate_script(&mut self, script: &str) -> RemoteResult<serde_json::Value>;

    /// Look up an element; a missing element is a `NoSuchElement` error
    fn find_element(&mut self, locator: &Locator) -> RemoteResult<ElementId>;

    /// Whether the element reports itself displayed
    fn is_element_displayed(&mut self, element: &ElementId) -> RemoteResult<bool>;

    /// Read an attribute (or property) of the element
    fn element_attribute(
        &mut self,
        element: &ElementId,
        name: &str,
    ) -> RemoteResult<Option<String>>;

    /// The session's configured timeout in milliseconds
    fn current_timeout(&self) -> u64;

    /// Markup of the current document
    fn page_source(&mut self) -> RemoteResult<String>;
}

/// JavaScript truthiness of a value returned from the page
#[must_use]
pub fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;

    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
