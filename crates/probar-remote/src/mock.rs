//! In-memory doubles for unit and integration tests.
//!
//! [`MockBrowser`] answers the [`Browser`] calls a wait expression makes
//! from a small page model. [`MockTransport`] replays scripted HTTP
//! responses and records every request for verification.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use serde_json::Value;

use crate::browser::{Browser, ElementId};
use crate::clause::{mark_page_script, page_loading_expr, page_ready_expr, AjaxFlavor};
use crate::locator::Locator;
use crate::poll::DEFAULT_TIMEOUT_MS;
use crate::result::{RemoteError, RemoteResult};
use crate::status::ErrorKind;
use crate::transport::{HttpRequest, HttpResponse, Transport};

const WRAP_PREFIX: &str = "return (function() { var value = ";
const WRAP_SUFFIX: &str = "; return value; })()";

// =============================================================================
// MOCK BROWSER
// =============================================================================

/// Page model driven by locator text such as `css=#druid`
#[derive(Debug)]
pub struct MockBrowser {
    elements: HashSet<String>,
    hidden: HashSet<String>,
    appear_after: HashMap<String, usize>,
    lookup_errors: HashMap<String, ErrorKind>,
    attributes: HashMap<(String, String), String>,
    script_results: HashMap<String, Value>,
    ajax_active: Option<u64>,
    page_marked: bool,
    source: String,
    timeout: u64,
    lookups: HashMap<String, usize>,
    scripts: Vec<String>,
    /// Call history for verification
    pub call_history: Vec<String>,
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self {
            elements: HashSet::new(),
            hidden: HashSet::new(),
            appear_after: HashMap::new(),
            lookup_errors: HashMap::new(),
            attributes: HashMap::new(),
            script_results: HashMap::new(),
            ajax_active: None,
            page_marked: false,
            source: String::new(),
            timeout: DEFAULT_TIMEOUT_MS,
            lookups: HashMap::new(),
            scripts: Vec::new(),
            call_history: Vec::new(),
        }
    }
}

impl MockBrowser {
    /// Empty page without an ajax library
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A displayed element
    #[must_use]
    pub fn with_element(mut self, locator: impl Into<String>) -> Self {
        self.elements.insert(locator.into());
        self
    }

    /// A present but hidden element
    #[must_use]
    pub fn with_hidden_element(mut self, locator: impl Into<String>) -> Self {
        let locator = locator.into();
        self.elements.insert(locator.clone());
        self.hidden.insert(locator);
        self
    }

    /// An element found from the `lookup`-th lookup on
    #[must_use]
    pub fn with_element_after(mut self, locator: impl Into<String>, lookup: usize) -> Self {
        self.appear_after.insert(locator.into(), lookup);
        self
    }

    /// Lookups of `locator` fail with `kind`
    #[must_use]
    pub fn with_lookup_error(mut self, locator: impl Into<String>, kind: ErrorKind) -> Self {
        self.lookup_errors.insert(locator.into(), kind);
        self
    }

    /// Attribute value of an element
    #[must_use]
    pub fn with_attribute(
        mut self,
        locator: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attributes
            .insert((locator.into(), name.into()), value.into());
        self
    }

    /// Value returned for a script expression
    #[must_use]
    pub fn with_script_result(mut self, expression: impl Into<String>, value: Value) -> Self {
        self.script_results.insert(expression.into(), value);
        self
    }

    /// jQuery on the page with `active` requests in flight
    #[must_use]
    pub const fn with_ajax_active(mut self, active: u64) -> Self {
        self.ajax_active = Some(active);
        self
    }

    /// Document markup
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Session timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Change the in-flight request count
    pub fn set_ajax_active(&mut self, active: Option<u64>) {
        self.ajax_active = active;
    }

    /// Plant or clear the page sentinel
    pub fn set_page_marked(&mut self, marked: bool) {
        self.page_marked = marked;
    }

    /// Whether the page sentinel is planted
    #[must_use]
    pub const fn page_marked(&self) -> bool {
        self.page_marked
    }

    /// Add an element after construction
    pub fn insert_element(&mut self, locator: impl Into<String>) {
        self.elements.insert(locator.into());
    }

    /// Remove an element
    pub fn remove_element(&mut self, locator: &str) {
        self.elements.remove(locator);
        self.appear_after.remove(locator);
    }

    /// Scripts evaluated so far, as sent
    #[must_use]
    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }

    /// Number of lookups of `locator`
    #[must_use]
    pub fn lookups(&self, locator: &str) -> usize {
        self.lookups.get(locator).copied().unwrap_or(0)
    }

    /// Check if a call was made
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.call_history.iter().any(|c| c.starts_with(method))
    }

    fn is_present(&self, locator: &str, lookup: usize) -> bool {
        self.elements.contains(locator)
            || self
                .appear_after
                .get(locator)
                .is_some_and(|after| lookup >= *after)
    }

    fn ajax_value(&self, expression: &str) -> Option<bool> {
        let jquery = AjaxFlavor::JQuery;
        for flavor in [AjaxFlavor::JQuery, AjaxFlavor::Prototype, AjaxFlavor::Dojo] {
            let active = if flavor == jquery {
                self.ajax_active
            } else {
                None
            };
            if expression == flavor.complete_expr() {
                return Some(active.map_or(true, |n| n == 0));
            }
            if expression == flavor.pending_expr() {
                return Some(active.is_some_and(|n| n != 0));
            }
        }
        None
    }
}

impl Browser for MockBrowser {
    fn evaluate_script(&mut self, script: &str) -> RemoteResult<Value> {
        self.call_history.push(format!("evaluate_script:{script}"));
        self.scripts.push(script.to_string());

        if script == mark_page_script() {
            self.page_marked = true;
            return Ok(Value::Null);
        }
        let expression = script
            .strip_prefix(WRAP_PREFIX)
            .and_then(|s| s.strip_suffix(WRAP_SUFFIX))
            .unwrap_or(script);

        if expression == page_loading_expr() {
            return Ok(Value::Bool(self.page_marked));
        }
        if expression == page_ready_expr() {
            return Ok(Value::Bool(!self.page_marked));
        }
        if let Some(value) = self.ajax_value(expression) {
            return Ok(Value::Bool(value));
        }
        Ok(self
            .script_results
            .get(expression)
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn find_element(&mut self, locator: &Locator) -> RemoteResult<ElementId> {
        let key = locator.to_string();
        self.call_history.push(format!("find_element:{key}"));
        let count = self.lookups.entry(key.clone()).or_insert(0);
        *count += 1;
        let lookup = *count;

        if let Some(kind) = self.lookup_errors.get(&key) {
            return Err(RemoteError::remote(*kind, None));
        }
        if self.is_present(&key, lookup) {
            Ok(ElementId::new(key))
        } else {
            Err(RemoteError::remote(
                ErrorKind::NoSuchElement,
                Some(format!("no element matches {key}")),
            ))
        }
    }

    fn is_element_displayed(&mut self, element: &ElementId) -> RemoteResult<bool> {
        self.call_history
            .push(format!("is_element_displayed:{element}"));
        Ok(!self.hidden.contains(element.as_str()))
    }

    fn element_attribute(
        &mut self,
        element: &ElementId,
        name: &str,
    ) -> RemoteResult<Option<String>> {
        self.call_history
            .push(format!("element_attribute:{element}.{name}"));
        Ok(self
            .attributes
            .get(&(element.as_str().to_string(), name.to_string()))
            .cloned())
    }

    fn current_timeout(&self) -> u64 {
        self.timeout
    }

    fn page_source(&mut self) -> RemoteResult<String> {
        self.call_history.push("page_source".to_string());
        Ok(self.source.clone())
    }
}

// =============================================================================
// MOCK TRANSPORT
// =============================================================================

/// Scripted HTTP responses with request recording
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    fallback: Mutex<Option<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    /// No scripted responses
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response
    pub fn push(&self, response: HttpResponse) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }

    /// Queue a 200 JSON response
    pub fn push_json(&self, value: Value) {
        self.push(HttpResponse::json(&value));
    }

    /// Queue a 200 text response
    pub fn push_text(&self, text: &str) {
        self.push(HttpResponse::new(200, text));
    }

    /// Response used once the queue is drained
    pub fn set_fallback(&self, response: HttpResponse) {
        if let Ok(mut fallback) = self.fallback.lock() {
            *fallback = Some(response);
        }
    }

    /// Requests sent so far
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Number of responses still queued
    #[must_use]
    pub fn pending(&self) -> usize {
        self.responses.lock().map(|q| q.len()).unwrap_or(0)
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &HttpRequest) -> RemoteResult<HttpResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let queued = self
            .responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        if let Some(response) = queued {
            return Ok(response);
        }
        self.fallback
            .lock()
            .ok()
            .and_then(|fallback| fallback.clone())
            .ok_or_else(|| RemoteError::Transport {
                message: format!("no scripted response for {} {}", request.method, request.url),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::clause::value_script;
    use crate::transport::HttpMethod;
    use serde_json::json;

    mod browser_tests {
        use super::*;

        #[test]
        fn test_lookup_counts_and_late_elements() {
            let mut browser = MockBrowser::new().with_element_after("css=#late", 2);
            let loc = Locator::css("#late");
            assert!(browser.find_element(&loc).is_err());
            assert!(browser.find_element(&loc).is_ok());
            assert_eq!(browser.lookups("css=#late"), 2);
            assert!(browser.was_called("find_element"));
        }

        #[test]
        fn test_sentinel_round_trip() {
            let mut browser = MockBrowser::new();
            browser.evaluate_script(&mark_page_script()).unwrap();
            assert!(browser.page_marked());
            let value = browser
                .evaluate_script(&value_script(&page_ready_expr()))
                .unwrap();
            assert_eq!(value, json!(false));
        }

        #[test]
        fn test_unknown_script_is_null() {
            let mut browser = MockBrowser::new();
            assert_eq!(browser.evaluate_script("return 1").unwrap(), Value::Null);
        }

        #[test]
        fn test_other_flavors_are_absent() {
            let mut browser = MockBrowser::new().with_ajax_active(3);
            let complete = value_script(&AjaxFlavor::Dojo.complete_expr());
            assert_eq!(browser.evaluate_script(&complete).unwrap(), json!(true));
        }
    }

    mod transport_tests {
        use super::*;

        #[test]
        fn test_queue_then_fallback() {
            let transport = MockTransport::new();
            transport.push_text("OK,1");
            transport.set_fallback(HttpResponse::new(200, "OK"));
            let request = HttpRequest::new(HttpMethod::Post, "http://rc/");
            assert_eq!(transport.send(&request).unwrap().body, "OK,1");
            assert_eq!(transport.send(&request).unwrap().body, "OK");
            assert_eq!(transport.requests().len(), 2);
        }

        #[test]
        fn test_drained_queue_is_transport_error() {
            let transport = MockTransport::new();
            let err = transport
                .send(&HttpRequest::new(HttpMethod::Get, "http://hub/status"))
                .unwrap_err();
            assert_eq!(
                err.to_string(),
                "Transport failed: no scripted response for GET http://hub/status"
            );
        }
    }
}
