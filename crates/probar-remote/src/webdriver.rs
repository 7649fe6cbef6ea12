//! WebDriver JSONWire session client and browser facade.
//!
//! [`WebDriverRemote`] owns the session id and timeouts and classifies every
//! response through the status table. It implements [`Browser`], so native
//! wait expressions run directly against it. [`WebDriverBrowser`] adds
//! navigation, clicks, cookies and `wait_for` on top.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::browser::{Browser, ElementId};
use crate::builder::NativeWaitExpression;
use crate::clause::{mark_page_script, AjaxFlavor};
use crate::condition::WaitCondition;
use crate::locator::Locator;
use crate::poll::{PollOptions, DEFAULT_TIMEOUT_MS};
use crate::protocol::{unquote_cookie_value, Cookie, WireCommand};
use crate::result::{RemoteError, RemoteResult};
use crate::session::{join_url, scoped_timeout, SessionTimeout};
use crate::status::{classify, ErrorKind};
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Path of the JSONWire hub below the server URL
pub const HUB_PATH: &str = "/wd/hub";

/// Browser requested when the capabilities name none
pub const DEFAULT_BROWSER_NAME: &str = "phantomjs";

/// Key of an element reference in JSONWire responses
const ELEMENT_KEY: &str = "ELEMENT";

/// Key of an element reference in W3C responses
const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

// =============================================================================
// RESPONSE CLASSIFICATION
// =============================================================================

/// Turn an HTTP response into the JSON payload or a classified error.
///
/// # Errors
///
/// [`RemoteError::Remote`] for a non-zero `status`,
/// [`RemoteError::InvalidResponse`] for an unparseable body.
pub fn classify_response(response: &HttpResponse) -> RemoteResult<Value> {
    let body = response.body.trim();
    if body.is_empty() {
        return if response.is_success() {
            Ok(Value::Null)
        } else {
            Err(invalid_request(&response.body))
        };
    }

    let data: Value = match serde_json::from_str(body) {
        Ok(data) => data,
        Err(_) if response.is_success() => {
            return Err(RemoteError::InvalidResponse {
                message: format!("expected JSON, got: {body}"),
            });
        }
        Err(_) => return Err(invalid_request(&response.body)),
    };

    let status = data.get("status").and_then(Value::as_u64);
    match status {
        Some(0) => Ok(data),
        Some(code) => Err(remote_error(classify(code), &data)),
        None if response.is_success() => Ok(data),
        None => Err(remote_error(ErrorKind::UnknownError, &data)),
    }
}

fn invalid_request(text: &str) -> RemoteError {
    RemoteError::InvalidResponse {
        message: format!("Invalid Request: {text}"),
    }
}

fn remote_error(kind: ErrorKind, data: &Value) -> RemoteError {
    let value = data.get("value");
    let message = value
        .and_then(|v| v.get("message").or_else(|| v.get("state")))
        .and_then(Value::as_str)
        .or_else(|| value.and_then(Value::as_str))
        .map(str::to_string);
    RemoteError::remote(kind, message)
}

// =============================================================================
// REMOTE SESSION
// =============================================================================

/// A JSONWire session over some [`Transport`]
#[derive(Debug)]
pub struct WebDriverRemote<T: Transport> {
    transport: T,
    hub_url: String,
    capabilities: Map<String, Value>,
    session_id: Option<String>,
    default_timeout: u64,
    current_timeout: Option<u64>,
}

impl<T: Transport> WebDriverRemote<T> {
    /// Client for the hub below `server_url`
    pub fn new(transport: T, server_url: &str) -> Self {
        Self {
            transport,
            hub_url: format!("{}{HUB_PATH}", server_url.trim_end_matches('/')),
            capabilities: Map::new(),
            session_id: None,
            default_timeout: DEFAULT_TIMEOUT_MS,
            current_timeout: None,
        }
    }

    /// Desired capabilities for new sessions
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Map<String, Value>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Timeout applied when a session starts
    #[must_use]
    pub const fn with_default_timeout(mut self, ms: u64) -> Self {
        self.default_timeout = ms;
        self
    }

    /// Hub URL
    #[must_use]
    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }

    /// Current session id
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The underlying transport
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Start a session and apply the default timeout.
    ///
    /// # Errors
    ///
    /// Remote or transport failures, or a response without `sessionId`.
    pub fn new_session(&mut self) -> RemoteResult<()> {
        let mut capabilities = self.capabilities.clone();
        capabilities
            .entry("browserName")
            .or_insert_with(|| Value::String(DEFAULT_BROWSER_NAME.to_string()));

        let data = self.raw_call(&WireCommand::NewSession { capabilities })?;
        let session_id = data
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteError::InvalidResponse {
                message: "new session response has no sessionId".to_string(),
            })?;
        info!(session_id, "webdriver session started");
        self.session_id = Some(session_id.to_string());
        self.current_timeout = None;
        self.set_timeout(self.default_timeout)
    }

    /// End the session
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn quit(&mut self) -> RemoteResult<()> {
        self.raw_call(&WireCommand::Quit)?;
        info!(session_id = ?self.session_id, "webdriver session ended");
        self.session_id = None;
        self.current_timeout = None;
        Ok(())
    }

    /// Send a command and return the response's `value`
    ///
    /// # Errors
    ///
    /// [`RemoteError::NoSession`], remote and transport failures.
    pub fn call(&mut self, command: &WireCommand) -> RemoteResult<Value> {
        let mut data = self.raw_call(command)?;
        Ok(data
            .get_mut("value")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    fn raw_call(&self, command: &WireCommand) -> RemoteResult<Value> {
        let path = command.path(self.session_id.as_deref())?;
        let mut request = HttpRequest::new(command.method(), format!("{}/{path}", self.hub_url));
        if let Some(body) = command.body() {
            request = request.json(body);
        }
        debug!(command = command.name(), url = %request.url, "webdriver call");
        let response = self.transport.send(&request)?;
        classify_response(&response)
    }

    /// Run `op` with a temporary timeout
    ///
    /// # Errors
    ///
    /// As [`scoped_timeout`].
    pub fn with_timeout<R>(
        &mut self,
        timeout: Option<u64>,
        op: impl FnOnce(&mut Self) -> RemoteResult<R>,
    ) -> RemoteResult<R> {
        scoped_timeout(self, timeout, op)
    }

    /// Load `url` in the current session
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn navigate(&mut self, url: &str, timeout: Option<u64>) -> RemoteResult<()> {
        let command = WireCommand::Navigate {
            url: url.to_string(),
        };
        self.with_timeout(timeout, |remote| remote.call(&command).map(|_| ()))
    }

    /// Click an element
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn click_element(&mut self, id: &ElementId) -> RemoteResult<()> {
        self.call(&WireCommand::ClickElement { id: id.clone() })
            .map(|_| ())
    }

    fn string_value(&mut self, command: &WireCommand) -> RemoteResult<String> {
        match self.call(command)? {
            Value::String(text) => Ok(text),
            Value::Null => Ok(String::new()),
            other => Ok(other.to_string()),
        }
    }
}

impl<T: Transport> SessionTimeout for WebDriverRemote<T> {
    fn session_timeout(&self) -> Option<u64> {
        self.current_timeout
    }

    fn set_timeout(&mut self, ms: u64) -> RemoteResult<()> {
        if self.current_timeout != Some(ms) {
            self.call(&WireCommand::SetTimeouts {
                kind: "page load".to_string(),
                ms,
            })?;
        }
        self.current_timeout = Some(ms);
        Ok(())
    }
}

impl<T: Transport> Browser for WebDriverRemote<T> {
    fn evaluate_script(&mut self, script: &str) -> RemoteResult<Value> {
        self.call(&WireCommand::ExecuteScript {
            script: script.to_string(),
            args: Vec::new(),
        })
    }

    fn find_element(&mut self, locator: &Locator) -> RemoteResult<ElementId> {
        let (using, value) = locator.to_wire()?;
        let found = self.call(&WireCommand::FindElement {
            using,
            value: value.to_string(),
        })?;
        found
            .get(ELEMENT_KEY)
            .or_else(|| found.get(W3C_ELEMENT_KEY))
            .and_then(Value::as_str)
            .map(ElementId::new)
            .ok_or_else(|| RemoteError::InvalidResponse {
                message: format!("element reference missing in {found}"),
            })
    }

    fn is_element_displayed(&mut self, element: &ElementId) -> RemoteResult<bool> {
        let shown = self.call(&WireCommand::ElementDisplayed {
            id: element.clone(),
        })?;
        Ok(shown.as_bool().unwrap_or(false))
    }

    fn element_attribute(
        &mut self,
        element: &ElementId,
        name: &str,
    ) -> RemoteResult<Option<String>> {
        let value = self.call(&WireCommand::ElementAttribute {
            id: element.clone(),
            name: name.to_string(),
        })?;
        Ok(match value {
            Value::Null => None,
            Value::String(text) => Some(text),
            other => Some(other.to_string()),
        })
    }

    fn current_timeout(&self) -> u64 {
        self.current_timeout.unwrap_or(self.default_timeout)
    }

    fn page_source(&mut self) -> RemoteResult<String> {
        self.string_value(&WireCommand::PageSource)
    }
}

// =============================================================================
// BROWSER FACADE
// =============================================================================

/// Browser name, platform and version reported by the session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserAgent {
    /// Browser name
    pub browser: String,
    /// Platform
    pub platform: String,
    /// Version
    pub version: String,
}

/// Test-facing WebDriver browser
#[derive(Debug)]
pub struct WebDriverBrowser<T: Transport> {
    remote: WebDriverRemote<T>,
    base_url: Option<String>,
    flavor: AjaxFlavor,
    poll: PollOptions,
}

impl<T: Transport> WebDriverBrowser<T> {
    /// Wrap a remote session
    pub fn new(remote: WebDriverRemote<T>) -> Self {
        Self {
            remote,
            base_url: None,
            flavor: AjaxFlavor::default(),
            poll: PollOptions::default(),
        }
    }

    /// Resolve relative URLs against `base_url`
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Ajax library used by `ajax` conditions
    #[must_use]
    pub const fn with_flavor(mut self, flavor: AjaxFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Frequency, diagnostics and cancellation for waits
    #[must_use]
    pub fn with_poll_options(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    /// The session client
    #[must_use]
    pub const fn remote(&self) -> &WebDriverRemote<T> {
        &self.remote
    }

    /// The session client, mutably
    pub fn remote_mut(&mut self) -> &mut WebDriverRemote<T> {
        &mut self.remote
    }

    /// Start a session if needed, load `url`, then wait for `wait_for`.
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn open(
        &mut self,
        url: &str,
        wait_for: &WaitCondition,
        timeout: Option<u64>,
    ) -> RemoteResult<bool> {
        let url = match &self.base_url {
            Some(base) => join_url(base, url),
            None => url.to_string(),
        };
        info!(url = %url, "open");
        if self.remote.session_id().is_none() {
            self.remote.new_session()?;
        }
        self.remote.navigate(&url, timeout)?;
        self.wait_for(wait_for, timeout)
    }

    /// A fresh expression configured like this browser
    #[must_use]
    pub fn wait_expression(&self) -> NativeWaitExpression {
        NativeWaitExpression::new()
            .with_flavor(self.flavor)
            .with_poll_options(self.poll.clone())
    }

    /// Wait for a sentinel condition; `false` on timeout.
    ///
    /// # Errors
    ///
    /// Non-transient remote errors, transport failures and cancellation.
    pub fn wait_for(&mut self, condition: &WaitCondition, timeout: Option<u64>) -> RemoteResult<bool> {
        if let WaitCondition::Duration(ms) = condition {
            let ms = ms.or(timeout).unwrap_or_else(|| self.remote.current_timeout());
            if ms > 0 {
                std::thread::sleep(std::time::Duration::from_millis(ms));
            }
            return Ok(true);
        }
        let Some(clause) = condition.clause(self.flavor) else {
            return Ok(true);
        };
        let expr = self.wait_expression().clause(clause);
        self.wait_for_expression(&expr, timeout)
    }

    /// Poll a compound expression; `false` on timeout.
    ///
    /// # Errors
    ///
    /// As [`WebDriverBrowser::wait_for`], plus deferred builder errors.
    pub fn wait_for_expression(
        &mut self,
        expr: &NativeWaitExpression,
        timeout: Option<u64>,
    ) -> RemoteResult<bool> {
        let satisfied = expr.wait(&mut self.remote, timeout)?;
        if !satisfied {
            debug!(expression = %expr.expression(), "wait timed out");
        }
        Ok(satisfied)
    }

    /// Plant the page sentinel so `page` waits detect the next load
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn mark_page_loading(&mut self) -> RemoteResult<()> {
        self.remote.evaluate_script(&mark_page_script()).map(|_| ())
    }

    /// Click an element, then wait for `wait_for`.
    ///
    /// A `page` wait marks the current page first, so the wait ends only
    /// after a new document replaced it.
    ///
    /// # Errors
    ///
    /// Remote or transport failures, including a missing element.
    pub fn click(
        &mut self,
        locator: &Locator,
        wait_for: &WaitCondition,
        timeout: Option<u64>,
    ) -> RemoteResult<bool> {
        if *wait_for == WaitCondition::Page {
            self.mark_page_loading()?;
        }
        let element = self.remote.find_element(locator)?;
        self.remote.click_element(&element)?;
        self.wait_for(wait_for, timeout)
    }

    /// URL of the current page
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn location(&mut self) -> RemoteResult<String> {
        self.remote.string_value(&WireCommand::CurrentUrl)
    }

    /// Markup of the current page
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn page_source(&mut self) -> RemoteResult<String> {
        self.remote.page_source()
    }

    /// Cookie names and values, with surrounding quotes removed
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn cookies(&mut self) -> RemoteResult<BTreeMap<String, String>> {
        let value = self.remote.call(&WireCommand::GetCookies)?;
        let cookies: Vec<Cookie> = serde_json::from_value(value)?;
        Ok(cookies
            .into_iter()
            .map(|c| {
                let value = unquote_cookie_value(&c.value).to_string();
                (c.name, value)
            })
            .collect())
    }

    /// Set a cookie
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn set_cookie(&mut self, cookie: Cookie) -> RemoteResult<()> {
        self.remote
            .call(&WireCommand::AddCookie { cookie })
            .map(|_| ())
    }

    /// Delete a cookie by name
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn delete_cookie(&mut self, name: &str) -> RemoteResult<()> {
        self.remote
            .call(&WireCommand::DeleteCookie {
                name: name.to_string(),
            })
            .map(|_| ())
    }

    /// Delete all cookies
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn reset(&mut self) -> RemoteResult<()> {
        self.remote.call(&WireCommand::DeleteAllCookies).map(|_| ())
    }

    /// Browser name, platform and version from the session capabilities
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn user_agent(&mut self) -> RemoteResult<UserAgent> {
        let caps = self.remote.call(&WireCommand::Capabilities)?;
        let field = |key: &str| {
            caps.get(key)
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string()
        };
        Ok(UserAgent {
            browser: field("browserName"),
            platform: field("platform"),
            version: field("version"),
        })
    }

    /// End the session
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn stop(&mut self) -> RemoteResult<()> {
        self.remote.quit()
    }
}
