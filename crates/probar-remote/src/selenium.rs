//! Selenium RC session client and browser facade.
//!
//! RC commands are form posts to `/selenium-server/driver/` answered with
//! `OK` or `OK,<data>`. Waits run server-side: conditions compile to a
//! JavaScript string for `waitForCondition`, and a timed-out wait surfaces
//! as [`RemoteError::AssertionFailed`].

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::builder::{ScriptWaitExpression, WaitExpression};
use crate::clause::AjaxFlavor;
use crate::condition::WaitCondition;
use crate::locator::Locator;
use crate::logging::Diagnostics;
use crate::poll::DEFAULT_TIMEOUT_MS;
use crate::protocol::{parse_rc_cookies, Cookie, RcCommand};
use crate::result::{RemoteError, RemoteResult};
use crate::session::{join_url, scoped_timeout, SessionTimeout};
use crate::status::ErrorKind;
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, Transport};

/// Path of the RC driver below the server URL
pub const DRIVER_PATH: &str = "/selenium-server/driver/";

/// Prepended to every `waitForCondition` script so `window` is the page
pub const WINDOW_PRELUDE: &str = "var window = selenium.browserbot.getCurrentWindow(); ";

/// Launcher used when none is configured
pub const DEFAULT_RC_BROWSER: &str = "*phantomjs";

/// Marker RC puts in the message of an expired wait
const TIMED_OUT: &str = "Timed out";

/// Parse an RC response body: `OK` or `OK,<data>` yields the data.
///
/// # Errors
///
/// [`RemoteError::Remote`] with kind `Timeout` when the server reports a
/// timed-out wait, `UnknownError` for anything else.
pub fn parse_rc_response(response: &HttpResponse) -> RemoteResult<String> {
    let body = response.body.as_str();
    if response.is_success() {
        if body == "OK" {
            return Ok(String::new());
        }
        if let Some(data) = body.strip_prefix("OK,") {
            return Ok(data.to_string());
        }
    }
    let kind = if body.contains(TIMED_OUT) {
        ErrorKind::Timeout
    } else {
        ErrorKind::UnknownError
    };
    Err(RemoteError::remote(kind, Some(body.trim().to_string())))
}

/// Turn a failed server-side wait on `condition` into an assertion failure
fn wait_failed(err: RemoteError, condition: &str, ms: u64) -> RemoteError {
    match err {
        RemoteError::Remote { message, .. } => RemoteError::AssertionFailed {
            message: format!(
                "Selenium encountered an error: {message} (waited {ms}ms for {condition})"
            ),
        },
        other => other,
    }
}

// =============================================================================
// REMOTE SESSION
// =============================================================================

/// A Selenium RC session over some [`Transport`]
#[derive(Debug)]
pub struct SeleniumRemote<T: Transport> {
    transport: T,
    driver_url: String,
    browser: String,
    browser_url: String,
    launch_options: String,
    session_id: Option<String>,
    default_timeout: u64,
    current_timeout: Option<u64>,
    user_agent: Option<String>,
}

impl<T: Transport> SeleniumRemote<T> {
    /// Client for the RC server at `server_url`, launching `browser`
    pub fn new(transport: T, server_url: &str, browser: impl Into<String>) -> Self {
        Self {
            transport,
            driver_url: format!("{}{DRIVER_PATH}", server_url.trim_end_matches('/')),
            browser: browser.into(),
            browser_url: String::new(),
            launch_options: String::new(),
            session_id: None,
            default_timeout: DEFAULT_TIMEOUT_MS,
            current_timeout: None,
            user_agent: None,
        }
    }

    /// URL the browser is launched against
    #[must_use]
    pub fn with_browser_url(mut self, url: impl Into<String>) -> Self {
        self.browser_url = url.into();
        self
    }

    /// `key=value;...` launch options
    #[must_use]
    pub fn with_launch_options(mut self, options: impl Into<String>) -> Self {
        self.launch_options = options.into();
        self
    }

    /// Timeout applied when a session starts
    #[must_use]
    pub const fn with_default_timeout(mut self, ms: u64) -> Self {
        self.default_timeout = ms;
        self
    }

    /// Driver URL
    #[must_use]
    pub fn driver_url(&self) -> &str {
        &self.driver_url
    }

    /// Current session id
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// `navigator.userAgent` captured when the session started
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// The timeout in effect, or the default before one was set
    #[must_use]
    pub fn current_timeout(&self) -> u64 {
        self.current_timeout.unwrap_or(self.default_timeout)
    }

    /// The underlying transport
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Launch a browser, apply the default timeout and read the user agent.
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn start(&mut self) -> RemoteResult<()> {
        let session_id = self.call(&RcCommand::GetNewBrowserSession {
            browser: self.browser.clone(),
            url: self.browser_url.clone(),
            extension_js: String::new(),
            options: self.launch_options.clone(),
        })?;
        info!(session_id = %session_id, browser = %self.browser, "selenium session started");
        self.session_id = Some(session_id);
        self.current_timeout = None;
        self.set_timeout(self.default_timeout)?;
        let agent = self.call(&RcCommand::GetEval {
            script: "navigator.userAgent".to_string(),
        })?;
        self.user_agent = Some(agent);
        Ok(())
    }

    /// Close the browser
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn test_complete(&mut self) -> RemoteResult<()> {
        self.call(&RcCommand::TestComplete)?;
        info!(session_id = ?self.session_id, "selenium session ended");
        self.session_id = None;
        self.current_timeout = None;
        Ok(())
    }

    /// Send a command and return its data
    ///
    /// # Errors
    ///
    /// [`RemoteError::NoSession`], remote and transport failures.
    pub fn call(&self, command: &RcCommand) -> RemoteResult<String> {
        let form = command.form(self.session_id.as_deref())?;
        let request = HttpRequest::new(HttpMethod::Post, self.driver_url.as_str()).form(form);
        debug!(command = command.name(), "selenium call");
        let response = self.transport.send(&request)?;
        parse_rc_response(&response)
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
}

impl<T: Transport> SessionTimeout for SeleniumRemote<T> {
    fn session_timeout(&self) -> Option<u64> {
        self.current_timeout
    }

    fn set_timeout(&mut self, ms: u64) -> RemoteResult<()> {
        if self.current_timeout != Some(ms) {
            self.call(&RcCommand::SetTimeout { ms })?;
        }
        self.current_timeout = Some(ms);
        Ok(())
    }
}

// =============================================================================
// BROWSER FACADE
// =============================================================================

/// Test-facing Selenium RC browser
#[derive(Debug)]
pub struct SeleniumBrowser<T: Transport> {
    remote: SeleniumRemote<T>,
    base_url: Option<String>,
    flavor: AjaxFlavor,
    diagnostics: Diagnostics,
}

impl<T: Transport> SeleniumBrowser<T> {
    /// Wrap a remote session
    pub fn new(remote: SeleniumRemote<T>) -> Self {
        Self {
            remote,
            base_url: None,
            flavor: AjaxFlavor::default(),
            diagnostics: Diagnostics::default(),
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

    /// Console logging inside compiled conditions
    #[must_use]
    pub const fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// The session client
    #[must_use]
    pub const fn remote(&self) -> &SeleniumRemote<T> {
        &self.remote
    }

    /// The session client, mutably
    pub fn remote_mut(&mut self) -> &mut SeleniumRemote<T> {
        &mut self.remote
    }

    /// A fresh expression configured like this browser
    #[must_use]
    pub fn wait_expression(&self) -> ScriptWaitExpression {
        ScriptWaitExpression::new()
            .with_flavor(self.flavor)
            .with_diagnostics(self.diagnostics)
    }

    /// Start a session if needed, load `url`, then wait for `wait_for`.
    ///
    /// `open` itself blocks until the page loaded, so a `page` wait adds
    /// nothing.
    ///
    /// # Errors
    ///
    /// Remote or transport failures, and failed waits as
    /// [`RemoteError::AssertionFailed`].
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
            if self.remote.browser_url.is_empty() {
                self.remote.browser_url = url.clone();
            }
            self.remote.start()?;
        }
        let command = RcCommand::Open { url };
        self.remote
            .with_timeout(timeout, |remote| remote.call(&command))?;
        if *wait_for == WaitCondition::Page {
            return Ok(true);
        }
        self.wait_for(wait_for, timeout)
    }

    /// Wait server-side for a sentinel condition.
    ///
    /// # Errors
    ///
    /// [`RemoteError::AssertionFailed`] when the wait fails or times out,
    /// transport failures as-is.
    pub fn wait_for(&mut self, condition: &WaitCondition, timeout: Option<u64>) -> RemoteResult<bool> {
        let ms = timeout.unwrap_or_else(|| self.remote.current_timeout());
        let outcome = match condition {
            WaitCondition::None => return Ok(true),
            WaitCondition::Duration(sleep) => {
                let sleep = sleep.unwrap_or(ms);
                if sleep > 0 {
                    std::thread::sleep(std::time::Duration::from_millis(sleep));
                }
                return Ok(true);
            }
            WaitCondition::Page => self.remote.call(&RcCommand::WaitForPageToLoad { ms }),
            WaitCondition::Element(loc) => self.wait_for_element(loc, true, timeout),
            WaitCondition::NotElement(loc) => self.wait_for_element(loc, false, timeout),
            WaitCondition::Ajax => {
                let script = self.flavor.complete_expr();
                self.wait_for_script(&script, ms)
            }
            WaitCondition::Script(js) => self.wait_for_script(js, ms),
            WaitCondition::Visible(loc) => {
                let expr = self.wait_expression().element_visible(loc);
                return self.wait_for_expression(&expr, timeout);
            }
            WaitCondition::NotVisible(loc) => {
                let expr = self.wait_expression().element_not_visible(loc);
                return self.wait_for_expression(&expr, timeout);
            }
        };
        outcome
            .map(|_| true)
            .map_err(|err| wait_failed(err, &condition.to_string(), ms))
    }

    /// Compile `expr` and wait for it server-side.
    ///
    /// # Errors
    ///
    /// Deferred builder errors, plus the errors of
    /// [`SeleniumBrowser::wait_for`].
    pub fn wait_for_expression(
        &mut self,
        expr: &ScriptWaitExpression,
        timeout: Option<u64>,
    ) -> RemoteResult<bool> {
        let script = expr.compile()?;
        if script.is_empty() {
            return Ok(true);
        }
        let ms = timeout.unwrap_or_else(|| self.remote.current_timeout());
        self.wait_for_script(&script, ms)
            .map(|_| true)
            .map_err(|err| wait_failed(err, &expr.describe(), ms))
    }

    fn wait_for_script(&self, script: &str, ms: u64) -> RemoteResult<String> {
        self.remote.call(&RcCommand::WaitForCondition {
            script: format!("{WINDOW_PRELUDE}{script}"),
            ms,
        })
    }

    fn wait_for_element(
        &mut self,
        locator: &Locator,
        present: bool,
        timeout: Option<u64>,
    ) -> RemoteResult<String> {
        let locator = locator.to_string();
        let command = if present {
            RcCommand::WaitForElementPresent { locator }
        } else {
            RcCommand::WaitForElementNotPresent { locator }
        };
        self.remote
            .with_timeout(timeout, |remote| remote.call(&command))
    }

    /// URL of the current page
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn location(&mut self) -> RemoteResult<String> {
        self.remote.call(&RcCommand::GetLocation)
    }

    /// Markup of the current page, wrapped in an `html` element
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn page_source(&mut self) -> RemoteResult<String> {
        let body = self.remote.call(&RcCommand::GetHtmlSource)?;
        Ok(format!("<html>{body}</html>"))
    }

    /// Cookie names and values, with surrounding quotes removed
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn cookies(&mut self) -> RemoteResult<BTreeMap<String, String>> {
        let text = self.remote.call(&RcCommand::GetCookie)?;
        Ok(parse_rc_cookies(&text).into_iter().collect())
    }

    /// Set a cookie; only the path scope is passed on
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn set_cookie(&mut self, cookie: &Cookie) -> RemoteResult<()> {
        let options = cookie
            .path
            .as_ref()
            .map(|path| format!("path={path}"))
            .unwrap_or_default();
        self.remote
            .call(&RcCommand::CreateCookie {
                pair: format!("{}={}", cookie.name, cookie.value),
                options,
            })
            .map(|_| ())
    }

    /// Delete a cookie by name
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn delete_cookie(&mut self, name: &str) -> RemoteResult<()> {
        self.remote
            .call(&RcCommand::DeleteCookie {
                name: name.to_string(),
                path: None,
            })
            .map(|_| ())
    }

    /// Delete all visible cookies
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn reset(&mut self) -> RemoteResult<()> {
        self.remote
            .call(&RcCommand::DeleteAllVisibleCookies)
            .map(|_| ())
    }

    /// `navigator.userAgent` of the running browser
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.remote.user_agent()
    }

    /// Close the browser
    ///
    /// # Errors
    ///
    /// Remote or transport failures.
    pub fn stop(&mut self) -> RemoteResult<()> {
        self.remote.test_complete()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    fn started() -> SeleniumRemote<MockTransport> {
        let transport = MockTransport::new();
        transport.push_text("OK,sess-1");
        transport.push_text("OK");
        transport.push_text("OK,Mozilla/5.0 (PhantomJS)");
        let mut remote = SeleniumRemote::new(transport, "http://rc:4444/", DEFAULT_RC_BROWSER)
            .with_browser_url("http://app.test/");
        remote.start().unwrap();
        remote
    }

    fn cmd(request: &HttpRequest) -> &str {
        request.form_field("cmd").unwrap()
    }

    mod response_tests {
        use super::*;

        #[test]
        fn test_ok_forms() {
            assert_eq!(parse_rc_response(&HttpResponse::new(200, "OK")).unwrap(), "");
            assert_eq!(
                parse_rc_response(&HttpResponse::new(200, "OK,a,b")).unwrap(),
                "a,b"
            );
        }

        #[test]
        fn test_timed_out_is_timeout() {
            let err = parse_rc_response(&HttpResponse::new(200, "Timed out after 100ms"))
                .unwrap_err();
            assert!(err.is_kind(ErrorKind::Timeout));
        }

        #[test]
        fn test_other_failure_is_unknown() {
            let err = parse_rc_response(&HttpResponse::new(200, "ERROR: Element x not found"))
                .unwrap_err();
            assert!(err.is_kind(ErrorKind::UnknownError));
            assert!(err.to_string().contains("Element x not found"));
        }
    }

    mod remote_tests {
        use super::*;

        #[test]
        fn test_start_sequence() {
            let remote = started();
            assert_eq!(remote.session_id(), Some("sess-1"));
            assert_eq!(remote.user_agent(), Some("Mozilla/5.0 (PhantomJS)"));
            assert_eq!(remote.current_timeout(), DEFAULT_TIMEOUT_MS);

            let requests = remote.transport().requests();
            assert_eq!(requests[0].url, "http://rc:4444/selenium-server/driver/");
            assert_eq!(cmd(&requests[0]), "getNewBrowserSession");
            assert_eq!(requests[0].form_field("1"), Some("*phantomjs"));
            assert_eq!(requests[0].form_field("2"), Some("http://app.test/"));
            assert_eq!(cmd(&requests[1]), "setTimeout");
            assert_eq!(requests[1].form_field("1"), Some("16000"));
            assert_eq!(requests[1].form_field("sessionId"), Some("sess-1"));
            assert_eq!(cmd(&requests[2]), "getEval");
        }

        #[test]
        fn test_call_without_session() {
            let remote = SeleniumRemote::new(MockTransport::new(), "http://rc", "*firefox");
            assert!(matches!(
                remote.call(&RcCommand::GetLocation).unwrap_err(),
                RemoteError::NoSession
            ));
        }

        #[test]
        fn test_test_complete_clears_session() {
            let mut remote = started();
            remote.transport().push_text("OK");
            remote.test_complete().unwrap();
            assert!(remote.session_id().is_none());
        }
    }

    mod browser_tests {
        use super::*;

        fn browser() -> SeleniumBrowser<MockTransport> {
            SeleniumBrowser::new(started()).with_base_url("http://app.test/shop/")
        }

        #[test]
        fn test_open_with_scoped_timeout() {
            let mut browser = browser();
            for _ in 0..3 {
                browser.remote().transport().push_text("OK");
            }
            assert!(browser.open("cart", &WaitCondition::Page, Some(500)).unwrap());
            let requests = browser.remote().transport().requests();
            let cmds: Vec<_> = requests[3..].iter().map(cmd).collect();
            assert_eq!(cmds, vec!["setTimeout", "open", "setTimeout"]);
            assert_eq!(requests[4].form_field("1"), Some("http://app.test/shop/cart"));
            assert_eq!(requests[4].form_field("2"), Some("true"));
        }

        #[test]
        fn test_open_then_waits_for_element() {
            let mut browser = browser();
            browser.remote().transport().push_text("OK");
            browser.remote().transport().push_text("OK");
            let condition: WaitCondition = "element:#druid".parse().unwrap();
            assert!(browser.open("/", &condition, None).unwrap());
            let last = browser.remote().transport().requests().pop().unwrap();
            assert_eq!(cmd(&last), "waitForElementPresent");
            assert_eq!(last.form_field("1"), Some("css=#druid"));
        }

        #[test]
        fn test_script_wait_gets_window_prelude() {
            let mut browser = browser();
            browser.remote().transport().push_text("OK");
            let condition: WaitCondition = "js:window.ready".parse().unwrap();
            assert!(browser.wait_for(&condition, Some(250)).unwrap());
            let last = browser.remote().transport().requests().pop().unwrap();
            assert_eq!(cmd(&last), "waitForCondition");
            assert_eq!(
                last.form_field("1"),
                Some("var window = selenium.browserbot.getCurrentWindow(); window.ready")
            );
            assert_eq!(last.form_field("2"), Some("250"));
        }

        #[test]
        fn test_page_wait_uses_current_timeout() {
            let mut browser = browser();
            browser.remote().transport().push_text("OK");
            assert!(browser.wait_for(&WaitCondition::Page, None).unwrap());
            let last = browser.remote().transport().requests().pop().unwrap();
            assert_eq!(cmd(&last), "waitForPageToLoad");
            assert_eq!(last.form_field("1"), Some("16000"));
        }

        #[test]
        fn test_timed_out_wait_is_assertion() {
            let mut browser = browser();
            browser
                .remote()
                .transport()
                .push_text("Timed out after 250ms");
            let err = browser.wait_for(&WaitCondition::Ajax, Some(250)).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Assertion failed: Selenium encountered an error: Timed out after 250ms \
                 (waited 250ms for ajax)"
            );
        }

        #[test]
        fn test_timed_out_element_wait_names_locator() {
            let mut browser = browser();
            let transport = browser.remote().transport();
            transport.push_text("OK");
            transport.push_text("Timed out after 250ms");
            transport.push_text("OK");
            let condition: WaitCondition = "element:#druid".parse().unwrap();
            let err = browser.wait_for(&condition, Some(250)).unwrap_err();
            let message = err.to_string();
            assert!(message.contains("element:css=#druid"), "{message}");
            assert!(message.contains("250ms"), "{message}");
        }

        #[test]
        fn test_expression_wait() {
            let mut browser = browser();
            browser.remote().transport().push_text("OK");
            let expr = browser
                .wait_expression()
                .element_present("#druid")
                .or_()
                .ajax_complete();
            assert!(browser.wait_for_expression(&expr, Some(100)).unwrap());
            let last = browser.remote().transport().requests().pop().unwrap();
            let script = last.form_field("1").unwrap();
            assert!(script.starts_with(WINDOW_PRELUDE));
            assert!(script.contains(" || "));
        }

        #[test]
        fn test_empty_expression_skips_server() {
            let mut browser = browser();
            let before = browser.remote().transport().requests().len();
            let expr = browser.wait_expression();
            assert!(browser.wait_for_expression(&expr, None).unwrap());
            assert_eq!(browser.remote().transport().requests().len(), before);
        }

        #[test]
        fn test_page_source_wrapped() {
            let mut browser = browser();
            browser
                .remote()
                .transport()
                .push_text("OK,<body>hi</body>");
            assert_eq!(
                browser.page_source().unwrap(),
                "<html><body>hi</body></html>"
            );
        }

        #[test]
        fn test_cookies() {
            let mut browser = browser();
            browser
                .remote()
                .transport()
                .push_text("OK,sid=\"abc\"; lang=en");
            let cookies = browser.cookies().unwrap();
            assert_eq!(cookies["sid"], "abc");
            assert_eq!(cookies["lang"], "en");
        }

        #[test]
        fn test_set_cookie_passes_path() {
            let mut browser = browser();
            browser.remote().transport().push_text("OK");
            browser
                .set_cookie(&Cookie::new("sid", "1").with_path("/shop"))
                .unwrap();
            let last = browser.remote().transport().requests().pop().unwrap();
            assert_eq!(cmd(&last), "createCookie");
            assert_eq!(last.form_field("1"), Some("sid=1"));
            assert_eq!(last.form_field("2"), Some("path=/shop"));
        }
    }
}
