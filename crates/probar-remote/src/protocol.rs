//! Command tables for the two wire protocols.
//!
//! Every remote call the clients make is one variant here, so the set of
//! commands, their HTTP shape and their argument order is fixed in one place.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::browser::ElementId;
use crate::result::{RemoteError, RemoteResult};
use crate::transport::HttpMethod;

// =============================================================================
// COOKIES
// =============================================================================

/// A browser cookie as exchanged with the WebDriver server
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Path scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Domain scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// HTTPS only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    /// Expiry, seconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<u64>,
}

impl Cookie {
    /// Name/value cookie with no scope
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// Restrict to a path
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Restrict to a domain
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set an expiry
    #[must_use]
    pub const fn with_expiry(mut self, expiry: u64) -> Self {
        self.expiry = Some(expiry);
        self
    }
}

/// Strip one pair of surrounding double quotes
#[must_use]
pub fn unquote_cookie_value(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

// =============================================================================
// WEBDRIVER JSONWIRE
// =============================================================================

/// One JSONWire command
#[derive(Debug, Clone, PartialEq)]
pub enum WireCommand {
    /// Start a session with the given desired capabilities
    NewSession {
        /// Desired capabilities
        capabilities: Map<String, Value>,
    },
    /// End the session
    Quit,
    /// Load a URL
    Navigate {
        /// Target URL
        url: String,
    },
    /// URL of the current page
    CurrentUrl,
    /// Markup of the current page
    PageSource,
    /// Run a synchronous script
    ExecuteScript {
        /// Script body
        script: String,
        /// Script arguments
        args: Vec<Value>,
    },
    /// Look up one element
    FindElement {
        /// JSONWire strategy name
        using: &'static str,
        /// Strategy value
        value: String,
    },
    /// Whether an element is displayed
    ElementDisplayed {
        /// Element reference
        id: ElementId,
    },
    /// Read an element attribute
    ElementAttribute {
        /// Element reference
        id: ElementId,
        /// Attribute name
        name: String,
    },
    /// Click an element
    ClickElement {
        /// Element reference
        id: ElementId,
    },
    /// Configure a session timeout
    SetTimeouts {
        /// Timeout type, e.g. `page load`
        kind: String,
        /// Milliseconds
        ms: u64,
    },
    /// All visible cookies
    GetCookies,
    /// Set a cookie
    AddCookie {
        /// Cookie to set
        cookie: Cookie,
    },
    /// Delete one cookie
    DeleteCookie {
        /// Cookie name
        name: String,
    },
    /// Delete every visible cookie
    DeleteAllCookies,
    /// Capabilities of the running session
    Capabilities,
}

impl WireCommand {
    /// Short command name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NewSession { .. } => "newSession",
            Self::Quit => "quit",
            Self::Navigate { .. } => "get",
            Self::CurrentUrl => "getCurrentUrl",
            Self::PageSource => "getPageSource",
            Self::ExecuteScript { .. } => "executeScript",
            Self::FindElement { .. } => "findElement",
            Self::ElementDisplayed { .. } => "isElementDisplayed",
            Self::ElementAttribute { .. } => "getElementAttribute",
            Self::ClickElement { .. } => "clickElement",
            Self::SetTimeouts { .. } => "setTimeout",
            Self::GetCookies => "getCookies",
            Self::AddCookie { .. } => "addCookie",
            Self::DeleteCookie { .. } => "deleteCookie",
            Self::DeleteAllCookies => "deleteAllCookies",
            Self::Capabilities => "getCapabilities",
        }
    }

    /// HTTP verb
    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        match self {
            Self::CurrentUrl
            | Self::PageSource
            | Self::ElementDisplayed { .. }
            | Self::ElementAttribute { .. }
            | Self::GetCookies
            | Self::Capabilities => HttpMethod::Get,
            Self::Quit | Self::DeleteCookie { .. } | Self::DeleteAllCookies => HttpMethod::Delete,
            Self::NewSession { .. }
            | Self::Navigate { .. }
            | Self::ExecuteScript { .. }
            | Self::FindElement { .. }
            | Self::ClickElement { .. }
            | Self::SetTimeouts { .. }
            | Self::AddCookie { .. } => HttpMethod::Post,
        }
    }

    /// Whether the command is addressed to an existing session
    #[must_use]
    pub const fn requires_session(&self) -> bool {
        !matches!(self, Self::NewSession { .. })
    }

    /// Path below the hub URL.
    ///
    /// # Errors
    ///
    /// [`RemoteError::NoSession`] for a session command without a session.
    pub fn path(&self, session: Option<&str>) -> RemoteResult<String> {
        if !self.requires_session() {
            return Ok("session".to_string());
        }
        let session = session.ok_or(RemoteError::NoSession)?;
        let base = format!("session/{session}");
        let path = match self {
            Self::NewSession { .. } => return Ok("session".to_string()),
            Self::Quit | Self::Capabilities => base,
            Self::Navigate { .. } | Self::CurrentUrl => format!("{base}/url"),
            Self::PageSource => format!("{base}/source"),
            Self::ExecuteScript { .. } => format!("{base}/execute"),
            Self::FindElement { .. } => format!("{base}/element"),
            Self::ElementDisplayed { id } => format!("{base}/element/{id}/displayed"),
            Self::ElementAttribute { id, name } => {
                format!("{base}/element/{id}/attribute/{name}")
            }
            Self::ClickElement { id } => format!("{base}/element/{id}/click"),
            Self::SetTimeouts { .. } => format!("{base}/timeouts"),
            Self::GetCookies | Self::AddCookie { .. } | Self::DeleteAllCookies => {
                format!("{base}/cookie")
            }
            Self::DeleteCookie { name } => format!("{base}/cookie/{name}"),
        };
        Ok(path)
    }

    /// JSON body, for POST commands
    #[must_use]
    pub fn body(&self) -> Option<Value> {
        match self {
            Self::NewSession { capabilities } => {
                Some(json!({ "desiredCapabilities": capabilities }))
            }
            Self::Navigate { url } => Some(json!({ "url": url })),
            Self::ExecuteScript { script, args } => Some(json!({ "script": script, "args": args })),
            Self::FindElement { using, value } => Some(json!({ "using": using, "value": value })),
            Self::ClickElement { .. } => Some(json!({})),
            Self::SetTimeouts { kind, ms } => Some(json!({ "type": kind, "ms": ms })),
            Self::AddCookie { cookie } => Some(json!({ "cookie": cookie })),
            Self::Quit
            | Self::CurrentUrl
            | Self::PageSource
            | Self::ElementDisplayed { .. }
            | Self::ElementAttribute { .. }
            | Self::GetCookies
            | Self::DeleteCookie { .. }
            | Self::DeleteAllCookies
            | Self::Capabilities => None,
        }
    }
}

// =============================================================================
// SELENIUM RC
// =============================================================================

/// One Selenium RC command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RcCommand {
    /// Launch a browser
    GetNewBrowserSession {
        /// Browser launcher, e.g. `*firefox`
        browser: String,
        /// Initial URL
        url: String,
        /// Extension JavaScript
        extension_js: String,
        /// `key=value;...` launch options
        options: String,
    },
    /// Close the browser
    TestComplete,
    /// Load a URL
    Open {
        /// Target URL
        url: String,
    },
    /// Default command timeout
    SetTimeout {
        /// Milliseconds
        ms: u64,
    },
    /// Block until the page loads
    WaitForPageToLoad {
        /// Milliseconds
        ms: u64,
    },
    /// Block until a script condition holds
    WaitForCondition {
        /// Condition script
        script: String,
        /// Milliseconds
        ms: u64,
    },
    /// Block until an element exists
    WaitForElementPresent {
        /// RC locator
        locator: String,
    },
    /// Block until an element is gone
    WaitForElementNotPresent {
        /// RC locator
        locator: String,
    },
    /// Markup of the current document body
    GetHtmlSource,
    /// URL of the current page
    GetLocation,
    /// Evaluate a script in the RC context
    GetEval {
        /// Script
        script: String,
    },
    /// All cookies as a header-style string
    GetCookie,
    /// Set a cookie
    CreateCookie {
        /// `name=value`
        pair: String,
        /// `path=/x,max_age=10`
        options: String,
    },
    /// Delete one cookie
    DeleteCookie {
        /// Cookie name
        name: String,
        /// Path scope
        path: Option<String>,
    },
    /// Delete every visible cookie
    DeleteAllVisibleCookies,
}

impl RcCommand {
    /// Wire command name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GetNewBrowserSession { .. } => "getNewBrowserSession",
            Self::TestComplete => "testComplete",
            Self::Open { .. } => "open",
            Self::SetTimeout { .. } => "setTimeout",
            Self::WaitForPageToLoad { .. } => "waitForPageToLoad",
            Self::WaitForCondition { .. } => "waitForCondition",
            Self::WaitForElementPresent { .. } => "waitForElementPresent",
            Self::WaitForElementNotPresent { .. } => "waitForElementNotPresent",
            Self::GetHtmlSource => "getHtmlSource",
            Self::GetLocation => "getLocation",
            Self::GetEval { .. } => "getEval",
            Self::GetCookie => "getCookie",
            Self::CreateCookie { .. } => "createCookie",
            Self::DeleteCookie { .. } => "deleteCookie",
            Self::DeleteAllVisibleCookies => "deleteAllVisibleCookies",
        }
    }

    /// Whether the command is addressed to an existing session
    #[must_use]
    pub const fn requires_session(&self) -> bool {
        !matches!(self, Self::GetNewBrowserSession { .. })
    }

    /// Positional arguments, in wire order
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::GetNewBrowserSession {
                browser,
                url,
                extension_js,
                options,
            } => vec![
                browser.clone(),
                url.clone(),
                extension_js.clone(),
                options.clone(),
            ],
            Self::Open { url } => vec![url.clone(), "true".to_string()],
            Self::SetTimeout { ms } | Self::WaitForPageToLoad { ms } => vec![ms.to_string()],
            Self::WaitForCondition { script, ms } => vec![script.clone(), ms.to_string()],
            Self::WaitForElementPresent { locator } | Self::WaitForElementNotPresent { locator } => {
                vec![locator.clone()]
            }
            Self::GetEval { script } => vec![script.clone()],
            Self::CreateCookie { pair, options } => vec![pair.clone(), options.clone()],
            Self::DeleteCookie { name, path } => {
                vec![name.clone(), path.clone().unwrap_or_default()]
            }
            Self::TestComplete
            | Self::GetHtmlSource
            | Self::GetLocation
            | Self::GetCookie
            | Self::DeleteAllVisibleCookies => Vec::new(),
        }
    }

    /// Form fields: `cmd`, numbered arguments, then `sessionId`.
    ///
    /// # Errors
    ///
    /// [`RemoteError::NoSession`] for a session command without a session.
    pub fn form(&self, session: Option<&str>) -> RemoteResult<Vec<(String, String)>> {
        let mut fields = vec![("cmd".to_string(), self.name().to_string())];
        fields.extend(
            self.args()
                .into_iter()
                .enumerate()
                .map(|(i, arg)| ((i + 1).to_string(), arg)),
        );
        if self.requires_session() {
            let session = session.ok_or(RemoteError::NoSession)?;
            fields.push(("sessionId".to_string(), session.to_string()));
        }
        Ok(fields)
    }
}

/// Parse an RC `getCookie` string: `a=1; b="x=y"`
#[must_use]
pub fn parse_rc_cookies(text: &str) -> Vec<(String, String)> {
    text.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.split_once('='))
        .map(|(name, value)| {
            (
                name.trim().to_string(),
                unquote_cookie_value(value.trim()).to_string(),
            )
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod wire_tests {
        use super::*;

        #[test]
        fn test_new_session_needs_no_session() {
            let cmd = WireCommand::NewSession {
                capabilities: Map::new(),
            };
            assert_eq!(cmd.path(None).unwrap(), "session");
            assert_eq!(cmd.method(), HttpMethod::Post);
            assert_eq!(cmd.body().unwrap(), json!({"desiredCapabilities": {}}));
        }

        #[test]
        fn test_session_commands_require_session() {
            let err = WireCommand::CurrentUrl.path(None).unwrap_err();
            assert!(matches!(err, RemoteError::NoSession));
        }

        #[test]
        fn test_paths() {
            let s = Some("abc");
            assert_eq!(WireCommand::Quit.path(s).unwrap(), "session/abc");
            assert_eq!(WireCommand::PageSource.path(s).unwrap(), "session/abc/source");
            assert_eq!(
                WireCommand::ElementDisplayed {
                    id: ElementId::new("7")
                }
                .path(s)
                .unwrap(),
                "session/abc/element/7/displayed"
            );
            assert_eq!(
                WireCommand::ElementAttribute {
                    id: ElementId::new("7"),
                    name: "value".into()
                }
                .path(s)
                .unwrap(),
                "session/abc/element/7/attribute/value"
            );
            assert_eq!(
                WireCommand::DeleteCookie { name: "sid".into() }
                    .path(s)
                    .unwrap(),
                "session/abc/cookie/sid"
            );
        }

        #[test]
        fn test_methods() {
            assert_eq!(WireCommand::GetCookies.method(), HttpMethod::Get);
            assert_eq!(WireCommand::DeleteAllCookies.method(), HttpMethod::Delete);
            assert_eq!(
                WireCommand::Navigate { url: "x".into() }.method(),
                HttpMethod::Post
            );
        }

        #[test]
        fn test_bodies() {
            assert_eq!(
                WireCommand::SetTimeouts {
                    kind: "page load".into(),
                    ms: 500
                }
                .body()
                .unwrap(),
                json!({"type": "page load", "ms": 500})
            );
            assert_eq!(
                WireCommand::FindElement {
                    using: "css selector",
                    value: "#a".into()
                }
                .body()
                .unwrap(),
                json!({"using": "css selector", "value": "#a"})
            );
            assert!(WireCommand::GetCookies.body().is_none());
        }

        #[test]
        fn test_cookie_body_skips_unset_fields() {
            let body = WireCommand::AddCookie {
                cookie: Cookie::new("sid", "1").with_path("/"),
            }
            .body()
            .unwrap();
            assert_eq!(body, json!({"cookie": {"name": "sid", "value": "1", "path": "/"}}));
        }
    }

    mod rc_tests {
        use super::*;

        #[test]
        fn test_form_layout() {
            let form = RcCommand::WaitForCondition {
                script: "true".into(),
                ms: 100,
            }
            .form(Some("s1"))
            .unwrap();
            assert_eq!(
                form,
                vec![
                    ("cmd".to_string(), "waitForCondition".to_string()),
                    ("1".to_string(), "true".to_string()),
                    ("2".to_string(), "100".to_string()),
                    ("sessionId".to_string(), "s1".to_string()),
                ]
            );
        }

        #[test]
        fn test_new_session_form_has_no_session_id() {
            let form = RcCommand::GetNewBrowserSession {
                browser: "*firefox".into(),
                url: "http://app/".into(),
                extension_js: String::new(),
                options: String::new(),
            }
            .form(None)
            .unwrap();
            assert_eq!(form.len(), 5);
            assert!(form.iter().all(|(k, _)| k != "sessionId"));
        }

        #[test]
        fn test_open_waits_on_xhr() {
            assert_eq!(
                RcCommand::Open { url: "/".into() }.args(),
                vec!["/".to_string(), "true".to_string()]
            );
        }

        #[test]
        fn test_missing_session() {
            assert!(matches!(
                RcCommand::GetLocation.form(None).unwrap_err(),
                RemoteError::NoSession
            ));
        }
    }

    #[test]
    fn test_parse_rc_cookies() {
        let cookies = parse_rc_cookies("a=1; b=\"x=y\";  ;c=");
        assert_eq!(
            cookies,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "x=y".to_string()),
                ("c".to_string(), String::new()),
            ]
        );
        assert!(parse_rc_cookies("").is_empty());
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote_cookie_value("\"v\""), "v");
        assert_eq!(unquote_cookie_value("v"), "v");
        assert_eq!(unquote_cookie_value("\""), "\"");
    }
}
