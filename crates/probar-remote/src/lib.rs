//! Probar Remote: compound wait expressions for remote-controlled browsers
//!
//! Tests against a live browser spend most of their effort waiting: for an
//! element to appear, for AJAX to settle, for a click to load a new page.
//! Probar Remote expresses such waits as boolean expressions over predicate
//! clauses and evaluates them against two wire protocols.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  PROBAR REMOTE Architecture                      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Wait       │    │ Native     │    │ WebDriver  │            │
//! │   │ Expression │───►│ Poller     │───►│ JSONWire   │            │
//! │   │ Builder    │    │ (client)   │    │ session    │            │
//! │   └─────┬──────┘    └────────────┘    └────────────┘            │
//! │         │           ┌────────────┐    ┌────────────┐            │
//! │         └──────────►│ JS compile │───►│ Selenium   │            │
//! │                     │ (server)   │    │ RC session │            │
//! │                     └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use probar_remote::{BrowserConfig, WaitCondition, WaitExpression};
//!
//! # fn main() -> probar_remote::RemoteResult<()> {
//! let config = BrowserConfig::from_file("browser.yaml")?;
//! let mut browser = config.open_webdriver()?;
//! browser.open("/", &WaitCondition::Page, None)?;
//!
//! let ready = browser
//!     .wait_expression()
//!     .element_present("#druid")
//!     .ajax_complete();
//! assert!(browser.wait_for_expression(&ready, Some(5_000))?);
//! browser.stop()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod browser;
mod builder;
mod clause;
mod condition;
mod config;
mod expression;
mod locator;
mod poll;
mod protocol;
mod result;
mod selenium;
mod session;
mod status;
mod transport;
mod webdriver;

/// Diagnostics switches and `tracing` subscriber setup
pub mod logging;

/// Test doubles for browsers and transports
pub mod mock;

pub use browser::{is_truthy, Browser, ElementId};
pub use builder::{
    js_quote, BuildState, NativeWaitExpression, ScriptWaitExpression, WaitDirective,
    WaitExpression,
};
pub use clause::{
    mark_page_script, page_loading_expr, page_ready_expr, value_script, AjaxFlavor,
    CallableClause, Clause, Comparison, PAGE_SENTINEL,
};
pub use condition::WaitCondition;
pub use config::{Backend, BrowserConfig, DEFAULT_SELENIUM_SERVER};
pub use expression::Expression;
pub use locator::{Finder, Locator, PageElement, Strategy};
pub use logging::{Diagnostics, LogFormat};
pub use poll::{
    min_attempts, CancelFlag, PollOptions, PollState, Poller, WaitResult,
    DEFAULT_POLL_FREQUENCY_MS, DEFAULT_TIMEOUT_MS,
};
pub use protocol::{parse_rc_cookies, unquote_cookie_value, Cookie, RcCommand, WireCommand};
pub use result::{RemoteError, RemoteResult};
pub use selenium::{
    parse_rc_response, SeleniumBrowser, SeleniumRemote, DEFAULT_RC_BROWSER, DRIVER_PATH,
    WINDOW_PRELUDE,
};
pub use session::{join_url, scoped_timeout, SessionTimeout};
pub use status::{classify, ErrorCategory, ErrorKind};
#[cfg(feature = "http")]
pub use transport::ReqwestTransport;
pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, RequestBody, Transport, DEFAULT_CONNECT_TIMEOUT,
};
pub use webdriver::{
    classify_response, UserAgent, WebDriverBrowser, WebDriverRemote, DEFAULT_BROWSER_NAME,
    HUB_PATH,
};
