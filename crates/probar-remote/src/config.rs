//! Browser configuration, loaded from YAML and overridable by the runner.
//!
//! ```yaml
//! backend: webdriver
//! server_url: http://localhost:8008
//! selenium-server: http://grid:4444
//! browser: firefox
//! default_timeout_ms: 20000
//! ajax_flavor: prototype
//! diagnostics:
//!   trace_ticks: true
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::clause::AjaxFlavor;
use crate::logging::Diagnostics;
use crate::poll::{PollOptions, DEFAULT_POLL_FREQUENCY_MS, DEFAULT_TIMEOUT_MS};
use crate::result::{RemoteError, RemoteResult};
use crate::selenium::{SeleniumBrowser, SeleniumRemote};
use crate::transport::Transport;
use crate::webdriver::{WebDriverBrowser, WebDriverRemote, DEFAULT_BROWSER_NAME};

/// Default remote endpoint
pub const DEFAULT_SELENIUM_SERVER: &str = "http://localhost:4444";

/// Remote protocol to speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// WebDriver JSONWire
    #[default]
    WebDriver,
    /// Selenium RC
    Selenium,
}

impl FromStr for Backend {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webdriver" => Ok(Self::WebDriver),
            "selenium" => Ok(Self::Selenium),
            other => Err(RemoteError::Config {
                message: format!("unknown backend '{other}'"),
            }),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebDriver => f.write_str("webdriver"),
            Self::Selenium => f.write_str("selenium"),
        }
    }
}

/// Remote browser configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Protocol
    pub backend: Backend,
    /// Application under test
    pub server_url: Option<String>,
    /// Base for relative URLs, when it differs from `server_url`
    pub base_url: Option<String>,
    /// Selenium RC or WebDriver hub endpoint
    #[serde(alias = "selenium-server")]
    pub selenium_server: String,
    /// Browser name, e.g. `firefox`
    pub browser: String,
    /// Session timeout in milliseconds; the HTTP client never cuts a wait short
    pub default_timeout_ms: u64,
    /// Sleep between native poll ticks in milliseconds
    pub poll_frequency_ms: u64,
    /// AJAX library inspected by `ajax` conditions
    pub ajax_flavor: AjaxFlavor,
    /// Diagnostic output
    pub diagnostics: Diagnostics,
    /// Extra desired capabilities (WebDriver only)
    pub capabilities: Map<String, Value>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            backend: Backend::WebDriver,
            server_url: None,
            base_url: None,
            selenium_server: DEFAULT_SELENIUM_SERVER.to_string(),
            browser: DEFAULT_BROWSER_NAME.to_string(),
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_frequency_ms: DEFAULT_POLL_FREQUENCY_MS,
            ajax_flavor: AjaxFlavor::JQuery,
            diagnostics: Diagnostics::default(),
            capabilities: Map::new(),
        }
    }
}

impl BrowserConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application URL
    #[must_use]
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Set the backend
    #[must_use]
    pub const fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Set the browser name
    #[must_use]
    pub fn with_browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = browser.into();
        self
    }

    /// Parse YAML text
    ///
    /// # Errors
    ///
    /// Malformed YAML or values of the wrong type.
    pub fn from_yaml_str(yaml: &str) -> RemoteResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Read and parse a YAML file
    ///
    /// # Errors
    ///
    /// I/O and parse failures.
    pub fn from_file(path: impl AsRef<Path>) -> RemoteResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading browser config");
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Apply runner options; non-empty values win over file values.
    ///
    /// Keys use the file's names, with `-` and `_` interchangeable.
    ///
    /// # Errors
    ///
    /// Unknown keys and unparseable values.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, String>) -> RemoteResult<Self> {
        for (key, value) in overrides {
            if value.is_empty() {
                continue;
            }
            let bad_number = || RemoteError::Config {
                message: format!("'{key}' expects milliseconds, got '{value}'"),
            };
            match key.replace('-', "_").as_str() {
                "backend" => self.backend = value.parse()?,
                "server_url" => self.server_url = Some(value.clone()),
                "base_url" => self.base_url = Some(value.clone()),
                "selenium_server" => self.selenium_server = value.clone(),
                "browser" => self.browser = value.clone(),
                "default_timeout_ms" => {
                    self.default_timeout_ms = value.parse().map_err(|_| bad_number())?;
                }
                "poll_frequency_ms" => {
                    self.poll_frequency_ms = value.parse().map_err(|_| bad_number())?;
                }
                "ajax_flavor" => self.ajax_flavor = value.parse()?,
                _ => {
                    return Err(RemoteError::Config {
                        message: format!("unknown configuration key '{key}'"),
                    });
                }
            }
        }
        Ok(self)
    }

    /// Check required keys
    ///
    /// # Errors
    ///
    /// [`RemoteError::Config`] naming every missing key.
    pub fn validate(&self) -> RemoteResult<()> {
        let mut missing = Vec::new();
        if self.server_url.as_deref().map_or(true, str::is_empty) {
            missing.push("server_url");
        }
        if self.selenium_server.is_empty() {
            missing.push("selenium_server");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RemoteError::Config {
                message: format!(
                    "Configuration is missing required keys {}",
                    missing.join(", ")
                ),
            })
        }
    }

    /// URL relative paths resolve against
    #[must_use]
    pub fn effective_base_url(&self) -> Option<&str> {
        self.base_url.as_deref().or(self.server_url.as_deref())
    }

    /// Poll options for native waits
    #[must_use]
    pub fn poll_options(&self) -> PollOptions {
        PollOptions::new()
            .with_frequency(self.poll_frequency_ms)
            .with_diagnostics(self.diagnostics)
    }

    /// Desired capabilities with `browserName` filled in
    #[must_use]
    pub fn desired_capabilities(&self) -> Map<String, Value> {
        let mut caps = self.capabilities.clone();
        caps.entry("browserName")
            .or_insert_with(|| Value::String(self.browser.clone()));
        caps
    }

    /// RC launcher string, e.g. `*firefox`
    #[must_use]
    pub fn rc_browser(&self) -> String {
        if self.browser.starts_with('*') {
            self.browser.clone()
        } else {
            format!("*{}", self.browser)
        }
    }

    /// Build a WebDriver browser over `transport`
    ///
    /// # Errors
    ///
    /// Validation failures.
    pub fn webdriver_with<T: Transport>(&self, transport: T) -> RemoteResult<WebDriverBrowser<T>> {
        self.validate()?;
        let remote = WebDriverRemote::new(transport, &self.selenium_server)
            .with_capabilities(self.desired_capabilities())
            .with_default_timeout(self.default_timeout_ms);
        let mut browser = WebDriverBrowser::new(remote)
            .with_flavor(self.ajax_flavor)
            .with_poll_options(self.poll_options());
        if let Some(base) = self.effective_base_url() {
            browser = browser.with_base_url(base);
        }
        Ok(browser)
    }

    /// Build a Selenium RC browser over `transport`
    ///
    /// # Errors
    ///
    /// Validation failures.
    pub fn selenium_with<T: Transport>(&self, transport: T) -> RemoteResult<SeleniumBrowser<T>> {
        self.validate()?;
        let mut remote = SeleniumRemote::new(transport, &self.selenium_server, self.rc_browser())
            .with_default_timeout(self.default_timeout_ms);
        if let Some(base) = self.effective_base_url() {
            remote = remote.with_browser_url(base);
        }
        let mut browser = SeleniumBrowser::new(remote)
            .with_flavor(self.ajax_flavor)
            .with_diagnostics(self.diagnostics);
        if let Some(base) = self.effective_base_url() {
            browser = browser.with_base_url(base);
        }
        Ok(browser)
    }

    /// WebDriver browser over HTTP
    ///
    /// # Errors
    ///
    /// Validation failures.
    #[cfg(feature = "http")]
    pub fn open_webdriver(
        &self,
    ) -> RemoteResult<WebDriverBrowser<crate::transport::ReqwestTransport>> {
        self.webdriver_with(crate::transport::ReqwestTransport::new())
    }

    /// Selenium RC browser over HTTP
    ///
    /// # Errors
    ///
    /// Validation failures.
    #[cfg(feature = "http")]
    pub fn open_selenium(
        &self,
    ) -> RemoteResult<SeleniumBrowser<crate::transport::ReqwestTransport>> {
        self.selenium_with(crate::transport::ReqwestTransport::new())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use std::io::Write;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = BrowserConfig::from_yaml_str("server_url: http://app.test").unwrap();
            assert_eq!(config.backend, Backend::WebDriver);
            assert_eq!(config.selenium_server, "http://localhost:4444");
            assert_eq!(config.browser, "phantomjs");
            assert_eq!(config.default_timeout_ms, 16_000);
            assert_eq!(config.poll_frequency_ms, 250);
            assert_eq!(config.ajax_flavor, AjaxFlavor::JQuery);
        }

        #[test]
        fn test_full_document() {
            let yaml = r"
backend: selenium
server_url: http://app.test:8008
selenium-server: http://grid:4444
browser: firefox
default_timeout_ms: 20000
ajax_flavor: prototype
diagnostics:
  trace_ticks: true
capabilities:
  platform: LINUX
";
            let config = BrowserConfig::from_yaml_str(yaml).unwrap();
            assert_eq!(config.backend, Backend::Selenium);
            assert_eq!(config.selenium_server, "http://grid:4444");
            assert_eq!(config.ajax_flavor, AjaxFlavor::Prototype);
            assert!(config.diagnostics.trace_ticks);
            assert!(!config.diagnostics.script_console);
            assert_eq!(config.capabilities["platform"], "LINUX");
            assert_eq!(config.rc_browser(), "*firefox");
        }

        #[test]
        fn test_bad_yaml() {
            let err = BrowserConfig::from_yaml_str("backend: [1, 2").unwrap_err();
            assert!(matches!(err, RemoteError::Yaml(_)));
            assert!(BrowserConfig::from_yaml_str("backend: wsgi").is_err());
        }

        #[test]
        fn test_from_file() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "server_url: http://app.test/").unwrap();
            writeln!(file, "browser: chrome").unwrap();
            let config = BrowserConfig::from_file(file.path()).unwrap();
            assert_eq!(config.browser, "chrome");
            assert_eq!(config.effective_base_url(), Some("http://app.test/"));
        }

        #[test]
        fn test_missing_file_is_io_error() {
            let dir = tempfile::tempdir().unwrap();
            let err = BrowserConfig::from_file(dir.path().join("absent.yaml")).unwrap_err();
            assert!(matches!(err, RemoteError::Io(_)));
        }
    }

    mod override_tests {
        use super::*;

        fn overrides(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect()
        }

        #[test]
        fn test_runner_values_win() {
            let config = BrowserConfig::new()
                .with_server_url("http://file.test")
                .with_overrides(&overrides(&[
                    ("server_url", "http://runner.test"),
                    ("selenium-server", "http://grid:5555"),
                    ("default_timeout_ms", "500"),
                ]))
                .unwrap();
            assert_eq!(config.server_url.as_deref(), Some("http://runner.test"));
            assert_eq!(config.selenium_server, "http://grid:5555");
            assert_eq!(config.default_timeout_ms, 500);
        }

        #[test]
        fn test_empty_values_ignored() {
            let config = BrowserConfig::new()
                .with_server_url("http://file.test")
                .with_overrides(&overrides(&[("server_url", "")]))
                .unwrap();
            assert_eq!(config.server_url.as_deref(), Some("http://file.test"));
        }

        #[test]
        fn test_bad_values_rejected() {
            assert!(BrowserConfig::new()
                .with_overrides(&overrides(&[("default_timeout_ms", "soon")]))
                .is_err());
            assert!(BrowserConfig::new()
                .with_overrides(&overrides(&[("colour", "blue")]))
                .is_err());
        }
    }

    mod validate_tests {
        use super::*;

        #[test]
        fn test_server_url_required() {
            let err = BrowserConfig::new().validate().unwrap_err();
            assert_eq!(
                err.to_string(),
                "Configuration error: Configuration is missing required keys server_url"
            );
        }

        #[test]
        fn test_factories_validate_first() {
            assert!(BrowserConfig::new()
                .webdriver_with(MockTransport::new())
                .is_err());
            assert!(BrowserConfig::new()
                .selenium_with(MockTransport::new())
                .is_err());
        }
    }

    mod factory_tests {
        use super::*;

        #[test]
        fn test_webdriver_factory() {
            let browser = BrowserConfig::new()
                .with_server_url("http://app.test")
                .with_browser("firefox")
                .webdriver_with(MockTransport::new())
                .unwrap();
            assert_eq!(browser.remote().hub_url(), "http://localhost:4444/wd/hub");
        }

        #[test]
        fn test_selenium_factory() {
            let browser = BrowserConfig::new()
                .with_server_url("http://app.test")
                .with_backend(Backend::Selenium)
                .selenium_with(MockTransport::new())
                .unwrap();
            assert_eq!(
                browser.remote().driver_url(),
                "http://localhost:4444/selenium-server/driver/"
            );
        }

        #[test]
        fn test_capabilities_keep_explicit_browser_name() {
            let mut config = BrowserConfig::new().with_browser("firefox");
            config
                .capabilities
                .insert("browserName".into(), Value::String("chrome".into()));
            assert_eq!(config.desired_capabilities()["browserName"], "chrome");
        }
    }
}
