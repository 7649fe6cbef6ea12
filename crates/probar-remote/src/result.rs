//! Result and error types for Probar Remote.

use thiserror::Error;

use crate::status::{ErrorCategory, ErrorKind};

/// Result type for Probar Remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors that can occur while driving a remote browser
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Classified error reported by the remote server
    #[error("{kind}: {message}")]
    Remote {
        /// Semantic kind from the status table
        kind: ErrorKind,
        /// Server-supplied message, or the kind's detail text
        message: String,
    },

    /// The HTTP exchange itself failed
    #[error("Transport failed: {message}")]
    Transport {
        /// Error message
        message: String,
    },

    /// The server answered with something we cannot interpret
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Error message
        message: String,
    },

    /// A finder could not be resolved to a page element
    #[error("Unknown page element {value}")]
    UnknownPageElement {
        /// Rendering of the offending value
        value: String,
    },

    /// A locator cannot be expressed on the target protocol
    #[error("Invalid locator: {locator}")]
    InvalidLocator {
        /// The locator text
        locator: String,
    },

    /// Custom comparison predicates need client-side evaluation
    #[error("Passing a predicate to evaluate_element is not supported by the {backend} backend")]
    UnsupportedPredicate {
        /// Backend name
        backend: &'static str,
    },

    /// A wait condition string could not be parsed
    #[error("Invalid wait condition: {condition}")]
    InvalidCondition {
        /// The condition text
        condition: String,
    },

    /// A builder directive name is not part of the vocabulary
    #[error("Unknown wait directive: {name}")]
    UnknownDirective {
        /// Directive name
        name: String,
    },

    /// A remote command was issued before a session was started
    #[error("No browser session")]
    NoSession,

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Assertion-style failure surfaced to test code
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// The wait was cancelled by the caller
    #[error("Interrupted")]
    Interrupted,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

/// Builders keep their first error and report it on every compile, so the
/// error must be cloneable. Source errors are rebuilt from their messages.
impl Clone for RemoteError {
    fn clone(&self) -> Self {
        use serde::de::Error as _;

        match self {
            Self::Remote { kind, message } => Self::Remote {
                kind: *kind,
                message: message.clone(),
            },
            Self::Transport { message } => Self::Transport {
                message: message.clone(),
            },
            Self::InvalidResponse { message } => Self::InvalidResponse {
                message: message.clone(),
            },
            Self::UnknownPageElement { value } => Self::UnknownPageElement {
                value: value.clone(),
            },
            Self::InvalidLocator { locator } => Self::InvalidLocator {
                locator: locator.clone(),
            },
            Self::UnsupportedPredicate { backend } => Self::UnsupportedPredicate { backend },
            Self::InvalidCondition { condition } => Self::InvalidCondition {
                condition: condition.clone(),
            },
            Self::UnknownDirective { name } => Self::UnknownDirective { name: name.clone() },
            Self::NoSession => Self::NoSession,
            Self::Config { message } => Self::Config {
                message: message.clone(),
            },
            Self::AssertionFailed { message } => Self::AssertionFailed {
                message: message.clone(),
            },
            Self::Interrupted => Self::Interrupted,
            Self::Io(err) => Self::Io(std::io::Error::new(err.kind(), err.to_string())),
            Self::Json(err) => Self::Json(serde_json::Error::custom(err.to_string())),
            Self::Yaml(err) => Self::Yaml(serde_yaml_ng::Error::custom(err.to_string())),
        }
    }
}

impl RemoteError {
    /// Build a classified remote error, falling back to the kind's detail text
    #[must_use]
    pub fn remote(kind: ErrorKind, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| kind.detail().to_string());
        Self::Remote { kind, message }
    }

    /// Semantic kind, when this is a classified remote error
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Remote { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether this is a remote error of the given kind
    #[must_use]
    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind() == Some(kind)
    }

    /// Cancellation always propagates, at every catch point
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// Whether a poll tick may fold this error into "not yet satisfied"
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Remote { kind, .. } => kind.is_retryable(),
            _ => false,
        }
    }

    /// Whether the server reported a timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind()
            .is_some_and(|kind| kind.category() == ErrorCategory::Timeout)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_uses_detail_when_message_missing() {
        let err = RemoteError::remote(ErrorKind::NoSuchElement, None);
        assert_eq!(
            err.to_string(),
            format!("NoSuchElement: {}", ErrorKind::NoSuchElement.detail())
        );
    }

    #[test]
    fn test_remote_keeps_server_message() {
        let err = RemoteError::remote(ErrorKind::UnknownError, Some("boom".into()));
        assert_eq!(err.to_string(), "UnknownError: boom");
        assert!(err.is_kind(ErrorKind::UnknownError));
    }

    #[test]
    fn test_empty_message_falls_back() {
        let err = RemoteError::remote(ErrorKind::Timeout, Some(String::new()));
        assert!(err.to_string().contains("timeout expired"));
    }

    #[test]
    fn test_triage() {
        assert!(RemoteError::remote(ErrorKind::StaleElementReference, None).is_transient());
        assert!(!RemoteError::remote(ErrorKind::InvalidSelector, None).is_transient());
        assert!(RemoteError::Interrupted.is_fatal());
        assert!(!RemoteError::Interrupted.is_transient());
        assert!(!RemoteError::Transport {
            message: "refused".into()
        }
        .is_transient());
        assert!(RemoteError::remote(ErrorKind::ScriptTimeout, None).is_timeout());
    }

    #[test]
    fn test_clone_keeps_message() {
        let io = RemoteError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "browser.yaml",
        ));
        let copy = io.clone();
        assert_eq!(copy.to_string(), io.to_string());
        assert!(matches!(copy, RemoteError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));

        let remote = RemoteError::remote(ErrorKind::NoSuchFrame, Some("frame 2".into()));
        assert!(remote.clone().is_kind(ErrorKind::NoSuchFrame));
    }

    #[test]
    fn test_unknown_page_element_message() {
        let err = RemoteError::UnknownPageElement {
            value: "42".into(),
        };
        assert_eq!(err.to_string(), "Unknown page element 42");
    }
}
