//! Remote Protocol Error Classifier
//!
//! Maps a JSONWire status code to a semantic [`ErrorKind`]. The table is fixed
//! for the life of the process and every remote call site goes through
//! [`classify`] before an error reaches the poller.

use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR CATEGORY
// =============================================================================

/// Coarse triage bucket for an [`ErrorKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// The command executed successfully
    Success,
    /// Page state not ready yet; folded into "not satisfied" while polling
    Transient,
    /// An operation ran out of time on the server
    Timeout,
    /// Malformed request; surfaced to the caller
    Protocol,
}

// =============================================================================
// ERROR KIND
// =============================================================================

/// Semantic kind of a remote protocol error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Status 0
    Success,
    /// A session is either terminated or not started
    NoSuchDriver,
    /// An element could not be located on the page
    NoSuchElement,
    /// A frame switch target could not be found
    NoSuchFrame,
    /// Unknown resource or unsupported HTTP method
    UnknownCommand,
    /// The referenced element is no longer attached to the DOM
    StaleElementReference,
    /// The element is not visible on the page
    ElementNotVisible,
    /// The element is in an invalid state (e.g. disabled)
    InvalidElementState,
    /// Unknown server-side error
    UnknownError,
    /// The element cannot be selected
    ElementIsNotSelectable,
    /// User supplied JavaScript failed
    JavaScriptError,
    /// XPath lookup failed
    XPathLookupError,
    /// An operation did not complete before its timeout expired
    Timeout,
    /// A window switch target could not be found
    NoSuchWindow,
    /// Cookie domain differs from the current page
    InvalidCookieDomain,
    /// A cookie could not be set
    UnableToSetCookie,
    /// A modal dialog blocked the operation
    UnexpectedAlertOpen,
    /// No modal dialog was open
    NoAlertOpen,
    /// A script did not complete before its timeout expired
    ScriptTimeout,
    /// Invalid interaction coordinates
    InvalidElementCoordinates,
    /// IME not available
    ImeNotAvailable,
    /// IME engine could not be started
    ImeEngineActivationFailed,
    /// Invalid XPath/CSS selector
    InvalidSelector,
    /// A new session could not be created
    SessionNotCreated,
    /// Mouse target out of bounds
    MoveTargetOutOfBounds,
}

impl ErrorKind {
    /// Every kind in the table, in status code order
    pub const ALL: [Self; 25] = [
        Self::Success,
        Self::NoSuchDriver,
        Self::NoSuchElement,
        Self::NoSuchFrame,
        Self::UnknownCommand,
        Self::StaleElementReference,
        Self::ElementNotVisible,
        Self::InvalidElementState,
        Self::UnknownError,
        Self::ElementIsNotSelectable,
        Self::JavaScriptError,
        Self::XPathLookupError,
        Self::Timeout,
        Self::NoSuchWindow,
        Self::InvalidCookieDomain,
        Self::UnableToSetCookie,
        Self::UnexpectedAlertOpen,
        Self::NoAlertOpen,
        Self::ScriptTimeout,
        Self::InvalidElementCoordinates,
        Self::ImeNotAvailable,
        Self::ImeEngineActivationFailed,
        Self::InvalidSelector,
        Self::SessionNotCreated,
        Self::MoveTargetOutOfBounds,
    ];

    /// JSONWire status code for this kind
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::Success => 0,
            Self::NoSuchDriver => 6,
            Self::NoSuchElement => 7,
            Self::NoSuchFrame => 8,
            Self::UnknownCommand => 9,
            Self::StaleElementReference => 10,
            Self::ElementNotVisible => 11,
            Self::InvalidElementState => 12,
            Self::UnknownError => 13,
            Self::ElementIsNotSelectable => 15,
            Self::JavaScriptError => 17,
            Self::XPathLookupError => 19,
            Self::Timeout => 21,
            Self::NoSuchWindow => 23,
            Self::InvalidCookieDomain => 24,
            Self::UnableToSetCookie => 25,
            Self::UnexpectedAlertOpen => 26,
            Self::NoAlertOpen => 27,
            Self::ScriptTimeout => 28,
            Self::InvalidElementCoordinates => 29,
            Self::ImeNotAvailable => 30,
            Self::ImeEngineActivationFailed => 31,
            Self::InvalidSelector => 32,
            Self::SessionNotCreated => 33,
            Self::MoveTargetOutOfBounds => 34,
        }
    }

    /// Short summary name, as reported in error messages
    #[must_use]
    pub const fn summary(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::NoSuchDriver => "NoSuchDriver",
            Self::NoSuchElement => "NoSuchElement",
            Self::NoSuchFrame => "NoSuchFrame",
            Self::UnknownCommand => "UnknownCommand",
            Self::StaleElementReference => "StaleElementReference",
            Self::ElementNotVisible => "ElementNotVisible",
            Self::InvalidElementState => "InvalidElementState",
            Self::UnknownError => "UnknownError",
            Self::ElementIsNotSelectable => "ElementIsNotSelectable",
            Self::JavaScriptError => "JavaScriptError",
            Self::XPathLookupError => "XPathLookupError",
            Self::Timeout => "Timeout",
            Self::NoSuchWindow => "NoSuchWindow",
            Self::InvalidCookieDomain => "InvalidCookieDomain",
            Self::UnableToSetCookie => "UnableToSetCookie",
            Self::UnexpectedAlertOpen => "UnexpectedAlertOpen",
            Self::NoAlertOpen => "NoAlertOpenError",
            Self::ScriptTimeout => "ScriptTimeout",
            Self::InvalidElementCoordinates => "InvalidElementCoordinates",
            Self::ImeNotAvailable => "IMENotAvailable",
            Self::ImeEngineActivationFailed => "IMEEngineActivationFailed",
            Self::InvalidSelector => "InvalidSelector",
            Self::SessionNotCreated => "SessionNotCreatedException",
            Self::MoveTargetOutOfBounds => "MoveTargetOutOfBounds",
        }
    }

    /// Long description used when the server supplies no message
    #[must_use]
    pub const fn detail(&self) -> &'static str {
        match self {
            Self::Success => "The command executed successfully.",
            Self::NoSuchDriver => "A session is either terminated or not started.",
            Self::NoSuchElement => {
                "An element could not be located on the page using the given search parameters."
            }
            Self::NoSuchFrame => {
                "A request to switch to a frame could not be satisfied because the frame could not be found."
            }
            Self::UnknownCommand => {
                "The requested resource could not be found, or a request was received using an HTTP method that is not supported by the mapped resource."
            }
            Self::StaleElementReference => {
                "An element command failed because the referenced element is no longer attached to the DOM."
            }
            Self::ElementNotVisible => {
                "An element command could not be completed because the element is not visible on the page."
            }
            Self::InvalidElementState => {
                "An element command could not be completed because the element is in an invalid state."
            }
            Self::UnknownError => {
                "An unknown server-side error occurred while processing the command."
            }
            Self::ElementIsNotSelectable => {
                "An attempt was made to select an element that cannot be selected."
            }
            Self::JavaScriptError => {
                "An error occurred while executing user supplied JavaScript."
            }
            Self::XPathLookupError => "An error occurred while searching for an element by XPath.",
            Self::Timeout => "An operation did not complete before its timeout expired.",
            Self::NoSuchWindow => {
                "A request to switch to a different window could not be satisfied because the window could not be found."
            }
            Self::InvalidCookieDomain => {
                "An illegal attempt was made to set a cookie under a different domain than the current page."
            }
            Self::UnableToSetCookie => "A request to set a cookie's value could not be satisfied.",
            Self::UnexpectedAlertOpen => "A modal dialog was open, blocking this operation.",
            Self::NoAlertOpen => {
                "An attempt was made to operate on a modal dialog when one was not open."
            }
            Self::ScriptTimeout => "A script did not complete before its timeout expired.",
            Self::InvalidElementCoordinates => {
                "The coordinates provided to an interactions operation are invalid."
            }
            Self::ImeNotAvailable => "IME was not available.",
            Self::ImeEngineActivationFailed => "An IME engine could not be started.",
            Self::InvalidSelector => "Argument was an invalid selector (e.g. XPath/CSS).",
            Self::SessionNotCreated => "A new session could not be created.",
            Self::MoveTargetOutOfBounds => {
                "Target provided for a move action is out of bounds."
            }
        }
    }

    /// Triage bucket used by the poller
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Success => ErrorCategory::Success,
            Self::NoSuchElement
            | Self::NoSuchFrame
            | Self::StaleElementReference
            | Self::ElementNotVisible
            | Self::InvalidElementState
            | Self::UnknownError => ErrorCategory::Transient,
            Self::Timeout | Self::ScriptTimeout => ErrorCategory::Timeout,
            Self::NoSuchDriver
            | Self::UnknownCommand
            | Self::ElementIsNotSelectable
            | Self::JavaScriptError
            | Self::XPathLookupError
            | Self::NoSuchWindow
            | Self::InvalidCookieDomain
            | Self::UnableToSetCookie
            | Self::UnexpectedAlertOpen
            | Self::NoAlertOpen
            | Self::InvalidElementCoordinates
            | Self::ImeNotAvailable
            | Self::ImeEngineActivationFailed
            | Self::InvalidSelector
            | Self::SessionNotCreated
            | Self::MoveTargetOutOfBounds => ErrorCategory::Protocol,
        }
    }

    /// Whether a poll tick may treat this kind as "not yet satisfied"
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::Timeout
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary())
    }
}

// =============================================================================
// CLASSIFIER
// =============================================================================

/// Map a wire status code to its semantic kind.
///
/// Codes missing from the table map to [`ErrorKind::UnknownError`]; callers
/// keep the server's raw message alongside.
#[must_use]
pub fn classify(code: u64) -> ErrorKind {
    ErrorKind::ALL
        .iter()
        .copied()
        .find(|kind| u64::from(kind.code()) == code)
        .unwrap_or(ErrorKind::UnknownError)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod classify_tests {
        use super::*;

        #[test]
        fn test_no_such_element() {
            assert_eq!(classify(7), ErrorKind::NoSuchElement);
        }

        #[test]
        fn test_timeout() {
            assert_eq!(classify(21), ErrorKind::Timeout);
        }

        #[test]
        fn test_success() {
            assert_eq!(classify(0), ErrorKind::Success);
        }

        #[test]
        fn test_unmapped_codes_are_unknown() {
            assert_eq!(classify(14), ErrorKind::UnknownError);
            assert_eq!(classify(99), ErrorKind::UnknownError);
            assert_eq!(classify(u64::MAX), ErrorKind::UnknownError);
        }

        #[test]
        fn test_table_round_trips_through_codes() {
            for kind in ErrorKind::ALL {
                assert_eq!(classify(u64::from(kind.code())), kind);
            }
        }

        #[test]
        fn test_codes_are_unique() {
            let mut codes: Vec<u16> = ErrorKind::ALL.iter().map(ErrorKind::code).collect();
            codes.sort_unstable();
            codes.dedup();
            assert_eq!(codes.len(), ErrorKind::ALL.len());
        }
    }

    mod category_tests {
        use super::*;

        #[test]
        fn test_transient_kinds() {
            assert_eq!(ErrorKind::NoSuchElement.category(), ErrorCategory::Transient);
            assert_eq!(
                ErrorKind::StaleElementReference.category(),
                ErrorCategory::Transient
            );
            assert!(ErrorKind::ElementNotVisible.is_retryable());
        }

        #[test]
        fn test_protocol_kinds_are_not_retryable() {
            assert!(!ErrorKind::InvalidSelector.is_retryable());
            assert!(!ErrorKind::JavaScriptError.is_retryable());
            assert!(!ErrorKind::UnknownCommand.is_retryable());
            assert!(!ErrorKind::InvalidCookieDomain.is_retryable());
        }

        #[test]
        fn test_timeouts_are_retryable() {
            assert_eq!(ErrorKind::Timeout.category(), ErrorCategory::Timeout);
            assert!(ErrorKind::ScriptTimeout.is_retryable());
        }
    }

    #[test]
    fn test_display_uses_summary() {
        assert_eq!(ErrorKind::NoSuchElement.to_string(), "NoSuchElement");
        assert_eq!(ErrorKind::NoAlertOpen.to_string(), "NoAlertOpenError");
    }

    #[test]
    fn test_every_kind_has_detail() {
        for kind in ErrorKind::ALL {
            assert!(!kind.detail().is_empty());
        }
    }
}
