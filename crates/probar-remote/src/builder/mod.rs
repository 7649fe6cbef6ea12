//! Fluent wait-expression builders.
//!
//! Both back-ends share one vocabulary, modeled as [`WaitDirective`]. The
//! chainable verbs on [`WaitExpression`] are thin wrappers that hand a
//! directive to the back-end's `apply`.
//!
//! ```ignore
//! let ready = NativeWaitExpression::new()
//!     .element_present("#druid")
//!     .ajax_complete();
//! ```
//!
//! Clauses are ANDed. [`WaitExpression::or_`] ORs everything built so far
//! with the next clause.

mod native;
mod script;

pub use native::{BuildState, NativeWaitExpression};
pub use script::ScriptWaitExpression;

use serde_json::Value;

use crate::clause::Comparison;
use crate::locator::Finder;
use crate::result::{RemoteError, RemoteResult};

// =============================================================================
// DIRECTIVES
// =============================================================================

/// One step of a wait expression
#[derive(Debug, Clone)]
pub enum WaitDirective {
    /// Element can be found
    ElementPresent(Finder),
    /// Element cannot be found
    ElementNotPresent(Finder),
    /// Element is found and displayed
    ElementVisible(Finder),
    /// Element is hidden or missing
    ElementNotVisible(Finder),
    /// Single check of an element attribute against a reference value
    EvaluateElement {
        /// Element to resolve
        finder: Finder,
        /// Attribute to read
        attribute: String,
        /// Expected value
        reference: String,
        /// Custom comparison; `None` means equality
        compare: Option<Comparison>,
    },
    /// AJAX requests in flight
    AjaxPending,
    /// No AJAX requests in flight
    AjaxComplete,
    /// Navigation has not replaced the document yet
    PageLoading,
    /// A fresh document is loaded
    PageReady,
    /// OR with the next clause
    Or,
}

impl WaitDirective {
    /// Directive name in the `(name, args...)` form
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ElementPresent(_) => "element_present",
            Self::ElementNotPresent(_) => "element_not_present",
            Self::ElementVisible(_) => "element_visible",
            Self::ElementNotVisible(_) => "element_not_visible",
            Self::EvaluateElement { .. } => "evaluate_element",
            Self::AjaxPending => "ajax_pending",
            Self::AjaxComplete => "ajax_complete",
            Self::PageLoading => "page_loading",
            Self::PageReady => "page_ready",
            Self::Or => "or_",
        }
    }

    /// Build a directive from its name and dynamic arguments.
    ///
    /// # Errors
    ///
    /// [`RemoteError::UnknownDirective`] for names outside the vocabulary,
    /// [`RemoteError::InvalidCondition`] for a wrong argument list and
    /// [`RemoteError::UnknownPageElement`] for a finder that is neither a
    /// string nor an element.
    pub fn parse(name: &str, args: &[Value]) -> RemoteResult<Self> {
        let arity = |expected: usize| -> RemoteResult<()> {
            if args.len() == expected {
                Ok(())
            } else {
                Err(RemoteError::InvalidCondition {
                    condition: format!(
                        "{name} takes {expected} argument(s), got {}",
                        args.len()
                    ),
                })
            }
        };
        let finder = || Finder::try_from(&args[0]);

        match name {
            "element_present" => {
                arity(1)?;
                Ok(Self::ElementPresent(finder()?))
            }
            "element_not_present" => {
                arity(1)?;
                Ok(Self::ElementNotPresent(finder()?))
            }
            "element_visible" => {
                arity(1)?;
                Ok(Self::ElementVisible(finder()?))
            }
            "element_not_visible" => {
                arity(1)?;
                Ok(Self::ElementNotVisible(finder()?))
            }
            "evaluate_element" => {
                arity(3)?;
                Ok(Self::EvaluateElement {
                    finder: finder()?,
                    attribute: scalar_text(&args[1]),
                    reference: scalar_text(&args[2]),
                    compare: None,
                })
            }
            "ajax_pending" => arity(0).map(|()| Self::AjaxPending),
            "ajax_complete" => arity(0).map(|()| Self::AjaxComplete),
            "page_loading" => arity(0).map(|()| Self::PageLoading),
            "page_ready" => arity(0).map(|()| Self::PageReady),
            "or_" | "or" => arity(0).map(|()| Self::Or),
            other => Err(RemoteError::UnknownDirective {
                name: other.to_string(),
            }),
        }
    }

    /// Parse a JSON/YAML list form: `["element_present", "#druid"]`
    ///
    /// # Errors
    ///
    /// As [`WaitDirective::parse`], plus [`RemoteError::InvalidCondition`]
    /// when `spec` is not a non-empty list headed by a string.
    pub fn from_value(spec: &Value) -> RemoteResult<Self> {
        match spec.as_array().map(Vec::as_slice) {
            Some([Value::String(name), args @ ..]) => Self::parse(name, args),
            _ => Err(RemoteError::InvalidCondition {
                condition: spec.to_string(),
            }),
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Escape text for a single-quoted JavaScript string literal
#[must_use]
pub fn js_quote(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\'', "\\'")
}

// =============================================================================
// BUILDER TRAIT
// =============================================================================

/// Chainable wait-expression vocabulary.
///
/// Builder errors are deferred: the first one is kept and reported when the
/// expression is compiled or evaluated, so chains never need `?`.
pub trait WaitExpression: Sized {
    /// Apply one directive
    #[must_use]
    fn apply(self, directive: WaitDirective) -> Self;

    /// Record a deferred builder error; only the first is kept
    #[must_use]
    fn fail(self, error: RemoteError) -> Self;

    /// The deferred builder error, if any
    fn error(&self) -> Option<&RemoteError>;

    /// Apply a directive that may have failed to parse
    #[must_use]
    fn apply_parsed(self, directive: RemoteResult<WaitDirective>) -> Self {
        match directive {
            Ok(directive) => self.apply(directive),
            Err(err) => self.fail(err),
        }
    }

    /// Apply directives in order
    #[must_use]
    fn from_directives<I>(self, directives: I) -> Self
    where
        I: IntoIterator<Item = WaitDirective>,
    {
        directives.into_iter().fold(self, Self::apply)
    }

    /// Apply `(name, args...)` specs in order, deferring parse failures
    #[must_use]
    fn from_specs(self, specs: &[Value]) -> Self {
        specs.iter().fold(self, |expr, spec| {
            expr.apply_parsed(WaitDirective::from_value(spec))
        })
    }

    /// True if `finder` is present on the page
    #[must_use]
    fn element_present(self, finder: impl Into<Finder>) -> Self {
        self.apply(WaitDirective::ElementPresent(finder.into()))
    }

    /// True if `finder` is not present on the page
    #[must_use]
    fn element_not_present(self, finder: impl Into<Finder>) -> Self {
        self.apply(WaitDirective::ElementNotPresent(finder.into()))
    }

    /// True if `finder` is visible
    #[must_use]
    fn element_visible(self, finder: impl Into<Finder>) -> Self {
        self.apply(WaitDirective::ElementVisible(finder.into()))
    }

    /// True if `finder` is hidden or missing
    #[must_use]
    fn element_not_visible(self, finder: impl Into<Finder>) -> Self {
        self.apply(WaitDirective::ElementNotVisible(finder.into()))
    }

    /// True if `finder`'s `attribute` equals `reference`
    #[must_use]
    fn evaluate_element(
        self,
        finder: impl Into<Finder>,
        attribute: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        self.apply(WaitDirective::EvaluateElement {
            finder: finder.into(),
            attribute: attribute.into(),
            reference: reference.into(),
            compare: None,
        })
    }

    /// True if `compare(finder.attribute, reference)` holds
    #[must_use]
    fn evaluate_element_with(
        self,
        finder: impl Into<Finder>,
        attribute: impl Into<String>,
        reference: impl Into<String>,
        compare: Comparison,
    ) -> Self {
        self.apply(WaitDirective::EvaluateElement {
            finder: finder.into(),
            attribute: attribute.into(),
            reference: reference.into(),
            compare: Some(compare),
        })
    }

    /// True if AJAX requests are pending
    #[must_use]
    fn ajax_pending(self) -> Self {
        self.apply(WaitDirective::AjaxPending)
    }

    /// True if no AJAX requests are pending
    #[must_use]
    fn ajax_complete(self) -> Self {
        self.apply(WaitDirective::AjaxComplete)
    }

    /// True until the marked page is replaced
    #[must_use]
    fn page_loading(self) -> Self {
        self.apply(WaitDirective::PageLoading)
    }

    /// True once a fresh page is loaded
    #[must_use]
    fn page_ready(self) -> Self {
        self.apply(WaitDirective::PageReady)
    }

    /// Combine the next clause with OR instead of AND
    #[must_use]
    fn or_(self) -> Self {
        self.apply(WaitDirective::Or)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    mod directive_tests {
        use super::*;

        #[test]
        fn test_parse_element_directives() {
            let d = WaitDirective::parse("element_present", &[json!("#druid")]).unwrap();
            assert!(matches!(d, WaitDirective::ElementPresent(Finder::Selector(ref s)) if s == "#druid"));

            let d = WaitDirective::parse("element_not_visible", &[json!({"_locator": "id=x"})])
                .unwrap();
            assert_eq!(d.name(), "element_not_visible");
        }

        #[test]
        fn test_parse_evaluate_element() {
            let d = WaitDirective::parse(
                "evaluate_element",
                &[json!("#count"), json!("value"), json!(3)],
            )
            .unwrap();
            match d {
                WaitDirective::EvaluateElement {
                    attribute,
                    reference,
                    compare,
                    ..
                } => {
                    assert_eq!(attribute, "value");
                    assert_eq!(reference, "3");
                    assert!(compare.is_none());
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        #[test]
        fn test_parse_nullary() {
            assert!(matches!(
                WaitDirective::parse("ajax_complete", &[]).unwrap(),
                WaitDirective::AjaxComplete
            ));
            assert!(matches!(
                WaitDirective::parse("or_", &[]).unwrap(),
                WaitDirective::Or
            ));
        }

        #[test]
        fn test_unknown_name() {
            let err = WaitDirective::parse("element_shiny", &[]).unwrap_err();
            assert_eq!(err.to_string(), "Unknown wait directive: element_shiny");
        }

        #[test]
        fn test_wrong_arity() {
            let err = WaitDirective::parse("element_present", &[]).unwrap_err();
            assert!(matches!(err, RemoteError::InvalidCondition { .. }));
            assert!(WaitDirective::parse("ajax_pending", &[json!(1)]).is_err());
        }

        #[test]
        fn test_bad_finder() {
            let err = WaitDirective::parse("element_present", &[json!(42)]).unwrap_err();
            assert_eq!(err.to_string(), "Unknown page element 42");
        }

        #[test]
        fn test_from_value() {
            let d = WaitDirective::from_value(&json!(["element_visible", "#x"])).unwrap();
            assert_eq!(d.name(), "element_visible");
            assert!(WaitDirective::from_value(&json!("ajax_complete")).is_err());
            assert!(WaitDirective::from_value(&json!([])).is_err());
        }
    }

    mod js_quote_tests {
        use super::*;

        #[test]
        fn test_escapes_quote_and_backslash() {
            assert_eq!(js_quote("it's"), "it\\'s");
            assert_eq!(js_quote("a\\b"), "a\\\\b");
            assert_eq!(js_quote("plain"), "plain");
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn quoted_text_never_closes_the_literal(text in ".*") {
                let quoted = js_quote(&text);
                let mut escaped = false;
                for c in quoted.chars() {
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else {
                        prop_assert_ne!(c, '\'');
                    }
                }
                prop_assert!(!escaped);
            }
        }
    }
}
