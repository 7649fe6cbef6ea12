//! Wait expressions compiled to one JavaScript condition for Selenium RC.
//!
//! Every verb appends a self-invoking function fragment evaluated inside the
//! RC browserbot. `compile()` joins fragments with `&&`, or `||` where an OR
//! marker sits between them, so the whole expression runs server-side as a
//! single `waitForCondition`.
//!
//! The joined text is plain JavaScript, so `&&` binds tighter than `||`:
//! `a.or_().b.c` compiles to `a || b && c`, which the browser reads as
//! `a || (b && c)`. The native builder groups the same chain as
//! `(a || b) && c`. Build expressions whose meaning does not depend on the
//! difference when they must run on both back-ends.

use tracing::debug;

use super::{js_quote, WaitDirective, WaitExpression};
use crate::clause::{page_loading_expr, page_ready_expr, AjaxFlavor};
use crate::locator::Finder;
use crate::logging::Diagnostics;
use crate::result::{RemoteError, RemoteResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Fragment { js: String, label: String },
    Or,
}

/// Text-compiling wait expression for the Selenium RC back-end
#[derive(Debug, Clone, Default)]
pub struct ScriptWaitExpression {
    parts: Vec<Part>,
    flavor: AjaxFlavor,
    diagnostics: Diagnostics,
    error: Option<RemoteError>,
}

impl ScriptWaitExpression {
    /// Empty expression using jQuery for ajax checks
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another ajax library's counters
    #[must_use]
    pub const fn with_flavor(mut self, flavor: AjaxFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Emit `LOG.info` calls when `diagnostics.script_console` is set
    #[must_use]
    pub const fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Ajax flavor in use
    #[must_use]
    pub const fn flavor(&self) -> AjaxFlavor {
        self.flavor
    }

    /// Whether no clause was added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.parts.iter().any(|p| matches!(p, Part::Fragment { .. }))
    }

    /// Render the JavaScript condition.
    ///
    /// A trailing OR marker has no right operand and is dropped.
    ///
    /// # Errors
    ///
    /// The first deferred builder error.
    pub fn compile(&self) -> RemoteResult<String> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        let script = self.join(|js, _| js).replace('\n', " ");
        debug!(fragments = self.parts.len(), "compiled wait condition");
        Ok(script)
    }

    /// Readable form of the condition, e.g. `element_present(css=#a) || ajax_complete()`
    #[must_use]
    pub fn describe(&self) -> String {
        self.join(|_, label| label)
    }

    fn join<'a>(&'a self, pick: impl Fn(&'a str, &'a str) -> &'a str) -> String {
        let mut out = String::new();
        let mut pending_or = false;
        for part in &self.parts {
            match part {
                Part::Or => pending_or = true,
                Part::Fragment { js, label } => {
                    if !out.is_empty() {
                        out.push_str(if pending_or { " || " } else { " && " });
                    }
                    pending_or = false;
                    out.push_str(pick(js, label));
                }
            }
        }
        out
    }

    fn push(mut self, js: String, label: String) -> Self {
        self.parts.push(Part::Fragment { js, label });
        self
    }

    fn log(&self, label: &str, args: &[&str], var: &str) -> String {
        if !self.diagnostics.script_console {
            return String::new();
        }
        let inner = args
            .iter()
            .map(|a| js_quote(a))
            .collect::<Vec<_>>()
            .join(", ");
        format!("LOG.info('wait_for {}({inner})=' + {var}); ", js_quote(label))
    }

    fn presence(&self, label: &str, finder: &Finder, wanted: bool) -> String {
        let locator = finder.rc_locator();
        format!(
            "(function() {{ var found = true; \
             try {{ selenium.browserbot.findElement('{}'); }} catch (e) {{ found = false; }} \
             {}return found == {wanted}; }})()",
            js_quote(&locator),
            self.log(label, &[&locator], "found"),
        )
    }

    fn visibility(&self, label: &str, finder: &Finder, wanted: bool) -> String {
        let locator = finder.rc_locator();
        format!(
            "(function() {{ var visible; \
             try {{ visible = selenium.isVisible('{}'); }} catch (e) {{ visible = false; }} \
             {}return visible == {wanted}; }})()",
            js_quote(&locator),
            self.log(label, &[&locator], "visible"),
        )
    }

    fn evaluation(&self, finder: &Finder, attribute: &str, reference: &str) -> String {
        let locator = finder.rc_locator();
        let test = format!("element.{attribute} == '{}'", js_quote(reference));
        format!(
            "(function() {{ var element; \
             try {{ element = selenium.browserbot.findElement('{}'); }} catch (e) {{ element = null; }} \
             var result = false; if (element !== null) result = {test}; \
             {}return result; }})()",
            js_quote(&locator),
            self.log("evaluate_element", &[&locator, &test], "result"),
        )
    }

    fn value(&self, label: &str, var: &str, expression: &str) -> String {
        format!(
            "(function() {{ var {var} = {expression}; {}return {var}; }})()",
            self.log(label, &[], var)
        )
    }
}

impl WaitExpression for ScriptWaitExpression {
    fn apply(mut self, directive: WaitDirective) -> Self {
        match directive {
            WaitDirective::ElementPresent(finder) => {
                let js = self.presence("element_present", &finder, true);
                self.push(js, format!("element_present({})", finder.rc_locator()))
            }
            WaitDirective::ElementNotPresent(finder) => {
                let js = self.presence("element_not_present", &finder, false);
                self.push(js, format!("element_not_present({})", finder.rc_locator()))
            }
            WaitDirective::ElementVisible(finder) => {
                let js = self.visibility("element_visible", &finder, true);
                self.push(js, format!("element_visible({})", finder.rc_locator()))
            }
            WaitDirective::ElementNotVisible(finder) => {
                let js = self.visibility("element_not_visible", &finder, false);
                self.push(js, format!("element_not_visible({})", finder.rc_locator()))
            }
            WaitDirective::EvaluateElement {
                compare: Some(_), ..
            } => self.fail(RemoteError::UnsupportedPredicate { backend: "selenium" }),
            WaitDirective::EvaluateElement {
                finder,
                attribute,
                reference,
                compare: None,
            } => {
                let js = self.evaluation(&finder, &attribute, &reference);
                let label = format!(
                    "evaluate_element({}, {attribute}, {reference})",
                    finder.rc_locator()
                );
                self.push(js, label)
            }
            WaitDirective::AjaxPending => {
                let js = self.value("ajax_pending", "pending", &self.flavor.pending_expr());
                self.push(js, "ajax_pending()".to_string())
            }
            WaitDirective::AjaxComplete => {
                let js = self.value("ajax_complete", "complete", &self.flavor.complete_expr());
                self.push(js, "ajax_complete()".to_string())
            }
            WaitDirective::PageLoading => {
                let js = self.value("page_loading", "value", &page_loading_expr());
                self.push(js, "page_loading()".to_string())
            }
            WaitDirective::PageReady => {
                let js = self.value("page_ready", "value", &page_ready_expr());
                self.push(js, "page_ready()".to_string())
            }
            WaitDirective::Or => {
                if matches!(self.parts.last(), Some(Part::Fragment { .. })) {
                    self.parts.push(Part::Or);
                }
                self
            }
        }
    }

    fn fail(mut self, error: RemoteError) -> Self {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self
    }

    fn error(&self) -> Option<&RemoteError> {
        self.error.as_ref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::clause::Comparison;
    use crate::locator::Locator;

    mod compile_tests {
        use super::*;

        #[test]
        fn test_empty_compiles_to_empty_string() {
            assert_eq!(ScriptWaitExpression::new().compile().unwrap(), "");
            assert!(ScriptWaitExpression::new().is_empty());
        }

        #[test]
        fn test_and_join() {
            let js = ScriptWaitExpression::new()
                .element_present("#druid")
                .ajax_complete()
                .compile()
                .unwrap();
            assert!(js.contains("selenium.browserbot.findElement('css=#druid')"));
            assert!(js.contains("!window.jQuery || window.jQuery.active == 0"));
            assert_eq!(js.matches(" && ").count(), 1);
            assert!(!js.contains('\n'));
        }

        #[test]
        fn test_or_marker() {
            let js = ScriptWaitExpression::new()
                .element_present("#a")
                .or_()
                .element_present("#b")
                .element_not_present("#c")
                .compile()
                .unwrap();
            let a = js.find("css=#a").unwrap();
            let or = js.find(" || ").unwrap();
            let b = js.find("css=#b").unwrap();
            let and = js.find(" && ").unwrap();
            assert!(a < or && or < b && b < and);
            assert!(js.ends_with("return found == false; })()"));
        }

        #[test]
        fn test_describe_names_each_clause() {
            let expr = ScriptWaitExpression::new()
                .element_present("#a")
                .or_()
                .ajax_complete()
                .evaluate_element("[name=q]", "value", "x");
            assert_eq!(
                expr.describe(),
                "element_present(css=#a) || ajax_complete() && evaluate_element(css=[name=q], value, x)"
            );
            assert_eq!(ScriptWaitExpression::new().describe(), "");
        }

        #[test]
        fn test_or_edge_cases_collapse() {
            let plain = ScriptWaitExpression::new()
                .element_present("#a")
                .compile()
                .unwrap();
            let leading = ScriptWaitExpression::new()
                .or_()
                .element_present("#a")
                .or_()
                .compile()
                .unwrap();
            assert_eq!(plain, leading);

            let doubled = ScriptWaitExpression::new()
                .element_present("#a")
                .or_()
                .or_()
                .element_present("#b")
                .compile()
                .unwrap();
            assert_eq!(doubled.matches(" || ").count(), 1);
        }

        #[test]
        fn test_reusable() {
            let expr = ScriptWaitExpression::new().page_ready();
            assert_eq!(expr.compile().unwrap(), expr.compile().unwrap());
        }
    }

    mod fragment_tests {
        use super::*;

        #[test]
        fn test_raw_strings_are_always_css() {
            let js = ScriptWaitExpression::new()
                .element_visible("id=foo")
                .compile()
                .unwrap();
            assert!(js.contains("selenium.isVisible('css=id=foo')"));
        }

        #[test]
        fn test_element_locator_passes_through() {
            let js = ScriptWaitExpression::new()
                .element_not_visible(Locator::xpath("//div[@id='x']"))
                .compile()
                .unwrap();
            assert!(js.contains("selenium.isVisible('xpath=//div[@id=\\'x\\']')"));
            assert!(js.contains("return visible == false;"));
        }

        #[test]
        fn test_evaluate_element() {
            let js = ScriptWaitExpression::new()
                .evaluate_element("[name=x]", "value", "it's")
                .compile()
                .unwrap();
            assert!(js.contains("result = element.value == 'it\\'s';"));
        }

        #[test]
        fn test_flavors() {
            let js = ScriptWaitExpression::new()
                .with_flavor(AjaxFlavor::Dojo)
                .ajax_pending()
                .compile()
                .unwrap();
            assert!(js.contains(
                "var pending = !!window.dojo && window.dojo.io.XMLHTTPTransport.inFlight.length != 0;"
            ));

            let js = ScriptWaitExpression::new()
                .with_flavor(AjaxFlavor::Prototype)
                .ajax_complete()
                .compile()
                .unwrap();
            assert!(js.contains("window.Ajax.activeRequestCount == 0"));
        }

        #[test]
        fn test_page_sentinel() {
            let js = ScriptWaitExpression::new()
                .page_loading()
                .compile()
                .unwrap();
            assert!(js.contains("window.__probar_remote_page__ === true"));
        }
    }

    mod diagnostics_tests {
        use super::*;

        #[test]
        fn test_console_logging_off_by_default() {
            let js = ScriptWaitExpression::new()
                .element_present("#x")
                .compile()
                .unwrap();
            assert!(!js.contains("LOG.info"));
        }

        #[test]
        fn test_console_logging_when_enabled() {
            let js = ScriptWaitExpression::new()
                .with_diagnostics(Diagnostics::new().with_script_console(true))
                .element_present("#x")
                .ajax_complete()
                .compile()
                .unwrap();
            assert!(js.contains("LOG.info('wait_for element_present(css=#x)=' + found);"));
            assert!(js.contains("LOG.info('wait_for ajax_complete()=' + complete);"));
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn test_custom_predicate_rejected() {
            let expr = ScriptWaitExpression::new().evaluate_element_with(
                "#x",
                "value",
                "1",
                Comparison::new("gt", |v, r| v > r),
            );
            assert!(expr.error().is_some());
            let err = expr.compile().unwrap_err();
            assert!(matches!(
                err,
                RemoteError::UnsupportedPredicate { backend: "selenium" }
            ));
        }

        #[test]
        fn test_first_error_is_kept() {
            let expr = ScriptWaitExpression::new()
                .fail(RemoteError::UnknownPageElement { value: "1".into() })
                .fail(RemoteError::UnknownPageElement { value: "2".into() });
            assert_eq!(
                expr.compile().unwrap_err().to_string(),
                "Unknown page element 1"
            );
        }

        #[test]
        fn test_from_specs_defers_parse_errors() {
            let expr = ScriptWaitExpression::new().from_specs(&[
                serde_json::json!(["element_present", "#ok"]),
                serde_json::json!(["element_present", 7]),
            ]);
            assert_eq!(
                expr.compile().unwrap_err().to_string(),
                "Unknown page element 7"
            );
        }
    }
}
