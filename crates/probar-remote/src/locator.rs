//! Locator abstraction for element lookup on remote browsers.
//!
//! A locator is a `strategy=value` string (`css=`, `xpath=`, `id=`, ...).
//! Builder verbs accept a [`Finder`]: either a raw selector string or an
//! element that already knows its own locator.
//!
//! # Normalization
//!
//! - `"#foo"` becomes `css=#foo`
//! - `"xpath=//div"` passes through unchanged
//! - an element implementing [`PageElement`] supplies its locator verbatim

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::result::{RemoteError, RemoteResult};

fn prefix_re() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    PREFIX.get_or_init(|| Regex::new(r"^(\w+?)=(.+)$").expect("valid locator prefix pattern"))
}

// =============================================================================
// STRATEGY
// =============================================================================

/// Lookup strategy of a locator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// CSS selector
    Css,
    /// XPath expression
    XPath,
    /// Element id attribute
    Id,
    /// Element name attribute
    Name,
    /// Link text
    Link,
    /// Option value (select boxes)
    Value,
    /// Option label (select boxes)
    Label,
}

impl Strategy {
    /// Prefix used in locator strings
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::XPath => "xpath",
            Self::Id => "id",
            Self::Name => "name",
            Self::Link => "link",
            Self::Value => "value",
            Self::Label => "label",
        }
    }

    /// The JSONWire `using` value, if the strategy can be sent over the wire
    #[must_use]
    pub const fn wire_using(&self) -> Option<&'static str> {
        match self {
            Self::Css => Some("css selector"),
            Self::XPath => Some("xpath"),
            Self::Id => Some("id"),
            Self::Name => Some("name"),
            Self::Link => Some("link text"),
            Self::Value | Self::Label => None,
        }
    }
}

impl FromStr for Strategy {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "css" => Ok(Self::Css),
            "xpath" => Ok(Self::XPath),
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "link" => Ok(Self::Link),
            "value" => Ok(Self::Value),
            "label" => Ok(Self::Label),
            other => Err(RemoteError::InvalidLocator {
                locator: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

// =============================================================================
// LOCATOR
// =============================================================================

/// A strategy-tagged element lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    /// Lookup strategy
    pub strategy: Strategy,
    /// Strategy-specific value
    pub value: String,
}

impl Locator {
    /// Create a locator
    #[must_use]
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    /// Create a CSS locator
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Strategy::Css, selector)
    }

    /// Create an XPath locator
    #[must_use]
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, expression)
    }

    /// Create an id locator
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::new(Strategy::Id, id)
    }

    /// Parse `strategy=value`; text without a recognized prefix is CSS
    #[must_use]
    pub fn parse(text: &str) -> Self {
        if let Some(caps) = prefix_re().captures(text) {
            if let Ok(strategy) = caps[1].parse::<Strategy>() {
                return Self::new(strategy, &caps[2]);
            }
        }
        Self::css(text)
    }

    /// Whether `text` already carries a recognized strategy prefix
    #[must_use]
    pub fn has_strategy(text: &str) -> bool {
        prefix_re()
            .captures(text)
            .is_some_and(|caps| caps[1].parse::<Strategy>().is_ok())
    }

    /// The `(using, value)` pair for a JSONWire element lookup
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidLocator`] for RC-only strategies.
    pub fn to_wire(&self) -> RemoteResult<(&'static str, &str)> {
        self.strategy
            .wire_using()
            .map(|using| (using, self.value.as_str()))
            .ok_or_else(|| RemoteError::InvalidLocator {
                locator: self.to_string(),
            })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy, self.value)
    }
}

impl FromStr for Locator {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

// =============================================================================
// PAGE ELEMENT / FINDER
// =============================================================================

/// Anything that knows its own locator (document element wrappers, page objects)
pub trait PageElement {
    /// The fastest locator for this element
    fn locator(&self) -> Locator;
}

impl PageElement for Locator {
    fn locator(&self) -> Locator {
        self.clone()
    }
}

/// What a wait-expression verb accepts as its target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Finder {
    /// A raw selector string
    Selector(String),
    /// An element that supplied its own locator
    Element(Locator),
}

impl Finder {
    /// Finder for an element-like value
    #[must_use]
    pub fn element(element: &impl PageElement) -> Self {
        Self::Element(element.locator())
    }

    /// Locator for native WebDriver dispatch: recognized prefixes pass through
    #[must_use]
    pub fn locator(&self) -> Locator {
        match self {
            Self::Selector(text) => Locator::parse(text),
            Self::Element(locator) => locator.clone(),
        }
    }

    /// Locator text for the RC script compiler: raw strings are always CSS
    #[must_use]
    pub fn rc_locator(&self) -> String {
        match self {
            Self::Selector(text) => format!("css={text}"),
            Self::Element(locator) => locator.to_string(),
        }
    }
}

impl fmt::Display for Finder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selector(text) => f.write_str(text),
            Self::Element(locator) => write!(f, "{locator}"),
        }
    }
}

impl From<&str> for Finder {
    fn from(value: &str) -> Self {
        Self::Selector(value.to_string())
    }
}

impl From<String> for Finder {
    fn from(value: String) -> Self {
        Self::Selector(value)
    }
}

impl From<&String> for Finder {
    fn from(value: &String) -> Self {
        Self::Selector(value.clone())
    }
}

impl From<Locator> for Finder {
    fn from(value: Locator) -> Self {
        Self::Element(value)
    }
}

impl From<&Locator> for Finder {
    fn from(value: &Locator) -> Self {
        Self::Element(value.clone())
    }
}

/// Dynamic values (e.g. loaded from a scenario file)
///
/// Strings are selectors; objects carrying `_locator` (either `"id=x"` or
/// `["id", "x"]`) are elements. Anything else is an unknown page element.
impl TryFrom<&serde_json::Value> for Finder {
    type Error = RemoteError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        let unknown = || RemoteError::UnknownPageElement {
            value: value.to_string(),
        };
        match value {
            Value::String(text) => Ok(Self::Selector(text.clone())),
            Value::Object(map) => match map.get("_locator") {
                Some(Value::String(text)) => Ok(Self::Element(Locator::parse(text))),
                Some(Value::Array(pair)) => match pair.as_slice() {
                    [Value::String(strategy), Value::String(found)] => {
                        let strategy = strategy.parse::<Strategy>().map_err(|_| unknown())?;
                        Ok(Self::Element(Locator::new(strategy, found.clone())))
                    }
                    _ => Err(unknown()),
                },
                _ => Err(unknown()),
            },
            _ => Err(unknown()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    mod locator_tests {
        use super::*;

        #[test]
        fn test_bare_selector_defaults_to_css() {
            assert_eq!(Locator::parse("#foo").to_string(), "css=#foo");
        }

        #[test]
        fn test_prefixed_passes_through() {
            for text in ["css=#foo", "xpath=//div[@id='a']", "id=druid", "label=One"] {
                assert_eq!(Locator::parse(text).to_string(), text);
            }
        }

        #[test]
        fn test_attribute_selector_is_not_a_prefix() {
            let loc = Locator::parse("input[name=x]");
            assert_eq!(loc.strategy, Strategy::Css);
            assert_eq!(loc.value, "input[name=x]");
        }

        #[test]
        fn test_unknown_prefix_is_css() {
            let loc = Locator::parse("foo=bar");
            assert_eq!(loc, Locator::css("foo=bar"));
            assert!(!Locator::has_strategy("foo=bar"));
            assert!(Locator::has_strategy("xpath=//a"));
        }

        #[test]
        fn test_value_keeps_later_equals() {
            let loc = Locator::parse("css=a[href=x]");
            assert_eq!(loc.value, "a[href=x]");
        }

        #[test]
        fn test_to_wire() {
            assert_eq!(Locator::css("#a").to_wire().unwrap(), ("css selector", "#a"));
            assert_eq!(Locator::xpath("//a").to_wire().unwrap(), ("xpath", "//a"));
            assert!(matches!(
                Locator::new(Strategy::Label, "x").to_wire(),
                Err(RemoteError::InvalidLocator { .. })
            ));
        }
    }

    mod finder_tests {
        use super::*;

        struct Widget;

        impl PageElement for Widget {
            fn locator(&self) -> Locator {
                Locator::xpath("/html/body/div[2]")
            }
        }

        #[test]
        fn test_native_and_rc_forms() {
            let finder = Finder::from("#foo");
            assert_eq!(finder.locator().to_string(), "css=#foo");
            assert_eq!(finder.rc_locator(), "css=#foo");

            let prefixed = Finder::from("id=foo");
            assert_eq!(prefixed.locator().to_string(), "id=foo");
        }

        #[test]
        fn test_element_supplies_locator_verbatim() {
            let finder = Finder::element(&Widget);
            assert_eq!(finder.locator().to_string(), "xpath=/html/body/div[2]");
            assert_eq!(finder.rc_locator(), "xpath=/html/body/div[2]");
        }

        #[test]
        fn test_from_json_string() {
            let finder = Finder::try_from(&json!("#druid")).unwrap();
            assert_eq!(finder, Finder::Selector("#druid".into()));
        }

        #[test]
        fn test_from_json_element() {
            let finder = Finder::try_from(&json!({"_locator": "id=druid"})).unwrap();
            assert_eq!(finder, Finder::Element(Locator::id("druid")));

            let finder = Finder::try_from(&json!({"_locator": ["xpath", "//p"]})).unwrap();
            assert_eq!(finder, Finder::Element(Locator::xpath("//p")));
        }

        #[test]
        fn test_from_json_unknown() {
            for value in [json!(42), json!(null), json!({"id": "x"}), json!(["a"])] {
                let err = Finder::try_from(&value).unwrap_err();
                match err {
                    RemoteError::UnknownPageElement { value: v } => assert_eq!(v, value.to_string()),
                    other => panic!("unexpected {other:?}"),
                }
            }
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;
        use super::Strategy;

        proptest! {
            #[test]
            fn prop_unprefixed_selectors_become_css(sel in "[#.a-z][a-z0-9_ >.#-]{0,20}") {
                let loc = Locator::parse(&sel);
                prop_assert_eq!(loc.strategy, Strategy::Css);
                prop_assert_eq!(loc.value, sel);
            }

            #[test]
            fn prop_display_parse_is_stable(value in "[a-z0-9/@\\[\\]=#.-]{1,20}") {
                let loc = Locator::xpath(value);
                prop_assert_eq!(Locator::parse(&loc.to_string()), loc);
            }
        }
    }
}
