//! Sentinel condition strings accepted by `wait_for`.
//!
//! | Text               | Meaning                                   |
//! |--------------------|-------------------------------------------|
//! | `""`, `none`       | nothing to wait for                       |
//! | `page`             | a fresh document finished loading         |
//! | `ajax`             | no AJAX requests in flight                |
//! | `js:<expr>`        | `<expr>` is truthy                        |
//! | `element:<loc>`    | element present                           |
//! | `!element:<loc>`   | element absent                            |
//! | `visible:<loc>`    | element displayed                         |
//! | `!visible:<loc>`   | element hidden or absent                  |
//! | `duration[:<ms>]`  | sleep, then succeed                       |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::clause::{AjaxFlavor, Clause};
use crate::locator::Locator;
use crate::result::RemoteError;

/// A parsed `wait_for` condition
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WaitCondition {
    /// Succeed immediately without contacting the browser
    #[default]
    None,
    /// Page load finished
    Page,
    /// AJAX idle
    Ajax,
    /// Script value is truthy
    Script(String),
    /// Element present
    Element(Locator),
    /// Element absent
    NotElement(Locator),
    /// Element displayed
    Visible(Locator),
    /// Element hidden or absent
    NotVisible(Locator),
    /// Fixed sleep; without a value the wait's timeout is used
    Duration(Option<u64>),
}

impl WaitCondition {
    /// Whether this condition skips the browser entirely
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Clause evaluated per tick by the native back-end
    ///
    /// `None` and `Duration` have no clause.
    #[must_use]
    pub fn clause(&self, flavor: AjaxFlavor) -> Option<Clause> {
        match self {
            Self::None | Self::Duration(_) => None,
            Self::Page => Some(Clause::PageReady),
            Self::Ajax => Some(Clause::AjaxComplete(flavor)),
            Self::Script(js) => Some(Clause::Script(js.clone())),
            Self::Element(loc) => Some(Clause::ElementPresent(loc.clone())),
            Self::NotElement(loc) => Some(Clause::ElementNotPresent(loc.clone())),
            Self::Visible(loc) => Some(Clause::ElementVisible(loc.clone())),
            Self::NotVisible(loc) => Some(Clause::ElementNotVisible(loc.clone())),
        }
    }
}

impl FromStr for WaitCondition {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RemoteError::InvalidCondition {
            condition: s.to_string(),
        };
        let target = |rest: &str| {
            if rest.is_empty() {
                Err(invalid())
            } else {
                Ok(Locator::parse(rest))
            }
        };

        match s {
            "" | "none" => return Ok(Self::None),
            "page" => return Ok(Self::Page),
            "ajax" => return Ok(Self::Ajax),
            "duration" => return Ok(Self::Duration(None)),
            _ => {}
        }

        if let Some(rest) = s.strip_prefix("js:") {
            Ok(Self::Script(rest.to_string()))
        } else if let Some(rest) = s.strip_prefix("!element:") {
            target(rest).map(Self::NotElement)
        } else if let Some(rest) = s.strip_prefix("element:") {
            target(rest).map(Self::Element)
        } else if let Some(rest) = s.strip_prefix("!visible:") {
            target(rest).map(Self::NotVisible)
        } else if let Some(rest) = s.strip_prefix("visible:") {
            target(rest).map(Self::Visible)
        } else if let Some(rest) = s.strip_prefix("duration:") {
            rest.trim()
                .parse::<u64>()
                .map(|ms| Self::Duration(Some(ms)))
                .map_err(|_| invalid())
        } else {
            Err(invalid())
        }
    }
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Page => f.write_str("page"),
            Self::Ajax => f.write_str("ajax"),
            Self::Script(js) => write!(f, "js:{js}"),
            Self::Element(loc) => write!(f, "element:{loc}"),
            Self::NotElement(loc) => write!(f, "!element:{loc}"),
            Self::Visible(loc) => write!(f, "visible:{loc}"),
            Self::NotVisible(loc) => write!(f, "!visible:{loc}"),
            Self::Duration(None) => f.write_str("duration"),
            Self::Duration(Some(ms)) => write!(f, "duration:{ms}"),
        }
    }
}

impl Serialize for WaitCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WaitCondition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
