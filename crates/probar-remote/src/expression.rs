//! Boolean expression tree over clauses.
//!
//! Composite nodes evaluate their children strictly left to right and stop
//! as soon as the outcome is decided, so later clauses never touch the
//! browser.

use std::fmt;

use crate::browser::Browser;
use crate::clause::Clause;
use crate::result::RemoteResult;

/// A clause or a composite of child expressions
#[derive(Debug, Clone)]
pub enum Expression {
    /// Leaf
    Clause(Clause),
    /// All children hold
    And(Vec<Expression>),
    /// Any child holds
    Or(Vec<Expression>),
}

impl Expression {
    /// An empty conjunction, which is vacuously true
    #[must_use]
    pub const fn empty() -> Self {
        Self::And(Vec::new())
    }

    /// Evaluate once; the first child error aborts the walk
    pub fn evaluate(&self, browser: &mut dyn Browser) -> RemoteResult<bool> {
        match self {
            Self::Clause(clause) => clause.evaluate(browser),
            Self::And(children) => {
                for child in children {
                    if !child.evaluate(browser)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(children) => {
                for child in children {
                    if child.evaluate(browser)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Whether this node has no clauses at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Clause(_) => false,
            Self::And(children) | Self::Or(children) => children.iter().all(Self::is_empty),
        }
    }

    /// Number of leaf clauses
    #[must_use]
    pub fn clause_count(&self) -> usize {
        match self {
            Self::Clause(_) => 1,
            Self::And(children) | Self::Or(children) => {
                children.iter().map(Self::clause_count).sum()
            }
        }
    }

    /// Append a child to a composite node; a leaf is left untouched
    pub fn push(&mut self, child: Self) {
        match self {
            Self::And(children) | Self::Or(children) => children.push(child),
            Self::Clause(_) => {}
        }
    }
}

impl Default for Expression {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Clause> for Expression {
    fn from(clause: Clause) -> Self {
        Self::Clause(clause)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (children, op) = match self {
            Self::Clause(clause) => return write!(f, "{clause}"),
            Self::And(children) => (children, " && "),
            Self::Or(children) => (children, " || "),
        };
        f.write_str("(")?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                f.write_str(op)?;
            }
            write!(f, "{child}")?;
        }
        f.write_str(")")
    }
}
