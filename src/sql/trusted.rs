//! Verbatim SQL fragments.
//!
//! A [`TrustedExpression`] is the only way to put text into generated SQL
//! without parameterising it. It has no `From<String>`, no `Deserialize` and
//! no public field; [`TrustedExpression::create`] is the only constructor.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrustedExpressionError {
    #[error("Trusted expression must not be empty or whitespace")]
    Empty,

    #[error("Trusted expression must not be null")]
    Missing,
}

/// A SQL fragment the caller has vouched for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrustedExpression(String);

impl TrustedExpression {
    /// Wrap a fragment, rejecting empty and whitespace-only text.
    pub fn create(text: &str) -> Result<Self, TrustedExpressionError> {
        if text.trim().is_empty() {
            return Err(TrustedExpressionError::Empty);
        }
        Ok(Self(text.to_string()))
    }

    /// The fragment exactly as given.
    pub fn as_sql(&self) -> &str {
        &self.0
    }

    pub fn to_sql(&self) -> String {
        self.0.clone()
    }
}

impl TryFrom<Option<&str>> for TrustedExpression {
    type Error = TrustedExpressionError;

    fn try_from(text: Option<&str>) -> Result<Self, Self::Error> {
        match text {
            Some(text) => Self::create(text),
            None => Err(TrustedExpressionError::Missing),
        }
    }
}

impl fmt::Display for TrustedExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
