//! Error types for relq.

use std::fmt;

use crate::value::Value;

/// The main error type for relq operations.
// Note: `Display`/`Error` are implemented by hand because thiserror treats any
// field named `source` (here: the source *relation*) as the error source.
#[derive(Debug, Clone, PartialEq)]
pub enum RelqError {
    /// Referenced attribute is absent from the current schema.
    UnknownAttribute {
        name: String,
        relation: String,
        suggestion: Option<String>,
    },

    /// A fetch expected exactly one row.
    TupleCountMismatch { expected: usize, found: usize },

    /// A symbolic join target has no registered association.
    AssociationNotFound {
        source: String,
        name: String,
        suggestion: Option<String>,
    },

    /// Malformed argument (unsupported join target, invalid selector, ...).
    InvalidArgument(String),

    /// A value cannot be converted to an attribute's declared type.
    Coercion {
        value: String,
        target: &'static str,
        reason: String,
    },

    /// Failure surfaced by the execution layer, forwarded untouched.
    Database(String),
}

impl fmt::Display for RelqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAttribute {
                name,
                relation,
                suggestion,
            } => write!(
                f,
                "Unknown attribute '{name}' on relation '{relation}'{}",
                suggestion_suffix(suggestion)
            ),
            Self::TupleCountMismatch { expected, found } => {
                write!(f, "Expected {expected} tuple(s), found {found}")
            }
            Self::AssociationNotFound {
                source,
                name,
                suggestion,
            } => write!(
                f,
                "No association '{name}' defined on relation '{source}'{}",
                suggestion_suffix(suggestion)
            ),
            Self::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            Self::Coercion {
                value,
                target,
                reason,
            } => write!(f, "Cannot coerce {value} into {target}: {reason}"),
            Self::Database(msg) => write!(f, "Database error: {msg}"),
        }
    }
}

impl std::error::Error for RelqError {}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(". Did you mean '{s}'?"),
        None => String::new(),
    }
}

impl RelqError {
    /// Create an unknown-attribute error.
    pub fn unknown_attribute(
        name: impl Into<String>,
        relation: impl Into<String>,
        suggestion: Option<String>,
    ) -> Self {
        Self::UnknownAttribute {
            name: name.into(),
            relation: relation.into(),
            suggestion,
        }
    }

    /// Create an association-not-found error.
    pub fn association_not_found(
        source: impl Into<String>,
        name: impl Into<String>,
        suggestion: Option<String>,
    ) -> Self {
        Self::AssociationNotFound {
            source: source.into(),
            name: name.into(),
            suggestion,
        }
    }

    /// Create a coercion error from the offending value.
    pub fn coercion(value: &Value, target: &'static str, reason: impl Into<String>) -> Self {
        Self::Coercion {
            value: value.to_string(),
            target,
            reason: reason.into(),
        }
    }
}

/// Result type alias for relq operations.
pub type RelqResult<T> = Result<T, RelqError>;
