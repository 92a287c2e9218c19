//! Error types for query validation and compilation.
//!
//! Every variant is attributable to caller input: the compiler has no
//! internal fatal states, performs no retries, and never returns a partially
//! compiled statement. Callers surface these as client errors and let the
//! consumer fix and resubmit.

use std::fmt;

/// Result type for query validation and compilation.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while validating or compiling a query request.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    /// A field reference does not resolve to any registered table/alias/column.
    UnknownField { field: String, detail: String },

    /// An aggregation or filter operator token is outside the closed set.
    UnsupportedOperation { token: String },

    /// A filter value contains a denylisted keyword or structural pattern.
    UnsafeValue { pattern: String },

    /// Operator/value arity mismatch (`in`/`not_in`/`between` list shapes).
    InvalidFilterValue { operator: String, detail: String },

    /// A user-supplied alias fails the identifier syntax check or shadows a
    /// reserved word.
    InvalidIdentifier { identifier: String },

    /// A time-range bound is not a valid `YYYY-MM-DD` date.
    InvalidDate { value: String },

    /// Limit outside the accepted range.
    InvalidLimit { limit: u32 },
}

impl QueryError {
    pub fn unknown_field(field: impl Into<String>, detail: impl Into<String>) -> Self {
        QueryError::UnknownField {
            field: field.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::UnknownField { field, detail } => {
                write!(f, "Unknown field '{}': {}", field, detail)
            }
            QueryError::UnsupportedOperation { token } => {
                write!(f, "Unsupported operation: '{}'", token)
            }
            QueryError::UnsafeValue { pattern } => {
                write!(f, "Unsafe value: contains '{}'", pattern)
            }
            QueryError::InvalidFilterValue { operator, detail } => {
                write!(f, "Invalid value for '{}' filter: {}", operator, detail)
            }
            QueryError::InvalidIdentifier { identifier } => {
                write!(f, "Invalid identifier: '{}'", identifier)
            }
            QueryError::InvalidDate { value } => {
                write!(f, "Invalid date '{}': expected YYYY-MM-DD", value)
            }
            QueryError::InvalidLimit { limit } => {
                write!(f, "Limit {} is outside the accepted range 1-1000", limit)
            }
        }
    }
}

impl std::error::Error for QueryError {}
