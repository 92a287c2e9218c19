//! Positional parameter tracking for compiled SQL.

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::{QueryError, QueryResult};
use crate::request::FilterOp;

/// A value bound to a placeholder at execution time, never interpolated into
/// the statement text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Null,
}

impl SqlValue {
    /// Convert a JSON scalar into a bindable value.
    ///
    /// Arrays are unpacked by the list operators before this is called;
    /// nested arrays and objects are rejected with the operator attached for
    /// context.
    pub fn from_scalar(value: &Value, operator: FilterOp) -> QueryResult<SqlValue> {
        match value {
            Value::Null => Ok(SqlValue::Null),
            Value::Bool(b) => Ok(SqlValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(SqlValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(SqlValue::Float(f))
                } else {
                    Err(QueryError::InvalidFilterValue {
                        operator: operator.token().to_string(),
                        detail: format!("number out of range: {}", n),
                    })
                }
            }
            Value::String(s) => Ok(SqlValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Err(QueryError::InvalidFilterValue {
                operator: operator.token().to_string(),
                detail: "expected a scalar value".to_string(),
            }),
        }
    }
}

/// Parameter list with a running placeholder counter.
///
/// Placeholders are handed out only by [`ParamList::push`], so the SQL text
/// can never reference a parameter that is not in the list, and numbering is
/// continuous `$1..$N` with no gaps or repeats.
#[derive(Debug, Default)]
pub struct ParamList {
    values: Vec<SqlValue>,
}

impl ParamList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value and return its placeholder (`$1`-based).
    pub fn push(&mut self, value: SqlValue) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}
