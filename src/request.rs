//! Query request model for the dynamic query endpoint.
//!
//! These types are deserialized straight from the request body; every field
//! reference, operator and value in them is untrusted until the compiler has
//! run its resolution pass.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QueryError;

/// A structured description of a query: what to select, how to aggregate,
/// filter, group, order and cap it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// A non-aggregated output column.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Dimension {
    pub field: String,
    #[serde(default)]
    pub alias: Option<String>,
}

/// An aggregated output column.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Metric {
    pub field: String,
    pub aggregation: Aggregation,
    #[serde(default)]
    pub alias: Option<String>,
}

/// One WHERE predicate.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Filter {
    pub field: String,
    pub operator: FilterOp,
    pub value: Value,
}

/// Day-granular date window, both bounds `YYYY-MM-DD`. The end date is
/// inclusive: the compiler turns it into an exclusive start-of-next-day bound.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TimeRange {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

/// One ORDER BY entry. The direction stays a free-form string on purpose:
/// unrecognized values normalize to ASC instead of failing the request.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: Option<String>,
}

// =============================================================================
// Closed token sets
// =============================================================================

/// Aggregation functions the compiler will emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    CountDistinct,
}

impl Aggregation {
    /// Request-level token, also used for default metric aliases.
    pub fn token(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Avg => "avg",
            Aggregation::Count => "count",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::CountDistinct => "count_distinct",
        }
    }

    /// Render the aggregate call over an already-resolved field expression.
    pub fn render(&self, field_sql: &str) -> String {
        match self {
            Aggregation::Sum => format!("SUM({})", field_sql),
            Aggregation::Avg => format!("AVG({})", field_sql),
            Aggregation::Count => format!("COUNT({})", field_sql),
            Aggregation::Min => format!("MIN({})", field_sql),
            Aggregation::Max => format!("MAX({})", field_sql),
            Aggregation::CountDistinct => format!("COUNT(DISTINCT {})", field_sql),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Aggregation {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(Aggregation::Sum),
            "avg" => Ok(Aggregation::Avg),
            "count" => Ok(Aggregation::Count),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "count_distinct" => Ok(Aggregation::CountDistinct),
            other => Err(QueryError::UnsupportedOperation {
                token: other.to_string(),
            }),
        }
    }
}

/// Filter operators the compiler will emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Like,
    Between,
}

impl FilterOp {
    pub fn token(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Ne => "ne",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::In => "in",
            FilterOp::NotIn => "not_in",
            FilterOp::Like => "like",
            FilterOp::Between => "between",
        }
    }

    /// SQL comparison operator for the single-placeholder forms.
    pub fn comparison_sql(&self) -> Option<&'static str> {
        match self {
            FilterOp::Eq => Some("="),
            FilterOp::Ne => Some("!="),
            FilterOp::Gt => Some(">"),
            FilterOp::Gte => Some(">="),
            FilterOp::Lt => Some("<"),
            FilterOp::Lte => Some("<="),
            _ => None,
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for FilterOp {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eq" => Ok(FilterOp::Eq),
            "ne" => Ok(FilterOp::Ne),
            "gt" => Ok(FilterOp::Gt),
            "gte" => Ok(FilterOp::Gte),
            "lt" => Ok(FilterOp::Lt),
            "lte" => Ok(FilterOp::Lte),
            "in" => Ok(FilterOp::In),
            "not_in" => Ok(FilterOp::NotIn),
            "like" => Ok(FilterOp::Like),
            "between" => Ok(FilterOp::Between),
            other => Err(QueryError::UnsupportedOperation {
                token: other.to_string(),
            }),
        }
    }
}
