//! # Tavola
//!
//! Restaurant sales analytics API built around a safety-constrained SQL
//! query compiler.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            QueryRequest (structured JSON body)           │
//! │   (dimensions, metrics, filters, time_range, order_by)   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [registry + sanitize]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Resolved fields (whitelist, screened values)      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compiler]
//! ┌─────────────────────────────────────────────────────────┐
//! │       CompiledQuery: SQL with $1..$N + parameters        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [executor]
//! ┌─────────────────────────────────────────────────────────┐
//! │             Postgres rows as JSON objects                │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The compiler never interpolates a user value into statement text: every
//! value travels as a positional parameter, and field references only exist
//! once the registry has resolved them against its whitelist. Fixed report
//! templates (`reports`) and the HTTP surface (`http`) sit on the same
//! `CompiledQuery`/executor seam.

pub mod auth;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod registry;
pub mod reports;
pub mod request;
pub mod sanitize;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::compiler::{compile, CompiledQuery, ParamList, SqlValue};
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::registry::{FieldRegistry, ResolvedField};
    pub use crate::request::{
        Aggregation, Dimension, Filter, FilterOp, Metric, OrderBy, QueryRequest, TimeRange,
    };
}
