//! Screening of user-supplied values and identifiers.
//!
//! Parameter binding already prevents injection; values are still screened
//! for structural SQL fragments so nothing dangerous survives even on a code
//! path that would interpolate a value directly. Identifier checks cover the
//! aliases a caller may attach to SELECT-list items.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{QueryError, QueryResult};

/// SQL keywords that must never appear inside field names or filter values.
pub const DANGEROUS_KEYWORDS: &[&str] = &[
    "DROP",
    "DELETE",
    "INSERT",
    "UPDATE",
    "TRUNCATE",
    "ALTER",
    "CREATE",
    "EXEC",
    "EXECUTE",
    "SCRIPT",
    "DECLARE",
    "GRANT",
    "REVOKE",
    "UNION",
    "INFORMATION_SCHEMA",
    "PG_",
    "CURRENT_USER",
];

/// Sequences that could terminate a statement or open a comment.
const DANGEROUS_PATTERNS: &[&str] = &["';", "--", "/*", "*/", "xp_", "sp_"];

/// Words a user alias may not shadow, even when it passes the syntax check.
const RESERVED_IDENTIFIERS: &[&str] = &[
    "select", "from", "where", "group", "having", "order", "by", "limit", "offset", "join", "on",
    "and", "or", "not", "as", "in", "like", "between", "union", "all", "distinct", "case", "when",
    "then", "else", "end", "null", "true", "false",
];

static IDENTIFIER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

static FIELD_REF_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").unwrap());

/// Check the basic shape of a field reference (`column` or `alias.column`)
/// before it is resolved against the registry.
pub fn check_field_syntax(field: &str) -> QueryResult<()> {
    // No keyword screening here: the registry whitelist is authoritative for
    // field names, and a substring denylist would reject legitimate columns
    // such as `created_at` (contains CREATE).
    if field.is_empty() || !FIELD_REF_PATTERN.is_match(field) {
        return Err(QueryError::unknown_field(field, "invalid field name format"));
    }
    Ok(())
}

/// Validate a user-supplied alias for a SELECT-list item.
pub fn check_identifier(identifier: &str) -> QueryResult<()> {
    if !IDENTIFIER_PATTERN.is_match(identifier)
        || RESERVED_IDENTIFIERS.contains(&identifier.to_lowercase().as_str())
    {
        return Err(QueryError::InvalidIdentifier {
            identifier: identifier.to_string(),
        });
    }
    Ok(())
}

/// Screen a filter value for denylisted keywords and structural patterns.
///
/// Strings are matched case-insensitively; lists are screened element-wise.
/// Numbers, booleans and null pass through untouched. The value itself is
/// never rewritten: it will be bound as a parameter, this is defense in depth.
pub fn screen_value(value: &Value) -> QueryResult<()> {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => Ok(()),
        Value::String(s) => screen_str(s),
        Value::Array(items) => {
            for item in items {
                screen_value(item)?;
            }
            Ok(())
        }
        // Objects are not valid filter scalars; arity checks in the compiler
        // reject them with the operator context attached.
        Value::Object(map) => {
            for item in map.values() {
                screen_value(item)?;
            }
            Ok(())
        }
    }
}

fn screen_str(s: &str) -> QueryResult<()> {
    let upper = s.to_uppercase();
    for keyword in DANGEROUS_KEYWORDS {
        if upper.contains(keyword) {
            return Err(QueryError::UnsafeValue {
                pattern: (*keyword).to_string(),
            });
        }
    }
    let lower = s.to_lowercase();
    for pattern in DANGEROUS_PATTERNS {
        if lower.contains(pattern) {
            return Err(QueryError::UnsafeValue {
                pattern: (*pattern).to_string(),
            });
        }
    }
    Ok(())
}
