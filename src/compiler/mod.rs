//! Compiles a [`QueryRequest`] into a single parameterized SQL statement.
//!
//! The compiler is a pure function of its input plus the immutable
//! [`FieldRegistry`]; it performs no I/O, holds no locks and never executes
//! the statement it produces. Compilation is one linear pipeline:
//!
//! 1. resolution pass — every field, aggregation, operator and value is
//!    validated; any failure aborts before a byte of SQL exists
//! 2. SELECT list assembly
//! 3. JOIN inference from a fixed join map
//! 4. WHERE assembly with a continuously running placeholder counter
//! 5. GROUP BY
//! 6. ORDER BY
//! 7. LIMIT (literal, bounds-checked integer)
//! 8. concatenation into `(sql, params)`
//!
//! Values never reach the statement text: the placeholder counter lives in
//! [`ParamList`], so every `$n` in the output is backed by the parameter at
//! position `n`.

mod params;

pub use params::{ParamList, SqlValue};

use chrono::{Duration, NaiveDate};
use serde_json::Value;

use crate::error::{QueryError, QueryResult};
use crate::registry::{FieldRegistry, ResolvedField, BASE_ALIAS, BASE_TABLE};
use crate::request::{FilterOp, QueryRequest, TimeRange};
use crate::sanitize;

/// The compiled statement: SQL text with `$1..$N` placeholders and the
/// positionally aligned parameter list. Produced once per request and handed
/// straight to the executor; never cached, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Applied when the request carries no limit.
pub const DEFAULT_LIMIT: u32 = 100;

/// Hard cap on returned rows. One bound for every validation path.
pub const MAX_LIMIT: u32 = 1000;

/// Column the implicit completed-status predicate guards.
const STATUS_COLUMN: &str = "sale_status_desc";

// =============================================================================
// Join map
// =============================================================================

/// How each non-base table links back to `sales`. `requires` lists bridge
/// tables that must be joined first (products hang off product_sales, etc.).
struct JoinSpec {
    table: &'static str,
    alias: &'static str,
    on: &'static str,
    requires: &'static [&'static str],
}

/// Fixed, ordered join map. Order here decides emission order, keeping the
/// compiler deterministic regardless of how the request references tables.
const JOIN_MAP: &[JoinSpec] = &[
    JoinSpec {
        table: "stores",
        alias: "st",
        on: "st.id = s.store_id",
        requires: &[],
    },
    JoinSpec {
        table: "channels",
        alias: "ch",
        on: "ch.id = s.channel_id",
        requires: &[],
    },
    JoinSpec {
        table: "customers",
        alias: "c",
        on: "c.id = s.customer_id",
        requires: &[],
    },
    JoinSpec {
        table: "sub_brands",
        alias: "sb",
        on: "sb.id = s.sub_brand_id",
        requires: &[],
    },
    JoinSpec {
        table: "product_sales",
        alias: "ps",
        on: "ps.sale_id = s.id",
        requires: &[],
    },
    JoinSpec {
        table: "products",
        alias: "p",
        on: "p.id = ps.product_id",
        requires: &["product_sales"],
    },
    JoinSpec {
        table: "categories",
        alias: "cat",
        on: "cat.id = p.category_id",
        requires: &["products"],
    },
    JoinSpec {
        table: "brands",
        alias: "b",
        on: "b.id = st.brand_id",
        requires: &["stores"],
    },
];

// =============================================================================
// Resolved intermediates
// =============================================================================

struct ResolvedDimension {
    field: ResolvedField,
    alias: String,
}

struct ResolvedMetric {
    select_sql: String,
    field: ResolvedField,
}

struct ResolvedFilter<'a> {
    field: ResolvedField,
    operator: FilterOp,
    value: &'a Value,
}

struct ResolvedOrder {
    field: ResolvedField,
    descending: bool,
}

struct ResolvedWindow {
    start: Option<NaiveDate>,
    /// Exclusive upper bound: the request's inclusive end date plus one day.
    end_exclusive: Option<NaiveDate>,
}

// =============================================================================
// Compilation
// =============================================================================

/// Compile a query request against the registry.
///
/// Fail-fast: the first invalid field, operator, value or identifier aborts
/// the whole request. Partial SQL is never returned.
pub fn compile(request: &QueryRequest, registry: &FieldRegistry) -> QueryResult<CompiledQuery> {
    // Step 1: resolution pass. Everything is validated before any SQL is
    // assembled.
    let dimensions = resolve_dimensions(request, registry)?;
    let metrics = resolve_metrics(request, registry)?;
    let filters = resolve_filters(request, registry)?;
    let group_by = resolve_group_by(request, registry)?;
    let order_by = resolve_order_by(request, registry)?;
    let window = resolve_time_range(request.time_range.as_ref())?;
    let limit = resolve_limit(request.limit)?;

    // Step 2: SELECT list.
    let mut select_parts: Vec<String> = Vec::new();
    for dim in &dimensions {
        select_parts.push(format!("{} AS {}", dim.field.render(), dim.alias));
    }
    for metric in &metrics {
        select_parts.push(metric.select_sql.clone());
    }
    if select_parts.is_empty() {
        select_parts.push("*".to_string());
    }

    // Step 3: JOIN inference.
    let mut referenced: Vec<&'static str> = Vec::new();
    let all_fields = dimensions
        .iter()
        .map(|d| &d.field)
        .chain(metrics.iter().map(|m| &m.field))
        .chain(filters.iter().map(|f| &f.field))
        .chain(group_by.iter())
        .chain(order_by.iter().map(|o| &o.field));
    for field in all_fields {
        if !field.is_base() && !referenced.contains(&field.table) {
            referenced.push(field.table);
        }
    }
    let join_clauses = infer_joins(&referenced);

    // Step 4: WHERE, with the running placeholder counter.
    let mut list = ParamList::new();
    let mut where_parts: Vec<String> = Vec::new();

    let status_overridden = filters
        .iter()
        .any(|f| f.field.is_base() && f.field.column == STATUS_COLUMN);
    if !status_overridden {
        where_parts.push(format!("{}.{} = 'COMPLETED'", BASE_ALIAS, STATUS_COLUMN));
    }

    if let Some(start) = window.start {
        let placeholder = list.push(SqlValue::Date(start));
        where_parts.push(format!("{}.created_at >= {}", BASE_ALIAS, placeholder));
    }
    if let Some(end) = window.end_exclusive {
        let placeholder = list.push(SqlValue::Date(end));
        where_parts.push(format!("{}.created_at < {}", BASE_ALIAS, placeholder));
    }

    for filter in &filters {
        where_parts.push(render_filter(filter, &mut list)?);
    }

    // Step 5: GROUP BY. Explicit list wins; otherwise metrics group by the
    // dimension fields. Metrics with no dimensions intentionally emit no
    // GROUP BY and collapse to a single aggregate row.
    let group_parts: Vec<String> = if !group_by.is_empty() {
        group_by.iter().map(ResolvedField::render).collect()
    } else if !metrics.is_empty() {
        dimensions.iter().map(|d| d.field.render()).collect()
    } else {
        Vec::new()
    };

    // Step 6: ORDER BY.
    let order_parts: Vec<String> = order_by
        .iter()
        .map(|o| {
            format!(
                "{} {}",
                o.field.render(),
                if o.descending { "DESC" } else { "ASC" }
            )
        })
        .collect();

    // Steps 7-8: LIMIT and concatenation. The limit is a bounds-checked
    // integer, safe to append as a literal.
    let mut sql = format!(
        "SELECT {} FROM {} {}",
        select_parts.join(", "),
        BASE_TABLE,
        BASE_ALIAS
    );
    for clause in &join_clauses {
        sql.push(' ');
        sql.push_str(clause);
    }
    if !where_parts.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_parts.join(" AND "));
    }
    if !group_parts.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&group_parts.join(", "));
    }
    if !order_parts.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_parts.join(", "));
    }
    sql.push_str(&format!(" LIMIT {}", limit));

    Ok(CompiledQuery {
        sql,
        params: list.into_values(),
    })
}

// =============================================================================
// Resolution pass
// =============================================================================

fn resolve_dimensions(
    request: &QueryRequest,
    registry: &FieldRegistry,
) -> QueryResult<Vec<ResolvedDimension>> {
    let mut out = Vec::with_capacity(request.dimensions.len());
    for dim in &request.dimensions {
        let field = registry.resolve(&dim.field)?;
        let alias = match &dim.alias {
            Some(alias) => {
                sanitize::check_identifier(alias)?;
                alias.clone()
            }
            None => field.column.clone(),
        };
        out.push(ResolvedDimension { field, alias });
    }
    Ok(out)
}

fn resolve_metrics(
    request: &QueryRequest,
    registry: &FieldRegistry,
) -> QueryResult<Vec<ResolvedMetric>> {
    let mut out = Vec::with_capacity(request.metrics.len());
    for metric in &request.metrics {
        let field = registry.resolve(&metric.field)?;
        let alias = match &metric.alias {
            Some(alias) => {
                sanitize::check_identifier(alias)?;
                alias.clone()
            }
            None => format!("{}_{}", metric.aggregation.token(), field.column),
        };
        let select_sql = format!("{} AS {}", metric.aggregation.render(&field.render()), alias);
        out.push(ResolvedMetric { select_sql, field });
    }
    Ok(out)
}

fn resolve_filters<'a>(
    request: &'a QueryRequest,
    registry: &FieldRegistry,
) -> QueryResult<Vec<ResolvedFilter<'a>>> {
    let mut out = Vec::with_capacity(request.filters.len());
    for filter in &request.filters {
        let field = registry.resolve(&filter.field)?;
        sanitize::screen_value(&filter.value)?;
        out.push(ResolvedFilter {
            field,
            operator: filter.operator,
            value: &filter.value,
        });
    }
    Ok(out)
}

fn resolve_group_by(
    request: &QueryRequest,
    registry: &FieldRegistry,
) -> QueryResult<Vec<ResolvedField>> {
    request
        .group_by
        .iter()
        .map(|field| registry.resolve(field))
        .collect()
}

fn resolve_order_by(
    request: &QueryRequest,
    registry: &FieldRegistry,
) -> QueryResult<Vec<ResolvedOrder>> {
    let mut out = Vec::with_capacity(request.order_by.len());
    for order in &request.order_by {
        let field = registry.resolve(&order.field)?;
        // Unrecognized directions normalize to ASC rather than failing.
        let descending = order
            .direction
            .as_deref()
            .is_some_and(|d| d.eq_ignore_ascii_case("desc"));
        out.push(ResolvedOrder { field, descending });
    }
    Ok(out)
}

fn resolve_time_range(time_range: Option<&TimeRange>) -> QueryResult<ResolvedWindow> {
    let Some(range) = time_range else {
        return Ok(ResolvedWindow {
            start: None,
            end_exclusive: None,
        });
    };
    let start = range.start.as_deref().map(parse_date).transpose()?;
    // The exclusive bound is the day after the inclusive end; chrono's `%Y`
    // accepts dates close enough to the calendar maximum that the plain `+`
    // would panic, so the overflow becomes an InvalidDate error instead.
    let end_exclusive = match range.end.as_deref() {
        None => None,
        Some(raw) => {
            let end = parse_date(raw)?;
            let bound = end
                .checked_add_signed(Duration::days(1))
                .ok_or_else(|| QueryError::InvalidDate {
                    value: raw.to_string(),
                })?;
            Some(bound)
        }
    };
    Ok(ResolvedWindow {
        start,
        end_exclusive,
    })
}

fn parse_date(s: &str) -> QueryResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| QueryError::InvalidDate {
        value: s.to_string(),
    })
}

fn resolve_limit(limit: Option<u32>) -> QueryResult<u32> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(n) if (1..=MAX_LIMIT).contains(&n) => Ok(n),
        Some(n) => Err(QueryError::InvalidLimit { limit: n }),
    }
}

// =============================================================================
// Clause assembly
// =============================================================================

fn infer_joins(referenced: &[&'static str]) -> Vec<String> {
    let mut included: Vec<&'static str> = Vec::new();
    let mut clauses: Vec<String> = Vec::new();
    for spec in JOIN_MAP {
        if referenced.contains(&spec.table) {
            add_join(spec, &mut included, &mut clauses);
        }
    }
    clauses
}

fn add_join(spec: &JoinSpec, included: &mut Vec<&'static str>, clauses: &mut Vec<String>) {
    if included.contains(&spec.table) {
        return;
    }
    for required in spec.requires {
        if let Some(dep) = JOIN_MAP.iter().find(|s| s.table == *required) {
            add_join(dep, included, clauses);
        }
    }
    included.push(spec.table);
    clauses.push(format!(
        "LEFT JOIN {} {} ON {}",
        spec.table, spec.alias, spec.on
    ));
}

fn render_filter(filter: &ResolvedFilter<'_>, list: &mut ParamList) -> QueryResult<String> {
    let field_sql = filter.field.render();
    let operator = filter.operator;

    if let Some(cmp) = operator.comparison_sql() {
        let placeholder = list.push(SqlValue::from_scalar(filter.value, operator)?);
        return Ok(format!("{} {} {}", field_sql, cmp, placeholder));
    }

    match operator {
        FilterOp::Like => {
            let Value::String(s) = filter.value else {
                return Err(invalid_value(operator, "expected a string"));
            };
            let placeholder = list.push(SqlValue::Text(format!("%{}%", s)));
            Ok(format!("{} ILIKE {}", field_sql, placeholder))
        }
        FilterOp::In | FilterOp::NotIn => {
            let Value::Array(items) = filter.value else {
                return Err(invalid_value(operator, "expected a non-empty list"));
            };
            if items.is_empty() {
                return Err(invalid_value(operator, "expected a non-empty list"));
            }
            let mut placeholders = Vec::with_capacity(items.len());
            for item in items {
                placeholders.push(list.push(SqlValue::from_scalar(item, operator)?));
            }
            let keyword = if operator == FilterOp::In {
                "IN"
            } else {
                "NOT IN"
            };
            Ok(format!(
                "{} {} ({})",
                field_sql,
                keyword,
                placeholders.join(",")
            ))
        }
        FilterOp::Between => {
            let Value::Array(items) = filter.value else {
                return Err(invalid_value(operator, "expected a list of 2 values"));
            };
            if items.len() != 2 {
                return Err(invalid_value(operator, "expected a list of 2 values"));
            }
            let lower = list.push(SqlValue::from_scalar(&items[0], operator)?);
            let upper = list.push(SqlValue::from_scalar(&items[1], operator)?);
            Ok(format!("{} BETWEEN {} AND {}", field_sql, lower, upper))
        }
        // Comparison operators were handled above.
        _ => Err(QueryError::UnsupportedOperation {
            token: operator.token().to_string(),
        }),
    }
}

fn invalid_value(operator: FilterOp, detail: &str) -> QueryError {
    QueryError::InvalidFilterValue {
        operator: operator.token().to_string(),
        detail: detail.to_string(),
    }
}
