//! End-to-end compilation scenarios for the dynamic query compiler.

use regex::Regex;
use serde_json::json;

use tavola::prelude::*;

fn registry() -> &'static FieldRegistry {
    FieldRegistry::shared()
}

fn compile_value(body: serde_json::Value) -> QueryResult<CompiledQuery> {
    let request: QueryRequest = serde_json::from_value(body).expect("valid request body");
    compile(&request, registry())
}

/// Every `$n` in the SQL must be backed by the parameter at position `n`.
fn assert_placeholders_aligned(query: &CompiledQuery) {
    let pattern = Regex::new(r"\$(\d+)").unwrap();
    let mut seen = vec![false; query.params.len()];
    for capture in pattern.captures_iter(&query.sql) {
        let n: usize = capture[1].parse().unwrap();
        assert!(n >= 1 && n <= query.params.len(), "placeholder ${} out of range", n);
        seen[n - 1] = true;
    }
    assert!(
        seen.iter().all(|s| *s),
        "unused parameters in {:?}",
        query.sql
    );
}

#[test]
fn full_analytics_request_compiles_in_clause_order() {
    let query = compile_value(json!({
        "dimensions": [{"field": "st.city", "alias": "city"}],
        "metrics": [{"field": "total_amount", "aggregation": "sum", "alias": "total_revenue"}],
        "filters": [{"field": "store_id", "operator": "in", "value": [1, 2, 3]}],
        "time_range": {"start": "2025-05-01", "end": "2025-05-31"},
        "order_by": [{"field": "total_amount", "direction": "desc"}]
    }))
    .unwrap();

    assert_eq!(
        query.sql,
        "SELECT st.city AS city, SUM(s.total_amount) AS total_revenue \
         FROM sales s \
         LEFT JOIN stores st ON st.id = s.store_id \
         WHERE s.sale_status_desc = 'COMPLETED' \
         AND s.created_at >= $1 AND s.created_at < $2 \
         AND s.store_id IN ($3,$4,$5) \
         GROUP BY st.city \
         ORDER BY s.total_amount DESC \
         LIMIT 100"
    );
    assert_eq!(query.params.len(), 5);
    assert_placeholders_aligned(&query);
}

#[test]
fn placeholder_count_always_matches_parameter_count() {
    let bodies = [
        json!({}),
        json!({"filters": [{"field": "total_amount", "operator": "between", "value": [10, 50]}]}),
        json!({
            "filters": [
                {"field": "ch.type", "operator": "eq", "value": "DELIVERY"},
                {"field": "store_id", "operator": "not_in", "value": [7, 8]},
                {"field": "customer_name", "operator": "like", "value": "silva"}
            ],
            "time_range": {"start": "2025-01-01"}
        }),
    ];
    for body in bodies {
        let query = compile_value(body).unwrap();
        assert_placeholders_aligned(&query);
    }
}

#[test]
fn in_list_emits_one_placeholder_per_element() {
    let query = compile_value(json!({
        "filters": [{"field": "store_id", "operator": "in", "value": [1, 2, 3, 4]}]
    }))
    .unwrap();
    assert!(query.sql.contains("s.store_id IN ($1,$2,$3,$4)"));
    assert_eq!(query.params.len(), 4);
}

#[test]
fn between_emits_exactly_two_placeholders() {
    let query = compile_value(json!({
        "filters": [{"field": "total_amount", "operator": "between", "value": [25.0, 80.0]}]
    }))
    .unwrap();
    assert!(query.sql.contains("s.total_amount BETWEEN $1 AND $2"));
    assert_eq!(query.params.len(), 2);
}

#[test]
fn like_value_is_wrapped_and_parameterized() {
    let query = compile_value(json!({
        "filters": [{"field": "customer_name", "operator": "like", "value": "maria"}]
    }))
    .unwrap();
    assert!(query.sql.contains("s.customer_name ILIKE $1"));
    assert!(!query.sql.contains("maria"));
    assert_eq!(query.params, vec![SqlValue::Text("%maria%".into())]);
}

#[test]
fn end_date_becomes_exclusive_next_day_bound() {
    let query = compile_value(json!({
        "time_range": {"start": "2025-05-01", "end": "2025-05-31"}
    }))
    .unwrap();
    assert!(query.sql.contains("s.created_at >= $1"));
    assert!(query.sql.contains("s.created_at < $2"));
    let expected = chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    assert_eq!(query.params[1], SqlValue::Date(expected));
}

#[test]
fn unknown_table_alias_is_rejected() {
    let err = compile_value(json!({
        "dimensions": [{"field": "zz.created_at"}]
    }))
    .unwrap_err();
    assert!(matches!(err, QueryError::UnknownField { .. }));
    assert!(err.to_string().contains("zz.created_at"));
}

#[test]
fn injection_in_filter_value_aborts_compilation() {
    let err = compile_value(json!({
        "filters": [{"field": "customer_name", "operator": "eq", "value": "x'; DROP TABLE sales;--"}]
    }))
    .unwrap_err();
    assert!(matches!(err, QueryError::UnsafeValue { .. }));
}

#[test]
fn status_override_replaces_default_predicate() {
    let query = compile_value(json!({
        "filters": [{"field": "sale_status_desc", "operator": "ne", "value": "CANCELLED"}]
    }))
    .unwrap();
    assert!(!query.sql.contains("'COMPLETED'"));
    assert!(query.sql.contains("s.sale_status_desc != $1"));
}

#[test]
fn limit_outside_bounds_is_a_hard_error() {
    for limit in [0, 1001, 50_000] {
        let err = compile_value(json!({"limit": limit})).unwrap_err();
        assert!(matches!(err, QueryError::InvalidLimit { .. }));
    }
    let query = compile_value(json!({"limit": 1000})).unwrap();
    assert!(query.sql.ends_with("LIMIT 1000"));
}

#[test]
fn category_dimension_pulls_prerequisite_joins() {
    let query = compile_value(json!({
        "dimensions": [{"field": "cat.name", "alias": "category"}],
        "metrics": [{"field": "ps.quantity", "aggregation": "sum"}]
    }))
    .unwrap();
    let ps = query.sql.find("LEFT JOIN product_sales ps ON ps.sale_id = s.id");
    let p = query.sql.find("LEFT JOIN products p ON p.id = ps.product_id");
    let cat = query.sql.find("LEFT JOIN categories cat ON cat.id = p.category_id");
    assert!(ps.unwrap() < p.unwrap());
    assert!(p.unwrap() < cat.unwrap());
    assert_eq!(query.sql.matches("LEFT JOIN product_sales").count(), 1);
}

#[test]
fn brand_fields_join_through_stores() {
    let query = compile_value(json!({
        "dimensions": [{"field": "b.name", "alias": "brand"}]
    }))
    .unwrap();
    let st = query.sql.find("LEFT JOIN stores st").unwrap();
    let b = query.sql.find("LEFT JOIN brands b ON b.id = st.brand_id").unwrap();
    assert!(st < b);
}

#[test]
fn compilation_has_no_side_effects_between_runs() {
    let body = json!({
        "metrics": [{"field": "total_amount", "aggregation": "avg"}],
        "filters": [{"field": "ch.type", "operator": "eq", "value": "DINE_IN"}],
        "time_range": {"start": "2025-05-01", "end": "2025-05-31"}
    });
    let first = compile_value(body.clone()).unwrap();
    let second = compile_value(body).unwrap();
    assert_eq!(first, second);
}
