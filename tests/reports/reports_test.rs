//! Report template assembly: placeholder alignment and clause content.

use chrono::NaiveDate;
use regex::Regex;

use tavola::compiler::{CompiledQuery, SqlValue};
use tavola::reports::{self, DateWindow, TopProductsOrder};

fn may_2025() -> DateWindow {
    DateWindow::new(
        NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 5, 31).unwrap(),
    )
    .unwrap()
}

fn assert_placeholders_aligned(query: &CompiledQuery) {
    let pattern = Regex::new(r"\$(\d+)").unwrap();
    let mut max = 0usize;
    for capture in pattern.captures_iter(&query.sql) {
        let n: usize = capture[1].parse().unwrap();
        assert!(n >= 1);
        max = max.max(n);
    }
    assert_eq!(max, query.params.len(), "in {}", query.sql);
}

#[test]
fn every_template_keeps_placeholders_and_params_aligned() {
    let queries = [
        reports::revenue(may_2025(), None, None),
        reports::revenue(may_2025(), Some(1), None),
        reports::revenue(may_2025(), Some(1), Some(2)),
        reports::top_products(may_2025(), 10, TopProductsOrder::Quantity),
        reports::peak_hours(may_2025()),
        reports::store_performance(may_2025()),
        reports::channel_comparison(may_2025()),
        reports::daily_trends(may_2025()),
        reports::cohort_retention(6),
        reports::product_affinity(0.01, 20),
        reports::customers(may_2025(), &[]),
        reports::customers(may_2025(), &[1, 2, 3]),
        reports::meta_products(Some("pizza"), 100),
        reports::meta_products(None, 100),
        reports::table_columns("sales"),
    ];
    for query in &queries {
        assert_placeholders_aligned(query);
    }
}

#[test]
fn window_construction_fails_at_calendar_max() {
    let start = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
    assert!(DateWindow::new(start, NaiveDate::MAX).is_none());
    assert!(DateWindow::new(start, NaiveDate::from_ymd_opt(2025, 5, 31).unwrap()).is_some());
}

#[test]
fn windowed_templates_use_half_open_bounds() {
    let window = may_2025();
    for query in [
        reports::revenue(window, None, None),
        reports::peak_hours(window),
        reports::daily_trends(window),
    ] {
        assert!(query.sql.contains(">= $1"));
        assert!(query.sql.contains("< $2"));
        assert_eq!(
            query.params[1],
            SqlValue::Date(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
        );
    }
}

#[test]
fn revenue_optional_filters_are_parameterized() {
    let query = reports::revenue(may_2025(), Some(12), Some(3));
    assert!(query.sql.contains("s.store_id = $3"));
    assert!(query.sql.contains("s.channel_id = $4"));
    assert!(!query.sql.contains("12"));
    assert_eq!(query.params[2], SqlValue::Int(12));
    assert_eq!(query.params[3], SqlValue::Int(3));
}

#[test]
fn top_products_sorts_and_limits_in_sql() {
    let query = reports::top_products(may_2025(), 5, TopProductsOrder::Revenue);
    assert!(query.sql.contains("ORDER BY total_revenue DESC"));
    assert!(query.sql.contains("LIMIT $3"));
    assert_eq!(query.params[2], SqlValue::Int(5));
}

#[test]
fn store_performance_groups_by_store() {
    let query = reports::store_performance(may_2025());
    assert!(query.sql.contains("JOIN stores st ON st.id = s.store_id"));
    assert!(query.sql.contains("GROUP BY st.id, st.name, st.city, st.state"));
    assert!(query.sql.contains("ORDER BY total_revenue DESC"));
}

#[test]
fn explore_templates_bind_their_thresholds() {
    let cohort = reports::cohort_retention(4);
    assert_eq!(cohort.params, vec![SqlValue::Int(4)]);

    let affinity = reports::product_affinity(0.05, 10);
    assert_eq!(
        affinity.params,
        vec![SqlValue::Float(0.05), SqlValue::Int(10)]
    );
    assert!(affinity.sql.contains("ORDER BY lift DESC, pair_count DESC"));
}

#[test]
fn all_templates_pin_completed_sales() {
    for query in [
        reports::revenue(may_2025(), None, None),
        reports::top_products(may_2025(), 10, TopProductsOrder::Quantity),
        reports::peak_hours(may_2025()),
        reports::store_performance(may_2025()),
        reports::channel_comparison(may_2025()),
        reports::daily_trends(may_2025()),
        reports::cohort_retention(6),
        reports::product_affinity(0.01, 20),
        reports::customers(may_2025(), &[]),
    ] {
        assert!(
            query.sql.contains("sale_status_desc = 'COMPLETED'"),
            "missing status pin in {}",
            query.sql
        );
    }
}

#[test]
fn customers_binds_window_channels_and_churn_cutoff() {
    let query = reports::customers(may_2025(), &[1, 3]);
    assert!(query.sql.contains("s.channel_id IN ($3, $4)"));
    assert!(query.sql.contains("is_churn_risk"));
    assert_eq!(query.params.len(), 6);
    assert_eq!(
        query.params[4],
        SqlValue::Date(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap())
    );
    assert_eq!(
        query.params[5],
        SqlValue::Date(NaiveDate::from_ymd_opt(2025, 5, 31).unwrap())
    );
}

#[test]
fn metadata_listings_bind_user_input() {
    let products = reports::meta_products(Some("calabresa"), 50);
    assert!(products.sql.contains("ILIKE $1"));
    assert!(!products.sql.contains("calabresa"));
    assert_eq!(products.params[0], SqlValue::Text("%calabresa%".to_string()));

    let columns = reports::table_columns("stores");
    assert!(columns.sql.contains("table_name = $1"));
    assert_eq!(columns.params, vec![SqlValue::Text("stores".to_string())]);

    assert!(reports::meta_channels().params.is_empty());
    assert!(reports::meta_stores().params.is_empty());
}
