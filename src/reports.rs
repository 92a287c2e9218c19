//! Fixed report queries behind the metrics and explore endpoints.
//!
//! Unlike the dynamic compiler these are hand-written SQL templates; they go
//! through the same [`ParamList`] so placeholder numbering and parameter
//! order stay aligned by construction. Every template pins completed sales
//! and a half-open date window.

use chrono::{Duration, NaiveDate};

use crate::compiler::{CompiledQuery, ParamList, SqlValue};

/// Half-open date window `[start, end_exclusive)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end_exclusive: NaiveDate,
}

impl DateWindow {
    /// Build a window from inclusive start and end dates. Returns `None` when
    /// the end date has no next calendar day to serve as the exclusive bound.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        let end_exclusive = end.checked_add_signed(Duration::days(1))?;
        Some(Self {
            start,
            end_exclusive,
        })
    }

    fn push_bounds(&self, params: &mut ParamList) -> (String, String) {
        let start = params.push(SqlValue::Date(self.start));
        let end = params.push(SqlValue::Date(self.end_exclusive));
        (start, end)
    }
}

/// Sort key for the top-products report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopProductsOrder {
    Quantity,
    Revenue,
}

impl TopProductsOrder {
    /// Unrecognized values fall back to quantity.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "revenue" => TopProductsOrder::Revenue,
            _ => TopProductsOrder::Quantity,
        }
    }

    fn sort_column(&self) -> &'static str {
        match self {
            TopProductsOrder::Quantity => "total_quantity",
            TopProductsOrder::Revenue => "total_revenue",
        }
    }
}

/// Revenue summary: order count, total and average ticket.
pub fn revenue(
    window: DateWindow,
    store_id: Option<i64>,
    channel_id: Option<i64>,
) -> CompiledQuery {
    let mut params = ParamList::new();
    let (start, end) = window.push_bounds(&mut params);

    let mut conditions = vec![
        "s.sale_status_desc = 'COMPLETED'".to_string(),
        format!("s.created_at >= {}", start),
        format!("s.created_at < {}", end),
    ];
    if let Some(store_id) = store_id {
        let placeholder = params.push(SqlValue::Int(store_id));
        conditions.push(format!("s.store_id = {}", placeholder));
    }
    if let Some(channel_id) = channel_id {
        let placeholder = params.push(SqlValue::Int(channel_id));
        conditions.push(format!("s.channel_id = {}", placeholder));
    }

    let sql = format!(
        "SELECT COUNT(*)::bigint AS total_orders, \
         COALESCE(SUM(s.total_amount), 0)::numeric AS total_revenue, \
         COALESCE(AVG(s.total_amount), 0)::numeric AS avg_ticket \
         FROM sales s WHERE {}",
        conditions.join(" AND ")
    );

    CompiledQuery {
        sql,
        params: params.into_values(),
    }
}

/// Top products by quantity or revenue. Ordering and limiting happen in SQL.
pub fn top_products(window: DateWindow, limit: u32, order: TopProductsOrder) -> CompiledQuery {
    let mut params = ParamList::new();
    let (start, end) = window.push_bounds(&mut params);
    let limit_placeholder = params.push(SqlValue::Int(i64::from(limit)));

    let sql = format!(
        "SELECT MIN(p.id) AS id, TRIM(p.name) AS product_name, \
         MAX(cat.name) AS category_name, \
         SUM(ps.quantity)::numeric AS total_quantity, \
         SUM(ps.total_price)::numeric AS total_revenue, \
         COUNT(DISTINCT ps.sale_id) AS order_count \
         FROM product_sales ps \
         JOIN sales s ON s.id = ps.sale_id \
         JOIN products p ON p.id = ps.product_id \
         LEFT JOIN categories cat ON cat.id = p.category_id \
         WHERE s.sale_status_desc = 'COMPLETED' \
         AND s.created_at >= {start} AND s.created_at < {end} \
         GROUP BY TRIM(p.name) \
         ORDER BY {sort} DESC \
         LIMIT {limit}",
        start = start,
        end = end,
        sort = order.sort_column(),
        limit = limit_placeholder,
    );

    CompiledQuery {
        sql,
        params: params.into_values(),
    }
}

/// Orders and revenue per hour of day.
pub fn peak_hours(window: DateWindow) -> CompiledQuery {
    let mut params = ParamList::new();
    let (start, end) = window.push_bounds(&mut params);

    let sql = format!(
        "SELECT EXTRACT(HOUR FROM s.created_at)::integer AS hour, \
         COUNT(*)::bigint AS order_count, \
         COALESCE(SUM(s.total_amount), 0)::numeric AS revenue \
         FROM sales s \
         WHERE s.sale_status_desc = 'COMPLETED' \
         AND s.created_at >= {start} AND s.created_at < {end} \
         GROUP BY EXTRACT(HOUR FROM s.created_at)::integer \
         ORDER BY hour",
    );

    CompiledQuery {
        sql,
        params: params.into_values(),
    }
}

/// Per-store totals with operational averages, highest revenue first.
pub fn store_performance(window: DateWindow) -> CompiledQuery {
    let mut params = ParamList::new();
    let (start, end) = window.push_bounds(&mut params);

    let sql = format!(
        "SELECT st.id, st.name AS store_name, st.city, st.state, \
         COUNT(*)::bigint AS total_orders, \
         COALESCE(SUM(s.total_amount), 0)::numeric AS total_revenue, \
         COALESCE(AVG(s.total_amount), 0)::numeric AS avg_ticket, \
         COALESCE(AVG(s.production_seconds), 0)::numeric AS avg_production_time, \
         COALESCE(AVG(s.delivery_seconds), 0)::numeric AS avg_delivery_time \
         FROM sales s \
         JOIN stores st ON st.id = s.store_id \
         WHERE s.sale_status_desc = 'COMPLETED' \
         AND s.created_at >= {start} AND s.created_at < {end} \
         GROUP BY st.id, st.name, st.city, st.state \
         ORDER BY total_revenue DESC",
    );

    CompiledQuery {
        sql,
        params: params.into_values(),
    }
}

/// Order and revenue totals per sales channel.
pub fn channel_comparison(window: DateWindow) -> CompiledQuery {
    let mut params = ParamList::new();
    let (start, end) = window.push_bounds(&mut params);

    let sql = format!(
        "SELECT ch.id, ch.name AS channel_name, \
         COUNT(*)::bigint AS total_orders, \
         COALESCE(SUM(s.total_amount), 0)::numeric AS total_revenue, \
         COALESCE(AVG(s.total_amount), 0)::numeric AS avg_ticket \
         FROM sales s \
         JOIN channels ch ON ch.id = s.channel_id \
         WHERE s.sale_status_desc = 'COMPLETED' \
         AND s.created_at >= {start} AND s.created_at < {end} \
         GROUP BY ch.id, ch.name \
         ORDER BY total_revenue DESC",
    );

    CompiledQuery {
        sql,
        params: params.into_values(),
    }
}

/// Orders and revenue per calendar day.
pub fn daily_trends(window: DateWindow) -> CompiledQuery {
    let mut params = ParamList::new();
    let (start, end) = window.push_bounds(&mut params);

    let sql = format!(
        "SELECT DATE(s.created_at) AS date, \
         COUNT(*)::bigint AS order_count, \
         COALESCE(SUM(s.total_amount), 0)::numeric AS revenue \
         FROM sales s \
         WHERE s.sale_status_desc = 'COMPLETED' \
         AND s.created_at >= {start} AND s.created_at < {end} \
         GROUP BY DATE(s.created_at) \
         ORDER BY date",
    );

    CompiledQuery {
        sql,
        params: params.into_values(),
    }
}

/// Monthly cohort retention over the last twelve months of activity.
pub fn cohort_retention(cohort_months: i64) -> CompiledQuery {
    let mut params = ParamList::new();
    let months = params.push(SqlValue::Int(cohort_months));

    let sql = format!(
        "WITH customer_cohorts AS ( \
         SELECT c.id AS customer_id, \
         DATE_TRUNC('month', MIN(s.created_at)) AS cohort_month, \
         DATE_TRUNC('month', s.created_at) AS order_month \
         FROM customers c \
         JOIN sales s ON s.customer_id = c.id \
         WHERE s.sale_status_desc = 'COMPLETED' \
         AND s.created_at >= CURRENT_DATE - INTERVAL '12 months' \
         GROUP BY c.id, DATE_TRUNC('month', s.created_at) \
         ), cohort_sizes AS ( \
         SELECT cohort_month, COUNT(DISTINCT customer_id) AS cohort_size \
         FROM customer_cohorts GROUP BY cohort_month \
         ), retention_data AS ( \
         SELECT cc.cohort_month, cc.order_month, \
         COUNT(DISTINCT cc.customer_id) AS returning_customers, \
         EXTRACT(MONTH FROM AGE(cc.order_month, cc.cohort_month))::integer AS months_since_cohort \
         FROM customer_cohorts cc GROUP BY cc.cohort_month, cc.order_month \
         ) \
         SELECT TO_CHAR(rd.cohort_month, 'YYYY-MM') AS cohort, \
         cs.cohort_size, rd.months_since_cohort AS month, \
         rd.returning_customers, \
         ROUND((rd.returning_customers::numeric / cs.cohort_size * 100), 2) AS retention_rate \
         FROM retention_data rd \
         JOIN cohort_sizes cs ON cs.cohort_month = rd.cohort_month \
         WHERE rd.months_since_cohort <= {months} \
         ORDER BY rd.cohort_month DESC, rd.months_since_cohort",
    );

    CompiledQuery {
        sql,
        params: params.into_values(),
    }
}

/// Market-basket pairs over the last 90 days: support, confidence and lift.
pub fn product_affinity(min_support: f64, limit: i64) -> CompiledQuery {
    let mut params = ParamList::new();
    let support = params.push(SqlValue::Float(min_support));
    let limit = params.push(SqlValue::Int(limit));

    let sql = format!(
        "WITH product_pairs AS ( \
         SELECT ps1.product_id AS product_a_id, p1.name AS product_a_name, \
         ps2.product_id AS product_b_id, p2.name AS product_b_name, \
         COUNT(DISTINCT ps1.sale_id) AS pair_count \
         FROM product_sales ps1 \
         JOIN product_sales ps2 ON ps1.sale_id = ps2.sale_id \
         AND ps1.product_id < ps2.product_id \
         JOIN products p1 ON p1.id = ps1.product_id \
         JOIN products p2 ON p2.id = ps2.product_id \
         JOIN sales s ON s.id = ps1.sale_id \
         WHERE s.sale_status_desc = 'COMPLETED' \
         AND s.created_at >= CURRENT_DATE - INTERVAL '90 days' \
         GROUP BY ps1.product_id, p1.name, ps2.product_id, p2.name \
         ), product_counts AS ( \
         SELECT ps.product_id, COUNT(DISTINCT ps.sale_id) AS order_count \
         FROM product_sales ps \
         JOIN sales s ON s.id = ps.sale_id \
         WHERE s.sale_status_desc = 'COMPLETED' \
         AND s.created_at >= CURRENT_DATE - INTERVAL '90 days' \
         GROUP BY ps.product_id \
         ), total_orders AS ( \
         SELECT COUNT(DISTINCT id) AS total FROM sales \
         WHERE sale_status_desc = 'COMPLETED' \
         AND created_at >= CURRENT_DATE - INTERVAL '90 days' \
         ) \
         SELECT pp.product_a_name, pp.product_b_name, pp.pair_count, \
         pc1.order_count AS product_a_count, pc2.order_count AS product_b_count, \
         t.total AS total_orders, \
         ROUND((pp.pair_count::numeric / t.total), 4) AS support, \
         ROUND((pp.pair_count::numeric / pc1.order_count), 4) AS confidence_a_to_b, \
         ROUND((pp.pair_count::numeric / pc2.order_count), 4) AS confidence_b_to_a, \
         ROUND((pp.pair_count::numeric / t.total) / \
         ((pc1.order_count::numeric / t.total) * (pc2.order_count::numeric / t.total)), 4) AS lift \
         FROM product_pairs pp \
         JOIN product_counts pc1 ON pc1.product_id = pp.product_a_id \
         JOIN product_counts pc2 ON pc2.product_id = pp.product_b_id \
         CROSS JOIN total_orders t \
         WHERE (pp.pair_count::numeric / t.total) >= {support} \
         ORDER BY lift DESC, pair_count DESC \
         LIMIT {limit}",
    );

    CompiledQuery {
        sql,
        params: params.into_values(),
    }
}

/// Customers active in the window: lifetime and in-window totals plus a
/// churn-risk flag (regulars whose last order predates the 30-day cutoff).
pub fn customers(window: DateWindow, channel_ids: &[i64]) -> CompiledQuery {
    let mut params = ParamList::new();
    let (start, end) = window.push_bounds(&mut params);

    let mut period_conditions = vec![
        "s.sale_status_desc = 'COMPLETED'".to_string(),
        format!("s.created_at >= {}", start),
        format!("s.created_at < {}", end),
        "s.customer_id IS NOT NULL".to_string(),
    ];
    if !channel_ids.is_empty() {
        let placeholders: Vec<String> = channel_ids
            .iter()
            .map(|id| params.push(SqlValue::Int(*id)))
            .collect();
        period_conditions.push(format!("s.channel_id IN ({})", placeholders.join(", ")));
    }

    // Both cutoffs derive from the inclusive period end; saturate at the
    // calendar minimum rather than underflow on extreme windows.
    let period_end = window
        .end_exclusive
        .checked_sub_signed(Duration::days(1))
        .unwrap_or(NaiveDate::MIN);
    let churn_cutoff = period_end
        .checked_sub_signed(Duration::days(30))
        .unwrap_or(NaiveDate::MIN);
    let churn = params.push(SqlValue::Date(churn_cutoff));
    let period_end = params.push(SqlValue::Date(period_end));

    let sql = format!(
        "WITH period_stats AS ( \
         SELECT s.customer_id, \
         COUNT(DISTINCT s.id) AS orders_in_period, \
         COALESCE(SUM(s.total_amount), 0)::numeric AS spent_in_period \
         FROM sales s WHERE {conditions} \
         GROUP BY s.customer_id \
         ) \
         SELECT c.id AS customer_id, c.customer_name, c.email, c.phone_number, \
         COUNT(DISTINCT s.id) AS total_orders, \
         COALESCE(SUM(s.total_amount), 0)::numeric AS total_spent, \
         MAX(s.created_at)::date AS last_order_date, \
         ps.orders_in_period, ps.spent_in_period, \
         CASE WHEN COUNT(DISTINCT s.id) >= 3 \
         AND MAX(s.created_at)::date < {churn}::date THEN true \
         ELSE false END AS is_churn_risk, \
         ({period_end}::date - MAX(s.created_at)::date)::integer AS days_since_last_order \
         FROM customers c \
         JOIN period_stats ps ON ps.customer_id = c.id \
         LEFT JOIN sales s ON s.customer_id = c.id \
         AND s.sale_status_desc = 'COMPLETED' \
         GROUP BY c.id, c.customer_name, c.email, c.phone_number, \
         ps.orders_in_period, ps.spent_in_period \
         ORDER BY ps.spent_in_period DESC \
         LIMIT 100",
        conditions = period_conditions.join(" AND "),
        churn = churn,
        period_end = period_end,
    );

    CompiledQuery {
        sql,
        params: params.into_values(),
    }
}

// ============================================================================
// Metadata listings
// ============================================================================

/// Distinct sales channels; duplicate name/type rows collapse to the lowest id.
pub fn meta_channels() -> CompiledQuery {
    CompiledQuery {
        sql: "SELECT DISTINCT ON (name, type) \
              MIN(id) OVER (PARTITION BY name, type) AS id, \
              name, type, description \
              FROM channels ORDER BY name, type, id"
            .to_string(),
        params: Vec::new(),
    }
}

/// Active stores.
pub fn meta_stores() -> CompiledQuery {
    CompiledQuery {
        sql: "SELECT id, name, city, state FROM stores \
              WHERE is_active = true ORDER BY name, city"
            .to_string(),
        params: Vec::new(),
    }
}

/// Product catalog with category names, optionally narrowed by a name search.
pub fn meta_products(search: Option<&str>, limit: i64) -> CompiledQuery {
    let mut params = ParamList::new();
    let mut sql = String::from(
        "SELECT DISTINCT p.id, p.name, c.name AS category \
         FROM products p \
         LEFT JOIN categories c ON c.id = p.category_id",
    );
    if let Some(search) = search {
        let placeholder = params.push(SqlValue::Text(format!("%{}%", search)));
        sql.push_str(&format!(" WHERE p.name ILIKE {}", placeholder));
    }
    let limit = params.push(SqlValue::Int(limit));
    sql.push_str(&format!(" ORDER BY p.name LIMIT {}", limit));

    CompiledQuery {
        sql,
        params: params.into_values(),
    }
}

/// Column catalog for one table, from information_schema. Callers gate the
/// table name against the registry whitelist; it is still bound, never spliced.
pub fn table_columns(table: &str) -> CompiledQuery {
    let mut params = ParamList::new();
    let table = params.push(SqlValue::Text(table.to_string()));

    let sql = format!(
        "SELECT column_name AS name, data_type AS type, \
         (is_nullable = 'YES') AS nullable \
         FROM information_schema.columns \
         WHERE table_schema = 'public' AND table_name = {} \
         ORDER BY ordinal_position",
        table,
    );

    CompiledQuery {
        sql,
        params: params.into_values(),
    }
}
