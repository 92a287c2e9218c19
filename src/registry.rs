//! Field registry: the whitelist of queryable tables and their columns.
//!
//! The registry is the single source of truth preventing arbitrary column or
//! table access through the dynamic query endpoint. It is built once at
//! process start from a fixed literal table and shared read-only across
//! requests; there is no dynamic reconfiguration.
//!
//! Field references come in two shapes:
//!
//! - `column` — bare, resolved against the base `sales` table only
//! - `alias.column` — qualified by a registered table alias (`st.city`)

use once_cell::sync::Lazy;

use crate::error::{QueryError, QueryResult};
use crate::sanitize;

/// Table every query anchors on.
pub const BASE_TABLE: &str = "sales";

/// Alias the base table is always rendered under.
pub const BASE_ALIAS: &str = "s";

/// One whitelisted table: its short alias and permitted columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableEntry {
    pub name: &'static str,
    pub alias: &'static str,
    pub columns: &'static [&'static str],
}

impl TableEntry {
    pub fn permits(&self, column: &str) -> bool {
        self.columns.contains(&column)
    }
}

/// A field reference resolved against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    pub table: &'static str,
    pub alias: &'static str,
    pub column: String,
}

impl ResolvedField {
    /// SQL rendering, always qualified by the table alias.
    pub fn render(&self) -> String {
        format!("{}.{}", self.alias, self.column)
    }

    pub fn is_base(&self) -> bool {
        self.table == BASE_TABLE
    }
}

/// Immutable whitelist of queryable tables.
///
/// Entries keep a fixed declaration order so everything derived from the
/// registry (join emission in particular) is deterministic.
#[derive(Debug)]
pub struct FieldRegistry {
    tables: Vec<TableEntry>,
}

static REGISTRY: Lazy<FieldRegistry> = Lazy::new(FieldRegistry::builtin);

impl FieldRegistry {
    /// Process-wide shared registry.
    pub fn shared() -> &'static FieldRegistry {
        &REGISTRY
    }

    fn builtin() -> Self {
        Self {
            tables: vec![
                TableEntry {
                    name: "sales",
                    alias: "s",
                    columns: &[
                        "id",
                        "store_id",
                        "customer_id",
                        "channel_id",
                        "sub_brand_id",
                        "created_at",
                        "total_amount",
                        "total_discount",
                        "total_increase",
                        "total_amount_items",
                        "delivery_fee",
                        "service_tax_fee",
                        "sale_status_desc",
                        "production_seconds",
                        "delivery_seconds",
                        "people_quantity",
                        "value_paid",
                        "cod_sale1",
                        "cod_sale2",
                        "customer_name",
                        "discount_reason",
                        "increase_reason",
                        "origin",
                    ],
                },
                TableEntry {
                    name: "stores",
                    alias: "st",
                    columns: &[
                        "id",
                        "name",
                        "city",
                        "state",
                        "district",
                        "address_street",
                        "address_number",
                        "zipcode",
                        "latitude",
                        "longitude",
                        "is_active",
                        "is_own",
                        "is_holding",
                        "creation_date",
                        "brand_id",
                        "sub_brand_id",
                    ],
                },
                TableEntry {
                    name: "customers",
                    alias: "c",
                    columns: &[
                        "id",
                        "customer_name",
                        "email",
                        "phone_number",
                        "cpf",
                        "birth_date",
                        "gender",
                        "store_id",
                        "sub_brand_id",
                        "registration_origin",
                        "agree_terms",
                        "receive_promotions_email",
                        "receive_promotions_sms",
                        "created_at",
                    ],
                },
                TableEntry {
                    name: "channels",
                    alias: "ch",
                    columns: &["id", "name", "description", "type", "brand_id", "created_at"],
                },
                TableEntry {
                    name: "products",
                    alias: "p",
                    columns: &[
                        "id",
                        "name",
                        "brand_id",
                        "sub_brand_id",
                        "category_id",
                        "pos_uuid",
                        "deleted_at",
                    ],
                },
                TableEntry {
                    name: "categories",
                    alias: "cat",
                    columns: &[
                        "id",
                        "name",
                        "type",
                        "brand_id",
                        "sub_brand_id",
                        "pos_uuid",
                        "deleted_at",
                    ],
                },
                TableEntry {
                    name: "product_sales",
                    alias: "ps",
                    columns: &[
                        "id",
                        "sale_id",
                        "product_id",
                        "quantity",
                        "base_price",
                        "total_price",
                        "observations",
                    ],
                },
                TableEntry {
                    name: "brands",
                    alias: "b",
                    columns: &["id", "name", "created_at"],
                },
                TableEntry {
                    name: "sub_brands",
                    alias: "sb",
                    columns: &["id", "brand_id", "name", "created_at"],
                },
            ],
        }
    }

    /// All whitelisted tables, in declaration order.
    pub fn tables(&self) -> impl Iterator<Item = &TableEntry> {
        self.tables.iter()
    }

    pub fn table(&self, name: &str) -> Option<&TableEntry> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_by_alias(&self, alias: &str) -> Option<&TableEntry> {
        self.tables.iter().find(|t| t.alias == alias)
    }

    /// Resolve a field reference (`column` or `alias.column`).
    ///
    /// Bare names resolve against the base table only; qualified names must
    /// use a registered alias and one of that table's permitted columns.
    pub fn resolve(&self, field_ref: &str) -> QueryResult<ResolvedField> {
        let field_ref = field_ref.trim();
        sanitize::check_field_syntax(field_ref)?;

        if let Some((alias, column)) = field_ref.split_once('.') {
            if column.contains('.') {
                return Err(QueryError::unknown_field(field_ref, "invalid field format"));
            }
            let table = self.table_by_alias(alias).ok_or_else(|| {
                QueryError::unknown_field(field_ref, format!("unknown table alias '{}'", alias))
            })?;
            if !table.permits(column) {
                return Err(QueryError::unknown_field(
                    field_ref,
                    format!("column '{}' not allowed in table '{}'", column, table.name),
                ));
            }
            Ok(ResolvedField {
                table: table.name,
                alias: table.alias,
                column: column.to_string(),
            })
        } else {
            let base = self
                .table(BASE_TABLE)
                .ok_or_else(|| QueryError::unknown_field(field_ref, "no base table registered"))?;
            if !base.permits(field_ref) {
                return Err(QueryError::unknown_field(
                    field_ref,
                    format!("field not allowed on table '{}'", BASE_TABLE),
                ));
            }
            Ok(ResolvedField {
                table: base.name,
                alias: base.alias,
                column: field_ref.to_string(),
            })
        }
    }
}
