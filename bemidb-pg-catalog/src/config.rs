/// Catalog-facing slice of the gateway configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Database name clients connect to; also reported by `pg_database`.
    pub database: String,
    /// Role reported by the emulated `pg_shadow` / `pg_user` views.
    pub user: String,
    /// Name the lakehouse catalog is attached under inside the engine.
    pub catalog_name: String,
    /// The engine's default schema, home of emulated tables and macros.
    pub default_schema: String,
    /// Drop the `psql \d` publication WHERE clause the engine cannot plan.
    pub drop_describe_where_workaround: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            database: "bemidb".to_string(),
            user: "bemidb".to_string(),
            catalog_name: "lakehouse".to_string(),
            default_schema: "main".to_string(),
            drop_describe_where_workaround: true,
        }
    }
}

impl CatalogConfig {
    /// Fully qualified engine-side reference for a lakehouse table.
    pub fn engine_table(&self, schema: &str, table: &str) -> String {
        format!("\"{}\".\"{}\".\"{}\"", self.catalog_name, schema, table)
    }
}
