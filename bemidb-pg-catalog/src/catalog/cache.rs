//! In-process snapshot of the lakehouse catalog metadata.
//!
//! A snapshot is built from the engine's introspection views and swapped
//! in atomically; readers always observe a consistent version. A failed
//! rebuild leaves the previous snapshot intact.

use std::collections::HashMap;
use std::sync::Arc;

use lake_pg::{EngineValue, LakeEngine, QueryResult};
use log::warn;
use tokio::sync::RwLock;

use super::mirror::CatalogMirror;
use crate::config::CatalogConfig;
use crate::error::RewriteResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub name: String,
    pub type_text: String,
    /// 1-based, dense within a table.
    pub ordinal: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub oid: u32,
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeyCandidate {
    pub oid: u32,
    pub constraint_name: String,
    pub table_oid: u32,
    pub table_name: String,
    pub column_name: String,
    pub column_index: i16,
}

/// Mirror of an upstream `pg_type` row for base and domain types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMetadata {
    pub oid: u32,
    pub name: String,
    pub typtype: String,
    pub category: String,
    pub base_type: u32,
    pub not_null: bool,
    pub typmod: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrDefault {
    pub adrelid: u32,
    pub adnum: i16,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescription {
    pub objoid: u32,
    pub classoid: u32,
    pub objsubid: i32,
    pub description: String,
}

#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    pub tables: Vec<TableMetadata>,
    pub table_oids: HashMap<String, u32>,
    pub columns: HashMap<String, Vec<ColumnMetadata>>,
    pub pk_candidates: HashMap<String, PrimaryKeyCandidate>,
    pub types: Vec<TypeMetadata>,
    pub attr_defaults: Vec<AttrDefault>,
    pub descriptions: Vec<ObjectDescription>,
}

impl CatalogSnapshot {
    pub fn table(&self, name: &str) -> Option<&TableMetadata> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn has_table(&self, namespace: &str, name: &str) -> bool {
        self.tables
            .iter()
            .any(|t| t.name == name && t.namespace == namespace)
    }

    pub fn namespaces(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for table in &self.tables {
            if !seen.contains(&table.namespace) {
                seen.push(table.namespace.clone());
            }
        }
        seen
    }
}

/// FNV-1a 32-bit hash folded into the positive 31-bit OID space.
pub fn synthesized_oid(name: &str) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 16_777_619;

    let mut hash = OFFSET_BASIS;
    for byte in name.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    match hash % 0x7fff_ffff {
        0 => 0x7fff_fffe,
        oid => oid,
    }
}

pub struct CatalogCache {
    config: CatalogConfig,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
    mirror: RwLock<Arc<CatalogMirror>>,
}

impl CatalogCache {
    pub fn new(config: CatalogConfig) -> Self {
        CatalogCache {
            config,
            snapshot: RwLock::new(Arc::new(CatalogSnapshot::default())),
            mirror: RwLock::new(Arc::new(CatalogMirror::default())),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Current snapshot; cheap to clone and safe to iterate while a
    /// rebuild swaps in a newer one.
    pub async fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Relational mirror of the current snapshot; read-only between
    /// rebuilds.
    pub async fn mirror(&self) -> Arc<CatalogMirror> {
        self.mirror.read().await.clone()
    }

    /// Build a fresh snapshot from the engine and swap it (and its
    /// mirror) in. Idempotent; on failure the previous snapshot stays.
    pub async fn rebuild(&self, engine: &dyn LakeEngine) -> RewriteResult<()> {
        let snapshot = build_snapshot(engine, &self.config).await?;
        let mirror = CatalogMirror::from_snapshot(&snapshot);
        *self.snapshot.write().await = Arc::new(snapshot);
        *self.mirror.write().await = Arc::new(mirror);
        Ok(())
    }

    pub async fn table_oid(&self, table: &str) -> Option<u32> {
        self.snapshot().await.table_oids.get(table).copied()
    }

    pub async fn table_columns(&self, table: &str) -> Option<Vec<ColumnMetadata>> {
        self.snapshot().await.columns.get(table).cloned()
    }

    pub async fn primary_key(&self, table: &str) -> Option<PrimaryKeyCandidate> {
        self.snapshot().await.pk_candidates.get(table).cloned()
    }

    pub async fn has_table(&self, namespace: &str, table: &str) -> bool {
        self.snapshot().await.has_table(namespace, table)
    }

    pub async fn tables(&self) -> Vec<TableMetadata> {
        self.snapshot().await.tables.clone()
    }

    pub async fn primary_keys(&self) -> Vec<PrimaryKeyCandidate> {
        let snapshot = self.snapshot().await;
        let mut keys: Vec<PrimaryKeyCandidate> = snapshot.pk_candidates.values().cloned().collect();
        keys.sort_by(|a, b| a.table_name.cmp(&b.table_name));
        keys
    }

    pub async fn types(&self) -> Vec<TypeMetadata> {
        self.snapshot().await.types.clone()
    }

    pub async fn attr_defaults(&self) -> Vec<AttrDefault> {
        self.snapshot().await.attr_defaults.clone()
    }

    pub async fn descriptions(&self) -> Vec<ObjectDescription> {
        self.snapshot().await.descriptions.clone()
    }
}

async fn build_snapshot(
    engine: &dyn LakeEngine,
    config: &CatalogConfig,
) -> RewriteResult<CatalogSnapshot> {
    let mut snapshot = CatalogSnapshot::default();

    load_tables(engine, config, &mut snapshot).await?;
    load_columns(engine, config, &mut snapshot).await?;
    load_types(engine, &mut snapshot).await?;

    // Both are best-effort: older engines lack these catalogs entirely.
    if let Err(e) = load_attr_defaults(engine, &mut snapshot).await {
        warn!("skipping pg_attrdef mirror: {e}");
    }
    if let Err(e) = load_descriptions(engine, &mut snapshot).await {
        warn!("skipping pg_description mirror: {e}");
    }

    Ok(snapshot)
}

async fn load_tables(
    engine: &dyn LakeEngine,
    config: &CatalogConfig,
    snapshot: &mut CatalogSnapshot,
) -> RewriteResult<()> {
    let sql = format!(
        "SELECT t.schema_name, t.table_name, c.column_name \
         FROM duckdb_tables() t \
         LEFT JOIN duckdb_columns() c \
           ON c.database_name = t.database_name \
          AND c.schema_name = t.schema_name \
          AND c.table_name = t.table_name \
          AND (c.column_name = 'id' OR c.column_name LIKE '%\\_id' ESCAPE '\\') \
         WHERE t.database_name = '{catalog}' \
           AND t.table_name NOT LIKE 'ducklake\\_%' ESCAPE '\\' \
         ORDER BY t.schema_name, t.table_name, c.column_name",
        catalog = config.catalog_name
    );
    let result = engine.query(&sql).await?;

    // (namespace, table) -> candidate PK column names, lexicographic
    let mut candidates: Vec<(String, String, Vec<String>)> = Vec::new();
    for row in &result.rows {
        let namespace = text_at(row, 0);
        let table = text_at(row, 1);
        let column = match row.get(2) {
            Some(EngineValue::Null) | None => None,
            Some(v) => Some(value_text(v)),
        };
        match candidates.last_mut() {
            Some((ns, t, cols)) if *ns == namespace && *t == table => {
                if let Some(column) = column {
                    cols.push(column);
                }
            }
            _ => {
                let cols = column.map(|c| vec![c]).unwrap_or_default();
                candidates.push((namespace, table, cols));
            }
        }
    }

    for (namespace, table, pk_columns) in candidates {
        let oid = synthesized_oid(&table);
        snapshot.table_oids.insert(table.clone(), oid);
        snapshot.tables.push(TableMetadata {
            oid,
            name: table.clone(),
            namespace,
        });

        let candidate = pk_columns
            .iter()
            .find(|c| c.as_str() == "id")
            .or_else(|| pk_columns.iter().find(|c| c.ends_with("_id")));
        if let Some(column_name) = candidate {
            let constraint_name = format!("{table}_pkey");
            snapshot.pk_candidates.insert(
                table.clone(),
                PrimaryKeyCandidate {
                    oid: synthesized_oid(&constraint_name),
                    constraint_name,
                    table_oid: oid,
                    table_name: table.clone(),
                    column_name: column_name.clone(),
                    column_index: 1,
                },
            );
        }
    }

    Ok(())
}

async fn load_columns(
    engine: &dyn LakeEngine,
    config: &CatalogConfig,
    snapshot: &mut CatalogSnapshot,
) -> RewriteResult<()> {
    let sql = format!(
        "SELECT table_name, column_name, data_type, \
                row_number() OVER (PARTITION BY schema_name, table_name ORDER BY column_index) AS ordinal \
         FROM duckdb_columns() \
         WHERE database_name = '{catalog}' \
           AND table_name NOT LIKE 'ducklake\\_%' ESCAPE '\\' \
         ORDER BY schema_name, table_name, ordinal",
        catalog = config.catalog_name
    );
    let result = engine.query(&sql).await?;

    for row in &result.rows {
        let table = text_at(row, 0);
        if !snapshot.table_oids.contains_key(&table) {
            continue;
        }
        snapshot
            .columns
            .entry(table)
            .or_default()
            .push(ColumnMetadata {
                name: text_at(row, 1),
                type_text: text_at(row, 2),
                ordinal: int_at(row, 3) as i32,
            });
    }

    Ok(())
}

async fn load_types(engine: &dyn LakeEngine, snapshot: &mut CatalogSnapshot) -> RewriteResult<()> {
    let sql = "SELECT oid, typname, typtype, typcategory, typbasetype, typnotnull, typtypmod \
               FROM pg_catalog.pg_type WHERE typtype IN ('b', 'd')";
    let result = engine.query(sql).await?;

    for row in &result.rows {
        snapshot.types.push(TypeMetadata {
            oid: int_at(row, 0) as u32,
            name: text_at(row, 1),
            typtype: text_at(row, 2),
            category: text_at(row, 3),
            base_type: int_at(row, 4) as u32,
            not_null: bool_at(row, 5),
            typmod: int_at(row, 6) as i32,
        });
    }

    Ok(())
}

async fn load_attr_defaults(
    engine: &dyn LakeEngine,
    snapshot: &mut CatalogSnapshot,
) -> RewriteResult<()> {
    let sql = "SELECT adrelid, adnum, pg_catalog.pg_get_expr(adbin, adrelid) \
               FROM pg_catalog.pg_attrdef";
    let result = engine.query(sql).await?;
    for row in &result.rows {
        snapshot.attr_defaults.push(AttrDefault {
            adrelid: int_at(row, 0) as u32,
            adnum: int_at(row, 1) as i16,
            expression: text_at(row, 2),
        });
    }
    Ok(())
}

async fn load_descriptions(
    engine: &dyn LakeEngine,
    snapshot: &mut CatalogSnapshot,
) -> RewriteResult<()> {
    let sql = "SELECT objoid, classoid, objsubid, description FROM pg_catalog.pg_description";
    let result = engine.query(sql).await?;
    for row in &result.rows {
        snapshot.descriptions.push(ObjectDescription {
            objoid: int_at(row, 0) as u32,
            classoid: int_at(row, 1) as u32,
            objsubid: int_at(row, 2) as i32,
            description: text_at(row, 3),
        });
    }
    Ok(())
}

fn value_text(value: &EngineValue) -> String {
    match value {
        EngineValue::Text(s) => s.clone(),
        other => lake_pg::encoder::text_value(other).unwrap_or_default(),
    }
}

fn text_at(row: &[EngineValue], idx: usize) -> String {
    row.get(idx).map(value_text).unwrap_or_default()
}

fn int_at(row: &[EngineValue], idx: usize) -> i64 {
    match row.get(idx) {
        Some(EngineValue::Int16(v)) => i64::from(*v),
        Some(EngineValue::Int32(v)) => i64::from(*v),
        Some(EngineValue::Int64(v)) => *v,
        Some(EngineValue::Text(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

fn bool_at(row: &[EngineValue], idx: usize) -> bool {
    match row.get(idx) {
        Some(EngineValue::Bool(b)) => *b,
        Some(EngineValue::Text(s)) => s == "t" || s == "true",
        _ => false,
    }
}

/// Materialized variant of an engine result for scripting tests and
/// bootstrap helpers.
pub fn rows(columns: &[(&str, &str)], data: Vec<Vec<EngineValue>>) -> QueryResult {
    QueryResult::new(
        columns
            .iter()
            .map(|(name, type_text)| lake_pg::EngineColumn::new(*name, *type_text))
            .collect(),
        data,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lake_pg::mock::MockEngine;

    fn text(s: &str) -> EngineValue {
        EngineValue::Text(s.to_string())
    }

    fn scripted_engine() -> MockEngine {
        MockEngine::new()
            .with_result(
                "duckdb_tables()",
                rows(
                    &[
                        ("schema_name", "VARCHAR"),
                        ("table_name", "VARCHAR"),
                        ("column_name", "VARCHAR"),
                    ],
                    vec![
                        vec![text("postgres"), text("test_table"), text("id")],
                        vec![text("postgres"), text("test_table"), text("user_id")],
                        vec![text("postgres"), text("users"), text("account_id")],
                        vec![text("postgres"), text("users"), text("zone_id")],
                        vec![text("postgres"), text("logs"), EngineValue::Null],
                    ],
                ),
            )
            .with_result(
                "duckdb_columns()",
                rows(
                    &[
                        ("table_name", "VARCHAR"),
                        ("column_name", "VARCHAR"),
                        ("data_type", "VARCHAR"),
                        ("ordinal", "BIGINT"),
                    ],
                    vec![
                        vec![
                            text("test_table"),
                            text("id"),
                            text("BIGINT"),
                            EngineValue::Int64(1),
                        ],
                        vec![
                            text("test_table"),
                            text("bit_column"),
                            text("VARCHAR"),
                            EngineValue::Int64(2),
                        ],
                        vec![
                            text("users"),
                            text("account_id"),
                            text("BIGINT"),
                            EngineValue::Int64(1),
                        ],
                        vec![
                            text("logs"),
                            text("message"),
                            text("VARCHAR"),
                            EngineValue::Int64(1),
                        ],
                    ],
                ),
            )
            .with_result(
                "pg_catalog.pg_type",
                rows(
                    &[
                        ("oid", "BIGINT"),
                        ("typname", "VARCHAR"),
                        ("typtype", "VARCHAR"),
                        ("typcategory", "VARCHAR"),
                        ("typbasetype", "BIGINT"),
                        ("typnotnull", "BOOLEAN"),
                        ("typtypmod", "INTEGER"),
                    ],
                    vec![vec![
                        EngineValue::Int64(23),
                        text("int4"),
                        text("b"),
                        text("N"),
                        EngineValue::Int64(0),
                        EngineValue::Bool(false),
                        EngineValue::Int32(-1),
                    ]],
                ),
            )
    }

    #[tokio::test]
    async fn test_rebuild_builds_consistent_snapshot() {
        let engine = scripted_engine();
        let cache = CatalogCache::new(CatalogConfig::default());
        cache.rebuild(&engine).await.unwrap();

        let snapshot = cache.snapshot().await;
        assert_eq!(snapshot.tables.len(), 3);
        for table in &snapshot.tables {
            assert!(table.oid > 0);
            assert_eq!(snapshot.table_oids.get(&table.name), Some(&table.oid));
        }
        for name in snapshot.columns.keys() {
            assert!(snapshot.table(name).is_some());
        }
        assert!(snapshot.has_table("postgres", "test_table"));
        assert!(!snapshot.has_table("public", "test_table"));
    }

    #[tokio::test]
    async fn test_pk_candidate_rule() {
        let engine = scripted_engine();
        let cache = CatalogCache::new(CatalogConfig::default());
        cache.rebuild(&engine).await.unwrap();

        // `id` wins over any `*_id`
        let pk = cache.primary_key("test_table").await.unwrap();
        assert_eq!(pk.column_name, "id");
        assert_eq!(pk.constraint_name, "test_table_pkey");
        assert_eq!(pk.column_index, 1);
        assert_eq!(pk.table_oid, cache.table_oid("test_table").await.unwrap());

        // first `*_id` in lexicographic order
        let pk = cache.primary_key("users").await.unwrap();
        assert_eq!(pk.column_name, "account_id");

        // no candidate at all
        assert!(cache.primary_key("logs").await.is_none());
    }

    #[tokio::test]
    async fn test_rebuild_refreshes_the_mirror() {
        let cache = CatalogCache::new(CatalogConfig::default());
        assert!(cache.mirror().await.classes().is_empty());

        cache.rebuild(&scripted_engine()).await.unwrap();
        let mirror = cache.mirror().await;
        assert_eq!(
            mirror.table_oid("postgres", "test_table"),
            cache.table_oid("test_table").await
        );
        assert!(!mirror.attributes().is_empty());
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_snapshot() {
        let cache = CatalogCache::new(CatalogConfig::default());
        cache.rebuild(&scripted_engine()).await.unwrap();
        let before = cache.snapshot().await;

        let broken = MockEngine::new().with_error("duckdb_tables()", "catalog unavailable");
        assert!(cache.rebuild(&broken).await.is_err());

        let after = cache.snapshot().await;
        assert_eq!(before.tables, after.tables);
    }

    #[test]
    fn test_synthesized_oid_is_stable_and_positive() {
        let a = synthesized_oid("test_table");
        assert!(a > 0);
        assert_eq!(a, synthesized_oid("test_table"));
        assert_ne!(a, synthesized_oid("test_table2"));
        assert_ne!(a, synthesized_oid("test_table_pkey"));
    }
}
