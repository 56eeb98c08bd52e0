use std::sync::Arc;

use bemidb_pg_catalog::catalog::CatalogCache;
use bemidb_pg_catalog::matview::MaterializedViewStore;
use bemidb_pg_catalog::{
    CatalogConfig, MemoryMaterializedViewStore, QueryRewriter, RewriteError, NOOP_STATEMENT,
};
use lake_pg::mock::MockEngine;
use lake_pg::{EngineColumn, EngineValue, QueryResult};

fn text(s: &str) -> EngineValue {
    EngineValue::Text(s.to_string())
}

fn introspection_engine() -> MockEngine {
    MockEngine::new()
        .with_result(
            "duckdb_tables()",
            QueryResult::new(
                vec![
                    EngineColumn::new("schema_name", "VARCHAR"),
                    EngineColumn::new("table_name", "VARCHAR"),
                    EngineColumn::new("column_name", "VARCHAR"),
                ],
                vec![
                    vec![text("postgres"), text("test_table"), text("id")],
                    vec![text("main"), text("events"), EngineValue::Null],
                ],
            ),
        )
        .with_result(
            "duckdb_columns()",
            QueryResult::new(
                vec![
                    EngineColumn::new("table_name", "VARCHAR"),
                    EngineColumn::new("column_name", "VARCHAR"),
                    EngineColumn::new("data_type", "VARCHAR"),
                    EngineColumn::new("ordinal", "BIGINT"),
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
                        text("events"),
                        text("payload"),
                        text("JSON"),
                        EngineValue::Int64(1),
                    ],
                ],
            ),
        )
}

struct Fixture {
    engine: Arc<MockEngine>,
    store: Arc<MemoryMaterializedViewStore>,
    rewriter: QueryRewriter,
}

async fn fixture() -> Fixture {
    let engine = Arc::new(introspection_engine());
    let cache = Arc::new(CatalogCache::new(CatalogConfig::default()));
    cache.rebuild(&*engine).await.expect("cache builds");
    let store = Arc::new(MemoryMaterializedViewStore::new());
    let rewriter = QueryRewriter::new(engine.clone(), cache, store.clone());
    Fixture {
        engine,
        store,
        rewriter,
    }
}

#[tokio::test]
async fn test_user_table_becomes_direct_engine_reference() {
    let f = fixture().await;
    let out = f
        .rewriter
        .parse_and_remap("SELECT COUNT(*) AS count FROM postgres.test_table")
        .await
        .unwrap();
    assert_eq!(out.rewritten.len(), 1);
    assert!(
        out.rewritten[0].contains("lakehouse.postgres.test_table"),
        "got: {}",
        out.rewritten[0]
    );
    assert!(out.rewritten[0].contains("postgres_test_table"));
    assert!(out.originals[0].contains("postgres.test_table"));
}

#[tokio::test]
async fn test_public_schema_normalizes_to_engine_default() {
    let f = fixture().await;
    let out = f
        .rewriter
        .parse_and_remap("SELECT * FROM events")
        .await
        .unwrap();
    assert!(
        out.rewritten[0].contains("lakehouse.main.events"),
        "got: {}",
        out.rewritten[0]
    );
}

#[tokio::test]
async fn test_missing_table_fails_after_one_refresh() {
    let f = fixture().await;
    let err = f
        .rewriter
        .parse_and_remap("SELECT * FROM non_existent_table")
        .await
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("Table with name non_existent_table does not exist"));
}

#[tokio::test]
async fn test_emulated_pg_catalog_reference_is_requalified() {
    let f = fixture().await;
    let out = f
        .rewriter
        .parse_and_remap("SELECT usename, passwd FROM pg_catalog.pg_shadow")
        .await
        .unwrap();
    assert!(out.rewritten[0].contains("main.pg_shadow"));

    // tables the engine answers itself stay untouched
    let out = f
        .rewriter
        .parse_and_remap("SELECT * FROM pg_catalog.pg_proc")
        .await
        .unwrap();
    assert!(out.rewritten[0].contains("pg_catalog.pg_proc"));
}

#[tokio::test]
async fn test_pg_class_reference_triggers_refresh() {
    let f = fixture().await;
    f.rewriter
        .parse_and_remap("SELECT relname FROM pg_catalog.pg_class")
        .await
        .unwrap();
    assert!(!f
        .engine
        .executed_matching("CREATE OR REPLACE VIEW main.pg_class")
        .is_empty());
}

#[tokio::test]
async fn test_pg_stat_user_tables_reference_upserts_rows() {
    let f = fixture().await;
    f.rewriter
        .parse_and_remap("SELECT relname FROM pg_catalog.pg_stat_user_tables")
        .await
        .unwrap();
    let upserts = f.engine.executed_matching("INSERT INTO main.pg_stat_user_tables");
    assert_eq!(upserts.len(), 2);
}

#[tokio::test]
async fn test_information_schema_tables_becomes_filtered_subselect() {
    let f = fixture().await;
    let out = f
        .rewriter
        .parse_and_remap("SELECT table_name FROM information_schema.tables")
        .await
        .unwrap();
    assert!(out.rewritten[0].contains("main.information_schema_tables"));
    assert!(out.rewritten[0].contains("ducklake"));
}

#[tokio::test]
async fn test_permissions_restrict_columns() {
    let f = fixture().await;
    let query = "SELECT id, bit_column FROM postgres.test_table \
                 /*BEMIDB_PERMISSIONS {\"postgres.test_table\":[\"id\"]} BEMIDB_PERMISSIONS*/";
    let out = f.rewriter.parse_and_remap(query).await.unwrap();
    assert!(
        out.rewritten[0].contains("SELECT id FROM lakehouse.postgres.test_table"),
        "got: {}",
        out.rewritten[0]
    );
}

#[tokio::test]
async fn test_permissions_deny_unlisted_table() {
    let f = fixture().await;
    let query = "SELECT * FROM postgres.test_table \
                 /*BEMIDB_PERMISSIONS {\"postgres.other\":[\"id\"]} BEMIDB_PERMISSIONS*/";
    let out = f.rewriter.parse_and_remap(query).await.unwrap();
    assert!(
        out.rewritten[0].contains("WHERE false"),
        "got: {}",
        out.rewritten[0]
    );
}

#[tokio::test]
async fn test_permissions_filter_information_schema_columns() {
    let f = fixture().await;
    let query = "SELECT column_name FROM information_schema.columns \
                 /*BEMIDB_PERMISSIONS {\"postgres.test_table\":[\"id\"]} BEMIDB_PERMISSIONS*/";
    let out = f.rewriter.parse_and_remap(query).await.unwrap();
    assert!(out.rewritten[0].contains("'postgres.test_table'"));
    assert!(out.rewritten[0].contains("column_name IN ('id')"));
}

#[tokio::test]
async fn test_set_timezone_passes_through() {
    let f = fixture().await;
    let out = f
        .rewriter
        .parse_and_remap("SET timezone = 'America/New_York'")
        .await
        .unwrap();
    assert!(out.rewritten[0].contains("America/New_York"));
    assert!(out.originals[0].to_uppercase().starts_with("SET"));
}

#[tokio::test]
async fn test_ignored_and_unknown_set_become_noop() {
    let f = fixture().await;
    for sql in [
        "SET statement_timeout = '5s'",
        "SET SESSION CHARACTERISTICS AS TRANSACTION ISOLATION LEVEL READ UNCOMMITTED",
        "SET something_nobody_knows = 42",
    ] {
        let out = f.rewriter.parse_and_remap(sql).await.unwrap();
        assert_eq!(out.rewritten[0], NOOP_STATEMENT, "for {sql}");
        assert!(out.originals[0].to_uppercase().starts_with("SET"));
    }
}

#[tokio::test]
async fn test_transaction_and_discard_are_noops() {
    let f = fixture().await;
    for sql in ["BEGIN", "COMMIT", "ROLLBACK", "DISCARD ALL"] {
        let out = f.rewriter.parse_and_remap(sql).await.unwrap();
        assert_eq!(out.rewritten[0], NOOP_STATEMENT, "for {sql}");
    }
    let out = f.rewriter.parse_and_remap("DISCARD ALL").await.unwrap();
    assert_eq!(out.originals[0], "DISCARD ALL");
}

#[tokio::test]
async fn test_show_uses_static_settings_table() {
    let f = fixture().await;
    let out = f.rewriter.parse_and_remap("SHOW timezone").await.unwrap();
    assert!(out.rewritten[0].contains("current_setting('TimeZone')"));

    let out = f
        .rewriter
        .parse_and_remap("SHOW server_version")
        .await
        .unwrap();
    assert!(out.rewritten[0].contains("17.0"));

    let err = f
        .rewriter
        .parse_and_remap("SHOW nonexistent_setting")
        .await
        .unwrap_err();
    assert!(matches!(err, RewriteError::UnknownSetting(_)));
}

#[tokio::test]
async fn test_unsupported_statement_kind_fails() {
    let f = fixture().await;
    let err = f
        .rewriter
        .parse_and_remap("INSERT INTO t VALUES (1)")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("INSERT"));
}

#[tokio::test]
async fn test_empty_input_yields_no_statements() {
    let f = fixture().await;
    for sql in ["", "   ", ";"] {
        let out = f.rewriter.parse_and_remap(sql).await.unwrap();
        assert!(out.rewritten.is_empty());
        assert!(out.originals.is_empty());
    }
}

#[tokio::test]
async fn test_union_arms_are_both_rewritten() {
    let f = fixture().await;
    let out = f
        .rewriter
        .parse_and_remap(
            "SELECT id FROM postgres.test_table UNION SELECT id FROM postgres.test_table",
        )
        .await
        .unwrap();
    assert_eq!(
        out.rewritten[0]
            .matches("lakehouse.postgres.test_table")
            .count(),
        2
    );
}

#[tokio::test]
async fn test_rewrite_is_idempotent() {
    let f = fixture().await;
    let query = "SELECT t.id FROM postgres.test_table t \
                 WHERE t.id IS NOT NULL AND payload ->> 'k' = 'v' \
                 ORDER BY t.id";
    let first = f.rewriter.parse_and_remap(query).await.unwrap().rewritten;
    let second = f
        .rewriter
        .parse_and_remap(&first[0])
        .await
        .unwrap()
        .rewritten;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_create_materialized_view_persists_and_materializes() {
    let f = fixture().await;
    let out = f
        .rewriter
        .parse_and_remap("CREATE MATERIALIZED VIEW mv AS SELECT id FROM postgres.test_table")
        .await
        .unwrap();
    assert_eq!(out.rewritten[0], NOOP_STATEMENT);
    assert!(out.originals[0].to_uppercase().contains("MATERIALIZED"));

    let stored = f.store.get("public", "mv").await.unwrap().unwrap();
    assert!(stored.definition.contains("postgres.test_table"));

    let creates = f.engine.executed_matching("CREATE OR REPLACE TABLE");
    assert_eq!(creates.len(), 1);
    assert!(creates[0].contains("\"lakehouse\".\"public\".\"mv\""));
    assert!(creates[0].contains("lakehouse.postgres.test_table"));
}

#[tokio::test]
async fn test_create_materialized_view_with_no_data_skips_refresh() {
    let f = fixture().await;
    f.rewriter
        .parse_and_remap("CREATE MATERIALIZED VIEW mv AS SELECT id FROM postgres.test_table WITH NO DATA")
        .await
        .unwrap();
    assert!(f.store.get("public", "mv").await.unwrap().is_some());
    assert!(f.engine.executed_matching("CREATE OR REPLACE TABLE").is_empty());
}

#[tokio::test]
async fn test_duplicate_materialized_view() {
    let f = fixture().await;
    let create = "CREATE MATERIALIZED VIEW mv AS SELECT id FROM postgres.test_table";
    f.rewriter.parse_and_remap(create).await.unwrap();

    let err = f.rewriter.parse_and_remap(create).await.unwrap_err();
    assert!(err.to_string().contains("already exists"));

    // IF NOT EXISTS tolerates the duplicate
    f.rewriter
        .parse_and_remap(
            "CREATE MATERIALIZED VIEW IF NOT EXISTS mv AS SELECT id FROM postgres.test_table",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_failed_materialization_cleans_up_store() {
    let engine = Arc::new(
        introspection_engine().with_error("CREATE OR REPLACE TABLE", "Binder Error: no"),
    );
    let cache = Arc::new(CatalogCache::new(CatalogConfig::default()));
    cache.rebuild(&*engine).await.unwrap();
    let store = Arc::new(MemoryMaterializedViewStore::new());
    let rewriter = QueryRewriter::new(engine.clone(), cache, store.clone());

    let err = rewriter
        .parse_and_remap("CREATE MATERIALIZED VIEW mv AS SELECT id FROM postgres.test_table")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Binder Error"));
    assert!(store.get("public", "mv").await.unwrap().is_none());
}

#[tokio::test]
async fn test_drop_and_refresh_materialized_view() {
    let f = fixture().await;
    f.rewriter
        .parse_and_remap("CREATE MATERIALIZED VIEW mv AS SELECT id FROM postgres.test_table")
        .await
        .unwrap();

    f.rewriter
        .parse_and_remap("REFRESH MATERIALIZED VIEW mv")
        .await
        .unwrap();
    assert_eq!(f.engine.executed_matching("CREATE OR REPLACE TABLE").len(), 2);

    f.rewriter
        .parse_and_remap("DROP MATERIALIZED VIEW mv")
        .await
        .unwrap();
    assert!(f.store.get("public", "mv").await.unwrap().is_none());
    assert!(!f
        .engine
        .executed_matching("DROP TABLE IF EXISTS \"lakehouse\".\"public\".\"mv\"")
        .is_empty());

    // IF EXISTS tolerates the missing view; a bare drop does not
    f.rewriter
        .parse_and_remap("DROP MATERIALIZED VIEW IF EXISTS mv")
        .await
        .unwrap();
    assert!(f
        .rewriter
        .parse_and_remap("DROP MATERIALIZED VIEW mv")
        .await
        .is_err());

    let err = f
        .rewriter
        .parse_and_remap("REFRESH MATERIALIZED VIEW mv")
        .await
        .unwrap_err();
    assert!(matches!(err, RewriteError::MatviewMissing(_)));
}

#[tokio::test]
async fn test_rename_materialized_view() {
    let f = fixture().await;
    f.rewriter
        .parse_and_remap("CREATE MATERIALIZED VIEW mv AS SELECT id FROM postgres.test_table")
        .await
        .unwrap();
    f.rewriter
        .parse_and_remap("ALTER MATERIALIZED VIEW mv RENAME TO mv2")
        .await
        .unwrap();
    assert!(f.store.get("public", "mv").await.unwrap().is_none());
    assert!(f.store.get("public", "mv2").await.unwrap().is_some());
}

#[tokio::test]
async fn test_pg_matviews_reference_upserts_stored_views() {
    let f = fixture().await;
    f.rewriter
        .parse_and_remap("CREATE MATERIALIZED VIEW mv AS SELECT id FROM postgres.test_table")
        .await
        .unwrap();
    f.rewriter
        .parse_and_remap("SELECT matviewname FROM pg_catalog.pg_matviews")
        .await
        .unwrap();
    let upserts = f.engine.executed_matching("INSERT INTO main.pg_matviews");
    assert_eq!(upserts.len(), 1);
    assert!(upserts[0].contains("'mv'"));
}

#[tokio::test]
async fn test_long_identifier_round_trip() {
    let f = fixture().await;
    let long = "a".repeat(64);
    let query = format!("SELECT id AS \"{long}\" FROM postgres.test_table");
    let out = f.rewriter.parse_and_remap(&query).await.unwrap();
    assert!(
        out.rewritten[0].contains(&format!("\"{long}\"")),
        "got: {}",
        out.rewritten[0]
    );
}

#[tokio::test]
async fn test_json_array_elements_gets_value_alias() {
    let f = fixture().await;
    let out = f
        .rewriter
        .parse_and_remap("SELECT value FROM json_array_elements('[1,2]')")
        .await
        .unwrap();
    assert!(
        out.rewritten[0].contains("unnest") && out.rewritten[0].contains("value"),
        "got: {}",
        out.rewritten[0]
    );
}
