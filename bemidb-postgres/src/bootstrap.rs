//! Engine boot sequence.
//!
//! Issued once at startup: session pragmas, lakehouse attachment, then the
//! catalog probe, the user schema and the generated catalog-emulation DDL.

use bemidb_pg_catalog::{pg_catalog, CatalogCache, RewriteResult};
use lake_pg::LakeEngine;
use log::info;

use crate::config::GatewayConfig;

/// Name the lakehouse storage secret is registered under.
const STORAGE_SECRET_NAME: &str = "lakehouse_storage";

pub async fn bootstrap_engine(
    engine: &dyn LakeEngine,
    cache: &CatalogCache,
    config: &GatewayConfig,
) -> RewriteResult<()> {
    for sql in session_statements(config) {
        engine.execute(&sql).await?;
    }
    for sql in attach_statements(config) {
        engine.execute(&sql).await?;
    }

    // Force the engine's own pg_catalog to materialize before any view
    // definition references it.
    engine
        .query("SELECT count(*) FROM pg_catalog.pg_namespace")
        .await?;
    engine.execute("CREATE SCHEMA IF NOT EXISTS public").await?;

    cache.rebuild(engine).await?;
    let snapshot = cache.snapshot().await;
    let mirror = cache.mirror().await;
    let statements = pg_catalog::bootstrap_statements(cache.config(), &snapshot, &mirror);
    info!(
        "bootstrapping catalog emulation: {} statements, {} lakehouse tables",
        statements.len(),
        snapshot.tables.len()
    );
    for sql in statements {
        engine.execute(&sql).await?;
    }

    Ok(())
}

/// Session-level pragmas, applied before anything else. Settings owned by
/// the httpfs extension live in `attach_statements`, after its LOAD.
pub fn session_statements(config: &GatewayConfig) -> Vec<String> {
    let mut statements = vec![
        "SET TimeZone = 'UTC'".to_string(),
        "SET enable_object_cache = true".to_string(),
        "SET preserve_insertion_order = false".to_string(),
        "SET scalar_subquery_error_on_multiple_rows = false".to_string(),
    ];
    if let Some(memory_limit) = config.memory_limit() {
        statements.push(format!("SET memory_limit = '{memory_limit}'"));
    }
    if let Some(threads) = config.threads() {
        statements.push(format!("SET threads = {threads}"));
    }
    if let Some(temp_directory) = config.temp_directory() {
        statements.push(format!("SET temp_directory = '{temp_directory}'"));
    }
    statements
}

/// Lakehouse and object-storage extensions, HTTP tuning, storage secret
/// and catalog attachment.
pub fn attach_statements(config: &GatewayConfig) -> Vec<String> {
    let mut statements = vec![
        "INSTALL httpfs".to_string(),
        "LOAD httpfs".to_string(),
        "SET enable_http_metadata_cache = true".to_string(),
        "SET http_retries = 4".to_string(),
        "SET http_timeout = 30000".to_string(),
        "INSTALL ducklake".to_string(),
        "LOAD ducklake".to_string(),
    ];

    if let (Some(endpoint), Some(key_id), Some(secret)) = (
        config.r2_endpoint(),
        config.r2_access_key_id(),
        config.r2_secret_access_key(),
    ) {
        statements.push(format!(
            "CREATE OR REPLACE SECRET {STORAGE_SECRET_NAME} (TYPE S3, KEY_ID '{key_id}', \
             SECRET '{secret}', ENDPOINT '{endpoint}', URL_STYLE 'path')"
        ));
    }

    let catalog_url = config.ducklake_catalog_url().as_deref().unwrap_or_default();
    let data_path = config.ducklake_data_path().as_deref().unwrap_or_default();
    statements.push(format!(
        "ATTACH 'ducklake:{catalog_url}' AS lakehouse (DATA_PATH '{data_path}')"
    ));

    statements
}
