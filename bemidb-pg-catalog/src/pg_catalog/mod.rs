//! Catalog emulation bootstrap.
//!
//! Generates the ordered DDL that materializes `pg_catalog.*` and
//! `information_schema.*` inside the engine: static empty tables, static
//! views filled with configured values, dynamic views joining the engine's
//! own catalog with rows synthesized from the cache snapshot, and the
//! macro set emulating Postgres functions the engine lacks. The created
//! relation and macro names are captured in registries so the rewriter can
//! recognize which references to remap to the engine default schema.

mod pg_types;

use lake_pg::datatypes::column_pg_type;
use lake_pg::EngineColumn;

use crate::catalog::{synthesized_oid, CatalogMirror, CatalogSnapshot};
use crate::config::CatalogConfig;
use crate::sql::tree::quote_literal;

use pg_types::SUPPLEMENTAL_PG_TYPES;

/// Version string reported by the emulated `version()`.
pub const PG_VERSION_STRING: &str = "PostgreSQL 17.0, compiled by BemiDB";

/// Placeholder SCRAM verifier surfaced by `pg_shadow`.
pub const SCRAM_SHA_256_PASSWORD: &str =
    "SCRAM-SHA-256$4096:wtNeISduL1BqnjKCOWewEg==$VtbBK3orGwzQEn0PJWGbysoGUuvCRkZBIfRKcd9d/N8=:PK089G8KSei4MlzgxwRTF2KvJcbYjQPDl6KAhlLQVDA=";

const STATIC_TABLES: &[(&str, &str)] = &[
    (
        "pg_inherits",
        "inhrelid BIGINT, inhparent BIGINT, inhseqno INTEGER, inhdetachpending BOOLEAN",
    ),
    (
        "pg_shdescription",
        "objoid BIGINT, classoid BIGINT, description VARCHAR",
    ),
    (
        "pg_replication_slots",
        "slot_name VARCHAR, plugin VARCHAR, slot_type VARCHAR, datoid BIGINT, database VARCHAR, \
         temporary BOOLEAN, active BOOLEAN, active_pid INTEGER, xmin VARCHAR, catalog_xmin VARCHAR, \
         restart_lsn VARCHAR, confirmed_flush_lsn VARCHAR, wal_status VARCHAR, safe_wal_size BIGINT, \
         two_phase BOOLEAN",
    ),
    (
        "pg_stat_gssapi",
        "pid INTEGER, gss_authenticated BOOLEAN, principal VARCHAR, encrypted BOOLEAN, \
         credentials_delegated BOOLEAN",
    ),
    (
        "pg_auth_members",
        "oid BIGINT, roleid BIGINT, member BIGINT, grantor BIGINT, admin_option BOOLEAN",
    ),
    (
        "pg_stat_activity",
        "datid BIGINT, datname VARCHAR, pid INTEGER, usesysid BIGINT, usename VARCHAR, \
         application_name VARCHAR, client_addr VARCHAR, client_hostname VARCHAR, client_port INTEGER, \
         backend_start TIMESTAMP, xact_start TIMESTAMP, query_start TIMESTAMP, state_change TIMESTAMP, \
         wait_event_type VARCHAR, wait_event VARCHAR, state VARCHAR, backend_xid VARCHAR, \
         backend_xmin VARCHAR, query_id BIGINT, query VARCHAR, backend_type VARCHAR",
    ),
    (
        "pg_views",
        "schemaname VARCHAR, viewname VARCHAR, viewowner VARCHAR, definition VARCHAR",
    ),
    (
        "pg_matviews",
        "schemaname VARCHAR, matviewname VARCHAR, matviewowner VARCHAR, tablespace VARCHAR, \
         hasindexes BOOLEAN, ispopulated BOOLEAN, definition VARCHAR",
    ),
    (
        "pg_opclass",
        "oid BIGINT, opcmethod BIGINT, opcname VARCHAR, opcnamespace BIGINT, opcowner BIGINT, \
         opcfamily BIGINT, opcintype BIGINT, opcdefault BOOLEAN, opckeytype BIGINT",
    ),
    (
        "pg_policy",
        "oid BIGINT, polname VARCHAR, polrelid BIGINT, polcmd VARCHAR, polpermissive BOOLEAN, \
         polroles VARCHAR, polqual VARCHAR, polwithcheck VARCHAR",
    ),
    (
        "pg_statistic_ext",
        "oid BIGINT, stxrelid BIGINT, stxname VARCHAR, stxnamespace BIGINT, stxowner BIGINT, \
         stxstattarget INTEGER, stxkeys VARCHAR, stxkind VARCHAR",
    ),
    (
        "pg_publication",
        "oid BIGINT, pubname VARCHAR, pubowner BIGINT, puballtables BOOLEAN, pubinsert BOOLEAN, \
         pubupdate BOOLEAN, pubdelete BOOLEAN, pubtruncate BOOLEAN, pubviaroot BOOLEAN",
    ),
    (
        "pg_publication_rel",
        "oid BIGINT, prpubid BIGINT, prrelid BIGINT, prqual VARCHAR, prattrs VARCHAR",
    ),
    (
        "pg_publication_namespace",
        "oid BIGINT, pnpubid BIGINT, pnnspid BIGINT",
    ),
    (
        "pg_rewrite",
        "oid BIGINT, rulename VARCHAR, ev_class BIGINT, ev_type VARCHAR, ev_enabled VARCHAR, \
         is_instead BOOLEAN, ev_qual VARCHAR, ev_action VARCHAR",
    ),
    (
        "pg_statio_user_tables",
        "relid BIGINT, schemaname VARCHAR, relname VARCHAR, heap_blks_read BIGINT, heap_blks_hit BIGINT, \
         idx_blks_read BIGINT, idx_blks_hit BIGINT, toast_blks_read BIGINT, toast_blks_hit BIGINT, \
         tidx_blks_read BIGINT, tidx_blks_hit BIGINT",
    ),
    (
        "pg_stat_user_tables",
        "relid BIGINT, schemaname VARCHAR, relname VARCHAR, seq_scan BIGINT, seq_tup_read BIGINT, \
         idx_scan BIGINT, idx_tup_fetch BIGINT, n_tup_ins BIGINT, n_tup_upd BIGINT, n_tup_del BIGINT, \
         n_tup_hot_upd BIGINT, n_live_tup BIGINT, n_dead_tup BIGINT, n_mod_since_analyze BIGINT, \
         n_ins_since_vacuum BIGINT, last_vacuum TIMESTAMP, last_autovacuum TIMESTAMP, \
         last_analyze TIMESTAMP, last_autoanalyze TIMESTAMP, vacuum_count BIGINT, \
         autovacuum_count BIGINT, analyze_count BIGINT, autoanalyze_count BIGINT",
    ),
];

const STATIC_VIEW_NAMES: &[&str] = &[
    "pg_shadow",
    "pg_roles",
    "pg_extension",
    "pg_database",
    "pg_user",
    "pg_collation",
    "user",
];

const DYNAMIC_VIEW_NAMES: &[&str] = &[
    "pg_namespace",
    "pg_class",
    "pg_type",
    "pg_attribute",
    "pg_tables",
    "pg_indexes",
    "pg_index",
    "pg_constraint",
];

const INFORMATION_SCHEMA_VIEWS: &[(&str, &str)] = &[
    ("tables", "information_schema_tables"),
    ("columns", "information_schema_columns"),
    ("table_constraints", "information_schema_table_constraints"),
    ("key_column_usage", "information_schema_key_column_usage"),
];

const MACRO_NAMES: &[&str] = &[
    "aclexplode",
    "current_setting",
    "pg_backend_pid",
    "pg_get_expr",
    "pg_get_viewdef",
    "pg_tablespace_location",
    "pg_total_relation_size",
    "quote_ident",
    "row_to_json",
    "set_config",
    "version",
    "json_array_elements",
    "jsonb_array_elements",
    "jsonb_array_length",
    "jsonb_typeof",
    "jsonb_extract_path_text",
    "jsonb_build_object",
    "json_build_object",
    "array_upper",
    "to_char",
    "pg_date_trunc",
    "pg_show_all_settings",
    "pg_get_keywords",
    "_pg_expandarray",
];

/// Relation names materialized by the bootstrap; references to
/// `pg_catalog.<name>` for these are remapped to the engine default schema.
pub fn is_emulated_relation(name: &str) -> bool {
    STATIC_TABLES.iter().any(|(table, _)| *table == name)
        || STATIC_VIEW_NAMES.contains(&name)
        || DYNAMIC_VIEW_NAMES.contains(&name)
}

pub fn is_emulated_macro(name: &str) -> bool {
    MACRO_NAMES.contains(&name)
}

/// Engine-side view backing an `information_schema.<name>` reference.
pub fn information_schema_view(name: &str) -> Option<&'static str> {
    INFORMATION_SCHEMA_VIEWS
        .iter()
        .find(|(logical, _)| *logical == name)
        .map(|(_, view)| *view)
}

/// The full bootstrap batch, in execution order.
pub fn bootstrap_statements(
    config: &CatalogConfig,
    snapshot: &CatalogSnapshot,
    mirror: &CatalogMirror,
) -> Vec<String> {
    let mut statements = static_empty_tables(config);
    statements.extend(static_views(config));
    statements.extend(refresh_statements(config, snapshot, mirror));
    statements.extend(macro_statements(config));
    statements
}

/// The snapshot-dependent subset, re-run when a lazy refresh fires.
pub fn refresh_statements(
    config: &CatalogConfig,
    snapshot: &CatalogSnapshot,
    mirror: &CatalogMirror,
) -> Vec<String> {
    let mut statements = dynamic_views(config, snapshot, mirror);
    statements.extend(information_schema_views(config, snapshot));
    statements
}

/// One insert-if-absent per lakehouse table, fired when a query touches
/// `pg_stat_user_tables`.
pub fn pg_stat_user_tables_upserts(
    config: &CatalogConfig,
    snapshot: &CatalogSnapshot,
) -> Vec<String> {
    let schema = &config.default_schema;
    snapshot
        .tables
        .iter()
        .map(|table| {
            format!(
                "INSERT INTO {schema}.pg_stat_user_tables (relid, schemaname, relname, seq_scan, n_live_tup) \
                 SELECT {oid}, {ns}, {name}, 0, 0 \
                 WHERE NOT EXISTS (SELECT 1 FROM {schema}.pg_stat_user_tables WHERE relid = {oid})",
                oid = table.oid,
                ns = quote_literal(&table.namespace),
                name = quote_literal(&table.name),
            )
        })
        .collect()
}

/// One insert-if-absent per stored materialized view, fired when a query
/// touches `pg_matviews`.
pub fn pg_matviews_upserts(
    config: &CatalogConfig,
    views: &[(String, String, String)],
) -> Vec<String> {
    let schema = &config.default_schema;
    views
        .iter()
        .map(|(view_schema, view_name, definition)| {
            format!(
                "INSERT INTO {schema}.pg_matviews \
                 (schemaname, matviewname, matviewowner, tablespace, hasindexes, ispopulated, definition) \
                 SELECT {ns}, {name}, 'bemidb', NULL, false, true, {def} \
                 WHERE NOT EXISTS (SELECT 1 FROM {schema}.pg_matviews \
                                   WHERE schemaname = {ns} AND matviewname = {name})",
                ns = quote_literal(view_schema),
                name = quote_literal(view_name),
                def = quote_literal(definition),
            )
        })
        .collect()
}

fn static_empty_tables(config: &CatalogConfig) -> Vec<String> {
    let schema = &config.default_schema;
    STATIC_TABLES
        .iter()
        .map(|(name, columns)| format!("CREATE TABLE IF NOT EXISTS {schema}.{name} ({columns})"))
        .collect()
}

fn static_views(config: &CatalogConfig) -> Vec<String> {
    let schema = &config.default_schema;
    let user = quote_literal(&config.user);
    let database = quote_literal(&config.database);
    let passwd = quote_literal(SCRAM_SHA_256_PASSWORD);

    vec![
        format!(
            "CREATE OR REPLACE VIEW {schema}.pg_shadow AS \
             SELECT {user} AS usename, 10 AS usesysid, true AS usecreatedb, true AS usesuper, \
                    true AS userepl, false AS usebypassrls, {passwd} AS passwd, \
                    NULL AS valuntil, NULL AS useconfig"
        ),
        format!(
            "CREATE OR REPLACE VIEW {schema}.pg_roles AS \
             SELECT 10 AS oid, {user} AS rolname, true AS rolsuper, true AS rolinherit, \
                    true AS rolcreaterole, true AS rolcreatedb, true AS rolcanlogin, \
                    false AS rolreplication, -1 AS rolconnlimit, NULL AS rolpassword, \
                    NULL AS rolvaliduntil, false AS rolbypassrls, NULL AS rolconfig"
        ),
        format!(
            "CREATE OR REPLACE VIEW {schema}.pg_extension AS \
             SELECT 13823 AS oid, 'plpgsql' AS extname, 10 AS extowner, 11 AS extnamespace, \
                    false AS extrelocatable, '1.0' AS extversion, NULL AS extconfig, \
                    NULL AS extcondition"
        ),
        format!(
            "CREATE OR REPLACE VIEW {schema}.pg_database AS \
             SELECT 16388 AS oid, {database} AS datname, 10 AS datdba, 6 AS encoding, \
                    'c' AS datlocprovider, false AS datistemplate, true AS datallowconn, \
                    -1 AS datconnlimit, 722 AS datfrozenxid, 1 AS datminmxid, 1663 AS dattablespace, \
                    'en_US.UTF-8' AS datcollate, 'en_US.UTF-8' AS datctype, NULL AS daticulocale, \
                    NULL AS daticurules, NULL AS datcollversion, NULL AS datacl"
        ),
        format!(
            "CREATE OR REPLACE VIEW {schema}.pg_user AS \
             SELECT {user} AS usename, 10 AS usesysid, true AS usecreatedb, true AS usesuper, \
                    true AS userepl, false AS usebypassrls, '********' AS passwd, \
                    NULL AS valuntil, NULL AS useconfig"
        ),
        format!(
            "CREATE OR REPLACE VIEW {schema}.pg_collation AS \
             SELECT 100 AS oid, 'default' AS collname, 11 AS collnamespace, 10 AS collowner, \
                    'd' AS collprovider, true AS collisdeterministic, -1 AS collencoding, \
                    NULL AS collcollate, NULL AS collctype"
        ),
        format!("CREATE OR REPLACE VIEW {schema}.\"user\" AS SELECT {user} AS \"user\""),
    ]
}

const PG_CLASS_COLUMNS: &str = "oid, relname, relnamespace, reltype, relowner, relam, relfilenode, \
    reltablespace, relpages, reltuples, relallvisible, reltoastrelid, relhasindex, relisshared, \
    relpersistence, relkind, relnatts, relchecks, relhasrules, relhastriggers, relrowsecurity, \
    relforcerowsecurity, relispopulated, relreplident, relispartition, relacl, reloptions";

fn dynamic_views(
    config: &CatalogConfig,
    snapshot: &CatalogSnapshot,
    mirror: &CatalogMirror,
) -> Vec<String> {
    let schema = &config.default_schema;
    let mut statements = Vec::new();

    // pg_namespace: engine-side user-facing schemas plus lakehouse schemas
    let mut namespace_rows: Vec<String> = Vec::new();
    for namespace in snapshot.namespaces() {
        if matches!(namespace.as_str(), "main" | "pg_catalog" | "information_schema") {
            continue;
        }
        namespace_rows.push(format!(
            "SELECT {oid} AS oid, {name} AS nspname, 10 AS nspowner, NULL AS nspacl",
            oid = synthesized_oid(&namespace),
            name = quote_literal(&namespace),
        ));
    }
    let mut pg_namespace = format!(
        "CREATE OR REPLACE VIEW {schema}.pg_namespace AS \
         SELECT oid, nspname, nspowner, nspacl FROM pg_catalog.pg_namespace \
         WHERE nspname IN ('pg_catalog', 'information_schema', 'public')"
    );
    for row in &namespace_rows {
        pg_namespace.push_str(" UNION ALL ");
        pg_namespace.push_str(row);
    }
    statements.push(pg_namespace);

    // pg_class: engine rows + lakehouse tables + synthetic PK indexes
    let mut pg_class = format!(
        "CREATE OR REPLACE VIEW {schema}.pg_class AS \
         SELECT {PG_CLASS_COLUMNS} FROM pg_catalog.pg_class"
    );
    for table in &snapshot.tables {
        let natts = snapshot
            .columns
            .get(&table.name)
            .map(|cols| cols.len())
            .unwrap_or(0);
        let has_index = snapshot.pk_candidates.contains_key(&table.name);
        pg_class.push_str(&format!(
            " UNION ALL SELECT {oid}, {name}, {ns}, 0, 10, 0, 0, 0, 0, -1.0, 0, 0, {has_index}, \
             false, 'p', 'r', {natts}, 0, false, false, false, false, true, 'd', false, NULL, NULL",
            oid = table.oid,
            name = quote_literal(&table.name),
            ns = synthesized_oid(&table.namespace),
        ));
    }
    for pk in snapshot.pk_candidates.values() {
        let namespace_oid = snapshot
            .table(&pk.table_name)
            .map(|t| synthesized_oid(&t.namespace))
            .unwrap_or(0);
        pg_class.push_str(&format!(
            " UNION ALL SELECT {oid}, {name}, {ns}, 0, 10, 403, 0, 0, 0, -1.0, 0, 0, false, \
             false, 'p', 'i', 1, 0, false, false, false, false, true, 'n', false, NULL, NULL",
            oid = pk.oid,
            name = quote_literal(&pk.constraint_name),
            ns = namespace_oid,
        ));
    }
    statements.push(pg_class);

    statements.push(pg_type_view(config));
    statements.push(pg_attribute_view(config, mirror));

    // pg_tables
    let mut table_rows: Vec<String> = snapshot
        .tables
        .iter()
        .map(|table| {
            format!(
                "SELECT {ns} AS schemaname, {name} AS tablename, 'bemidb' AS tableowner, \
                 NULL AS tablespace, {has_index} AS hasindexes, false AS hasrules, \
                 false AS hastriggers, false AS rowsecurity",
                ns = quote_literal(&table.namespace),
                name = quote_literal(&table.name),
                has_index = snapshot.pk_candidates.contains_key(&table.name),
            )
        })
        .collect();
    statements.push(union_or_empty(
        &format!("CREATE OR REPLACE VIEW {schema}.pg_tables AS "),
        &table_rows,
        "SELECT NULL::VARCHAR AS schemaname, NULL::VARCHAR AS tablename, NULL::VARCHAR AS tableowner, \
         NULL::VARCHAR AS tablespace, NULL::BOOLEAN AS hasindexes, NULL::BOOLEAN AS hasrules, \
         NULL::BOOLEAN AS hastriggers, NULL::BOOLEAN AS rowsecurity WHERE false",
    ));

    // pg_indexes
    let mut index_rows: Vec<String> = Vec::new();
    for pk in snapshot.pk_candidates.values() {
        let namespace = snapshot
            .table(&pk.table_name)
            .map(|t| t.namespace.clone())
            .unwrap_or_default();
        index_rows.push(format!(
            "SELECT {ns} AS schemaname, {table} AS tablename, {index} AS indexname, \
             NULL AS tablespace, {def} AS indexdef",
            ns = quote_literal(&namespace),
            table = quote_literal(&pk.table_name),
            index = quote_literal(&pk.constraint_name),
            def = quote_literal(&format!(
                "CREATE UNIQUE INDEX {} ON {}.{} USING btree ({})",
                pk.constraint_name, namespace, pk.table_name, pk.column_name
            )),
        ));
    }
    statements.push(union_or_empty(
        &format!("CREATE OR REPLACE VIEW {schema}.pg_indexes AS "),
        &index_rows,
        "SELECT NULL::VARCHAR AS schemaname, NULL::VARCHAR AS tablename, NULL::VARCHAR AS indexname, \
         NULL::VARCHAR AS tablespace, NULL::VARCHAR AS indexdef WHERE false",
    ));

    // pg_index
    let mut pg_index_rows: Vec<String> = snapshot
        .pk_candidates
        .values()
        .map(|pk| {
            format!(
                "SELECT {index_oid} AS indexrelid, {table_oid} AS indrelid, 1 AS indnatts, \
                 1 AS indnkeyatts, true AS indisunique, true AS indisprimary, false AS indisexclusion, \
                 true AS indimmediate, false AS indisclustered, true AS indisvalid, \
                 false AS indcheckxmin, true AS indisready, true AS indislive, false AS indisreplident, \
                 '1' AS indkey, '0' AS indcollation, '0' AS indclass, '0' AS indoption, \
                 NULL AS indexprs, NULL AS indpred",
                index_oid = pk.oid,
                table_oid = pk.table_oid,
            )
        })
        .collect();
    statements.push(union_or_empty(
        &format!("CREATE OR REPLACE VIEW {schema}.pg_index AS "),
        &pg_index_rows,
        "SELECT NULL::BIGINT AS indexrelid, NULL::BIGINT AS indrelid, NULL::INTEGER AS indnatts, \
         NULL::INTEGER AS indnkeyatts, NULL::BOOLEAN AS indisunique, NULL::BOOLEAN AS indisprimary, \
         NULL::BOOLEAN AS indisexclusion, NULL::BOOLEAN AS indimmediate, NULL::BOOLEAN AS indisclustered, \
         NULL::BOOLEAN AS indisvalid, NULL::BOOLEAN AS indcheckxmin, NULL::BOOLEAN AS indisready, \
         NULL::BOOLEAN AS indislive, NULL::BOOLEAN AS indisreplident, NULL::VARCHAR AS indkey, \
         NULL::VARCHAR AS indcollation, NULL::VARCHAR AS indclass, NULL::VARCHAR AS indoption, \
         NULL::VARCHAR AS indexprs, NULL::VARCHAR AS indpred WHERE false",
    ));

    // pg_constraint
    let mut constraint_rows: Vec<String> = snapshot
        .pk_candidates
        .values()
        .map(|pk| {
            let namespace_oid = snapshot
                .table(&pk.table_name)
                .map(|t| synthesized_oid(&t.namespace))
                .unwrap_or(0);
            format!(
                "SELECT {oid} AS oid, {name} AS conname, {ns} AS connamespace, 'p' AS contype, \
                 false AS condeferrable, false AS condeferred, true AS convalidated, \
                 {table_oid} AS conrelid, 0 AS contypid, {index_oid} AS conindid, 0 AS conparentid, \
                 0 AS confrelid, ' ' AS confupdtype, ' ' AS confdeltype, ' ' AS confmatchtype, \
                 true AS conislocal, 0 AS coninhcount, true AS connoinherit, '{{1}}' AS conkey, \
                 NULL AS confkey, NULL AS conpfeqop, NULL AS conppeqop, NULL AS conffeqop, \
                 NULL AS conbin",
                oid = pk.oid,
                name = quote_literal(&pk.constraint_name),
                ns = namespace_oid,
                table_oid = pk.table_oid,
                index_oid = pk.oid,
            )
        })
        .collect();
    statements.push(union_or_empty(
        &format!("CREATE OR REPLACE VIEW {schema}.pg_constraint AS "),
        &constraint_rows,
        "SELECT NULL::BIGINT AS oid, NULL::VARCHAR AS conname, NULL::BIGINT AS connamespace, \
         NULL::VARCHAR AS contype, NULL::BOOLEAN AS condeferrable, NULL::BOOLEAN AS condeferred, \
         NULL::BOOLEAN AS convalidated, NULL::BIGINT AS conrelid, NULL::BIGINT AS contypid, \
         NULL::BIGINT AS conindid, NULL::BIGINT AS conparentid, NULL::BIGINT AS confrelid, \
         NULL::VARCHAR AS confupdtype, NULL::VARCHAR AS confdeltype, NULL::VARCHAR AS confmatchtype, \
         NULL::BOOLEAN AS conislocal, NULL::INTEGER AS coninhcount, NULL::BOOLEAN AS connoinherit, \
         NULL::VARCHAR AS conkey, NULL::VARCHAR AS confkey, NULL::VARCHAR AS conpfeqop, \
         NULL::VARCHAR AS conppeqop, NULL::VARCHAR AS conffeqop, NULL::VARCHAR AS conbin WHERE false",
    ));

    statements
}

fn pg_type_view(config: &CatalogConfig) -> String {
    let schema = &config.default_schema;
    let columns = "oid, typname, typnamespace, typowner, typlen, typbyval, typtype, typcategory, \
                   typispreferred, typisdefined, typdelim, typrelid, typelem, typarray, typnotnull, \
                   typbasetype, typtypmod, typndims, typcollation, typdefault";

    let mut view = format!(
        "CREATE OR REPLACE VIEW {schema}.pg_type AS \
         SELECT {columns} FROM pg_catalog.pg_type"
    );

    for (oid, name, len, category, preferred, elem, array) in SUPPLEMENTAL_PG_TYPES {
        let typtype = match *category {
            "P" => "p",
            "R" if name.ends_with("multirange") => "m",
            "R" => "r",
            _ => "b",
        };
        let byval = matches!(*len, 1 | 2 | 4 | 8);
        view.push_str(&format!(
            " UNION ALL SELECT {oid}, '{name}', 11, 10, {len}, {byval}, '{typtype}', '{category}', \
             {preferred}, true, ',', 0, {elem}, {array}, false, 0, -1, 0, 0, NULL \
             WHERE NOT EXISTS (SELECT 1 FROM pg_catalog.pg_type e WHERE e.oid = {oid})"
        ));
    }

    view
}

fn pg_attribute_view(config: &CatalogConfig, mirror: &CatalogMirror) -> String {
    let schema = &config.default_schema;
    let columns = "attrelid, attname, atttypid, attstattarget, attlen, attnum, attndims, \
                   attcacheoff, atttypmod, attbyval, attalign, attstorage, attnotnull, atthasdef, \
                   attisdropped, attislocal, attinhcount, attcollation";

    let mut view = format!(
        "CREATE OR REPLACE VIEW {schema}.pg_attribute AS \
         SELECT {columns} FROM pg_catalog.pg_attribute"
    );

    // the mirror already carries one attribute row per lakehouse column
    // with the Postgres type OID resolved
    for attribute in mirror.attributes() {
        view.push_str(&format!(
            " UNION ALL SELECT {attrelid}, {attname}, {atttypid}, -1, -1, {attnum}, 0, -1, -1, \
             false, 'i', 'p', false, false, false, true, 0, 0",
            attrelid = attribute.attrelid,
            attname = quote_literal(&attribute.attname),
            atttypid = attribute.atttypid,
            attnum = attribute.attnum,
        ));
    }

    view
}

fn information_schema_views(config: &CatalogConfig, snapshot: &CatalogSnapshot) -> Vec<String> {
    let schema = &config.default_schema;
    let database = quote_literal(&config.database);
    let mut statements = Vec::new();

    let mut table_rows: Vec<String> = snapshot
        .tables
        .iter()
        .map(|table| {
            format!(
                "SELECT {db} AS table_catalog, {ns} AS table_schema, {name} AS table_name, \
                 'BASE TABLE' AS table_type, 'YES' AS is_insertable_into, 'NO' AS is_typed, \
                 NULL AS commit_action",
                db = database,
                ns = quote_literal(&table.namespace),
                name = quote_literal(&table.name),
            )
        })
        .collect();
    statements.push(union_or_empty(
        &format!("CREATE OR REPLACE VIEW {schema}.information_schema_tables AS "),
        &table_rows,
        "SELECT NULL::VARCHAR AS table_catalog, NULL::VARCHAR AS table_schema, \
         NULL::VARCHAR AS table_name, NULL::VARCHAR AS table_type, \
         NULL::VARCHAR AS is_insertable_into, NULL::VARCHAR AS is_typed, \
         NULL::VARCHAR AS commit_action WHERE false",
    ));

    let mut column_rows: Vec<String> = Vec::new();
    for table in &snapshot.tables {
        let Some(columns) = snapshot.columns.get(&table.name) else {
            continue;
        };
        for column in columns {
            column_rows.push(format!(
                "SELECT {db} AS table_catalog, {ns} AS table_schema, {table} AS table_name, \
                 {name} AS column_name, {ordinal} AS ordinal_position, NULL AS column_default, \
                 'YES' AS is_nullable, {data_type} AS data_type, {udt} AS udt_name",
                db = database,
                ns = quote_literal(&table.namespace),
                table = quote_literal(&table.name),
                name = quote_literal(&column.name),
                ordinal = column.ordinal,
                data_type = quote_literal(&data_type_name(&column.type_text)),
                udt = quote_literal(&udt_name(&column.type_text)),
            ));
        }
    }
    statements.push(union_or_empty(
        &format!("CREATE OR REPLACE VIEW {schema}.information_schema_columns AS "),
        &column_rows,
        "SELECT NULL::VARCHAR AS table_catalog, NULL::VARCHAR AS table_schema, \
         NULL::VARCHAR AS table_name, NULL::VARCHAR AS column_name, \
         NULL::INTEGER AS ordinal_position, NULL::VARCHAR AS column_default, \
         NULL::VARCHAR AS is_nullable, NULL::VARCHAR AS data_type, NULL::VARCHAR AS udt_name \
         WHERE false",
    ));

    let mut constraint_rows: Vec<String> = Vec::new();
    for pk in snapshot.pk_candidates.values() {
        let namespace = snapshot
            .table(&pk.table_name)
            .map(|t| t.namespace.clone())
            .unwrap_or_default();
        constraint_rows.push(format!(
            "SELECT {db} AS constraint_catalog, {ns} AS constraint_schema, \
             {name} AS constraint_name, {db} AS table_catalog, {ns} AS table_schema, \
             {table} AS table_name, 'PRIMARY KEY' AS constraint_type, 'NO' AS is_deferrable, \
             'NO' AS initially_deferred, 'YES' AS enforced",
            db = database,
            ns = quote_literal(&namespace),
            name = quote_literal(&pk.constraint_name),
            table = quote_literal(&pk.table_name),
        ));
    }
    statements.push(union_or_empty(
        &format!("CREATE OR REPLACE VIEW {schema}.information_schema_table_constraints AS "),
        &constraint_rows,
        "SELECT NULL::VARCHAR AS constraint_catalog, NULL::VARCHAR AS constraint_schema, \
         NULL::VARCHAR AS constraint_name, NULL::VARCHAR AS table_catalog, \
         NULL::VARCHAR AS table_schema, NULL::VARCHAR AS table_name, \
         NULL::VARCHAR AS constraint_type, NULL::VARCHAR AS is_deferrable, \
         NULL::VARCHAR AS initially_deferred, NULL::VARCHAR AS enforced WHERE false",
    ));

    let mut usage_rows: Vec<String> = Vec::new();
    for pk in snapshot.pk_candidates.values() {
        let namespace = snapshot
            .table(&pk.table_name)
            .map(|t| t.namespace.clone())
            .unwrap_or_default();
        usage_rows.push(format!(
            "SELECT {db} AS constraint_catalog, {ns} AS constraint_schema, \
             {name} AS constraint_name, {db} AS table_catalog, {ns} AS table_schema, \
             {table} AS table_name, {column} AS column_name, 1 AS ordinal_position, \
             NULL AS position_in_unique_constraint",
            db = database,
            ns = quote_literal(&namespace),
            name = quote_literal(&pk.constraint_name),
            table = quote_literal(&pk.table_name),
            column = quote_literal(&pk.column_name),
        ));
    }
    statements.push(union_or_empty(
        &format!("CREATE OR REPLACE VIEW {schema}.information_schema_key_column_usage AS "),
        &usage_rows,
        "SELECT NULL::VARCHAR AS constraint_catalog, NULL::VARCHAR AS constraint_schema, \
         NULL::VARCHAR AS constraint_name, NULL::VARCHAR AS table_catalog, \
         NULL::VARCHAR AS table_schema, NULL::VARCHAR AS table_name, \
         NULL::VARCHAR AS column_name, NULL::INTEGER AS ordinal_position, \
         NULL::INTEGER AS position_in_unique_constraint WHERE false",
    ));

    statements
}

fn macro_statements(config: &CatalogConfig) -> Vec<String> {
    let schema = &config.default_schema;
    let version = quote_literal(PG_VERSION_STRING);

    vec![
        format!("CREATE OR REPLACE MACRO {schema}.aclexplode(acl) AS NULL"),
        format!(
            "CREATE OR REPLACE MACRO {schema}.current_setting(setting_name) AS \
             (SELECT value FROM duckdb_settings() WHERE lower(name) = lower(setting_name))"
        ),
        format!("CREATE OR REPLACE MACRO {schema}.pg_backend_pid() AS 0"),
        format!(
            "CREATE OR REPLACE MACRO {schema}.pg_get_expr(expr, relation_oid, pretty := false) \
             AS expr"
        ),
        format!("CREATE OR REPLACE MACRO {schema}.pg_get_viewdef(view_oid) AS ''"),
        format!("CREATE OR REPLACE MACRO {schema}.pg_tablespace_location(tablespace_oid) AS ''"),
        format!("CREATE OR REPLACE MACRO {schema}.pg_total_relation_size(relation_oid) AS 0"),
        format!(
            "CREATE OR REPLACE MACRO {schema}.quote_ident(ident) AS \
             '\"' || replace(ident, '\"', '\"\"') || '\"'"
        ),
        format!("CREATE OR REPLACE MACRO {schema}.row_to_json(record) AS to_json(record)"),
        format!(
            "CREATE OR REPLACE MACRO {schema}.set_config(setting_name, new_value, is_local) AS \
             new_value"
        ),
        format!("CREATE OR REPLACE MACRO {schema}.version() AS {version}"),
        format!(
            "CREATE OR REPLACE MACRO {schema}.json_array_elements(js) AS TABLE \
             SELECT unnest(json_extract(js, '$[*]')) AS value"
        ),
        format!(
            "CREATE OR REPLACE MACRO {schema}.jsonb_array_elements(js) AS TABLE \
             SELECT unnest(json_extract(js, '$[*]')) AS value"
        ),
        format!(
            "CREATE OR REPLACE MACRO {schema}.jsonb_array_length(js) AS json_array_length(js)"
        ),
        format!("CREATE OR REPLACE MACRO {schema}.jsonb_typeof(js) AS json_type(js)"),
        format!(
            "CREATE OR REPLACE MACRO {schema}.jsonb_extract_path_text(js, p1, p2 := NULL) AS \
             CASE WHEN p2 IS NULL THEN json_extract_string(js, p1) \
                  ELSE json_extract_string(js, p1 || '.' || p2) END"
        ),
        format!(
            "CREATE OR REPLACE MACRO {schema}.jsonb_build_object(k1, v1, k2 := NULL, v2 := NULL) AS \
             CASE WHEN k2 IS NULL THEN json_object(k1, v1) \
                  ELSE json_object(k1, v1, k2, v2) END"
        ),
        format!(
            "CREATE OR REPLACE MACRO {schema}.json_build_object(k1, v1, k2 := NULL, v2 := NULL, \
             k3 := NULL, v3 := NULL, k4 := NULL, v4 := NULL) AS \
             CASE WHEN k2 IS NULL THEN json_object(k1, v1) \
                  WHEN k3 IS NULL THEN json_object(k1, v1, k2, v2) \
                  WHEN k4 IS NULL THEN json_object(k1, v1, k2, v2, k3, v3) \
                  ELSE json_object(k1, v1, k2, v2, k3, v3, k4, v4) END"
        ),
        format!("CREATE OR REPLACE MACRO {schema}.array_upper(arr, dim) AS len(arr)"),
        format!(
            "CREATE OR REPLACE MACRO {schema}.to_char(ts, fmt) AS \
             CASE fmt \
               WHEN 'YYYY-MM-DD' THEN strftime(ts, '%Y-%m-%d') \
               WHEN 'HH24:MI:SS' THEN strftime(ts, '%H:%M:%S') \
               WHEN 'YYYY-MM-DD HH24:MI:SS' THEN strftime(ts, '%Y-%m-%d %H:%M:%S') \
               WHEN 'MM/DD/YYYY' THEN strftime(ts, '%m/%d/%Y') \
               ELSE strftime(ts, fmt) \
             END"
        ),
        format!(
            "CREATE OR REPLACE MACRO {schema}.pg_date_trunc(part, ts) AS \
             CASE WHEN part IS NULL OR ts IS NULL THEN NULL ELSE date_trunc(part, ts) END"
        ),
        format!(
            "CREATE OR REPLACE MACRO {schema}.pg_show_all_settings() AS TABLE \
             SELECT name, value AS setting, NULL AS unit, 'Settings' AS category, \
                    description AS short_desc, NULL AS extra_desc, 'user' AS context, \
                    input_type AS vartype, 'default' AS source, NULL AS min_val, NULL AS max_val, \
                    NULL AS enumvals, value AS boot_val, value AS reset_val \
             FROM duckdb_settings()"
        ),
        format!(
            "CREATE OR REPLACE MACRO {schema}.pg_get_keywords() AS TABLE \
             SELECT keyword_name AS word, 'U' AS catcode, NULL AS barelabel, \
                    'unreserved' AS catdesc, NULL AS baredesc \
             FROM duckdb_keywords()"
        ),
        format!(
            "CREATE OR REPLACE MACRO {schema}._pg_expandarray(arr) AS TABLE \
             SELECT unnest(arr) AS x, generate_subscripts(arr, 1) AS n"
        ),
    ]
}

fn union_or_empty(prefix: &str, rows: &[String], empty: &str) -> String {
    if rows.is_empty() {
        format!("{prefix}{empty}")
    } else {
        format!("{prefix}{}", rows.join(" UNION ALL "))
    }
}

/// `udt_name` value for `information_schema.columns`.
pub fn udt_name(type_text: &str) -> String {
    column_pg_type(&EngineColumn::new("", type_text))
        .name()
        .to_string()
}

/// Human-readable `data_type` value for `information_schema.columns`.
pub fn data_type_name(type_text: &str) -> String {
    let pg_type = column_pg_type(&EngineColumn::new("", type_text));
    match pg_type.name() {
        "bool" => "boolean".to_string(),
        "int2" => "smallint".to_string(),
        "int4" => "integer".to_string(),
        "int8" => "bigint".to_string(),
        "float4" => "real".to_string(),
        "float8" => "double precision".to_string(),
        "varchar" => "character varying".to_string(),
        "time" => "time without time zone".to_string(),
        "timetz" => "time with time zone".to_string(),
        "timestamp" => "timestamp without time zone".to_string(),
        "timestamptz" => "timestamp with time zone".to_string(),
        name if name.starts_with('_') => "ARRAY".to_string(),
        name => name.to_string(),
    }
}
