//! Postgres catalog emulation and SQL rewriting for the BemiDB gateway.
//!
//! The crate owns everything between the wire protocol and the engine:
//! the catalog metadata cache, the generated `pg_catalog` /
//! `information_schema` emulation DDL, the materialized-view store, and
//! the statement rewriter that turns Postgres SQL into the engine's
//! dialect.

pub mod catalog;
pub mod config;
pub mod error;
pub mod matview;
pub mod permissions;
pub mod pg_catalog;
pub mod sql;

pub use catalog::{CatalogCache, CatalogMirror, CatalogSnapshot};
pub use config::CatalogConfig;
pub use error::{RewriteError, RewriteResult};
pub use matview::{MaterializedViewStore, MemoryMaterializedViewStore, StoredMaterializedView};
pub use permissions::{extract_permissions, PermissionSet};
pub use sql::{QueryRewriter, RemappedStatements, NOOP_STATEMENT};
