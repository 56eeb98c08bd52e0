use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::value::{EngineColumn, EngineValue};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Error text as reported by the engine, unmodified so callers can
    /// match on known binder messages.
    #[error("{0}")]
    Sql(String),
    #[error("canceling statement due to statement timeout")]
    Timeout,
    #[error("engine connection failed: {0}")]
    Connection(String),
}

impl EngineError {
    pub fn sql(message: impl Into<String>) -> Self {
        EngineError::Sql(message.into())
    }
}

/// A fully materialized result set from the engine.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<EngineColumn>,
    pub rows: Vec<Vec<EngineValue>>,
}

impl QueryResult {
    pub fn new(columns: Vec<EngineColumn>, rows: Vec<Vec<EngineValue>>) -> Self {
        QueryResult { columns, rows }
    }

    pub fn empty() -> Self {
        QueryResult::default()
    }
}

/// The analytical engine, reduced to an opaque SQL executor.
///
/// The gateway only ever hands the engine SQL text and reads back typed
/// rows; attachment of the lakehouse catalog, credentials and storage are
/// the engine's own business.
#[async_trait]
pub trait LakeEngine: Send + Sync {
    async fn query(&self, sql: &str) -> EngineResult<QueryResult>;

    /// Execute a statement for its side effect, returning the affected row
    /// count when the engine reports one.
    async fn execute(&self, sql: &str) -> EngineResult<u64>;

    /// Execute a batch atomically; any failure rolls the whole batch back.
    async fn execute_transaction(&self, statements: &[String]) -> EngineResult<()>;

    async fn prepare(&self, sql: &str) -> EngineResult<Arc<dyn PreparedQuery>>;
}

/// An engine-side prepared statement. The handle is released when the last
/// `Arc` is dropped, which happens exactly once per Parse.
#[async_trait]
pub trait PreparedQuery: Send + Sync {
    /// Result columns, known at prepare time and used to answer Describe.
    fn columns(&self) -> &[EngineColumn];

    async fn query(&self, params: &[EngineValue]) -> EngineResult<QueryResult>;
}
