use lake_pg::EngineError;
use thiserror::Error;

pub type RewriteResult<T> = Result<T, RewriteError>;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("{0}")]
    Parse(#[from] pg_query::Error),
    #[error("unsupported query type: {0}")]
    Unsupported(String),
    #[error("Table with name {0} does not exist")]
    TableNotFound(String),
    #[error("invalid permissions comment: {0}")]
    Permissions(String),
    #[error("cannot insert multiple commands into a prepared statement")]
    MultipleStatements,
    #[error("unrecognized configuration parameter \"{0}\"")]
    UnknownSetting(String),
    #[error("relation \"{0}\" already exists")]
    RelationExists(String),
    #[error("materialized view \"{0}\" does not exist")]
    MatviewMissing(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}
