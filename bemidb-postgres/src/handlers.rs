//! Simple and extended query handling against the lakehouse engine.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bemidb_pg_catalog::{QueryRewriter, RewriteError};
use lake_pg::datatypes::is_statement_ack;
use lake_pg::row_encoder::{encode_query_result, fields_from_columns};
use lake_pg::{EngineError, EngineValue, LakeEngine, PreparedQuery, QueryResult};
use log::{debug, warn};
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DescribePortalResponse, DescribeStatementResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::{ClientInfo, ErrorHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};

use crate::auth::GatewayStartupHandler;
use crate::config::GatewayConfig;

/// The one engine error that triggers the `SELECT 1` liveness fallback.
const UNNEST_BINDER_ERROR: &str = "Binder Error: UNNEST requires a single list as input";

pub struct HandlerFactory {
    pub session_service: Arc<LakeSessionService>,
    startup_handler: Arc<GatewayStartupHandler>,
}

impl HandlerFactory {
    pub fn new(
        engine: Arc<dyn LakeEngine>,
        rewriter: QueryRewriter,
        config: Arc<GatewayConfig>,
    ) -> Self {
        let session_service = Arc::new(LakeSessionService::new(
            engine,
            rewriter,
            *config.query_timeout(),
        ));
        let startup_handler = Arc::new(GatewayStartupHandler::new(config));
        HandlerFactory {
            session_service,
            startup_handler,
        }
    }
}

impl PgWireServerHandlers for HandlerFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.session_service.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.session_service.clone()
    }

    fn startup_handler(&self) -> Arc<impl pgwire::api::auth::StartupHandler> {
        self.startup_handler.clone()
    }

    fn error_handler(&self) -> Arc<impl ErrorHandler> {
        Arc::new(LoggingErrorHandler)
    }
}

struct LoggingErrorHandler;

impl ErrorHandler for LoggingErrorHandler {
    fn on_error<C>(&self, _client: &C, error: &mut PgWireError)
    where
        C: ClientInfo,
    {
        debug!("sending error: {error}");
    }
}

/// The pgwire handler backed by the rewriter and the engine.
pub struct LakeSessionService {
    engine: Arc<dyn LakeEngine>,
    rewriter: QueryRewriter,
    parser: Arc<Parser>,
    query_timeout: Duration,
}

impl LakeSessionService {
    pub fn new(
        engine: Arc<dyn LakeEngine>,
        rewriter: QueryRewriter,
        query_timeout: Duration,
    ) -> LakeSessionService {
        let parser = Arc::new(Parser {
            engine: engine.clone(),
            rewriter: rewriter.clone(),
            query_timeout,
        });
        LakeSessionService {
            engine,
            rewriter,
            parser,
            query_timeout,
        }
    }

    async fn run_query(&self, sql: &str) -> Result<QueryResult, EngineError> {
        run_with_timeout(self.query_timeout, self.engine.query(sql)).await
    }

    /// Execute one rewritten statement, falling back to the literal
    /// `SELECT 1` on the known-harmless binder error so client liveness
    /// probes keep working.
    async fn execute_with_fallback(
        &self,
        rewritten: &str,
        original: &str,
    ) -> PgWireResult<QueryResult> {
        match self.run_query(rewritten).await {
            Ok(result) => Ok(result),
            Err(EngineError::Sql(message)) if message.contains(UNNEST_BINDER_ERROR) => {
                warn!("engine rejected {original:?} ({message}); falling back to SELECT 1");
                self.run_query("SELECT 1")
                    .await
                    .map_err(|e| engine_error_to_pgwire(e))
            }
            Err(e) => Err(engine_error_to_pgwire(e)),
        }
    }
}

async fn run_with_timeout<F>(timeout: Duration, query: F) -> Result<QueryResult, EngineError>
where
    F: std::future::Future<Output = Result<QueryResult, EngineError>>,
{
    match tokio::time::timeout(timeout, query).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout),
    }
}

#[async_trait]
impl SimpleQueryHandler for LakeSessionService {
    async fn do_query<'a, C>(&self, _client: &mut C, query: &str) -> PgWireResult<Vec<Response<'a>>>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        debug!("received query: {query}");

        let remapped = self
            .rewriter
            .parse_and_remap(query)
            .await
            .map_err(rewrite_error_to_pgwire)?;

        if remapped.rewritten.is_empty() {
            return Ok(vec![Response::EmptyQuery]);
        }

        let mut responses = Vec::with_capacity(remapped.rewritten.len());
        for (rewritten, original) in remapped.rewritten.iter().zip(remapped.originals.iter()) {
            let result = self.execute_with_fallback(rewritten, original).await?;
            responses.push(build_response(result, original)?);
        }
        Ok(responses)
    }
}

fn build_response<'a>(result: QueryResult, original: &str) -> PgWireResult<Response<'a>> {
    // The engine acknowledges SET-like statements with a lone boolean
    // `Success` column; those carry no row description on the wire.
    if is_statement_ack(&result.columns) {
        return Ok(Response::Execution(Tag::new(command_tag(original))));
    }
    Ok(Response::Query(encode_query_result(result)?))
}

/// CommandComplete tag derived by prefix-matching the original statement.
fn command_tag(original: &str) -> &'static str {
    let upper = original.trim_start().to_uppercase();
    const TAGS: &[(&str, &str)] = &[
        ("SET", "SET"),
        ("SHOW", "SHOW"),
        ("DISCARD ALL", "DISCARD ALL"),
        ("BEGIN", "BEGIN"),
        ("START TRANSACTION", "BEGIN"),
        ("COMMIT", "COMMIT"),
        ("END", "COMMIT"),
        ("ROLLBACK", "ROLLBACK"),
        ("ABORT", "ROLLBACK"),
        ("CREATE MATERIALIZED VIEW", "CREATE MATERIALIZED VIEW"),
        ("DROP MATERIALIZED VIEW", "DROP MATERIALIZED VIEW"),
        ("REFRESH MATERIALIZED VIEW", "REFRESH MATERIALIZED VIEW"),
        ("ALTER MATERIALIZED VIEW", "ALTER MATERIALIZED VIEW"),
    ];
    for (prefix, tag) in TAGS {
        if upper.starts_with(prefix) {
            return tag;
        }
    }
    "SELECT 1"
}

/// A Parse-message statement: the original text, its engine-dialect
/// rewrite, and the engine-side prepared handle (absent for the empty
/// query). The handle is released when the statement is closed.
#[derive(Clone)]
pub struct RemappedStatement {
    pub original: String,
    pub rewritten: String,
    pub param_types: Vec<Type>,
    pub prepared: Option<Arc<dyn PreparedQuery>>,
}

impl fmt::Debug for RemappedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemappedStatement")
            .field("original", &self.original)
            .field("rewritten", &self.rewritten)
            .field("param_types", &self.param_types)
            .finish()
    }
}

pub struct Parser {
    engine: Arc<dyn LakeEngine>,
    rewriter: QueryRewriter,
    query_timeout: Duration,
}

#[async_trait]
impl QueryParser for Parser {
    type Statement = RemappedStatement;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        types: &[Type],
    ) -> PgWireResult<Self::Statement> {
        debug!("received parse: {sql}");

        let remapped = self
            .rewriter
            .parse_and_remap(sql)
            .await
            .map_err(rewrite_error_to_pgwire)?;

        if remapped.rewritten.len() > 1 {
            return Err(rewrite_error_to_pgwire(RewriteError::MultipleStatements));
        }

        // empty query: ParseComplete without an engine handle
        let Some(rewritten) = remapped.rewritten.into_iter().next() else {
            return Ok(RemappedStatement {
                original: String::new(),
                rewritten: String::new(),
                param_types: types.to_vec(),
                prepared: None,
            });
        };
        let original = remapped.originals.into_iter().next().unwrap_or_default();

        let prepared = match tokio::time::timeout(self.query_timeout, self.engine.prepare(&rewritten))
            .await
        {
            Ok(result) => result.map_err(engine_error_to_pgwire)?,
            Err(_) => return Err(engine_error_to_pgwire(EngineError::Timeout)),
        };

        Ok(RemappedStatement {
            original,
            rewritten,
            param_types: types.to_vec(),
            prepared: Some(prepared),
        })
    }
}

#[async_trait]
impl ExtendedQueryHandler for LakeSessionService {
    type Statement = RemappedStatement;
    type QueryParser = Parser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.parser.clone()
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        let statement = &target.statement;
        let fields = statement
            .prepared
            .as_ref()
            .map(|prepared| fields_from_columns(prepared.columns()))
            .unwrap_or_default();
        Ok(DescribeStatementResponse::new(
            statement.param_types.clone(),
            fields,
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        let statement = &target.statement.statement;
        let fields = statement
            .prepared
            .as_ref()
            .map(|prepared| fields_from_columns(prepared.columns()))
            .unwrap_or_default();
        Ok(DescribePortalResponse::new(fields))
    }

    async fn do_query<'a, C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response<'a>>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        let statement = &portal.statement.statement;
        debug!("executing extended query: {}", statement.original);

        let Some(prepared) = statement.prepared.as_ref() else {
            return Ok(Response::EmptyQuery);
        };

        let params = decode_parameters(portal)?;
        let result = run_with_timeout(self.query_timeout, prepared.query(&params))
            .await
            .map_err(engine_error_to_pgwire)?;

        build_response(result, &statement.original)
    }
}

/// Decode bound parameters: text format arrives as raw strings; binary
/// parameters are recognized by length (int4, int8, uuid).
fn decode_parameters(portal: &Portal<RemappedStatement>) -> PgWireResult<Vec<EngineValue>> {
    let mut values = Vec::with_capacity(portal.parameters.len());
    for (idx, parameter) in portal.parameters.iter().enumerate() {
        let Some(bytes) = parameter else {
            values.push(EngineValue::Null);
            continue;
        };
        if parameter_is_binary(&portal.parameter_format, idx) {
            values.push(decode_binary_parameter(bytes.as_ref())?);
        } else {
            let text = String::from_utf8(bytes.to_vec()).map_err(|e| {
                PgWireError::UserError(Box::new(ErrorInfo::new(
                    "ERROR".to_string(),
                    "22021".to_string(),
                    format!("invalid parameter encoding: {e}"),
                )))
            })?;
            values.push(EngineValue::Text(text));
        }
    }
    Ok(values)
}

fn parameter_is_binary(format: &Format, idx: usize) -> bool {
    match format {
        Format::UnifiedText => false,
        Format::UnifiedBinary => true,
        Format::Individual(codes) => codes.get(idx).map(|code| *code == 1).unwrap_or(false),
    }
}

fn decode_binary_parameter(bytes: &[u8]) -> PgWireResult<EngineValue> {
    match bytes.len() {
        4 => {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(bytes);
            Ok(EngineValue::Int32(i32::from_be_bytes(buf)))
        }
        8 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(bytes);
            Ok(EngineValue::Int64(i64::from_be_bytes(buf)))
        }
        16 => uuid::Uuid::from_slice(bytes)
            .map(EngineValue::Uuid)
            .map_err(|e| {
                PgWireError::UserError(Box::new(ErrorInfo::new(
                    "ERROR".to_string(),
                    "22P03".to_string(),
                    format!("invalid uuid parameter: {e}"),
                )))
            }),
        other => Err(PgWireError::UserError(Box::new(ErrorInfo::new(
            "ERROR".to_string(),
            "22P03".to_string(),
            format!("unsupported binary parameter length {other}"),
        )))),
    }
}

fn engine_error_to_pgwire(error: EngineError) -> PgWireError {
    let (code, message) = match &error {
        EngineError::Timeout => ("57014", error.to_string()),
        EngineError::Connection(_) => ("08006", error.to_string()),
        EngineError::Sql(message) => ("XX000", message.clone()),
    };
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".to_string(),
        code.to_string(),
        message,
    )))
}

fn rewrite_error_to_pgwire(error: RewriteError) -> PgWireError {
    let code = match &error {
        RewriteError::Parse(_) => "42601",
        RewriteError::Unsupported(_) => "0A000",
        RewriteError::TableNotFound(_) => "42P01",
        RewriteError::Permissions(_) => "42501",
        RewriteError::MultipleStatements => "42601",
        RewriteError::UnknownSetting(_) => "42704",
        RewriteError::RelationExists(_) => "42P07",
        RewriteError::MatviewMissing(_) => "42P01",
        RewriteError::Engine(_) => "XX000",
    };
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".to_string(),
        code.to_string(),
        error.to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bemidb_pg_catalog::catalog::CatalogCache;
    use bemidb_pg_catalog::{CatalogConfig, MemoryMaterializedViewStore};
    use lake_pg::mock::MockEngine;
    use lake_pg::EngineColumn;

    fn service_with(engine: MockEngine) -> LakeSessionService {
        let engine = Arc::new(engine);
        let cache = Arc::new(CatalogCache::new(CatalogConfig::default()));
        let store = Arc::new(MemoryMaterializedViewStore::new());
        let rewriter = QueryRewriter::new(engine.clone(), cache, store);
        LakeSessionService::new(engine, rewriter, Duration::from_secs(5))
    }

    #[test]
    fn test_command_tags() {
        assert_eq!(command_tag("SET timezone TO 'UTC'"), "SET");
        assert_eq!(
            command_tag("SET SESSION CHARACTERISTICS AS TRANSACTION ISOLATION LEVEL READ UNCOMMITTED"),
            "SET"
        );
        assert_eq!(command_tag("DISCARD ALL"), "DISCARD ALL");
        assert_eq!(command_tag("begin"), "BEGIN");
        assert_eq!(command_tag("COMMIT"), "COMMIT");
        assert_eq!(command_tag("ROLLBACK"), "ROLLBACK");
        assert_eq!(
            command_tag("CREATE MATERIALIZED VIEW mv AS SELECT 1"),
            "CREATE MATERIALIZED VIEW"
        );
        assert_eq!(command_tag("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn test_binary_parameter_decoding() {
        assert_eq!(
            decode_binary_parameter(&42i32.to_be_bytes()).unwrap(),
            EngineValue::Int32(42)
        );
        assert_eq!(
            decode_binary_parameter(&7i64.to_be_bytes()).unwrap(),
            EngineValue::Int64(7)
        );
        let uuid = uuid::Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
        assert_eq!(
            decode_binary_parameter(uuid.as_bytes()).unwrap(),
            EngineValue::Uuid(uuid)
        );
        assert!(decode_binary_parameter(&[1, 2, 3]).is_err());
    }

    #[tokio::test]
    async fn test_unnest_binder_error_falls_back_to_select_1() {
        let engine = MockEngine::new()
            .with_error(
                "json_each",
                "Binder Error: UNNEST requires a single list as input",
            )
            .with_result(
                "SELECT 1",
                MockEngine::single("one", "INTEGER", EngineValue::Int32(1)),
            );
        let service = service_with(engine);

        let result = service
            .execute_with_fallback("SELECT * FROM json_each(x)", "SELECT * FROM json_each(x)")
            .await
            .unwrap();
        assert_eq!(result.rows, vec![vec![EngineValue::Int32(1)]]);
    }

    #[tokio::test]
    async fn test_other_engine_errors_surface() {
        let engine = MockEngine::new().with_error("broken", "Catalog Error: broken does not exist");
        let service = service_with(engine);

        let err = service
            .execute_with_fallback("SELECT * FROM broken", "SELECT * FROM broken")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Catalog Error"));
    }

    #[tokio::test]
    async fn test_statement_ack_elides_row_description() {
        let result = QueryResult::new(
            vec![EngineColumn::new("Success", "BOOLEAN")],
            vec![vec![EngineValue::Bool(true)]],
        );
        match build_response(result, "SET timezone TO 'UTC'").unwrap() {
            Response::Execution(_) => {}
            _ => panic!("expected execution response"),
        }

        let rows = QueryResult::new(
            vec![EngineColumn::new("count", "BIGINT")],
            vec![vec![EngineValue::Int64(2)]],
        );
        match build_response(rows, "SELECT COUNT(*)").unwrap() {
            Response::Query(_) => {}
            _ => panic!("expected query response"),
        }
    }

    #[tokio::test]
    async fn test_query_timeout_surfaces_cancellation() {
        struct SlowEngine;
        #[async_trait]
        impl LakeEngine for SlowEngine {
            async fn query(&self, _sql: &str) -> Result<QueryResult, EngineError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(QueryResult::empty())
            }
            async fn execute(&self, _sql: &str) -> Result<u64, EngineError> {
                Ok(0)
            }
            async fn execute_transaction(&self, _s: &[String]) -> Result<(), EngineError> {
                Ok(())
            }
            async fn prepare(
                &self,
                _sql: &str,
            ) -> Result<Arc<dyn PreparedQuery>, EngineError> {
                Err(EngineError::sql("unused"))
            }
        }

        let engine = Arc::new(SlowEngine);
        let cache = Arc::new(CatalogCache::new(CatalogConfig::default()));
        let store = Arc::new(MemoryMaterializedViewStore::new());
        let rewriter = QueryRewriter::new(engine.clone(), cache, store);
        let service = LakeSessionService::new(engine, rewriter, Duration::from_millis(20));

        let err = service
            .execute_with_fallback("SELECT pg_sleep(10)", "SELECT pg_sleep(10)")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("statement timeout"));
    }
}
