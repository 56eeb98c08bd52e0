//! Top-level statement rewriter.
//!
//! One entry point, [`QueryRewriter::parse_and_remap`]: parse the incoming
//! text, dispatch per statement kind, walk SELECTs depth-first, and hand
//! back the rewritten SQL next to the deparsed originals used for command
//! tags. Any error aborts the whole batch, so the engine never sees a
//! partially rewritten batch.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use lake_pg::LakeEngine;
use log::{debug, error, trace, warn};
use pg_query::protobuf::{
    BoolExprType, CreateTableAsStmt, DropStmt, Node, ObjectType, RefreshMatViewStmt, RenameStmt,
    SelectStmt, SetOperation, VariableSetStmt,
};
use pg_query::NodeEnum;

use crate::catalog::CatalogCache;
use crate::config::CatalogConfig;
use crate::error::{RewriteError, RewriteResult};
use crate::matview::{self, MaterializedViewStore, StoredMaterializedView};
use crate::permissions::{extract_permissions, PermissionSet};
use crate::sql::expressions::{self, LocalRewrite};
use crate::sql::ident;
use crate::sql::tree;

/// Statement executed in place of commands the engine has no use for.
pub const NOOP_STATEMENT: &str = "SET timezone = 'UTC'";

/// Settings clients routinely SET that the engine has no equivalent for;
/// they are acknowledged and dropped.
const KNOWN_IGNORED_SETTINGS: &[&str] = &[
    "application_name",
    "bytea_output",
    "client_encoding",
    "client_min_messages",
    "datestyle",
    "default_transaction_isolation",
    "default_transaction_read_only",
    "extra_float_digits",
    "idle_in_transaction_session_timeout",
    "intervalstyle",
    "jit",
    "lock_timeout",
    "row_security",
    "search_path",
    "session characteristics",
    "ssl_renegotiation_limit",
    "standard_conforming_strings",
    "statement_timeout",
    "transaction",
    "transaction_isolation",
    "work_mem",
    "xmloption",
];

#[derive(Default)]
pub(crate) struct WalkState {
    pub permissions: Option<PermissionSet>,
    /// Catalog mirror taken at walk start; answers literal `::regclass`
    /// lookups without touching the engine.
    pub mirror: Option<Arc<crate::catalog::CatalogMirror>>,
    /// `"schema.table"` as written by the client mapped to the alias the
    /// rewritten reference goes by.
    pub column_aliases: HashMap<String, String>,
    /// One cache rebuild per query at most.
    pub refreshed: bool,
}

#[derive(Debug, Clone)]
pub struct RemappedStatements {
    /// Engine-dialect statements, one per input statement.
    pub rewritten: Vec<String>,
    /// Deparsed originals, used for command-tag detection.
    pub originals: Vec<String>,
}

#[derive(Clone)]
pub struct QueryRewriter {
    pub(crate) engine: Arc<dyn LakeEngine>,
    pub(crate) cache: Arc<CatalogCache>,
    pub(crate) store: Arc<dyn MaterializedViewStore>,
    pub(crate) config: CatalogConfig,
}

impl QueryRewriter {
    pub fn new(
        engine: Arc<dyn LakeEngine>,
        cache: Arc<CatalogCache>,
        store: Arc<dyn MaterializedViewStore>,
    ) -> Self {
        let config = cache.config().clone();
        QueryRewriter {
            engine,
            cache,
            store,
            config,
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub async fn parse_and_remap(&self, query: &str) -> RewriteResult<RemappedStatements> {
        let parsed = tree::parse(query)?;
        if parsed.stmts.is_empty() {
            return Ok(RemappedStatements {
                rewritten: Vec::new(),
                originals: Vec::new(),
            });
        }
        if query.trim_end().ends_with("--INSPECT") {
            trace!("parse tree: {parsed:#?}");
        }

        let permissions = extract_permissions(query)?;
        let mut idents = ident::extract_long_identifiers(query);
        let version = parsed.version;

        let mut rewritten = Vec::with_capacity(parsed.stmts.len());
        let mut originals = Vec::with_capacity(parsed.stmts.len());

        for raw in &parsed.stmts {
            let Some(stmt) = raw.stmt.as_deref() else {
                continue;
            };
            ident::collect_long_identifiers(stmt, &mut idents);

            let original = tree::deparse_statement(stmt, version)?;
            let output = self
                .rewrite_statement(stmt, version, permissions.clone())
                .await?;

            originals.push(ident::restore_long_identifiers(&original, &idents));
            rewritten.push(ident::restore_long_identifiers(&output, &idents));
        }

        Ok(RemappedStatements {
            rewritten,
            originals,
        })
    }

    async fn rewrite_statement(
        &self,
        stmt: &Node,
        version: i32,
        permissions: Option<PermissionSet>,
    ) -> RewriteResult<String> {
        match stmt.node.as_ref() {
            Some(NodeEnum::SelectStmt(_)) => {
                self.rewrite_query_node(stmt, version, permissions).await
            }
            Some(NodeEnum::VariableSetStmt(set)) => self.rewrite_set(set, stmt, version),
            Some(NodeEnum::VariableShowStmt(show)) => show_statement_sql(&show.name),
            Some(NodeEnum::TransactionStmt(_)) | Some(NodeEnum::DiscardStmt(_)) => {
                Ok(NOOP_STATEMENT.to_string())
            }
            Some(NodeEnum::CreateTableAsStmt(create))
                if create.objtype() == ObjectType::ObjectMatview =>
            {
                self.create_materialized_view(create, version, permissions)
                    .await?;
                Ok(NOOP_STATEMENT.to_string())
            }
            Some(NodeEnum::DropStmt(drop)) if drop.remove_type() == ObjectType::ObjectMatview => {
                self.drop_materialized_view(drop).await?;
                Ok(NOOP_STATEMENT.to_string())
            }
            Some(NodeEnum::RefreshMatViewStmt(refresh)) => {
                self.refresh_materialized_view(refresh, permissions).await?;
                Ok(NOOP_STATEMENT.to_string())
            }
            Some(NodeEnum::RenameStmt(rename))
                if rename.rename_type() == ObjectType::ObjectMatview =>
            {
                self.rename_materialized_view(rename).await?;
                Ok(NOOP_STATEMENT.to_string())
            }
            Some(other) => Err(RewriteError::Unsupported(statement_kind(other).to_string())),
            None => Err(RewriteError::Unsupported("empty statement".to_string())),
        }
    }

    /// Rewrite a SELECT node and deparse it.
    async fn rewrite_query_node(
        &self,
        query: &Node,
        version: i32,
        permissions: Option<PermissionSet>,
    ) -> RewriteResult<String> {
        let mut node = query.clone();
        let mut state = WalkState {
            permissions,
            mirror: Some(self.cache.mirror().await),
            ..Default::default()
        };
        if let Some(NodeEnum::SelectStmt(select)) = node.node.as_mut() {
            self.rewrite_select(select, &mut state).await?;
        }
        tree::deparse_statement(&node, version)
    }

    fn rewrite_set(
        &self,
        set: &VariableSetStmt,
        stmt: &Node,
        version: i32,
    ) -> RewriteResult<String> {
        let name = set.name.to_lowercase();
        if matches!(name.as_str(), "timezone" | "time_zone") {
            return tree::deparse_statement(stmt, version);
        }
        if KNOWN_IGNORED_SETTINGS.contains(&name.as_str()) {
            debug!("ignoring SET {name}");
        } else {
            warn!("ignoring unsupported SET {name}");
        }
        Ok(NOOP_STATEMENT.to_string())
    }

    // Materialized view DDL ------------------------------------------------

    async fn create_materialized_view(
        &self,
        create: &CreateTableAsStmt,
        version: i32,
        permissions: Option<PermissionSet>,
    ) -> RewriteResult<()> {
        let Some(into) = create.r#into.as_ref() else {
            return Err(RewriteError::Unsupported(
                "CREATE MATERIALIZED VIEW".to_string(),
            ));
        };
        let Some(rel) = into.rel.as_ref() else {
            return Err(RewriteError::Unsupported(
                "CREATE MATERIALIZED VIEW".to_string(),
            ));
        };
        let schema = if rel.schemaname.is_empty() {
            "public".to_string()
        } else {
            rel.schemaname.clone()
        };
        let name = rel.relname.clone();

        let Some(query) = create.query.as_deref() else {
            return Err(RewriteError::Unsupported(
                "CREATE MATERIALIZED VIEW".to_string(),
            ));
        };
        let definition = tree::deparse_statement(query, version)?;

        let created = self
            .store
            .create(
                StoredMaterializedView {
                    schema: schema.clone(),
                    name: name.clone(),
                    definition,
                },
                create.if_not_exists,
            )
            .await?;

        if !created || into.skip_data {
            return Ok(());
        }

        let populate = async {
            let rewritten = self.rewrite_query_node(query, version, permissions).await?;
            matview::materialize(
                self.engine.as_ref(),
                &self.config,
                &schema,
                &name,
                &rewritten,
            )
            .await
        };

        if let Err(e) = populate.await {
            // best effort: forget the half-created view
            if let Err(cleanup) = self.store.delete(&schema, &name, true).await {
                warn!("failed to clean up materialized view {schema}.{name}: {cleanup}");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn drop_materialized_view(&self, drop: &DropStmt) -> RewriteResult<()> {
        let (schema, name) = drop_target(drop)
            .ok_or_else(|| RewriteError::Unsupported("DROP MATERIALIZED VIEW".to_string()))?;

        let deleted = self.store.delete(&schema, &name, drop.missing_ok).await?;
        if deleted {
            if let Err(e) =
                matview::drop_materialized(self.engine.as_ref(), &self.config, &schema, &name)
                    .await
            {
                warn!("failed to drop materialized table {schema}.{name}: {e}");
            }
        }
        Ok(())
    }

    async fn refresh_materialized_view(
        &self,
        refresh: &RefreshMatViewStmt,
        permissions: Option<PermissionSet>,
    ) -> RewriteResult<()> {
        let Some(rel) = refresh.relation.as_ref() else {
            return Err(RewriteError::Unsupported(
                "REFRESH MATERIALIZED VIEW".to_string(),
            ));
        };
        let schema = if rel.schemaname.is_empty() {
            "public".to_string()
        } else {
            rel.schemaname.clone()
        };
        let name = rel.relname.clone();

        let view = self
            .store
            .get(&schema, &name)
            .await?
            .ok_or_else(|| RewriteError::MatviewMissing(name.clone()))?;

        if refresh.skip_data {
            return Ok(());
        }

        if refresh.concurrent {
            let rewriter = self.clone();
            tokio::spawn(async move {
                if let Err(e) = rewriter.populate_from_definition(&view, None).await {
                    error!(
                        "concurrent refresh of {}.{} failed: {e}",
                        view.schema, view.name
                    );
                }
            });
            return Ok(());
        }

        self.populate_from_definition(&view, permissions).await
    }

    async fn populate_from_definition(
        &self,
        view: &StoredMaterializedView,
        permissions: Option<PermissionSet>,
    ) -> RewriteResult<()> {
        let parsed = tree::parse(&view.definition)?;
        let stmt = parsed
            .stmts
            .first()
            .and_then(|raw| raw.stmt.as_deref())
            .ok_or_else(|| RewriteError::MatviewMissing(view.name.clone()))?;
        let rewritten = self
            .rewrite_query_node(stmt, parsed.version, permissions)
            .await?;
        matview::materialize(
            self.engine.as_ref(),
            &self.config,
            &view.schema,
            &view.name,
            &rewritten,
        )
        .await
    }

    async fn rename_materialized_view(&self, rename: &RenameStmt) -> RewriteResult<()> {
        let Some(rel) = rename.relation.as_ref() else {
            return Err(RewriteError::Unsupported(
                "ALTER MATERIALIZED VIEW".to_string(),
            ));
        };
        let schema = if rel.schemaname.is_empty() {
            "public".to_string()
        } else {
            rel.schemaname.clone()
        };

        match self
            .store
            .rename(&schema, &rel.relname, &rename.newname)
            .await
        {
            Ok(()) => {
                if let Err(e) = matview::rename_materialized(
                    self.engine.as_ref(),
                    &self.config,
                    &schema,
                    &rel.relname,
                    &rename.newname,
                )
                .await
                {
                    warn!(
                        "failed to rename materialized table {schema}.{}: {e}",
                        rel.relname
                    );
                }
                Ok(())
            }
            Err(RewriteError::MatviewMissing(_)) if rename.missing_ok => Ok(()),
            Err(e) => Err(e),
        }
    }

    // SELECT walk ----------------------------------------------------------

    pub(crate) fn rewrite_select<'a>(
        &'a self,
        select: &'a mut SelectStmt,
        state: &'a mut WalkState,
    ) -> BoxFuture<'a, RewriteResult<()>> {
        Box::pin(async move {
            for target in &mut select.target_list {
                self.rewrite_node(target, state).await?;
            }

            if select.op() != SetOperation::SetopNone {
                if let Some(larg) = select.larg.as_deref_mut() {
                    self.rewrite_select(larg, state).await?;
                }
                if let Some(rarg) = select.rarg.as_deref_mut() {
                    self.rewrite_select(rarg, state).await?;
                }
            }

            let drop_where = self.config.drop_describe_where_workaround
                && select
                    .where_clause
                    .as_deref()
                    .map(expressions::is_describe_publication_where)
                    .unwrap_or(false);
            if drop_where {
                select.where_clause = None;
            } else if let Some(where_clause) = select.where_clause.as_deref_mut() {
                self.rewrite_node(where_clause, state).await?;
            }

            if let Some(with) = select.with_clause.as_mut() {
                for cte in &mut with.ctes {
                    self.rewrite_node(cte, state).await?;
                }
            }

            for item in &mut select.from_clause {
                self.rewrite_from_item(item, state).await?;
            }

            for sort in &mut select.sort_clause {
                self.rewrite_node(sort, state).await?;
            }
            for group in &mut select.group_clause {
                self.rewrite_node(group, state).await?;
            }
            if let Some(having) = select.having_clause.as_deref_mut() {
                self.rewrite_node(having, state).await?;
            }

            Ok(())
        })
    }

    pub(crate) fn rewrite_node<'a>(
        &'a self,
        node: &'a mut Node,
        state: &'a mut WalkState,
    ) -> BoxFuture<'a, RewriteResult<()>> {
        Box::pin(async move {
            if expressions::rewrite_local(node, &self.config, state)? == LocalRewrite::Replaced {
                return Ok(());
            }

            match node.node.as_mut() {
                Some(NodeEnum::ResTarget(target)) => {
                    if let Some(val) = target.val.as_deref_mut() {
                        self.rewrite_node(val, state).await?;
                    }
                }
                Some(NodeEnum::FuncCall(call)) => {
                    for arg in &mut call.args {
                        self.rewrite_node(arg, state).await?;
                    }
                    if let Some(filter) = call.agg_filter.as_deref_mut() {
                        self.rewrite_node(filter, state).await?;
                    }
                    for order in &mut call.agg_order {
                        self.rewrite_node(order, state).await?;
                    }
                }
                Some(NodeEnum::AExpr(expr)) => {
                    if let Some(lexpr) = expr.lexpr.as_deref_mut() {
                        self.rewrite_node(lexpr, state).await?;
                    }
                    if let Some(rexpr) = expr.rexpr.as_deref_mut() {
                        self.rewrite_node(rexpr, state).await?;
                    }
                }
                Some(NodeEnum::BoolExpr(bool_expr)) => {
                    let negation = bool_expr.boolop() == BoolExprType::NotExpr;
                    for arg in &mut bool_expr.args {
                        // NOT (x IS [NOT] NULL) is already in normalized
                        // form; descend past the null test.
                        if negation {
                            if let Some(NodeEnum::NullTest(test)) = arg.node.as_mut() {
                                if let Some(inner) = test.arg.as_deref_mut() {
                                    self.rewrite_node(inner, state).await?;
                                }
                                continue;
                            }
                        }
                        self.rewrite_node(arg, state).await?;
                    }
                }
                Some(NodeEnum::NullTest(test)) => {
                    if let Some(arg) = test.arg.as_deref_mut() {
                        self.rewrite_node(arg, state).await?;
                    }
                }
                Some(NodeEnum::SubLink(link)) => {
                    if let Some(test) = link.testexpr.as_deref_mut() {
                        self.rewrite_node(test, state).await?;
                    }
                    if let Some(subselect) = link.subselect.as_deref_mut() {
                        self.rewrite_node(subselect, state).await?;
                    }
                }
                Some(NodeEnum::SelectStmt(subselect)) => {
                    self.rewrite_select(subselect, state).await?;
                }
                Some(NodeEnum::TypeCast(cast)) => {
                    if let Some(arg) = cast.arg.as_deref_mut() {
                        self.rewrite_node(arg, state).await?;
                    }
                }
                Some(NodeEnum::CaseExpr(case)) => {
                    if let Some(arg) = case.arg.as_deref_mut() {
                        self.rewrite_node(arg, state).await?;
                    }
                    for when in &mut case.args {
                        self.rewrite_node(when, state).await?;
                    }
                    if let Some(defresult) = case.defresult.as_deref_mut() {
                        self.rewrite_node(defresult, state).await?;
                    }
                }
                Some(NodeEnum::CaseWhen(when)) => {
                    if let Some(expr) = when.expr.as_deref_mut() {
                        self.rewrite_node(expr, state).await?;
                    }
                    if let Some(result) = when.result.as_deref_mut() {
                        self.rewrite_node(result, state).await?;
                    }
                }
                Some(NodeEnum::CoalesceExpr(coalesce)) => {
                    for arg in &mut coalesce.args {
                        self.rewrite_node(arg, state).await?;
                    }
                }
                Some(NodeEnum::MinMaxExpr(minmax)) => {
                    for arg in &mut minmax.args {
                        self.rewrite_node(arg, state).await?;
                    }
                }
                Some(NodeEnum::SortBy(sort)) => {
                    if let Some(inner) = sort.node.as_deref_mut() {
                        self.rewrite_node(inner, state).await?;
                    }
                }
                Some(NodeEnum::AIndirection(indirection)) => {
                    if let Some(arg) = indirection.arg.as_deref_mut() {
                        self.rewrite_node(arg, state).await?;
                    }
                }
                Some(NodeEnum::AArrayExpr(array)) => {
                    for element in &mut array.elements {
                        self.rewrite_node(element, state).await?;
                    }
                }
                Some(NodeEnum::List(list)) => {
                    for item in &mut list.items {
                        self.rewrite_node(item, state).await?;
                    }
                }
                Some(NodeEnum::RowExpr(row)) => {
                    for arg in &mut row.args {
                        self.rewrite_node(arg, state).await?;
                    }
                }
                Some(NodeEnum::CommonTableExpr(cte)) => {
                    if let Some(query) = cte.ctequery.as_deref_mut() {
                        self.rewrite_node(query, state).await?;
                    }
                }
                _ => {}
            }
            Ok(())
        })
    }
}

fn drop_target(drop: &DropStmt) -> Option<(String, String)> {
    let object = drop.objects.first()?;
    let parts = match object.node.as_ref() {
        Some(NodeEnum::List(list)) => tree::list_strings(&list.items),
        Some(NodeEnum::String(s)) => vec![s.sval.clone()],
        _ => return None,
    };
    match parts.len() {
        1 => Some(("public".to_string(), parts[0].clone())),
        2 => Some((parts[0].clone(), parts[1].clone())),
        n if n > 2 => Some((parts[n - 2].clone(), parts[n - 1].clone())),
        _ => None,
    }
}

/// Static table of SHOW-able settings.
fn show_statement_sql(name: &str) -> RewriteResult<String> {
    let sql = match name.to_lowercase().as_str() {
        "timezone" | "time_zone" => {
            "SELECT current_setting('TimeZone') AS \"timezone\"".to_string()
        }
        "server_version" => "SELECT '17.0' AS server_version".to_string(),
        "search_path" => "SELECT '\"$user\", public' AS search_path".to_string(),
        "transaction_isolation" => {
            "SELECT 'read uncommitted' AS transaction_isolation".to_string()
        }
        "max_connections" => "SELECT '100' AS max_connections".to_string(),
        "standard_conforming_strings" => {
            "SELECT 'on' AS standard_conforming_strings".to_string()
        }
        "client_encoding" => "SELECT 'UTF8' AS client_encoding".to_string(),
        "is_superuser" => "SELECT 'on' AS is_superuser".to_string(),
        "all" => "SELECT name, setting FROM main.pg_show_all_settings()".to_string(),
        other => return Err(RewriteError::UnknownSetting(other.to_string())),
    };
    Ok(sql)
}

fn statement_kind(node: &NodeEnum) -> &'static str {
    match node {
        NodeEnum::InsertStmt(_) => "INSERT",
        NodeEnum::UpdateStmt(_) => "UPDATE",
        NodeEnum::DeleteStmt(_) => "DELETE",
        NodeEnum::CreateStmt(_) => "CREATE TABLE",
        NodeEnum::CreateTableAsStmt(_) => "CREATE TABLE AS",
        NodeEnum::ViewStmt(_) => "CREATE VIEW",
        NodeEnum::IndexStmt(_) => "CREATE INDEX",
        NodeEnum::DropStmt(_) => "DROP",
        NodeEnum::TruncateStmt(_) => "TRUNCATE",
        NodeEnum::AlterTableStmt(_) => "ALTER TABLE",
        NodeEnum::CopyStmt(_) => "COPY",
        NodeEnum::VacuumStmt(_) => "VACUUM",
        NodeEnum::ExplainStmt(_) => "EXPLAIN",
        NodeEnum::PrepareStmt(_) => "PREPARE",
        NodeEnum::ExecuteStmt(_) => "EXECUTE",
        NodeEnum::DeallocateStmt(_) => "DEALLOCATE",
        NodeEnum::RenameStmt(_) => "ALTER",
        NodeEnum::GrantStmt(_) => "GRANT",
        NodeEnum::LockStmt(_) => "LOCK",
        _ => "statement",
    }
}
