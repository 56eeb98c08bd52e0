//! Table-reference rewriting.
//!
//! Every FROM-clause item goes through here: `pg_catalog.*` references are
//! remapped onto the emulated relations (triggering a lazy cache refresh
//! for the handful of tables clients poll), `information_schema.*` turns
//! into filtered sub-selects, and user tables become direct qualified
//! engine references so LIMIT/WHERE/projection pushdown keeps working.

use futures::future::BoxFuture;
use pg_query::protobuf::{Alias, JoinType, Node};
use pg_query::NodeEnum;

use crate::config::CatalogConfig;
use crate::error::{RewriteError, RewriteResult};
use crate::pg_catalog;
use crate::sql::expressions;
use crate::sql::functions;
use crate::sql::rewriter::{QueryRewriter, WalkState};
use crate::sql::tree;

/// References to these trigger a catalog refresh before rewriting.
const REFRESH_TRIGGERS: &[&str] = &["pg_class", "pg_stat_user_tables", "pg_matviews"];

impl QueryRewriter {
    pub(crate) fn rewrite_from_item<'a>(
        &'a self,
        item: &'a mut Node,
        state: &'a mut WalkState,
    ) -> BoxFuture<'a, RewriteResult<()>> {
        Box::pin(async move {
            match item.node.as_mut() {
                Some(NodeEnum::RangeVar(_)) => self.rewrite_range_var(item, state).await,
                Some(NodeEnum::JoinExpr(join)) => {
                    if expressions::should_downgrade_join(join.jointype(), join.quals.as_deref()) {
                        join.jointype = JoinType::JoinInner as i32;
                    }
                    if let Some(larg) = join.larg.as_deref_mut() {
                        self.rewrite_from_item(larg, state).await?;
                    }
                    if let Some(rarg) = join.rarg.as_deref_mut() {
                        self.rewrite_from_item(rarg, state).await?;
                    }
                    if let Some(quals) = join.quals.as_deref_mut() {
                        self.rewrite_node(quals, state).await?;
                    }
                    Ok(())
                }
                Some(NodeEnum::RangeSubselect(subselect)) => {
                    if let Some(query) = subselect.subquery.as_deref_mut() {
                        self.rewrite_node(query, state).await?;
                    }
                    Ok(())
                }
                Some(NodeEnum::RangeFunction(_)) => {
                    rewrite_range_function(item, &self.config);
                    Ok(())
                }
                _ => Ok(()),
            }
        })
    }

    async fn rewrite_range_var(
        &self,
        item: &mut Node,
        state: &mut WalkState,
    ) -> RewriteResult<()> {
        let (catalog, schema, table, alias) = match item.node.as_ref() {
            Some(NodeEnum::RangeVar(rv)) => (
                rv.catalogname.clone(),
                rv.schemaname.clone(),
                rv.relname.clone(),
                rv.alias.as_ref().map(|a| a.aliasname.clone()),
            ),
            _ => return Ok(()),
        };

        // Already engine-qualified references pass through untouched.
        if !catalog.is_empty() || schema == self.config.default_schema {
            return Ok(());
        }

        if schema == "pg_catalog" {
            if REFRESH_TRIGGERS.contains(&table.as_str()) {
                self.refresh_catalog_for(&table, state).await?;
            }
            if pg_catalog::is_emulated_relation(&table) {
                if let Some(NodeEnum::RangeVar(rv)) = item.node.as_mut() {
                    rv.schemaname = self.config.default_schema.clone();
                }
            }
            // anything else is answered by the engine's own pg_catalog
            return Ok(());
        }

        if schema == "information_schema" {
            if let Some(view) = pg_catalog::information_schema_view(&table) {
                let alias_name = alias.unwrap_or_else(|| table.clone());
                let predicate = information_schema_predicate(&table, state);
                let sql = format!(
                    "(SELECT * FROM {m}.{view} WHERE {predicate}) AS \"{alias_name}\"",
                    m = self.config.default_schema,
                );
                *item = tree::parse_from_item(&sql)?;
            }
            return Ok(());
        }

        self.rewrite_user_table(item, state, schema, table, alias)
            .await
    }

    async fn rewrite_user_table(
        &self,
        item: &mut Node,
        state: &mut WalkState,
        schema: String,
        table: String,
        alias: Option<String>,
    ) -> RewriteResult<()> {
        let source_schema = if schema.is_empty() {
            "public".to_string()
        } else {
            schema
        };
        let engine_schema = if source_schema == "public" {
            self.config.default_schema.clone()
        } else {
            source_schema.clone()
        };

        if !self.cache.has_table(&engine_schema, &table).await {
            if !state.refreshed {
                self.cache.rebuild(self.engine.as_ref()).await?;
                state.refreshed = true;
            }
            if !self.cache.has_table(&engine_schema, &table).await {
                return Err(RewriteError::TableNotFound(table));
            }
        }

        let alias_name = alias.unwrap_or_else(|| {
            if source_schema == "public" {
                table.clone()
            } else {
                format!("{source_schema}_{table}")
            }
        });
        state
            .column_aliases
            .insert(format!("{source_schema}.{table}"), alias_name.clone());

        match state.permissions.as_ref() {
            None => {
                // direct reference, no sub-select wrapper, so pushdown of
                // LIMIT/WHERE/projections survives
                *item = tree::node(NodeEnum::RangeVar(tree::range_var(
                    &self.config.catalog_name,
                    &engine_schema,
                    &table,
                    Some(&alias_name),
                )));
            }
            Some(permissions) => {
                let allowed = permissions
                    .allowed_columns(&source_schema, &table)
                    .filter(|columns| !columns.is_empty());
                let sql = match allowed {
                    Some(columns) => {
                        let list = columns
                            .iter()
                            .map(|c| format!("\"{c}\""))
                            .collect::<Vec<_>>()
                            .join(", ");
                        format!(
                            "(SELECT {list} FROM {}) AS \"{alias_name}\"",
                            self.config.engine_table(&engine_schema, &table)
                        )
                    }
                    None => format!("(SELECT NULL WHERE false) AS \"{alias_name}\""),
                };
                *item = tree::parse_from_item(&sql)?;
            }
        }
        Ok(())
    }

    async fn refresh_catalog_for(
        &self,
        relname: &str,
        state: &mut WalkState,
    ) -> RewriteResult<()> {
        if !state.refreshed {
            self.cache.rebuild(self.engine.as_ref()).await?;
            state.refreshed = true;
        }
        let snapshot = self.cache.snapshot().await;

        match relname {
            "pg_class" => {
                // re-register the synthesized lakehouse relations
                let mirror = self.cache.mirror().await;
                for sql in pg_catalog::refresh_statements(&self.config, &snapshot, &mirror) {
                    self.engine.execute(&sql).await?;
                }
            }
            "pg_stat_user_tables" => {
                for sql in pg_catalog::pg_stat_user_tables_upserts(&self.config, &snapshot) {
                    self.engine.execute(&sql).await?;
                }
            }
            "pg_matviews" => {
                let views: Vec<(String, String, String)> = self
                    .store
                    .list()
                    .await?
                    .into_iter()
                    .map(|v| (v.schema, v.name, v.definition))
                    .collect();
                for sql in pg_catalog::pg_matviews_upserts(&self.config, &views) {
                    self.engine.execute(&sql).await?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn information_schema_predicate(table: &str, state: &WalkState) -> String {
    let mut predicate = String::from("table_name NOT LIKE 'ducklake\\_%' ESCAPE '\\'");
    let Some(permissions) = state.permissions.as_ref() else {
        return predicate;
    };

    let visible = permissions.visible_tables();
    if visible.is_empty() {
        predicate.push_str(" AND false");
    } else {
        predicate.push_str(&format!(
            " AND table_schema || '.' || table_name IN ({})",
            quoted_list(&visible)
        ));
    }

    if matches!(table, "columns" | "key_column_usage") {
        let columns = permissions.visible_columns();
        if columns.is_empty() {
            predicate.push_str(" AND false");
        } else {
            predicate.push_str(&format!(" AND column_name IN ({})", quoted_list(&columns)));
        }
    }

    predicate
}

fn quoted_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| tree::quote_literal(item))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Table functions in FROM: apply the function remap, and give
/// `(jsonb_)?json_array_elements` its implicit `(unnest)` alias with the
/// single `value` column so `SELECT value FROM ...` keeps resolving.
fn rewrite_range_function(item: &mut Node, config: &CatalogConfig) {
    let Some(NodeEnum::RangeFunction(range_function)) = item.node.as_mut() else {
        return;
    };

    let mut needs_value_alias = false;
    for entry in &mut range_function.functions {
        match entry.node.as_mut() {
            Some(NodeEnum::List(list)) => {
                for node in &mut list.items {
                    rewrite_function_entry(node, config, &mut needs_value_alias);
                }
            }
            Some(NodeEnum::FuncCall(_)) => {
                rewrite_function_entry(entry, config, &mut needs_value_alias);
            }
            _ => {}
        }
    }

    if needs_value_alias && range_function.alias.is_none() {
        range_function.alias = Some(Alias {
            aliasname: "unnest".to_string(),
            colnames: vec![tree::string_node("value")],
        });
    }
}

fn rewrite_function_entry(node: &mut Node, config: &CatalogConfig, needs_value_alias: &mut bool) {
    let Some(NodeEnum::FuncCall(call)) = node.node.as_mut() else {
        return;
    };
    let name = tree::func_call_name(call).1;
    if matches!(name.as_str(), "json_array_elements" | "jsonb_array_elements") {
        *needs_value_alias = true;
    }
    if let Some(replacement) = functions::rewrite_func_call(call, config) {
        *node = replacement;
    }
}
