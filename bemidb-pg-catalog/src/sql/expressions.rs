//! Expression, operator and type-cast remaps.
//!
//! These transforms are purely local: they look at one node (and its
//! immediate children) and either mutate it in place or replace it with a
//! generated construct. Recursive descent lives in the top-level walker.

use pg_query::protobuf::{AExprKind, JoinType, Node, NullTestType, TypeCast};
use pg_query::NodeEnum;

use crate::config::CatalogConfig;
use crate::error::RewriteResult;
use crate::sql::rewriter::WalkState;
use crate::sql::tree;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LocalRewrite {
    /// Keep walking into the (possibly mutated) node's children.
    Descend,
    /// The node was replaced by a generated construct; do not re-walk it.
    Replaced,
}

pub(crate) fn rewrite_local(
    node: &mut Node,
    config: &CatalogConfig,
    state: &mut WalkState,
) -> RewriteResult<LocalRewrite> {
    match node.node.as_mut() {
        Some(NodeEnum::TypeCast(_)) => rewrite_type_cast(node, config, state),
        Some(NodeEnum::AExpr(expr)) => {
            if expr.name.len() > 1 && tree::string_value(&expr.name[0]) == Some("pg_catalog") {
                expr.name.remove(0);
            }
            let operator = tree::a_expr_operator(expr);
            match (expr.kind(), operator.as_str()) {
                (AExprKind::AexprOpAny, "=") => {
                    rewrite_any_to_in(node);
                    Ok(LocalRewrite::Descend)
                }
                (AExprKind::AexprOp, "->>") => {
                    rewrite_json_operator(node, "json_extract_string");
                    Ok(LocalRewrite::Descend)
                }
                (AExprKind::AexprOp, "->") => {
                    rewrite_json_operator(node, "json_extract");
                    Ok(LocalRewrite::Descend)
                }
                (AExprKind::AexprOp, "?") => {
                    rewrite_json_operator(node, "json_exists");
                    Ok(LocalRewrite::Descend)
                }
                _ => Ok(LocalRewrite::Descend),
            }
        }
        Some(NodeEnum::NullTest(test)) => {
            let plain_column = test
                .arg
                .as_deref()
                .map(|arg| matches!(arg.node, Some(NodeEnum::ColumnRef(_))))
                .unwrap_or(false);
            if !plain_column {
                return Ok(LocalRewrite::Descend);
            }
            // Rewrite the column qualifier before wrapping.
            if let Some(arg) = test.arg.as_deref_mut() {
                rewrite_local(arg, config, state)?;
            }
            let mut flipped = test.clone();
            flipped.nulltesttype = match test.nulltesttype() {
                NullTestType::IsNull => NullTestType::IsNotNull,
                _ => NullTestType::IsNull,
            } as i32;
            *node = tree::not_expr(tree::node(NodeEnum::NullTest(flipped)));
            Ok(LocalRewrite::Replaced)
        }
        Some(NodeEnum::CollateClause(collate)) => {
            let name = tree::list_strings(&collate.collname);
            let is_default = matches!(
                name.iter().map(String::as_str).collect::<Vec<_>>().as_slice(),
                ["default"] | ["pg_catalog", "default"]
            );
            if is_default {
                if let Some(arg) = collate.arg.take() {
                    *node = *arg;
                    return rewrite_local(node, config, state);
                }
            }
            Ok(LocalRewrite::Descend)
        }
        Some(NodeEnum::ColumnRef(column_ref)) => {
            let fields = tree::column_ref_fields(column_ref);
            if fields.len() == 3 {
                let schema = fields[0].clone();
                let table = fields[1].clone();
                if schema != "pg_catalog" && schema != "information_schema" {
                    let rest = column_ref.fields.split_off(2);
                    if schema == "public" {
                        column_ref.fields = rest;
                    } else {
                        let merged = format!("{schema}_{table}");
                        let mut fields = vec![tree::string_node(&merged)];
                        fields.extend(rest);
                        column_ref.fields = fields;
                        state
                            .column_aliases
                            .insert(format!("{schema}.{table}"), merged);
                    }
                }
            }
            Ok(LocalRewrite::Descend)
        }
        Some(NodeEnum::FuncCall(call)) => {
            if let Some(replacement) = super::functions::rewrite_func_call(call, config) {
                *node = replacement;
            }
            Ok(LocalRewrite::Descend)
        }
        _ => Ok(LocalRewrite::Descend),
    }
}

fn rewrite_type_cast(
    node: &mut Node,
    config: &CatalogConfig,
    state: &WalkState,
) -> RewriteResult<LocalRewrite> {
    let Some(NodeEnum::TypeCast(cast)) = node.node.as_mut() else {
        return Ok(LocalRewrite::Descend);
    };

    if let Some(type_name) = cast.type_name.as_mut() {
        tree::strip_pg_catalog_qualifier(type_name);
    }
    let target = cast
        .type_name
        .as_ref()
        .map(tree::type_name_last)
        .unwrap_or_default();
    let is_array = cast
        .type_name
        .as_ref()
        .map(|t| !t.array_bounds.is_empty())
        .unwrap_or(false);

    if is_array {
        // '{a,b,c}'::text[] with a single literal becomes list_value(...)
        if matches!(target.as_str(), "text" | "varchar") {
            if let Some(elements) = cast
                .arg
                .as_deref()
                .and_then(tree::const_string)
                .as_deref()
                .and_then(parse_array_literal)
            {
                let args = elements.iter().map(|e| tree::string_const(e)).collect();
                *node = tree::function_call("list_value", args);
                return Ok(LocalRewrite::Replaced);
            }
        }
        return Ok(LocalRewrite::Descend);
    }

    match target.as_str() {
        "regclass" => {
            *node = rewrite_regclass_cast(cast, config, state)?;
            Ok(LocalRewrite::Replaced)
        }
        "regproc" | "regprocedure" => {
            *node = rewrite_regproc_cast(cast, config)?;
            Ok(LocalRewrite::Replaced)
        }
        "jsonb" => {
            cast.type_name = Some(tree::simple_type_name("json"));
            Ok(LocalRewrite::Descend)
        }
        "oid" => {
            // '...'::regclass::oid resolves through the same sub-select
            let inner_regclass = matches!(
                inner_cast_target(cast).as_deref(),
                Some("regclass")
            );
            if inner_regclass {
                if let Some(NodeEnum::TypeCast(inner)) =
                    cast.arg.as_deref_mut().and_then(|a| a.node.as_mut())
                {
                    if let Some(type_name) = inner.type_name.as_mut() {
                        tree::strip_pg_catalog_qualifier(type_name);
                    }
                    *node = rewrite_regclass_cast(inner, config, state)?;
                    return Ok(LocalRewrite::Replaced);
                }
            }
            Ok(LocalRewrite::Descend)
        }
        "text" => {
            // x::regtype::text and friends collapse to x::text
            if matches!(
                inner_cast_target(cast).as_deref(),
                Some("regtype") | Some("regnamespace") | Some("regclass")
            ) {
                let inner_arg = match cast.arg.as_deref_mut().and_then(|a| a.node.as_mut()) {
                    Some(NodeEnum::TypeCast(inner)) => inner.arg.take(),
                    _ => None,
                };
                if let Some(inner_arg) = inner_arg {
                    cast.arg = Some(inner_arg);
                }
            }
            Ok(LocalRewrite::Descend)
        }
        _ => Ok(LocalRewrite::Descend),
    }
}

fn inner_cast_target(cast: &TypeCast) -> Option<String> {
    match cast.arg.as_deref().and_then(|a| a.node.as_ref()) {
        Some(NodeEnum::TypeCast(inner)) => {
            let mut name = inner.type_name.as_ref().map(tree::type_name_last)?;
            if let Some(stripped) = name.strip_prefix("pg_catalog.") {
                name = stripped.to_string();
            }
            Some(name)
        }
        _ => None,
    }
}

/// `'schema.table'::regclass` resolves against the catalog mirror when the
/// relation is a known lakehouse table (a plain OID constant, no engine
/// round trip), and falls back to a correlated sub-select over the
/// emulated `pg_class` / `pg_namespace` otherwise. A non-literal argument
/// resolves to NULL.
fn rewrite_regclass_cast(
    cast: &TypeCast,
    config: &CatalogConfig,
    state: &WalkState,
) -> RewriteResult<Node> {
    let Some(literal) = cast.arg.as_deref().and_then(tree::const_string) else {
        return Ok(tree::null_const());
    };
    let (schema, relation) = split_qualified_name(&literal, "public");

    if let Some(mirror) = state.mirror.as_deref() {
        let namespace = if schema == "public" {
            config.default_schema.as_str()
        } else {
            schema.as_str()
        };
        if let Some(oid) = mirror.table_oid(namespace, &relation) {
            return Ok(tree::int_const(oid as i32));
        }
    }

    let sql = format!(
        "(SELECT c.oid FROM {m}.pg_class c JOIN {m}.pg_namespace n ON n.oid = c.relnamespace \
         WHERE n.nspname = {schema} AND c.relname = {relation})",
        m = config.default_schema,
        schema = tree::quote_literal(&schema),
        relation = tree::quote_literal(&relation),
    );
    tree::parse_expression(&sql)
}

/// `'schema.fn(argtypes)'::regproc` becomes a correlated sub-select keyed
/// on namespace, name, argument count and per-position argument types.
fn rewrite_regproc_cast(cast: &TypeCast, config: &CatalogConfig) -> RewriteResult<Node> {
    let Some(literal) = cast.arg.as_deref().and_then(tree::const_string) else {
        return Ok(tree::null_const());
    };

    let (name_part, args_part) = match literal.split_once('(') {
        Some((name, rest)) => (name.trim(), Some(rest.trim_end().trim_end_matches(')'))),
        None => (literal.trim(), None),
    };
    let (schema, function) = split_qualified_name(name_part, "pg_catalog");

    let mut conditions = format!(
        "n.nspname = {schema} AND p.proname = {function}",
        schema = tree::quote_literal(&schema),
        function = tree::quote_literal(&function),
    );

    if let Some(args_part) = args_part {
        let arg_types: Vec<&str> = args_part
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        conditions.push_str(&format!(" AND p.pronargs = {}", arg_types.len()));
        for (position, raw) in arg_types.iter().enumerate() {
            let canonical = canonical_type_name(raw);
            conditions.push_str(&format!(
                " AND p.proargtypes[{index}] = \
                 (SELECT t.oid FROM {m}.pg_type t JOIN {m}.pg_namespace tn \
                  ON tn.oid = t.typnamespace \
                  WHERE tn.nspname = 'pg_catalog' AND t.typname = {typname})",
                index = position + 1,
                m = config.default_schema,
                typname = tree::quote_literal(&canonical),
            ));
        }
    }

    let sql = format!(
        "(SELECT p.oid FROM pg_catalog.pg_proc p JOIN {m}.pg_namespace n \
         ON n.oid = p.pronamespace WHERE {conditions})",
        m = config.default_schema,
    );
    tree::parse_expression(&sql)
}

/// Canonical `pg_type.typname` for a Postgres type alias; `foo[]` becomes
/// `_foo`.
fn canonical_type_name(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('"').to_ascii_lowercase();
    if let Some(base) = trimmed.strip_suffix("[]") {
        return format!("_{}", canonical_type_name(base));
    }
    match trimmed.as_str() {
        "integer" | "int" => "int4".to_string(),
        "bigint" => "int8".to_string(),
        "smallint" => "int2".to_string(),
        "boolean" => "bool".to_string(),
        "real" => "float4".to_string(),
        "double precision" => "float8".to_string(),
        "decimal" => "numeric".to_string(),
        "character varying" => "varchar".to_string(),
        "character" => "bpchar".to_string(),
        "timestamp" | "timestamp without time zone" => "timestamp".to_string(),
        "timestamp with time zone" => "timestamptz".to_string(),
        "time" | "time without time zone" => "time".to_string(),
        "time with time zone" => "timetz".to_string(),
        "bit varying" => "varbit".to_string(),
        other => other.to_string(),
    }
}

/// Split `"schema"."name"` / `schema.name` / `name`, stripping quoting.
fn split_qualified_name(literal: &str, default_schema: &str) -> (String, String) {
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = literal.trim().chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            '.' if !in_quotes => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    parts.push(current);

    match parts.len() {
        1 => (default_schema.to_string(), parts.remove(0)),
        _ => {
            let name = parts.pop().unwrap_or_default();
            let schema = parts.pop().unwrap_or_default();
            (schema, name)
        }
    }
}

/// `x = ANY('{a,b}'::text[])` becomes `x IN ('a', 'b')`, in place.
fn rewrite_any_to_in(node: &mut Node) {
    let Some(NodeEnum::AExpr(expr)) = node.node.as_mut() else {
        return;
    };
    let elements = match expr.rexpr.as_deref().and_then(|r| r.node.as_ref()) {
        Some(NodeEnum::TypeCast(cast)) => cast
            .arg
            .as_deref()
            .and_then(tree::const_string)
            .as_deref()
            .and_then(parse_array_literal),
        _ => None,
    };
    let Some(elements) = elements else {
        return;
    };

    expr.kind = AExprKind::AexprIn as i32;
    expr.name = vec![tree::string_node("=")];
    expr.rexpr = Some(Box::new(tree::node(NodeEnum::List(
        pg_query::protobuf::List {
            items: elements.iter().map(|e| tree::string_const(e)).collect(),
        },
    ))));
}

fn rewrite_json_operator(node: &mut Node, function: &str) {
    let Some(NodeEnum::AExpr(expr)) = node.node.as_mut() else {
        return;
    };
    let (Some(lexpr), Some(rexpr)) = (expr.lexpr.take(), expr.rexpr.take()) else {
        return;
    };
    *node = tree::function_call(function, vec![*lexpr, *rexpr]);
}

/// Parse a Postgres array literal `{a,"b c",d}` into its members.
fn parse_array_literal(literal: &str) -> Option<Vec<String>> {
    let trimmed = literal.trim();
    let body = trimmed.strip_prefix('{')?.strip_suffix('}')?;
    if body.trim().is_empty() {
        return Some(Vec::new());
    }

    let mut members = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ',' if !in_quotes => members.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    members.push(current);

    Some(members.into_iter().map(|m| m.trim().to_string()).collect())
}

/// Exact-shape detection of the `psql \d` publication WHERE clause the
/// engine cannot plan: `(attrelid = pr.prrelid) AND (attnum = prattrs[s])`.
pub(crate) fn is_describe_publication_where(node: &Node) -> bool {
    let Some(NodeEnum::BoolExpr(bool_expr)) = node.node.as_ref() else {
        return false;
    };
    if bool_expr.args.len() != 2 {
        return false;
    }

    let first = equality_operands(&bool_expr.args[0]);
    let second = equality_operands(&bool_expr.args[1]);
    let (Some((l1, r1)), Some((l2, r2))) = (first, second) else {
        return false;
    };

    column_last_field(l1) == Some("attrelid")
        && column_last_field(r1) == Some("prrelid")
        && column_last_field(l2) == Some("attnum")
        && indirection_base_field(r2) == Some("prattrs")
}

fn equality_operands(node: &Node) -> Option<(&Node, &Node)> {
    match node.node.as_ref() {
        Some(NodeEnum::AExpr(expr))
            if expr.kind() == AExprKind::AexprOp && tree::a_expr_operator(expr) == "=" =>
        {
            Some((expr.lexpr.as_deref()?, expr.rexpr.as_deref()?))
        }
        _ => None,
    }
}

fn column_last_field(node: &Node) -> Option<&str> {
    match node.node.as_ref() {
        Some(NodeEnum::ColumnRef(column_ref)) => column_ref
            .fields
            .last()
            .and_then(tree::string_value),
        _ => None,
    }
}

fn indirection_base_field(node: &Node) -> Option<&str> {
    match node.node.as_ref() {
        Some(NodeEnum::AIndirection(indirection)) => {
            column_last_field(indirection.arg.as_deref()?)
        }
        _ => None,
    }
}

/// True when a JOIN qualification subscripts an `indclass` column, the one
/// shape where a non-INNER join must be downgraded for the engine.
pub(crate) fn references_indclass_subscript(node: Option<&Node>) -> bool {
    let Some(node) = node else {
        return false;
    };
    match node.node.as_ref() {
        Some(NodeEnum::AIndirection(indirection)) => indirection
            .arg
            .as_deref()
            .map(|arg| column_last_field(arg) == Some("indclass"))
            .unwrap_or(false),
        Some(NodeEnum::AExpr(expr)) => {
            references_indclass_subscript(expr.lexpr.as_deref())
                || references_indclass_subscript(expr.rexpr.as_deref())
        }
        Some(NodeEnum::BoolExpr(bool_expr)) => bool_expr
            .args
            .iter()
            .any(|arg| references_indclass_subscript(Some(arg))),
        Some(NodeEnum::FuncCall(call)) => call
            .args
            .iter()
            .any(|arg| references_indclass_subscript(Some(arg))),
        _ => false,
    }
}

/// Downgrade applies only to the `indclass[i]` join shape.
pub(crate) fn should_downgrade_join(jointype: JoinType, quals: Option<&Node>) -> bool {
    jointype != JoinType::JoinInner && references_indclass_subscript(quals)
}
