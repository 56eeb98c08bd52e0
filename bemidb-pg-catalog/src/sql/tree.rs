//! Typed accessors and builders over the SQL parse tree.
//!
//! Every other module manipulates the AST through these helpers, so the
//! parser dependency stays contained. Builders that need a deep tree
//! (sub-selects, FROM items) format SQL text and re-parse it, which keeps
//! constructed nodes well-formed by definition.

use pg_query::protobuf::{
    self, a_const, AConst, Alias, BoolExprType, CoercionForm, ColumnRef, FuncCall, Node, RangeVar,
    TypeCast, TypeName,
};
use pg_query::NodeEnum;

use crate::error::{RewriteError, RewriteResult};

pub fn node(inner: NodeEnum) -> Node {
    Node { node: Some(inner) }
}

pub fn string_node(value: &str) -> Node {
    node(NodeEnum::String(protobuf::String {
        sval: value.to_string(),
    }))
}

pub fn string_const(value: &str) -> Node {
    node(NodeEnum::AConst(AConst {
        isnull: false,
        val: Some(a_const::Val::Sval(protobuf::String {
            sval: value.to_string(),
        })),
        ..Default::default()
    }))
}

pub fn int_const(value: i32) -> Node {
    node(NodeEnum::AConst(AConst {
        isnull: false,
        val: Some(a_const::Val::Ival(protobuf::Integer { ival: value })),
        ..Default::default()
    }))
}

pub fn null_const() -> Node {
    node(NodeEnum::AConst(AConst {
        isnull: true,
        val: None,
        ..Default::default()
    }))
}

/// String payload of a plain `String` node.
pub fn string_value(n: &Node) -> Option<&str> {
    match n.node.as_ref() {
        Some(NodeEnum::String(s)) => Some(&s.sval),
        _ => None,
    }
}

pub fn list_strings(nodes: &[Node]) -> Vec<String> {
    nodes
        .iter()
        .filter_map(|n| string_value(n).map(str::to_string))
        .collect()
}

/// String payload of a constant node (`'literal'`).
pub fn const_string(n: &Node) -> Option<String> {
    match n.node.as_ref() {
        Some(NodeEnum::AConst(c)) => match c.val.as_ref() {
            Some(a_const::Val::Sval(s)) => Some(s.sval.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Split a function's qualified name into `(schema, name)`.
pub fn func_call_name(call: &FuncCall) -> (Option<String>, String) {
    let parts = list_strings(&call.funcname);
    match parts.len() {
        0 => (None, String::new()),
        1 => (None, parts[0].clone()),
        _ => (
            Some(parts[parts.len() - 2].clone()),
            parts[parts.len() - 1].clone(),
        ),
    }
}

pub fn set_func_call_name(call: &mut FuncCall, schema: Option<&str>, name: &str) {
    let mut names = Vec::new();
    if let Some(schema) = schema {
        names.push(string_node(schema));
    }
    names.push(string_node(name));
    call.funcname = names;
}

/// First argument when it is a string literal.
pub fn first_string_argument(call: &FuncCall) -> Option<String> {
    call.args.first().and_then(const_string)
}

pub fn function_call(name: &str, args: Vec<Node>) -> Node {
    node(NodeEnum::FuncCall(Box::new(FuncCall {
        funcname: vec![string_node(name)],
        args,
        funcformat: CoercionForm::CoerceExplicitCall as i32,
        ..Default::default()
    })))
}

pub fn range_var(catalog: &str, schema: &str, name: &str, alias: Option<&str>) -> RangeVar {
    RangeVar {
        catalogname: catalog.to_string(),
        schemaname: schema.to_string(),
        relname: name.to_string(),
        inh: true,
        relpersistence: "p".to_string(),
        alias: alias.map(|a| Alias {
            aliasname: a.to_string(),
            colnames: vec![],
        }),
        location: -1,
    }
}

/// All string fields of a column reference; `*` is returned as `"*"`.
pub fn column_ref_fields(column_ref: &ColumnRef) -> Vec<String> {
    column_ref
        .fields
        .iter()
        .map(|f| match f.node.as_ref() {
            Some(NodeEnum::String(s)) => s.sval.clone(),
            Some(NodeEnum::AStar(_)) => "*".to_string(),
            _ => String::new(),
        })
        .collect()
}

/// Operator name of an A-expression (`=`, `->>`, ...), with any
/// `pg_catalog` qualifier ignored.
pub fn a_expr_operator(expr: &protobuf::AExpr) -> String {
    list_strings(&expr.name)
        .last()
        .cloned()
        .unwrap_or_default()
}

/// Last (unqualified) part of a type name.
pub fn type_name_last(type_name: &TypeName) -> String {
    list_strings(&type_name.names)
        .last()
        .cloned()
        .unwrap_or_default()
}

pub fn type_name_parts(type_name: &TypeName) -> Vec<String> {
    list_strings(&type_name.names)
}

/// Drop a leading `pg_catalog` qualifier from a type name, in place.
pub fn strip_pg_catalog_qualifier(type_name: &mut TypeName) {
    if type_name.names.len() > 1
        && string_value(&type_name.names[0]) == Some("pg_catalog")
    {
        type_name.names.remove(0);
    }
}

pub fn simple_type_name(name: &str) -> TypeName {
    TypeName {
        names: vec![string_node(name)],
        typemod: -1,
        ..Default::default()
    }
}

pub fn type_cast(arg: Node, type_name: &str) -> Node {
    node(NodeEnum::TypeCast(Box::new(TypeCast {
        arg: Some(Box::new(arg)),
        type_name: Some(simple_type_name(type_name)),
        ..Default::default()
    })))
}

/// Wrap an expression in `NOT (...)`.
pub fn not_expr(arg: Node) -> Node {
    node(NodeEnum::BoolExpr(Box::new(protobuf::BoolExpr {
        boolop: BoolExprType::NotExpr as i32,
        args: vec![arg],
        ..Default::default()
    })))
}

/// Parse a list of statements; whitespace-only input parses to zero
/// statements. Returns the protobuf result so the parser version travels
/// with the tree for later deparsing.
pub fn parse(sql: &str) -> Result<protobuf::ParseResult, pg_query::Error> {
    pg_query::parse(sql).map(|result| result.protobuf)
}

/// Deparse a single statement node.
pub fn deparse_statement(stmt: &Node, version: i32) -> RewriteResult<String> {
    let result = protobuf::ParseResult {
        version,
        stmts: vec![protobuf::RawStmt {
            stmt: Some(Box::new(stmt.clone())),
            ..Default::default()
        }],
    };
    Ok(pg_query::deparse(&result)?)
}

/// Parse `expr_sql` as a scalar expression and return its node.
pub fn parse_expression(expr_sql: &str) -> RewriteResult<Node> {
    let result = pg_query::parse(&format!("SELECT {expr_sql}"))?;
    let select = result
        .protobuf
        .stmts
        .first()
        .and_then(|raw| raw.stmt.as_ref())
        .and_then(|stmt| match stmt.node.as_ref() {
            Some(NodeEnum::SelectStmt(select)) => Some(select),
            _ => None,
        })
        .ok_or_else(|| RewriteError::Unsupported(format!("not an expression: {expr_sql}")))?;
    select
        .target_list
        .first()
        .and_then(|target| match target.node.as_ref() {
            Some(NodeEnum::ResTarget(res)) => res.val.as_deref().cloned(),
            _ => None,
        })
        .ok_or_else(|| RewriteError::Unsupported(format!("not an expression: {expr_sql}")))
}

/// Parse `item_sql` as a FROM-clause item (sub-select, function, table).
pub fn parse_from_item(item_sql: &str) -> RewriteResult<Node> {
    let result = pg_query::parse(&format!("SELECT * FROM {item_sql}"))?;
    result
        .protobuf
        .stmts
        .first()
        .and_then(|raw| raw.stmt.as_ref())
        .and_then(|stmt| match stmt.node.as_ref() {
            Some(NodeEnum::SelectStmt(select)) => select.from_clause.first().cloned(),
            _ => None,
        })
        .ok_or_else(|| RewriteError::Unsupported(format!("not a FROM item: {item_sql}")))
}

/// Escape a string for embedding in a generated SQL single-quoted literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_select_expr(sql: &str) -> Node {
        parse_expression(sql).expect("expression parses")
    }

    #[test]
    fn test_func_call_name_extraction() {
        let expr = parse_select_expr("pg_catalog.current_setting('x')");
        let Some(NodeEnum::FuncCall(call)) = expr.node.as_ref() else {
            panic!("expected function call");
        };
        assert_eq!(
            func_call_name(call),
            (Some("pg_catalog".to_string()), "current_setting".to_string())
        );
        assert_eq!(first_string_argument(call), Some("x".to_string()));
    }

    #[test]
    fn test_set_func_call_name() {
        let expr = parse_select_expr("version()");
        let Some(NodeEnum::FuncCall(call)) = expr.node else {
            panic!("expected function call");
        };
        let mut call = *call;
        set_func_call_name(&mut call, Some("main"), "version");
        assert_eq!(
            func_call_name(&call),
            (Some("main".to_string()), "version".to_string())
        );
    }

    #[test]
    fn test_column_ref_fields() {
        let expr = parse_select_expr("public.users.id");
        let Some(NodeEnum::ColumnRef(column_ref)) = expr.node.as_ref() else {
            panic!("expected column ref");
        };
        assert_eq!(column_ref_fields(column_ref), vec!["public", "users", "id"]);
    }

    #[test]
    fn test_type_cast_helpers() {
        let expr = parse_select_expr("x::pg_catalog.int4");
        let Some(NodeEnum::TypeCast(cast)) = expr.node else {
            panic!("expected cast");
        };
        let mut type_name = cast.type_name.clone().expect("type name");
        assert_eq!(type_name_last(&type_name), "int4");
        strip_pg_catalog_qualifier(&mut type_name);
        assert_eq!(type_name_parts(&type_name), vec!["int4"]);
    }

    #[test]
    fn test_not_expr_deparses() {
        let version = parse("SELECT 1").unwrap().version;
        let inner = parse_select_expr("x IS NULL");
        let wrapped = not_expr(inner);
        // splice into a statement to deparse
        let select = parse("SELECT 1").unwrap();
        let mut stmt = select.stmts[0].stmt.as_deref().cloned().unwrap();
        if let Some(NodeEnum::SelectStmt(ref mut s)) = stmt.node {
            if let Some(NodeEnum::ResTarget(ref mut res)) = s.target_list[0].node {
                res.val = Some(Box::new(wrapped));
            }
        }
        let sql = deparse_statement(&stmt, version).unwrap();
        assert!(sql.contains("NOT") && sql.contains("x IS NULL"), "got: {sql}");
    }

    #[test]
    fn test_parse_from_item() {
        let item = parse_from_item("(SELECT 1) sub").unwrap();
        assert!(matches!(
            item.node,
            Some(NodeEnum::RangeSubselect(_))
        ));
    }

    #[test]
    fn test_empty_input_parses_to_no_statements() {
        assert!(parse("").unwrap().stmts.is_empty());
        assert!(parse("  ;").unwrap().stmts.is_empty());
        assert!(parse(" ").unwrap().stmts.is_empty());
    }

    #[test]
    fn test_quote_literal_escapes() {
        assert_eq!(quote_literal("it's"), "'it''s'");
    }
}
