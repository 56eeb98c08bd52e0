//! Function-call remaps.

use pg_query::protobuf::{FuncCall, Node};
use pg_query::NodeEnum;

use crate::config::CatalogConfig;
use crate::pg_catalog::is_emulated_macro;
use crate::sql::tree;

/// Apply the function remap table to one call, in place. Returns a
/// replacement node when the rewrite changes the call's shape entirely.
pub(crate) fn rewrite_func_call(call: &mut FuncCall, config: &CatalogConfig) -> Option<Node> {
    let (schema, name) = tree::func_call_name(call);

    // Emulated functions qualified as pg_catalog.F / information_schema.F
    // live in the engine default schema.
    if matches!(
        schema.as_deref(),
        Some("pg_catalog") | Some("information_schema")
    ) && is_emulated_macro(&name)
    {
        tree::set_func_call_name(call, Some(&config.default_schema), &name);
    }

    match name.as_str() {
        "jsonb_agg" => Some(rewrite_jsonb_agg(call)),
        "format" => {
            rewrite_format(call);
            None
        }
        "encode" => rewrite_encode(call),
        "date_trunc" => {
            // null-safe wrapper macro
            tree::set_func_call_name(call, Some(&config.default_schema), "pg_date_trunc");
            None
        }
        _ => None,
    }
}

/// `jsonb_agg(x) FILTER (...)` becomes `to_json(array_agg(x) FILTER (...))`
/// with ORDER BY / DISTINCT / WITHIN GROUP / FILTER kept on the inner
/// aggregate.
fn rewrite_jsonb_agg(call: &mut FuncCall) -> Node {
    let mut inner = call.clone();
    tree::set_func_call_name(&mut inner, None, "array_agg");
    tree::function_call("to_json", vec![tree::node(NodeEnum::FuncCall(Box::new(inner)))])
}

/// `format(fmt, a, b)` becomes `printf(fmt')` where the i-th unindexed
/// `%s` is replaced with `%i$s`.
fn rewrite_format(call: &mut FuncCall) {
    tree::set_func_call_name(call, None, "printf");
    let Some(first) = call.args.first_mut() else {
        return;
    };
    if let Some(fmt) = tree::const_string(first) {
        *first = tree::string_const(&positional_format(&fmt));
    }
}

fn positional_format(fmt: &str) -> String {
    let mut out = String::with_capacity(fmt.len());
    let mut position = 0;
    let mut chars = fmt.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('%') => {
                out.push_str("%%");
                chars.next();
            }
            Some('s') => {
                position += 1;
                out.push_str(&format!("%{position}$s"));
                chars.next();
            }
            _ => out.push('%'),
        }
    }

    out
}

/// `encode(sha256(x), 'hex')` collapses to `sha256(x)`, which the engine
/// already renders as hex text.
fn rewrite_encode(call: &FuncCall) -> Option<Node> {
    if call.args.len() != 2 {
        return None;
    }
    let hex = tree::const_string(&call.args[1])
        .map(|s| s == "hex")
        .unwrap_or(false);
    if !hex {
        return None;
    }
    match call.args[0].node.as_ref() {
        Some(NodeEnum::FuncCall(inner)) if tree::func_call_name(inner).1 == "sha256" => {
            Some(call.args[0].clone())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_from(expr: &str) -> FuncCall {
        let node = tree::parse_expression(expr).unwrap();
        match node.node {
            Some(NodeEnum::FuncCall(call)) => *call,
            other => panic!("expected function call, got {other:?}"),
        }
    }

    fn config() -> CatalogConfig {
        CatalogConfig::default()
    }

    #[test]
    fn test_emulated_macro_is_requalified() {
        let mut call = call_from("pg_catalog.current_setting('TimeZone')");
        assert!(rewrite_func_call(&mut call, &config()).is_none());
        assert_eq!(
            tree::func_call_name(&call),
            (Some("main".to_string()), "current_setting".to_string())
        );
    }

    #[test]
    fn test_unknown_pg_catalog_function_untouched() {
        let mut call = call_from("pg_catalog.substring('abc', 1, 2)");
        assert!(rewrite_func_call(&mut call, &config()).is_none());
        assert_eq!(
            tree::func_call_name(&call).0,
            Some("pg_catalog".to_string())
        );
    }

    #[test]
    fn test_jsonb_agg_becomes_to_json_of_array_agg() {
        let mut call = call_from("jsonb_agg(x ORDER BY y)");
        let replacement = rewrite_func_call(&mut call, &config()).unwrap();
        let Some(NodeEnum::FuncCall(outer)) = replacement.node else {
            panic!("expected call");
        };
        assert_eq!(tree::func_call_name(&outer).1, "to_json");
        let Some(NodeEnum::FuncCall(inner)) = outer.args[0].node.as_ref() else {
            panic!("expected inner call");
        };
        assert_eq!(tree::func_call_name(inner).1, "array_agg");
        assert!(!inner.agg_order.is_empty());
    }

    #[test]
    fn test_format_positionalizes_unindexed_placeholders() {
        assert_eq!(positional_format("%s-%s"), "%1$s-%2$s");
        assert_eq!(positional_format("100%% %s"), "100%% %1$s");
        assert_eq!(positional_format("%d"), "%d");

        let mut call = call_from("format('%s.%s', a, b)");
        assert!(rewrite_func_call(&mut call, &config()).is_none());
        assert_eq!(tree::func_call_name(&call).1, "printf");
        assert_eq!(
            tree::const_string(&call.args[0]).as_deref(),
            Some("%1$s.%2$s")
        );
    }

    #[test]
    fn test_encode_sha256_hex_collapses() {
        let mut call = call_from("encode(sha256(payload), 'hex')");
        let replacement = rewrite_func_call(&mut call, &config()).unwrap();
        let Some(NodeEnum::FuncCall(inner)) = replacement.node else {
            panic!("expected call");
        };
        assert_eq!(tree::func_call_name(&inner).1, "sha256");

        // other encodings stay
        let mut call = call_from("encode(sha256(payload), 'base64')");
        assert!(rewrite_func_call(&mut call, &config()).is_none());
    }

    #[test]
    fn test_date_trunc_uses_null_safe_macro() {
        let mut call = call_from("date_trunc('day', created_at)");
        assert!(rewrite_func_call(&mut call, &config()).is_none());
        assert_eq!(
            tree::func_call_name(&call),
            (Some("main".to_string()), "pg_date_trunc".to_string())
        );
    }
}
