//! Long identifier preservation across parse/deparse round-trips.
//!
//! Postgres (and therefore the parser used for rewriting) truncates
//! identifiers to 63 bytes. Double-quoted identifiers longer than that are
//! collected from the original query text before parsing and spliced back
//! into the deparsed SQL afterwards. Two distinct originals sharing a
//! 63-byte prefix would collide in the map; that case is not handled.

use std::collections::HashMap;

use pg_query::protobuf::Node;
use pg_query::NodeEnum;

const MAX_IDENTIFIER_BYTES: usize = 63;

/// Map from 63-byte truncated form to the original identifier.
pub type LongIdentifierMap = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionKind {
    /// String literal, comment or dollar-quoted body; never rewritten.
    Literal,
    /// Double-quoted identifier; candidate for extraction/replacement.
    QuotedIdentifier,
}

#[derive(Debug, Clone, Copy)]
struct Region {
    start: usize,
    end: usize,
    kind: RegionKind,
}

/// Truncate to at most `max_bytes`, never splitting a UTF-8 code point.
pub fn truncate_utf8(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Scan SQL text marking string literals, comments, dollar-quoted bodies
/// and double-quoted identifiers. Handles `''` doubling, `E'...'`
/// backslash escapes, `$tag$ ... $tag$` and nested block comments.
fn scan_regions(sql: &str) -> Vec<Region> {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut regions = Vec::new();
    let mut i = 0;

    while i < len {
        match bytes[i] {
            b'\'' => {
                let escaped = is_estring_prefix(bytes, i);
                let end = scan_single_quoted(bytes, i + 1, escaped);
                regions.push(Region {
                    start: i,
                    end,
                    kind: RegionKind::Literal,
                });
                i = end;
            }
            b'"' => {
                let end = scan_double_quoted(bytes, i + 1);
                regions.push(Region {
                    start: i,
                    end,
                    kind: RegionKind::QuotedIdentifier,
                });
                i = end;
            }
            b'-' if i + 1 < len && bytes[i + 1] == b'-' => {
                let end = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map(|p| i + p + 1)
                    .unwrap_or(len);
                regions.push(Region {
                    start: i,
                    end,
                    kind: RegionKind::Literal,
                });
                i = end;
            }
            b'/' if i + 1 < len && bytes[i + 1] == b'*' => {
                let end = scan_block_comment(bytes, i + 2);
                regions.push(Region {
                    start: i,
                    end,
                    kind: RegionKind::Literal,
                });
                i = end;
            }
            b'$' if i == 0 || !is_ident_byte(bytes[i - 1]) => {
                if let Some((body_start, tag_len)) = scan_dollar_tag(bytes, i) {
                    let tag = &sql[i..body_start];
                    let end = sql[body_start..]
                        .find(tag)
                        .map(|p| body_start + p + tag_len)
                        .unwrap_or(len);
                    regions.push(Region {
                        start: i,
                        end,
                        kind: RegionKind::Literal,
                    });
                    i = end;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }

    regions
}

fn is_estring_prefix(bytes: &[u8], quote_at: usize) -> bool {
    if quote_at == 0 {
        return false;
    }
    let prev = bytes[quote_at - 1];
    if prev != b'e' && prev != b'E' {
        return false;
    }
    // The E must not itself be the tail of an identifier (e.g. `TABLE'x'`).
    quote_at < 2 || !is_ident_byte(bytes[quote_at - 2])
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn scan_single_quoted(bytes: &[u8], mut i: usize, backslash_escapes: bool) -> usize {
    let len = bytes.len();
    while i < len {
        match bytes[i] {
            b'\\' if backslash_escapes => i += 2,
            b'\'' => {
                if i + 1 < len && bytes[i + 1] == b'\'' {
                    i += 2;
                } else {
                    return i + 1;
                }
            }
            _ => i += 1,
        }
    }
    len
}

fn scan_double_quoted(bytes: &[u8], mut i: usize) -> usize {
    let len = bytes.len();
    while i < len {
        if bytes[i] == b'"' {
            if i + 1 < len && bytes[i + 1] == b'"' {
                i += 2;
            } else {
                return i + 1;
            }
        } else {
            i += 1;
        }
    }
    len
}

fn scan_block_comment(bytes: &[u8], mut i: usize) -> usize {
    let len = bytes.len();
    let mut depth = 1;
    while i + 1 < len {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
        } else if bytes[i] == b'/' && bytes[i + 1] == b'*' {
            depth += 1;
            i += 2;
        } else {
            i += 1;
        }
    }
    len
}

/// Returns `(body_start, tag_len)` when a dollar-quote tag starts at `i`.
fn scan_dollar_tag(bytes: &[u8], i: usize) -> Option<(usize, usize)> {
    let len = bytes.len();
    let mut j = i + 1;
    while j < len && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
        j += 1;
    }
    if j < len && bytes[j] == b'$' {
        Some((j + 1, j + 1 - i))
    } else {
        None
    }
}

fn unescape_quoted(content: &str) -> String {
    content.replace("\"\"", "\"")
}

/// Collect `> 63`-byte double-quoted identifiers from the raw query text,
/// keyed by their UTF-8-safe 63-byte truncation.
pub fn extract_long_identifiers(sql: &str) -> LongIdentifierMap {
    let mut map = LongIdentifierMap::new();
    for region in scan_regions(sql) {
        if region.kind != RegionKind::QuotedIdentifier {
            continue;
        }
        if region.end <= region.start + 2 {
            continue;
        }
        let content = unescape_quoted(&sql[region.start + 1..region.end - 1]);
        if content.len() > MAX_IDENTIFIER_BYTES {
            map.insert(
                truncate_utf8(&content, MAX_IDENTIFIER_BYTES).to_string(),
                content,
            );
        }
    }
    map
}

/// Collect long identifiers carried by AST nodes that commonly hold names:
/// column refs, res targets, range vars and their aliases, CTE names,
/// function names, joins and subquery aliases.
pub fn collect_long_identifiers(root: &Node, map: &mut LongIdentifierMap) {
    let Some(inner) = root.node.as_ref() else {
        return;
    };

    let mut remember = |name: &str| {
        if name.len() > MAX_IDENTIFIER_BYTES {
            map.insert(
                truncate_utf8(name, MAX_IDENTIFIER_BYTES).to_string(),
                name.to_string(),
            );
        }
    };

    match inner {
        NodeEnum::SelectStmt(select) => {
            for n in select
                .target_list
                .iter()
                .chain(select.from_clause.iter())
                .chain(select.group_clause.iter())
                .chain(select.sort_clause.iter())
            {
                collect_long_identifiers(n, map);
            }
            if let Some(w) = select.where_clause.as_deref() {
                collect_long_identifiers(w, map);
            }
            if let Some(with) = select.with_clause.as_ref() {
                for cte in &with.ctes {
                    collect_long_identifiers(cte, map);
                }
            }
            if let Some(larg) = select.larg.as_deref() {
                collect_long_identifiers(
                    &Node {
                        node: Some(NodeEnum::SelectStmt(Box::new(larg.clone()))),
                    },
                    map,
                );
            }
            if let Some(rarg) = select.rarg.as_deref() {
                collect_long_identifiers(
                    &Node {
                        node: Some(NodeEnum::SelectStmt(Box::new(rarg.clone()))),
                    },
                    map,
                );
            }
        }
        NodeEnum::ResTarget(target) => {
            remember(&target.name);
            if let Some(val) = target.val.as_deref() {
                collect_long_identifiers(val, map);
            }
        }
        NodeEnum::ColumnRef(column_ref) => {
            for field in &column_ref.fields {
                if let Some(NodeEnum::String(s)) = field.node.as_ref() {
                    remember(&s.sval);
                }
            }
        }
        NodeEnum::RangeVar(rv) => {
            remember(&rv.schemaname);
            remember(&rv.relname);
            if let Some(alias) = rv.alias.as_ref() {
                remember(&alias.aliasname);
            }
        }
        NodeEnum::CommonTableExpr(cte) => {
            remember(&cte.ctename);
            if let Some(query) = cte.ctequery.as_deref() {
                collect_long_identifiers(query, map);
            }
        }
        NodeEnum::FuncCall(call) => {
            for name in &call.funcname {
                if let Some(NodeEnum::String(s)) = name.node.as_ref() {
                    remember(&s.sval);
                }
            }
            for arg in &call.args {
                collect_long_identifiers(arg, map);
            }
        }
        NodeEnum::JoinExpr(join) => {
            if let Some(larg) = join.larg.as_deref() {
                collect_long_identifiers(larg, map);
            }
            if let Some(rarg) = join.rarg.as_deref() {
                collect_long_identifiers(rarg, map);
            }
            if let Some(alias) = join.alias.as_ref() {
                remember(&alias.aliasname);
            }
        }
        NodeEnum::RangeSubselect(sub) => {
            if let Some(alias) = sub.alias.as_ref() {
                remember(&alias.aliasname);
            }
            if let Some(query) = sub.subquery.as_deref() {
                collect_long_identifiers(query, map);
            }
        }
        NodeEnum::SortBy(sort) => {
            if let Some(n) = sort.node.as_deref() {
                collect_long_identifiers(n, map);
            }
        }
        _ => {}
    }
}

/// Splice original identifiers back into deparsed SQL. Literal and comment
/// regions are copied verbatim; bare or quoted tokens equal to a truncated
/// key are replaced with the quoted original. With an empty map the input
/// is returned unchanged.
pub fn restore_long_identifiers(sql: &str, idents: &LongIdentifierMap) -> String {
    if idents.is_empty() {
        return sql.to_string();
    }

    let regions = scan_regions(sql);
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut out = String::with_capacity(sql.len());
    let mut region_idx = 0;
    let mut i = 0;

    while i < len {
        while region_idx < regions.len() && regions[region_idx].end <= i {
            region_idx += 1;
        }

        if region_idx < regions.len() && regions[region_idx].start == i {
            let region = regions[region_idx];
            let text = &sql[region.start..region.end];
            match region.kind {
                RegionKind::Literal => out.push_str(text),
                RegionKind::QuotedIdentifier => {
                    let content =
                        unescape_quoted(&sql[region.start + 1..region.end.saturating_sub(1)]);
                    match idents.get(&content) {
                        Some(original) => out.push_str(&quote_identifier(original)),
                        None => out.push_str(text),
                    }
                }
            }
            i = region.end;
            continue;
        }

        let b = bytes[i];
        if b.is_ascii_alphabetic() || b == b'_' || b >= 0x80 {
            let mut j = i + 1;
            while j < len && is_ident_byte(bytes[j]) {
                j += 1;
            }
            let word = &sql[i..j];
            match idents.get(word) {
                Some(original) => out.push_str(&quote_identifier(original)),
                None => out.push_str(word),
            }
            i = j;
        } else {
            // safe: non-identifier ASCII byte
            out.push(b as char);
            i += 1;
        }
    }

    out
}
