//! Per-statement table/column permissions carried in a SQL comment of the
//! shape ` /*BEMIDB_PERMISSIONS {json} BEMIDB_PERMISSIONS*/`.

use std::collections::HashMap;

use log::warn;

use crate::error::{RewriteError, RewriteResult};

const COMMENT_OPEN: &str = "/*BEMIDB_PERMISSIONS";
const COMMENT_CLOSE: &str = "BEMIDB_PERMISSIONS*/";

/// Map from `"schema.table"` to allowed column names. A table absent from
/// the map is denied; a present table with an empty column list is denied
/// as well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    tables: HashMap<String, Vec<String>>,
}

impl PermissionSet {
    pub fn table_allowed(&self, schema: &str, table: &str) -> bool {
        self.allowed_columns(schema, table)
            .map(|columns| !columns.is_empty())
            .unwrap_or(false)
    }

    pub fn allowed_columns(&self, schema: &str, table: &str) -> Option<&[String]> {
        self.tables
            .get(&format!("{schema}.{table}"))
            .map(|columns| columns.as_slice())
    }

    /// `"schema.table"` keys with at least one visible column, sorted.
    pub fn visible_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self
            .tables
            .iter()
            .filter(|(_, columns)| !columns.is_empty())
            .map(|(key, _)| key.clone())
            .collect();
        tables.sort();
        tables
    }

    /// Union of all visible column names, sorted and deduplicated.
    pub fn visible_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.tables.values().flatten().cloned().collect();
        columns.sort();
        columns.dedup();
        columns
    }
}

impl From<HashMap<String, Vec<String>>> for PermissionSet {
    fn from(tables: HashMap<String, Vec<String>>) -> Self {
        PermissionSet { tables }
    }
}

/// Extract the permission set from a query.
///
/// Zero occurrences of the comment yield no permissions; exactly one is
/// parsed (malformed JSON is an error); two or more are ignored entirely.
pub fn extract_permissions(query: &str) -> RewriteResult<Option<PermissionSet>> {
    let opens: Vec<usize> = query.match_indices(COMMENT_OPEN).map(|(i, _)| i).collect();
    match opens.len() {
        0 => Ok(None),
        1 => {
            let body_start = opens[0] + COMMENT_OPEN.len();
            let rest = &query[body_start..];
            let end = rest.find(COMMENT_CLOSE).ok_or_else(|| {
                RewriteError::Permissions("unterminated permissions comment".to_string())
            })?;
            let json = rest[..end].trim();
            let tables: HashMap<String, Vec<String>> = serde_json::from_str(json)
                .map_err(|e| RewriteError::Permissions(e.to_string()))?;
            Ok(Some(PermissionSet { tables }))
        }
        n => {
            warn!("ignoring {n} permissions comments in one query");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMENT: &str =
        " /*BEMIDB_PERMISSIONS {\"postgres.test_table\":[\"id\"]} BEMIDB_PERMISSIONS*/";

    #[test]
    fn test_absent_comment_means_no_permissions() {
        assert_eq!(extract_permissions("SELECT 1").unwrap(), None);
    }

    #[test]
    fn test_single_comment_is_parsed() {
        let query = format!("SELECT id FROM postgres.test_table{COMMENT}");
        let permissions = extract_permissions(&query).unwrap().unwrap();
        assert!(permissions.table_allowed("postgres", "test_table"));
        assert!(!permissions.table_allowed("postgres", "other"));
        assert_eq!(
            permissions.allowed_columns("postgres", "test_table"),
            Some(["id".to_string()].as_slice())
        );
    }

    #[test]
    fn test_duplicate_comment_is_ignored() {
        let query = format!("SELECT 1{COMMENT}{COMMENT}");
        assert_eq!(extract_permissions(&query).unwrap(), None);
    }

    #[test]
    fn test_empty_column_list_denies_table() {
        let query = "SELECT 1 /*BEMIDB_PERMISSIONS {\"a.b\":[]} BEMIDB_PERMISSIONS*/";
        let permissions = extract_permissions(query).unwrap().unwrap();
        assert!(!permissions.table_allowed("a", "b"));
        assert!(permissions.visible_tables().is_empty());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let query = "SELECT 1 /*BEMIDB_PERMISSIONS {\"a.b\": null} BEMIDB_PERMISSIONS*/";
        assert!(matches!(
            extract_permissions(query),
            Err(RewriteError::Permissions(_))
        ));
    }
}
