//! Read-only relational mirror of the catalog snapshot.
//!
//! Answers trivial `pg_class` / `pg_attribute` lookups without a round
//! trip to the engine. Rebuilt together with the snapshot, immutable
//! afterwards.

use lake_pg::datatypes::engine_type_pg_oid;

use super::cache::CatalogSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorClassRow {
    pub oid: u32,
    pub relname: String,
    pub relnamespace: String,
    pub relkind: char,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorAttributeRow {
    pub attrelid: u32,
    pub attname: String,
    pub atttypid: u32,
    pub attnum: i16,
}

#[derive(Debug, Default)]
pub struct CatalogMirror {
    classes: Vec<MirrorClassRow>,
    attributes: Vec<MirrorAttributeRow>,
}

impl CatalogMirror {
    pub fn from_snapshot(snapshot: &CatalogSnapshot) -> Self {
        let mut classes = Vec::with_capacity(snapshot.tables.len());
        let mut attributes = Vec::new();

        for table in &snapshot.tables {
            classes.push(MirrorClassRow {
                oid: table.oid,
                relname: table.name.clone(),
                relnamespace: table.namespace.clone(),
                relkind: 'r',
            });

            if let Some(columns) = snapshot.columns.get(&table.name) {
                for column in columns {
                    attributes.push(MirrorAttributeRow {
                        attrelid: table.oid,
                        attname: column.name.clone(),
                        atttypid: engine_type_pg_oid(&column.type_text),
                        attnum: column.ordinal as i16,
                    });
                }
            }
        }

        for pk in snapshot.pk_candidates.values() {
            classes.push(MirrorClassRow {
                oid: pk.oid,
                relname: pk.constraint_name.clone(),
                relnamespace: snapshot
                    .table(&pk.table_name)
                    .map(|t| t.namespace.clone())
                    .unwrap_or_default(),
                relkind: 'i',
            });
        }

        CatalogMirror {
            classes,
            attributes,
        }
    }

    pub fn classes(&self) -> &[MirrorClassRow] {
        &self.classes
    }

    pub fn attributes(&self) -> &[MirrorAttributeRow] {
        &self.attributes
    }

    pub fn class_by_name(&self, relname: &str) -> Option<&MirrorClassRow> {
        self.classes.iter().find(|c| c.relname == relname)
    }

    /// OID of a lakehouse table, answered without an engine round trip.
    pub fn table_oid(&self, namespace: &str, relname: &str) -> Option<u32> {
        self.classes
            .iter()
            .find(|c| c.relkind == 'r' && c.relnamespace == namespace && c.relname == relname)
            .map(|c| c.oid)
    }

    pub fn class_by_oid(&self, oid: u32) -> Option<&MirrorClassRow> {
        self.classes.iter().find(|c| c.oid == oid)
    }

    pub fn attributes_of(&self, attrelid: u32) -> Vec<&MirrorAttributeRow> {
        self.attributes
            .iter()
            .filter(|a| a.attrelid == attrelid)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::cache::{
        synthesized_oid, ColumnMetadata, PrimaryKeyCandidate, TableMetadata,
    };

    fn snapshot() -> CatalogSnapshot {
        let mut snapshot = CatalogSnapshot::default();
        let oid = synthesized_oid("orders");
        snapshot.tables.push(TableMetadata {
            oid,
            name: "orders".to_string(),
            namespace: "postgres".to_string(),
        });
        snapshot.table_oids.insert("orders".to_string(), oid);
        snapshot.columns.insert(
            "orders".to_string(),
            vec![
                ColumnMetadata {
                    name: "id".to_string(),
                    type_text: "BIGINT".to_string(),
                    ordinal: 1,
                },
                ColumnMetadata {
                    name: "total".to_string(),
                    type_text: "DECIMAL(18,3)".to_string(),
                    ordinal: 2,
                },
            ],
        );
        snapshot.pk_candidates.insert(
            "orders".to_string(),
            PrimaryKeyCandidate {
                oid: synthesized_oid("orders_pkey"),
                constraint_name: "orders_pkey".to_string(),
                table_oid: oid,
                table_name: "orders".to_string(),
                column_name: "id".to_string(),
                column_index: 1,
            },
        );
        snapshot
    }

    #[test]
    fn test_mirror_reflects_tables_and_indexes() {
        let mirror = CatalogMirror::from_snapshot(&snapshot());

        let class = mirror.class_by_name("orders").unwrap();
        assert_eq!(class.relkind, 'r');
        assert_eq!(class.relnamespace, "postgres");

        let index = mirror.class_by_name("orders_pkey").unwrap();
        assert_eq!(index.relkind, 'i');

        let attrs = mirror.attributes_of(class.oid);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].attname, "id");
        assert_eq!(attrs[0].atttypid, 20);
        assert_eq!(attrs[1].atttypid, 1700);
        assert_eq!(mirror.class_by_oid(class.oid).unwrap().relname, "orders");
    }

    #[test]
    fn test_table_oid_lookup_is_namespace_aware() {
        let mirror = CatalogMirror::from_snapshot(&snapshot());
        let oid = mirror.table_oid("postgres", "orders").unwrap();
        assert_eq!(oid, synthesized_oid("orders"));
        assert!(mirror.table_oid("other", "orders").is_none());
        // index rows are not tables
        assert!(mirror.table_oid("postgres", "orders_pkey").is_none());
    }
}
