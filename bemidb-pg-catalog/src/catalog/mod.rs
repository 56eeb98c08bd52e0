pub mod cache;
pub mod mirror;

pub use cache::{
    synthesized_oid, AttrDefault, CatalogCache, CatalogSnapshot, ColumnMetadata,
    ObjectDescription, PrimaryKeyCandidate, TableMetadata, TypeMetadata,
};
pub use mirror::CatalogMirror;
