//! Materialized view bookkeeping.
//!
//! Definitions live in the external catalog store behind
//! [`MaterializedViewStore`]; the data itself is materialized as a plain
//! lakehouse table through the engine.

use async_trait::async_trait;
use lake_pg::LakeEngine;
use tokio::sync::Mutex;

use crate::config::CatalogConfig;
use crate::error::{RewriteError, RewriteResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMaterializedView {
    pub schema: String,
    pub name: String,
    /// Deparsed defining query, as written by the client.
    pub definition: String,
}

#[async_trait]
pub trait MaterializedViewStore: Send + Sync {
    /// Returns `false` when the view already existed and `if_not_exists`
    /// was set.
    async fn create(
        &self,
        view: StoredMaterializedView,
        if_not_exists: bool,
    ) -> RewriteResult<bool>;

    async fn get(&self, schema: &str, name: &str) -> RewriteResult<Option<StoredMaterializedView>>;

    async fn list(&self) -> RewriteResult<Vec<StoredMaterializedView>>;

    /// Returns `false` when the view was absent and `if_exists` was set.
    async fn delete(&self, schema: &str, name: &str, if_exists: bool) -> RewriteResult<bool>;

    async fn rename(&self, schema: &str, name: &str, new_name: &str) -> RewriteResult<()>;
}

/// In-memory store; the production deployment points this interface at
/// the lakehouse catalog database.
#[derive(Default)]
pub struct MemoryMaterializedViewStore {
    views: Mutex<Vec<StoredMaterializedView>>,
}

impl MemoryMaterializedViewStore {
    pub fn new() -> Self {
        MemoryMaterializedViewStore::default()
    }
}

#[async_trait]
impl MaterializedViewStore for MemoryMaterializedViewStore {
    async fn create(
        &self,
        view: StoredMaterializedView,
        if_not_exists: bool,
    ) -> RewriteResult<bool> {
        let mut views = self.views.lock().await;
        if views
            .iter()
            .any(|v| v.schema == view.schema && v.name == view.name)
        {
            if if_not_exists {
                return Ok(false);
            }
            return Err(RewriteError::RelationExists(view.name));
        }
        views.push(view);
        Ok(true)
    }

    async fn get(&self, schema: &str, name: &str) -> RewriteResult<Option<StoredMaterializedView>> {
        let views = self.views.lock().await;
        Ok(views
            .iter()
            .find(|v| v.schema == schema && v.name == name)
            .cloned())
    }

    async fn list(&self) -> RewriteResult<Vec<StoredMaterializedView>> {
        Ok(self.views.lock().await.clone())
    }

    async fn delete(&self, schema: &str, name: &str, if_exists: bool) -> RewriteResult<bool> {
        let mut views = self.views.lock().await;
        let before = views.len();
        views.retain(|v| !(v.schema == schema && v.name == name));
        if views.len() == before {
            if if_exists {
                return Ok(false);
            }
            return Err(RewriteError::MatviewMissing(name.to_string()));
        }
        Ok(true)
    }

    async fn rename(&self, schema: &str, name: &str, new_name: &str) -> RewriteResult<()> {
        let mut views = self.views.lock().await;
        if views
            .iter()
            .any(|v| v.schema == schema && v.name == new_name)
        {
            return Err(RewriteError::RelationExists(new_name.to_string()));
        }
        match views
            .iter_mut()
            .find(|v| v.schema == schema && v.name == name)
        {
            Some(view) => {
                view.name = new_name.to_string();
                Ok(())
            }
            None => Err(RewriteError::MatviewMissing(name.to_string())),
        }
    }
}

/// Materialize (or re-materialize) a view from its rewritten defining
/// query.
pub async fn materialize(
    engine: &dyn LakeEngine,
    config: &CatalogConfig,
    schema: &str,
    name: &str,
    rewritten_query: &str,
) -> RewriteResult<()> {
    let sql = format!(
        "CREATE OR REPLACE TABLE {} AS {}",
        config.engine_table(schema, name),
        rewritten_query
    );
    engine.execute(&sql).await?;
    Ok(())
}

pub async fn drop_materialized(
    engine: &dyn LakeEngine,
    config: &CatalogConfig,
    schema: &str,
    name: &str,
) -> RewriteResult<()> {
    let sql = format!("DROP TABLE IF EXISTS {}", config.engine_table(schema, name));
    engine.execute(&sql).await?;
    Ok(())
}

pub async fn rename_materialized(
    engine: &dyn LakeEngine,
    config: &CatalogConfig,
    schema: &str,
    name: &str,
    new_name: &str,
) -> RewriteResult<()> {
    let sql = format!(
        "ALTER TABLE {} RENAME TO \"{}\"",
        config.engine_table(schema, name),
        new_name
    );
    engine.execute(&sql).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(name: &str) -> StoredMaterializedView {
        StoredMaterializedView {
            schema: "public".to_string(),
            name: name.to_string(),
            definition: "SELECT 1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_respects_if_not_exists() {
        let store = MemoryMaterializedViewStore::new();
        assert!(store.create(view("mv"), false).await.unwrap());
        assert!(!store.create(view("mv"), true).await.unwrap());
        assert!(matches!(
            store.create(view("mv"), false).await,
            Err(RewriteError::RelationExists(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_respects_if_exists() {
        let store = MemoryMaterializedViewStore::new();
        store.create(view("mv"), false).await.unwrap();
        assert!(store.delete("public", "mv", false).await.unwrap());
        assert!(!store.delete("public", "mv", true).await.unwrap());
        assert!(matches!(
            store.delete("public", "mv", false).await,
            Err(RewriteError::MatviewMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_rename() {
        let store = MemoryMaterializedViewStore::new();
        store.create(view("old"), false).await.unwrap();
        store.rename("public", "old", "new").await.unwrap();
        assert!(store.get("public", "old").await.unwrap().is_none());
        assert!(store.get("public", "new").await.unwrap().is_some());
        assert!(store.rename("public", "missing", "x").await.is_err());
    }
}
