use crate::entities::{ConfigEntry, SqliteStore};
use chrono::Utc;
use std::future::Future;

pub trait ConfigStore: Send + Sync + 'static {
    fn get_config_entry(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<ConfigEntry>, sqlx::Error>> + Send;

    /// Value only; `None` when the key is absent.
    fn get_config_value(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, sqlx::Error>> + Send;

    /// Insert or update-in-place by key. A `None` description keeps the
    /// stored one.
    fn upsert_config_entry(
        &self,
        key: &str,
        value: &str,
        description: Option<&str>,
    ) -> impl Future<Output = Result<ConfigEntry, sqlx::Error>> + Send;

    /// Patch an existing key; `Ok(None)` when the key is absent.
    fn update_config_entry(
        &self,
        key: &str,
        value: Option<&str>,
        description: Option<&str>,
    ) -> impl Future<Output = Result<Option<ConfigEntry>, sqlx::Error>> + Send;

    fn delete_config_entry(&self, key: &str)
    -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    fn list_config_entries(
        &self,
    ) -> impl Future<Output = Result<Vec<ConfigEntry>, sqlx::Error>> + Send;
}

impl ConfigStore for SqliteStore {
    async fn get_config_entry(&self, key: &str) -> Result<Option<ConfigEntry>, sqlx::Error> {
        sqlx::query_as::<_, ConfigEntry>(
            "SELECT key, value, description, updated_at FROM system_configs WHERE key = ?1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_config_value(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM system_configs WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(v,)| v))
    }

    async fn upsert_config_entry(
        &self,
        key: &str,
        value: &str,
        description: Option<&str>,
    ) -> Result<ConfigEntry, sqlx::Error> {
        sqlx::query_as::<_, ConfigEntry>(
            "INSERT INTO system_configs (key, value, description, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(key) DO UPDATE \
             SET value = excluded.value, \
                 description = COALESCE(excluded.description, system_configs.description), \
                 updated_at = excluded.updated_at \
             RETURNING key, value, description, updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(description)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
    }

    async fn update_config_entry(
        &self,
        key: &str,
        value: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<ConfigEntry>, sqlx::Error> {
        sqlx::query_as::<_, ConfigEntry>(
            "UPDATE system_configs \
             SET value = COALESCE(?1, value), \
                 description = COALESCE(?2, description), \
                 updated_at = ?3 \
             WHERE key = ?4 \
             RETURNING key, value, description, updated_at",
        )
        .bind(value)
        .bind(description)
        .bind(Utc::now())
        .bind(key)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_config_entry(&self, key: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM system_configs WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_config_entries(&self) -> Result<Vec<ConfigEntry>, sqlx::Error> {
        sqlx::query_as::<_, ConfigEntry>(
            "SELECT key, value, description, updated_at FROM system_configs ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn upsert_updates_in_place() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .upsert_config_entry("AI_IMAGE_MODEL", "dall-e-3", Some("default image model"))
            .await
            .unwrap();
        let entry = store
            .upsert_config_entry("AI_IMAGE_MODEL", "flux-pro", None)
            .await
            .unwrap();

        assert_eq!(entry.value, "flux-pro");
        assert_eq!(entry.description.as_deref(), Some("default image model"));
        assert_eq!(store.list_config_entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn patch_and_delete_missing_key() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.update_config_entry("nope", Some("x"), None).await.unwrap().is_none());
        assert!(!store.delete_config_entry("nope").await.unwrap());

        store.upsert_config_entry("k", "v", None).await.unwrap();
        let patched = store.update_config_entry("k", None, Some("desc")).await.unwrap().unwrap();
        assert_eq!(patched.value, "v");
        assert_eq!(patched.description.as_deref(), Some("desc"));
        assert!(store.delete_config_entry("k").await.unwrap());
        assert_eq!(store.get_config_value("k").await.unwrap(), None);
    }
}
