use crate::entities::{SqliteStore, UserRecord};
use chrono::Utc;
use std::future::Future;

const USER_COLUMNS: &str = "id, username, nickname, avatar, role, created_at";

pub trait UserStore: Send + Sync + 'static {
    fn create_user(
        &self,
        username: &str,
        nickname: Option<&str>,
        avatar: Option<&str>,
        role: &str,
    ) -> impl Future<Output = Result<UserRecord, sqlx::Error>> + Send;

    fn get_user(&self, id: i64) -> impl Future<Output = Result<Option<UserRecord>, sqlx::Error>> + Send;

    fn list_users(&self) -> impl Future<Output = Result<Vec<UserRecord>, sqlx::Error>> + Send;

    fn update_user(
        &self,
        id: i64,
        nickname: Option<&str>,
        avatar: Option<&str>,
        role: Option<&str>,
    ) -> impl Future<Output = Result<Option<UserRecord>, sqlx::Error>> + Send;

    fn delete_user(&self, id: i64) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

impl UserStore for SqliteStore {
    async fn create_user(
        &self,
        username: &str,
        nickname: Option<&str>,
        avatar: Option<&str>,
        role: &str,
    ) -> Result<UserRecord, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (username, nickname, avatar, role, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(nickname)
        .bind(avatar)
        .bind(role)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
    }

    async fn get_user(&self, id: i64) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id DESC"))
            .fetch_all(&self.pool)
            .await
    }

    async fn update_user(
        &self,
        id: i64,
        nickname: Option<&str>,
        avatar: Option<&str>,
        role: Option<&str>,
    ) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET nickname = COALESCE(?1, nickname), \
             avatar = COALESCE(?2, avatar), role = COALESCE(?3, role) \
             WHERE id = ?4 RETURNING {USER_COLUMNS}"
        ))
        .bind(nickname)
        .bind(avatar)
        .bind(role)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_user(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::is_unique_violation;

    #[tokio::test]
    async fn usernames_are_unique() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.create_user("bob", None, None, "user").await.unwrap();
        let err = store.create_user("bob", Some("Bobby"), None, "user").await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn patch_keeps_unset_fields() {
        let store = SqliteStore::in_memory().await.unwrap();
        let user = store.create_user("carol", Some("C"), Some("/a.png"), "user").await.unwrap();
        let user = store.update_user(user.id, None, None, Some("admin")).await.unwrap().unwrap();
        assert_eq!(user.nickname.as_deref(), Some("C"));
        assert_eq!(user.role, "admin");
    }
}
