use crate::entities::{ChatMessage, ChatRecord, SqliteStore};

use chrono::{DateTime, Utc};
use std::future::Future;

pub trait ChatStore: Send + Sync + 'static {
    /// Replace the stored log for `(user_id, model)`, creating the record on
    /// first save.
    fn save_chat_record(
        &self,
        user_id: i64,
        model: &str,
        messages: &[ChatMessage],
    ) -> impl Future<Output = Result<ChatRecord, sqlx::Error>> + Send;

    fn get_chat_record(
        &self,
        user_id: i64,
        model: &str,
    ) -> impl Future<Output = Result<Option<ChatRecord>, sqlx::Error>> + Send;

    /// Every record of the user, most recently updated first.
    fn list_chat_records(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<Vec<ChatRecord>, sqlx::Error>> + Send;
}

#[derive(sqlx::FromRow)]
struct ChatRow {
    id: i64,
    user_id: i64,
    model: String,
    messages: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ChatRow> for ChatRecord {
    type Error = sqlx::Error;

    fn try_from(row: ChatRow) -> Result<Self, Self::Error> {
        let messages = serde_json::from_str(&row.messages).map_err(|e| sqlx::Error::ColumnDecode {
            index: "messages".into(),
            source: Box::new(e),
        })?;
        Ok(ChatRecord {
            id: row.id,
            user_id: row.user_id,
            model: row.model,
            messages,
            updated_at: row.updated_at,
        })
    }
}

impl ChatStore for SqliteStore {
    async fn save_chat_record(
        &self,
        user_id: i64,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatRecord, sqlx::Error> {
        let encoded = serde_json::to_string(messages).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let row = sqlx::query_as::<_, ChatRow>(
            "INSERT INTO chat_records (user_id, model, messages, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(user_id, model) DO UPDATE SET \
                 messages = excluded.messages, \
                 updated_at = excluded.updated_at \
             RETURNING id, user_id, model, messages, updated_at",
        )
        .bind(user_id)
        .bind(model)
        .bind(encoded)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn get_chat_record(
        &self,
        user_id: i64,
        model: &str,
    ) -> Result<Option<ChatRecord>, sqlx::Error> {
        sqlx::query_as::<_, ChatRow>(
            "SELECT id, user_id, model, messages, updated_at FROM chat_records \
             WHERE user_id = ?1 AND model = ?2",
        )
        .bind(user_id)
        .bind(model)
        .fetch_optional(&self.pool)
        .await?
        .map(ChatRecord::try_from)
        .transpose()
    }

    async fn list_chat_records(&self, user_id: i64) -> Result<Vec<ChatRecord>, sqlx::Error> {
        sqlx::query_as::<_, ChatRow>(
            "SELECT id, user_id, model, messages, updated_at FROM chat_records \
             WHERE user_id = ?1 ORDER BY updated_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ChatRecord::try_from)
        .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn msg(role: &str, content: &str) -> ChatMessage {
        ChatMessage {
            role: role.into(),
            content: content.into(),
            time: None,
        }
    }

    #[tokio::test]
    async fn save_replaces_the_whole_log() {
        let store = SqliteStore::in_memory().await.unwrap();
        let first = store
            .save_chat_record(7, "gpt-4o-mini", &[msg("user", "hi"), msg("assistant", "hello")])
            .await
            .unwrap();
        let second = store
            .save_chat_record(7, "gpt-4o-mini", &[msg("user", "again")])
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.messages, vec![msg("user", "again")]);
        assert!(second.updated_at >= first.updated_at);

        store.save_chat_record(7, "dall-e-3", &[]).await.unwrap();
        assert_eq!(store.list_chat_records(7).await.unwrap().len(), 2);
        assert!(store.get_chat_record(8, "gpt-4o-mini").await.unwrap().is_none());
    }
}
