use crate::entities::{SqliteStore, TaskRecord, TaskStatus};

use chrono::{DateTime, Utc};
use std::future::Future;

const TASK_COLUMNS: &str = "id, user_id, prompt, model, status, result_url, thumb_url, \
                            error_message, created_at, updated_at";

pub trait TaskStore: Send + Sync + 'static {
    /// Insert a new task in `PROCESSING` state and return its id.
    fn insert_task(
        &self,
        user_id: Option<i64>,
        prompt: &str,
        model: &str,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;

    /// Terminal `PROCESSING -> COMPLETED` write. Returns `false` when the row
    /// was no longer `PROCESSING` (already finalized or deleted).
    fn complete_task(
        &self,
        id: i64,
        result_url: &str,
        thumb_url: &str,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Terminal `PROCESSING -> FAILED` write, guarded like [`Self::complete_task`].
    fn fail_task(
        &self,
        id: i64,
        error_message: &str,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    fn get_task(&self, id: i64)
    -> impl Future<Output = Result<Option<TaskRecord>, sqlx::Error>> + Send;

    /// Newest first; `user_id = None` lists every task.
    fn list_tasks(
        &self,
        user_id: Option<i64>,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<TaskRecord>, sqlx::Error>> + Send;

    fn delete_task(&self, id: i64) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Fail every `PROCESSING` task created before `cutoff` (all of them when
    /// `cutoff` is `None`). Returns the number of rows finalized.
    fn fail_stale_tasks(
        &self,
        cutoff: Option<DateTime<Utc>>,
        error_message: &str,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
}

impl TaskStore for SqliteStore {
    async fn insert_task(
        &self,
        user_id: Option<i64>,
        prompt: &str,
        model: &str,
    ) -> Result<i64, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO ai_tasks (user_id, prompt, model, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        )
        .bind(user_id)
        .bind(prompt)
        .bind(model)
        .bind(TaskStatus::Processing.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn complete_task(
        &self,
        id: i64,
        result_url: &str,
        thumb_url: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE ai_tasks SET status = ?1, result_url = ?2, thumb_url = ?3, \
             error_message = NULL, updated_at = ?4 \
             WHERE id = ?5 AND status = ?6",
        )
        .bind(TaskStatus::Completed.as_str())
        .bind(result_url)
        .bind(thumb_url)
        .bind(Utc::now())
        .bind(id)
        .bind(TaskStatus::Processing.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn fail_task(&self, id: i64, error_message: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE ai_tasks SET status = ?1, error_message = ?2, \
             result_url = NULL, thumb_url = NULL, updated_at = ?3 \
             WHERE id = ?4 AND status = ?5",
        )
        .bind(TaskStatus::Failed.as_str())
        .bind(error_message)
        .bind(Utc::now())
        .bind(id)
        .bind(TaskStatus::Processing.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_task(&self, id: i64) -> Result<Option<TaskRecord>, sqlx::Error> {
        sqlx::query_as::<_, TaskRecord>(&format!(
            "SELECT {TASK_COLUMNS} FROM ai_tasks WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_tasks(
        &self,
        user_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<TaskRecord>, sqlx::Error> {
        if let Some(uid) = user_id {
            sqlx::query_as::<_, TaskRecord>(&format!(
                "SELECT {TASK_COLUMNS} FROM ai_tasks WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2"
            ))
            .bind(uid)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, TaskRecord>(&format!(
                "SELECT {TASK_COLUMNS} FROM ai_tasks ORDER BY id DESC LIMIT ?1"
            ))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
    }

    async fn delete_task(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM ai_tasks WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn fail_stale_tasks(
        &self,
        cutoff: Option<DateTime<Utc>>,
        error_message: &str,
    ) -> Result<u64, sqlx::Error> {
        let now = Utc::now();
        let result = match cutoff {
            Some(cutoff) => {
                sqlx::query(
                    "UPDATE ai_tasks SET status = ?1, error_message = ?2, updated_at = ?3 \
                     WHERE status = ?4 AND created_at < ?5",
                )
                .bind(TaskStatus::Failed.as_str())
                .bind(error_message)
                .bind(now)
                .bind(TaskStatus::Processing.as_str())
                .bind(cutoff)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "UPDATE ai_tasks SET status = ?1, error_message = ?2, updated_at = ?3 \
                     WHERE status = ?4",
                )
                .bind(TaskStatus::Failed.as_str())
                .bind(error_message)
                .bind(now)
                .bind(TaskStatus::Processing.as_str())
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected())
    }
}
