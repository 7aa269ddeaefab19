//! Favorites and view history.

use crate::entities::image::{attach_tags, load_image, IMAGE_COLUMNS};
use crate::entities::{FavoriteToggle, HistoryEntry, ImageRecord, SqliteStore};

use chrono::{DateTime, Utc};
use std::future::Future;

pub trait InteractionStore: Send + Sync + 'static {
    /// Flip the (user, image) favorite and adjust the image's like counter by
    /// exactly one, atomically. `Ok(None)` when the image does not exist.
    fn toggle_favorite(
        &self,
        user_id: i64,
        image_id: i64,
    ) -> impl Future<Output = Result<Option<FavoriteToggle>, sqlx::Error>> + Send;

    fn is_favorited(
        &self,
        user_id: i64,
        image_id: i64,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Images the user favorited, most recent favorite first.
    fn list_favorites(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<Vec<ImageRecord>, sqlx::Error>> + Send;

    /// Upsert the (user, image) view with a fresh timestamp.
    fn record_history(
        &self,
        user_id: i64,
        image_id: i64,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn list_history(
        &self,
        user_id: i64,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<HistoryEntry>, sqlx::Error>> + Send;

    fn clear_history(&self, user_id: i64) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
}

impl InteractionStore for SqliteStore {
    async fn toggle_favorite(
        &self,
        user_id: i64,
        image_id: i64,
    ) -> Result<Option<FavoriteToggle>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // The DELETE runs first so the transaction holds the write lock before
        // anything is read; a concurrent toggle on the same pair waits for it.
        let removed = sqlx::query("DELETE FROM favorites WHERE user_id = ?1 AND image_id = ?2")
            .bind(user_id)
            .bind(image_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        let delta: i64 = if removed { -1 } else { 1 };
        let updated = sqlx::query("UPDATE images SET likes = likes + ?1 WHERE id = ?2")
            .bind(delta)
            .bind(image_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        if !removed {
            sqlx::query("INSERT INTO favorites (user_id, image_id, created_at) VALUES (?1, ?2, ?3)")
                .bind(user_id)
                .bind(image_id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
        }

        let image = load_image(&mut tx, image_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        tx.commit().await?;

        tracing::debug!(user_id, image_id, favorited = !removed, likes = image.likes, "favorite toggled");
        Ok(Some(FavoriteToggle {
            image,
            favorited: !removed,
        }))
    }

    async fn is_favorited(&self, user_id: i64, image_id: i64) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM favorites WHERE user_id = ?1 AND image_id = ?2")
                .bind(user_id)
                .bind(image_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn list_favorites(&self, user_id: i64) -> Result<Vec<ImageRecord>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        let mut images = sqlx::query_as::<_, ImageRecord>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM favorites f JOIN images i ON i.id = f.image_id \
             WHERE f.user_id = ?1 ORDER BY f.id DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
        attach_tags(&mut conn, &mut images).await?;
        Ok(images)
    }

    async fn record_history(&self, user_id: i64, image_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO view_history (user_id, image_id, viewed_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(user_id, image_id) DO UPDATE SET viewed_at = excluded.viewed_at",
        )
        .bind(user_id)
        .bind(image_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_history(&self, user_id: i64, limit: i64) -> Result<Vec<HistoryEntry>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<(i64, i64, DateTime<Utc>, i64)> = sqlx::query_as(
            "SELECT id, user_id, viewed_at, image_id FROM view_history \
             WHERE user_id = ?1 ORDER BY viewed_at DESC, id DESC LIMIT ?2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for (id, user_id, viewed_at, image_id) in rows {
            // Rows cascade with their image, so a miss here is a race with a delete.
            if let Some(image) = load_image(&mut conn, image_id).await? {
                entries.push(HistoryEntry {
                    id,
                    user_id,
                    viewed_at,
                    image,
                });
            }
        }
        Ok(entries)
    }

    async fn clear_history(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM view_history WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
