use crate::entities::image::{IMAGE_COLUMNS, attach_tags};
use crate::entities::{CategoryRecord, ImageRecord, SqliteStore, TagRecord, TopicRecord};

use chrono::Utc;
use std::future::Future;

const CATEGORY_COLUMNS: &str = "id, name, description, cover_url, sort_order, created_at";
const TOPIC_COLUMNS: &str = "id, title, description, cover_url, created_at";

/// Categories, tags and topics: the taxonomy images are filed under.
pub trait CatalogStore: Send + Sync + 'static {
    // ── categories ────────────────────────────────────────────────────────────

    fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
        cover_url: Option<&str>,
        sort_order: i64,
    ) -> impl Future<Output = Result<CategoryRecord, sqlx::Error>> + Send;

    fn list_categories(&self) -> impl Future<Output = Result<Vec<CategoryRecord>, sqlx::Error>> + Send;

    fn update_category(
        &self,
        id: i64,
        name: Option<&str>,
        description: Option<&str>,
        cover_url: Option<&str>,
        sort_order: Option<i64>,
    ) -> impl Future<Output = Result<Option<CategoryRecord>, sqlx::Error>> + Send;

    /// Images filed under the category keep existing with no category.
    fn delete_category(&self, id: i64) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    // ── tags ──────────────────────────────────────────────────────────────────

    fn create_tag(&self, name: &str) -> impl Future<Output = Result<TagRecord, sqlx::Error>> + Send;

    fn list_tags(&self) -> impl Future<Output = Result<Vec<TagRecord>, sqlx::Error>> + Send;

    fn delete_tag(&self, id: i64) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    // ── topics ────────────────────────────────────────────────────────────────

    fn create_topic(
        &self,
        title: &str,
        description: Option<&str>,
        cover_url: Option<&str>,
    ) -> impl Future<Output = Result<TopicRecord, sqlx::Error>> + Send;

    fn list_topics(&self) -> impl Future<Output = Result<Vec<TopicRecord>, sqlx::Error>> + Send;

    fn get_topic(&self, id: i64) -> impl Future<Output = Result<Option<TopicRecord>, sqlx::Error>> + Send;

    /// Member images in their curated order.
    fn topic_images(&self, id: i64) -> impl Future<Output = Result<Vec<ImageRecord>, sqlx::Error>> + Send;

    fn update_topic(
        &self,
        id: i64,
        title: Option<&str>,
        description: Option<&str>,
        cover_url: Option<&str>,
    ) -> impl Future<Output = Result<Option<TopicRecord>, sqlx::Error>> + Send;

    fn delete_topic(&self, id: i64) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Replace the topic's membership with `image_ids`, in that order.
    ///
    /// Returns `false` when the topic does not exist. An unknown image id
    /// fails with a foreign-key violation and leaves membership untouched.
    fn set_topic_images(
        &self,
        id: i64,
        image_ids: &[i64],
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

impl CatalogStore for SqliteStore {
    async fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
        cover_url: Option<&str>,
        sort_order: i64,
    ) -> Result<CategoryRecord, sqlx::Error> {
        sqlx::query_as::<_, CategoryRecord>(&format!(
            "INSERT INTO categories (name, description, cover_url, sort_order, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(name)
        .bind(description)
        .bind(cover_url)
        .bind(sort_order)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
    }

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, sqlx::Error> {
        sqlx::query_as::<_, CategoryRecord>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY sort_order ASC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn update_category(
        &self,
        id: i64,
        name: Option<&str>,
        description: Option<&str>,
        cover_url: Option<&str>,
        sort_order: Option<i64>,
    ) -> Result<Option<CategoryRecord>, sqlx::Error> {
        sqlx::query_as::<_, CategoryRecord>(&format!(
            "UPDATE categories SET name = COALESCE(?1, name), \
             description = COALESCE(?2, description), \
             cover_url = COALESCE(?3, cover_url), \
             sort_order = COALESCE(?4, sort_order) \
             WHERE id = ?5 RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(name)
        .bind(description)
        .bind(cover_url)
        .bind(sort_order)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_category(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_tag(&self, name: &str) -> Result<TagRecord, sqlx::Error> {
        sqlx::query_as::<_, TagRecord>(
            "INSERT INTO tags (name, created_at) VALUES (?1, ?2) RETURNING id, name, created_at",
        )
        .bind(name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
    }

    async fn list_tags(&self) -> Result<Vec<TagRecord>, sqlx::Error> {
        sqlx::query_as::<_, TagRecord>("SELECT id, name, created_at FROM tags ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await
    }

    async fn delete_tag(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tags WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_topic(
        &self,
        title: &str,
        description: Option<&str>,
        cover_url: Option<&str>,
    ) -> Result<TopicRecord, sqlx::Error> {
        sqlx::query_as::<_, TopicRecord>(&format!(
            "INSERT INTO topics (title, description, cover_url, created_at) \
             VALUES (?1, ?2, ?3, ?4) RETURNING {TOPIC_COLUMNS}"
        ))
        .bind(title)
        .bind(description)
        .bind(cover_url)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
    }

    async fn list_topics(&self) -> Result<Vec<TopicRecord>, sqlx::Error> {
        sqlx::query_as::<_, TopicRecord>(&format!(
            "SELECT {TOPIC_COLUMNS} FROM topics ORDER BY id DESC"
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn get_topic(&self, id: i64) -> Result<Option<TopicRecord>, sqlx::Error> {
        sqlx::query_as::<_, TopicRecord>(&format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn topic_images(&self, id: i64) -> Result<Vec<ImageRecord>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        let mut images = sqlx::query_as::<_, ImageRecord>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM topic_images ti \
             JOIN images i ON i.id = ti.image_id \
             WHERE ti.topic_id = ?1 ORDER BY ti.position ASC"
        ))
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
        attach_tags(&mut conn, &mut images).await?;
        Ok(images)
    }

    async fn update_topic(
        &self,
        id: i64,
        title: Option<&str>,
        description: Option<&str>,
        cover_url: Option<&str>,
    ) -> Result<Option<TopicRecord>, sqlx::Error> {
        sqlx::query_as::<_, TopicRecord>(&format!(
            "UPDATE topics SET title = COALESCE(?1, title), \
             description = COALESCE(?2, description), \
             cover_url = COALESCE(?3, cover_url) \
             WHERE id = ?4 RETURNING {TOPIC_COLUMNS}"
        ))
        .bind(title)
        .bind(description)
        .bind(cover_url)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_topic(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM topics WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_topic_images(&self, id: i64, image_ids: &[i64]) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM topics WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(false);
        }

        sqlx::query("DELETE FROM topic_images WHERE topic_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for (position, image_id) in image_ids.iter().enumerate() {
            sqlx::query(
                "INSERT OR IGNORE INTO topic_images (topic_id, image_id, position) \
                 VALUES (?1, ?2, ?3)",
            )
            .bind(id)
            .bind(image_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{ImageStore, NewImage, is_foreign_key_violation, is_unique_violation};

    #[tokio::test]
    async fn deleting_a_category_detaches_its_images() {
        let store = SqliteStore::in_memory().await.unwrap();
        let category = store.create_category("Nature", None, None, 0).await.unwrap();
        let image = store
            .create_image(NewImage {
                title: "lake".into(),
                url: "/uploads/lake.png".into(),
                category_id: Some(category.id),
                ..Default::default()
            })
            .await
            .unwrap();

        let dup = store.create_category("Nature", None, None, 1).await.unwrap_err();
        assert!(is_unique_violation(&dup));

        assert!(store.delete_category(category.id).await.unwrap());
        let image = store.get_image(image.id).await.unwrap().unwrap();
        assert_eq!(image.category_id, None);
    }

    #[tokio::test]
    async fn topic_membership_is_replaced_in_order() {
        let store = SqliteStore::in_memory().await.unwrap();
        let topic = store.create_topic("Blue hour", None, None).await.unwrap();
        let mut ids = Vec::new();
        for title in ["a", "b", "c"] {
            let image = store
                .create_image(NewImage {
                    title: title.into(),
                    url: format!("/uploads/{title}.png"),
                    ..Default::default()
                })
                .await
                .unwrap();
            ids.push(image.id);
        }

        assert!(store.set_topic_images(topic.id, &[ids[2], ids[0]]).await.unwrap());
        let titles: Vec<String> = store
            .topic_images(topic.id)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(titles, vec!["c".to_string(), "a".to_string()]);

        let err = store.set_topic_images(topic.id, &[ids[1], 9999]).await.unwrap_err();
        assert!(is_foreign_key_violation(&err));
        assert_eq!(store.topic_images(topic.id).await.unwrap().len(), 2);

        assert!(!store.set_topic_images(9999, &[ids[0]]).await.unwrap());
    }
}
