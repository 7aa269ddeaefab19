use crate::entities::{BannerRecord, SqliteStore};
use chrono::Utc;
use std::future::Future;

const BANNER_COLUMNS: &str = "id, title, image_url, link_url, sort_order, is_active, created_at";

pub trait BannerStore: Send + Sync + 'static {
    fn create_banner(
        &self,
        title: &str,
        image_url: &str,
        link_url: Option<&str>,
        sort_order: i64,
        is_active: bool,
    ) -> impl Future<Output = Result<BannerRecord, sqlx::Error>> + Send;

    /// Ordered by `sort_order`; inactive banners only when `include_inactive`.
    fn list_banners(
        &self,
        include_inactive: bool,
    ) -> impl Future<Output = Result<Vec<BannerRecord>, sqlx::Error>> + Send;

    fn update_banner(
        &self,
        id: i64,
        title: Option<&str>,
        image_url: Option<&str>,
        link_url: Option<&str>,
        sort_order: Option<i64>,
        is_active: Option<bool>,
    ) -> impl Future<Output = Result<Option<BannerRecord>, sqlx::Error>> + Send;

    fn delete_banner(&self, id: i64) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

impl BannerStore for SqliteStore {
    async fn create_banner(
        &self,
        title: &str,
        image_url: &str,
        link_url: Option<&str>,
        sort_order: i64,
        is_active: bool,
    ) -> Result<BannerRecord, sqlx::Error> {
        sqlx::query_as::<_, BannerRecord>(&format!(
            "INSERT INTO banners (title, image_url, link_url, sort_order, is_active, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING {BANNER_COLUMNS}"
        ))
        .bind(title)
        .bind(image_url)
        .bind(link_url)
        .bind(sort_order)
        .bind(is_active)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
    }

    async fn list_banners(&self, include_inactive: bool) -> Result<Vec<BannerRecord>, sqlx::Error> {
        let filter = if include_inactive { "" } else { "WHERE is_active = 1" };
        sqlx::query_as::<_, BannerRecord>(&format!(
            "SELECT {BANNER_COLUMNS} FROM banners {filter} ORDER BY sort_order ASC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn update_banner(
        &self,
        id: i64,
        title: Option<&str>,
        image_url: Option<&str>,
        link_url: Option<&str>,
        sort_order: Option<i64>,
        is_active: Option<bool>,
    ) -> Result<Option<BannerRecord>, sqlx::Error> {
        sqlx::query_as::<_, BannerRecord>(&format!(
            "UPDATE banners SET title = COALESCE(?1, title), \
             image_url = COALESCE(?2, image_url), \
             link_url = COALESCE(?3, link_url), \
             sort_order = COALESCE(?4, sort_order), \
             is_active = COALESCE(?5, is_active) \
             WHERE id = ?6 RETURNING {BANNER_COLUMNS}"
        ))
        .bind(title)
        .bind(image_url)
        .bind(link_url)
        .bind(sort_order)
        .bind(is_active)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_banner(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM banners WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
