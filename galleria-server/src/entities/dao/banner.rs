use chrono::{DateTime, Utc};

/// A row in the `banners` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BannerRecord {
    pub id: i64,
    pub title: String,
    pub image_url: String,
    pub link_url: Option<String>,
    pub sort_order: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
