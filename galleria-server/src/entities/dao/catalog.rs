use chrono::{DateTime, Utc};

/// A row in the `categories` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

/// A row in the `tags` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TagRecord {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A row in the `topics` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopicRecord {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub created_at: DateTime<Utc>,
}
