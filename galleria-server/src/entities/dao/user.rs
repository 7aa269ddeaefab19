use chrono::{DateTime, Utc};

/// A row in the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}
