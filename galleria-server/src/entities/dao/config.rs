use chrono::{DateTime, Utc};

/// A row in the `system_configs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}
