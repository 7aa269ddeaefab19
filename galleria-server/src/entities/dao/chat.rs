use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of a stored conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `"user"`, `"assistant"`, or `"system"`.
    pub role: String,
    pub content: String,
    /// Client-side timestamp; kept verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// A row in the `chat_records` table, one per (user, model).
#[derive(Debug, Clone)]
pub struct ChatRecord {
    pub id: i64,
    pub user_id: i64,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub updated_at: DateTime<Utc>,
}
