use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle of a generation task.
///
/// The only legal transitions are `Processing -> Completed` and
/// `Processing -> Failed`; both terminal states are final.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Column value.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Processing)
    }
}

/// A row in the `ai_tasks` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskRecord {
    pub id: i64,
    pub user_id: Option<i64>,
    pub prompt: String,
    pub model: String,
    /// Stored as the upper-case status name; see [`TaskRecord::status`].
    #[sqlx(rename = "status")]
    pub status_raw: String,
    pub result_url: Option<String>,
    pub thumb_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Parsed status. Unknown strings (hand-edited rows) read as `Failed`.
    pub fn status(&self) -> TaskStatus {
        self.status_raw.parse().unwrap_or_else(|_| {
            tracing::warn!(task_id = self.id, raw = %self.status_raw, "unknown task status; treating as FAILED");
            TaskStatus::Failed
        })
    }
}
