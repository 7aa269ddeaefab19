//! Bodies of the `/ai` endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::ai::GenerationRequest;
use crate::ai::settings::ModelCatalog;
use crate::entities::{ChatMessage, ChatRecord, TaskRecord, TaskStatus};

pub const DEFAULT_TASK_LIMIT: i64 = 20;
pub const MAX_TASK_LIMIT: i64 = 100;

// ── generation tasks ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[validate(length(min = 1, max = 4000))]
    pub prompt: String,
    /// Overrides every configured image model.
    pub model: Option<String>,
    pub user_id: Option<i64>,
    /// e.g. `16:9`; picks the output size.
    #[serde(rename = "aspect_ratio", alias = "aspectRatio")]
    pub aspect_ratio: Option<String>,
}

impl From<GenerateRequest> for GenerationRequest {
    fn from(r: GenerateRequest) -> Self {
        Self {
            prompt: r.prompt,
            user_id: r.user_id,
            model: r.model,
            aspect_ratio: r.aspect_ratio,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub task_id: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TaskStatusRequest {
    pub id: i64,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaskListRequest {
    /// Every user's tasks when absent.
    pub user_id: Option<i64>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: i64,
    pub user_id: Option<i64>,
    pub prompt: String,
    pub model: String,
    /// `PROCESSING`, `COMPLETED` or `FAILED`.
    #[schema(value_type = String)]
    pub status: TaskStatus,
    pub result_url: Option<String>,
    pub thumb_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TaskRecord> for TaskResponse {
    fn from(r: TaskRecord) -> Self {
        Self {
            status: r.status(),
            id: r.id,
            user_id: r.user_id,
            prompt: r.prompt,
            model: r.model,
            result_url: r.result_url,
            thumb_url: r.thumb_url,
            error_message: r.error_message,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

// ── chat ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 16000))]
    pub prompt: String,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelsResponse {
    pub image_model: String,
    pub chat_model: String,
    pub models: Vec<String>,
}

impl From<ModelCatalog> for ModelsResponse {
    fn from(c: ModelCatalog) -> Self {
        Self {
            image_model: c.image_model,
            chat_model: c.chat_model,
            models: c.models,
        }
    }
}

// ── chat records ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ChatMessageBody {
    #[validate(length(min = 1, max = 16))]
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl From<ChatMessageBody> for ChatMessage {
    fn from(m: ChatMessageBody) -> Self {
        Self {
            role: m.role,
            content: m.content,
            time: m.time,
        }
    }
}

impl From<ChatMessage> for ChatMessageBody {
    fn from(m: ChatMessage) -> Self {
        Self {
            role: m.role,
            content: m.content,
            time: m.time,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveChatRecordRequest {
    pub user_id: i64,
    #[validate(length(min = 1, max = 128))]
    pub model: String,
    #[validate(length(max = 1000))]
    #[validate(nested)]
    pub messages: Vec<ChatMessageBody>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecordKey {
    pub user_id: i64,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecordListRequest {
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecordResponse {
    pub id: i64,
    pub user_id: i64,
    pub model: String,
    pub messages: Vec<ChatMessageBody>,
    pub updated_at: DateTime<Utc>,
}

impl From<ChatRecord> for ChatRecordResponse {
    fn from(r: ChatRecord) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            model: r.model,
            messages: r.messages.into_iter().map(Into::into).collect(),
            updated_at: r.updated_at,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn aspect_ratio_accepts_both_spellings() {
        let a: GenerateRequest =
            serde_json::from_str(r#"{"prompt":"p","aspect_ratio":"16:9","userId":1}"#).unwrap();
        let b: GenerateRequest =
            serde_json::from_str(r#"{"prompt":"p","aspectRatio":"16:9"}"#).unwrap();
        assert_eq!(a.aspect_ratio.as_deref(), Some("16:9"));
        assert_eq!(b.aspect_ratio, a.aspect_ratio);
        assert_eq!(a.user_id, Some(1));
    }

    #[test]
    fn empty_prompt_is_invalid() {
        let req: GenerateRequest = serde_json::from_str(r#"{"prompt":""}"#).unwrap();
        assert!(req.validate().is_err());
    }
}
