use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entities::HistoryEntry;
use crate::schemas::image::ImageResponse;

/// `(user, image)` pair addressed by favorite and history calls.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserImageRequest {
    pub user_id: i64,
    pub image_id: i64,
}

/// The image after a toggle, plus the resulting favorite state.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteToggleResponse {
    #[serde(flatten)]
    pub image: ImageResponse,
    pub favorited: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FavoriteStatusResponse {
    pub favorited: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    pub user_id: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    pub user_id: i64,
    /// 1..=200 (default 50).
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub id: i64,
    pub user_id: i64,
    pub viewed_at: DateTime<Utc>,
    pub image: ImageResponse,
}

impl From<HistoryEntry> for HistoryResponse {
    fn from(e: HistoryEntry) -> Self {
        Self {
            id: e.id,
            user_id: e.user_id,
            viewed_at: e.viewed_at,
            image: e.image.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClearedResponse {
    pub deleted: u64,
}
