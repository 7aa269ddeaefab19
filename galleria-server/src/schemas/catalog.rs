//! Categories, tags, topics and banners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::entities::{BannerRecord, CategoryRecord, TagRecord, TopicRecord};
use crate::schemas::image::ImageResponse;

// ── categories ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

impl From<CategoryRecord> for CategoryResponse {
    fn from(r: CategoryRecord) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            cover_url: r.cover_url,
            sort_order: r.sort_order,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub cover_url: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub sort_order: Option<i64>,
}

// ── tags ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TagResponse {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<TagRecord> for TagResponse {
    fn from(r: TagRecord) -> Self {
        Self {
            id: r.id,
            name: r.name,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, max = 32))]
    pub name: String,
}

// ── topics ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopicResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<TopicRecord> for TopicResponse {
    fn from(r: TopicRecord) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            cover_url: r.cover_url,
            created_at: r.created_at,
        }
    }
}

/// A topic with its member images in curated order.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopicDetailResponse {
    #[serde(flatten)]
    pub topic: TopicResponse,
    pub images: Vec<ImageResponse>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopicRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTopicRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TopicImagesRequest {
    #[validate(length(max = 500))]
    pub image_ids: Vec<i64>,
}

// ── banners ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BannerResponse {
    pub id: i64,
    pub title: String,
    pub image_url: String,
    pub link_url: Option<String>,
    pub sort_order: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<BannerRecord> for BannerResponse {
    fn from(r: BannerRecord) -> Self {
        Self {
            id: r.id,
            title: r.title,
            image_url: r.image_url,
            link_url: r.link_url,
            sort_order: r.sort_order,
            is_active: r.is_active,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BannerQuery {
    /// Include inactive banners.
    pub all: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBannerRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1, max = 2048))]
    pub image_url: String,
    pub link_url: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBannerRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 2048))]
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub sort_order: Option<i64>,
    pub is_active: Option<bool>,
}
