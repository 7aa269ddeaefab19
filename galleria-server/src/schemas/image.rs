use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::entities::{ImagePatch, ImageQuery, ImageRecord, ImageSort, NewImage};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub thumb_url: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub category_id: Option<i64>,
    pub user_id: Option<i64>,
    pub likes: i64,
    pub views: i64,
    pub downloads: i64,
    pub is_ai: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ImageRecord> for ImageResponse {
    fn from(r: ImageRecord) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            url: r.url,
            thumb_url: r.thumb_url,
            width: r.width,
            height: r.height,
            category_id: r.category_id,
            user_id: r.user_id,
            likes: r.likes,
            views: r.views,
            downloads: r.downloads,
            is_ai: r.is_ai,
            tags: r.tags,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ImageListQuery {
    pub category_id: Option<i64>,
    pub tag: Option<String>,
    /// Matched against title and description.
    pub keyword: Option<String>,
    /// `latest` (default), `popular` or `downloads`.
    pub sort: Option<String>,
    /// 1-based page number.
    pub page: Option<i64>,
    /// Items per page, 1..=100 (default 20).
    pub page_size: Option<i64>,
}

impl ImageListQuery {
    /// Store query with defaults applied. `Err` names the bad parameter.
    pub fn to_query(&self) -> Result<ImageQuery, String> {
        let sort = match self.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw
                .parse::<ImageSort>()
                .map_err(|_| format!("unknown sort '{raw}' (expected latest, popular or downloads)"))?,
            None => ImageSort::default(),
        };
        Ok(ImageQuery {
            category_id: self.category_id,
            tag: self.tag.clone(),
            keyword: self.keyword.clone(),
            sort,
            page: self.page.unwrap_or(1).max(1),
            page_size: self
                .page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        })
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImagePage {
    pub items: Vec<ImageResponse>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateImageRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 2048))]
    pub url: String,
    pub thumb_url: Option<String>,
    #[validate(range(min = 1))]
    pub width: Option<i64>,
    #[validate(range(min = 1))]
    pub height: Option<i64>,
    pub category_id: Option<i64>,
    pub user_id: Option<i64>,
    #[serde(default)]
    pub is_ai: bool,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub tags: Vec<String>,
}

impl From<CreateImageRequest> for NewImage {
    fn from(r: CreateImageRequest) -> Self {
        Self {
            title: r.title,
            description: r.description,
            url: r.url,
            thumb_url: r.thumb_url,
            width: r.width,
            height: r.height,
            category_id: r.category_id,
            user_id: r.user_id,
            is_ai: r.is_ai,
            tags: r.tags,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateImageRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 2048))]
    pub url: Option<String>,
    pub thumb_url: Option<String>,
    pub category_id: Option<i64>,
    /// Replaces every tag when present.
    #[validate(length(max = 32))]
    pub tags: Option<Vec<String>>,
}

impl From<UpdateImageRequest> for ImagePatch {
    fn from(r: UpdateImageRequest) -> Self {
        Self {
            title: r.title,
            description: r.description,
            url: r.url,
            thumb_url: r.thumb_url,
            category_id: r.category_id,
            tags: r.tags,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn list_query_applies_defaults_and_bounds() {
        let q = ImageListQuery::default().to_query().unwrap();
        assert_eq!((q.page, q.page_size, q.sort), (1, DEFAULT_PAGE_SIZE, ImageSort::Latest));

        let q = ImageListQuery {
            page: Some(0),
            page_size: Some(1000),
            sort: Some("popular".into()),
            ..Default::default()
        }
        .to_query()
        .unwrap();
        assert_eq!((q.page, q.page_size, q.sort), (1, MAX_PAGE_SIZE, ImageSort::Popular));

        let bad = ImageListQuery {
            sort: Some("random".into()),
            ..Default::default()
        };
        assert!(bad.to_query().is_err());
    }
}
