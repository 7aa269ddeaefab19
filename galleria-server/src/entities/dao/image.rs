use chrono::{DateTime, Utc};
use strum::{Display, EnumString};

/// A row in the `images` table plus its tag names.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ImageRecord {
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
    pub created_at: DateTime<Utc>,
    /// Filled after the row is loaded; not a column.
    #[sqlx(skip)]
    pub tags: Vec<String>,
}

/// Ordering for image listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ImageSort {
    #[default]
    Latest,
    Popular,
    Downloads,
}

impl ImageSort {
    pub(crate) fn order_by(self) -> &'static str {
        match self {
            ImageSort::Latest => "i.id DESC",
            ImageSort::Popular => "i.likes DESC, i.id DESC",
            ImageSort::Downloads => "i.downloads DESC, i.id DESC",
        }
    }
}

/// Filters and paging for `list_images`.
#[derive(Debug, Clone, Default)]
pub struct ImageQuery {
    pub category_id: Option<i64>,
    pub tag: Option<String>,
    pub keyword: Option<String>,
    pub sort: ImageSort,
    /// 1-based.
    pub page: i64,
    pub page_size: i64,
}

/// Insert payload for a new image.
#[derive(Debug, Clone, Default)]
pub struct NewImage {
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub thumb_url: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub category_id: Option<i64>,
    pub user_id: Option<i64>,
    pub is_ai: bool,
    pub tags: Vec<String>,
}

/// Partial update; `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct ImagePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub thumb_url: Option<String>,
    pub category_id: Option<i64>,
    pub tags: Option<Vec<String>>,
}
