use chrono::{DateTime, Utc};

use super::ImageRecord;

/// Outcome of a favorite toggle: the image after the counter update and
/// whether the pair is now favorited.
#[derive(Debug, Clone)]
pub struct FavoriteToggle {
    pub image: ImageRecord,
    pub favorited: bool,
}

/// A `view_history` row joined with the viewed image.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: i64,
    pub user_id: i64,
    pub viewed_at: DateTime<Utc>,
    pub image: ImageRecord,
}
