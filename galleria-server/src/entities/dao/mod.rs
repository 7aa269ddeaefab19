pub mod banner;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod image;
pub mod interaction;
pub mod task;
pub mod user;

pub use banner::BannerRecord;
pub use catalog::{CategoryRecord, TagRecord, TopicRecord};
pub use chat::{ChatMessage, ChatRecord};
pub use config::ConfigEntry;
pub use image::{ImageQuery, ImageRecord, ImageSort, NewImage, ImagePatch};
pub use interaction::{FavoriteToggle, HistoryEntry};
pub use task::{TaskRecord, TaskStatus};
pub use user::UserRecord;
