//! Database abstraction layer.
//!
//! Each aggregate gets its own store trait (`TaskStore`, `ConfigStore`,
//! `InteractionStore`, ...). The default implementation of all of them is
//! [`SqliteStore`]; swapping databases means implementing the traits for a
//! new type and changing the concrete type in [`crate::state::AppState`].
//!
//! All trait methods use `impl Future` in their signatures so no extra
//! `async-trait` crate is required at this layer.

pub mod banner;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod dao;
pub mod image;
pub mod interaction;
pub mod task;
pub mod user;

pub use dao::{
    BannerRecord, CategoryRecord, ChatMessage, ChatRecord, ConfigEntry, FavoriteToggle,
    HistoryEntry, ImagePatch, ImageQuery, ImageRecord, ImageSort, NewImage, TagRecord,
    TaskRecord, TaskStatus, TopicRecord, UserRecord,
};

pub use banner::BannerStore;
pub use catalog::CatalogStore;
pub use chat::ChatStore;
pub use config::ConfigStore;
pub use image::ImageStore;
pub use interaction::InteractionStore;
pub use task::TaskStore;
pub use user::UserStore;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

/// SQLite-backed implementation of every store trait.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g. `"sqlite://galleria.db"`
    /// or `"sqlite::memory:"` for tests. An in-memory database lives inside a
    /// single connection, so the pool is pinned to one connection that never
    /// expires.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let in_memory = url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Fresh, migrated in-memory database.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        Self::connect("sqlite::memory:", 1).await
    }
}

/// `true` when `e` is a UNIQUE constraint violation.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// `true` when `e` is a FOREIGN KEY constraint violation.
pub fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}
