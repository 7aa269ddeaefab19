use std::time::Duration;

use thiserror::Error;

/// Failures of one generation attempt against the upstream API.
#[derive(Debug, Error)]
pub enum AiError {
    /// No API key could be resolved from any settings layer.
    #[error("no API key configured for AI generation")]
    MissingCredentials,

    /// Upstream answered with a non-success status, an unreadable body, or a
    /// body without the expected field. The message is the upstream's own
    /// text whenever one could be extracted.
    #[error("{0}")]
    GenerationFailed(String),

    /// The endpoint-specific deadline elapsed.
    #[error("generation timed out after {}s", .0.as_secs())]
    GenerationTimeout(Duration),
}

/// Failures while turning a remote result into local assets. Never surfaced
/// to a task; the materializer falls back to the remote URL instead.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("asset exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("invalid data URL: {0}")]
    DataUrl(String),

    #[error("image decode/encode failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("thumbnail worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Why a generation request was not accepted.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("generation queue is full; try again later")]
    QueueFull,

    #[error("generation workers are shut down")]
    Closed,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
