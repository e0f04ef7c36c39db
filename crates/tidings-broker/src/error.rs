//! Broker error types.

use thiserror::Error;

use crate::pubsub::SearchError;

/// Broker errors.
///
/// The delivery path (`poll`, `publish*`, `subscribe`, `sweep`) never
/// surfaces these; they are reserved for setup and for per-item
/// evaluation failures that the broker logs and skips.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Search expression error.
    #[error("search error: {0}")]
    Search(#[from] SearchError),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] tidings_proto::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
