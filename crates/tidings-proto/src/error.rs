//! Protocol error types.

use thiserror::Error;

/// Errors raised while interpreting client-supplied notification data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A required view parameter was not supplied.
    #[error("missing view parameter: {0}")]
    MissingParam(&'static str),

    /// A view parameter was supplied with an unusable value.
    #[error("invalid view parameter {name}: {reason}")]
    InvalidParam {
        /// Parameter name, including the leading `@`.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
