//! Value conversion error types.

use thiserror::Error;

/// Errors raised while converting between textual and typed values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Text could not be parsed as a date/time.
    #[error("invalid timestamp: '{0}'")]
    InvalidTimestamp(String),

    /// Text could not be parsed as a UUID.
    #[error("invalid uuid: '{0}'")]
    InvalidUuid(String),

    /// A value of one kind cannot be represented as another.
    #[error("cannot convert {value} to {target}")]
    Conversion {
        /// Rendered form of the offending value.
        value: String,
        /// Name of the requested target kind.
        target: &'static str,
    },
}
