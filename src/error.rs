use thiserror::Error;

/// Errors raised by `nested_qs`.
///
/// Only configuration problems and runaway stringify recursion are errors.
/// Malformed querystring input never fails: bad escapes pass through,
/// guarded keys are dropped and oversized indices become map keys.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The charset is neither `utf-8` nor `iso-8859-1`.
    #[error("the charset option must be either utf-8 or iso-8859-1, found `{0}`")]
    InvalidCharset(String),

    /// The format is neither `RFC1738` nor `RFC3986`.
    #[error("unknown format option provided: `{0}`")]
    UnknownFormat(String),

    /// The array format is not one of `indices`, `brackets`, `repeat` or `comma`.
    #[error("unknown array format option provided: `{0}`")]
    UnknownArrayFormat(String),

    /// An empty literal delimiter would split between every character.
    #[error("the delimiter must not be empty")]
    EmptyDelimiter,

    /// Stringify walked deeper than the configured `max_depth`.
    #[error("value is nested deeper than the maximum stringify depth of {0}")]
    DepthExceeded(usize),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
