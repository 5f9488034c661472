use std::io;
use thiserror::Error;

/// Failures from the identifier and device-path cores. Database format
/// violations are not errors; they are reported as data by `support_db::validate`.
#[derive(Debug, Error)]
pub enum Error {
    /// Identifier text fails the 4-hex&4-hex shape check
    #[error("malformed identifier: {0}")]
    MalformedIdentifier(String),

    /// A path string cannot be parsed in the requested notation
    #[error("unrecognized path syntax in '{text}': {reason}")]
    UnrecognizedPathSyntax { text: String, reason: String },

    /// A segment kind the target notation cannot represent
    #[error("unsupported segment: {0}")]
    UnsupportedSegment(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
