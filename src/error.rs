//! Crate-level error types.
//!
//! A single [`Error`] enum covers the two fallible surfaces of this crate:
//!
//! - **Framing errors** from the codec (`TokenMismatch`, the `Truncated*`
//!   variants, and `Io`). Every framing failure is fatal to the connection it
//!   came from: the wire format carries no recovery marker, so the caller must
//!   close the socket and reconnect rather than retry the decode.
//! - **Configuration errors** from address-string parsing and validation.
//!
//! The consumer cache raises no errors at all; absent keys, empty queues, and
//! redundant insertions are valid, silently-handled states.

use std::{io, result};
use thiserror::Error as ThisError;

pub type Result<T> = result::Result<T, Error>;

/// Protocol, connection, and configuration level errors.
#[derive(Clone, Debug, ThisError, PartialEq, Eq)]
pub enum Error {
    /// An error in the underlying byte stream.
    #[error("IO error: {0:?}")]
    Io(io::ErrorKind),

    /// The frame did not begin with the expected protocol token.
    #[error("framing error: begin token mismatch (got {found:#010x}, expected {expected:#010x})")]
    TokenMismatch {
        /// The four bytes actually read.
        found: u32,
        /// The fixed protocol begin token.
        expected: u32,
    },

    /// The stream ended inside the 8-byte frame header.
    #[error("framing error: short read in frame header")]
    TruncatedHeader,

    /// The stream ended inside the chunk-count or a chunk-length word.
    #[error("framing error: short read in chunk length")]
    TruncatedLength,

    /// The stream ended inside a chunk body.
    #[error("framing error: short read in chunk body")]
    TruncatedBody,

    /// Malformed metadata received from a master or broker.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e.kind())
    }
}
