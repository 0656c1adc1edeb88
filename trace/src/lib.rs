//! Versioned trace-record parsing and chunk reassembly.
//!
//! A capture splits oversized manifests and event payloads across several
//! records; the [`Reassembler`](reassembly::Reassembler) stitches them back
//! together and only ever emits complete messages.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use nom::error::{ErrorKind, ParseError};
use serde::Serialize;

pub mod reassembly;
pub mod record;

pub use reassembly::Reassembler;
pub use record::{ChunkInfo, Record, RecordVersion};

/// What a reassembler instance is scoped to, together with its provider.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum Kind {
    Manifest,
    EventPayload,
}

/// A completed logical trace message.
///
/// Produced only when every chunk has arrived; a partially received
/// message never escapes the reassembler.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Envelope {
    pub occurred: DateTime<Utc>,
    pub received: DateTime<Utc>,
    pub protocol: String,
    pub source: String,
    /// type/manifest identifier of the payload
    pub manifest: String,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
pub enum Error {
    /// Record buffer ends before the structure does
    Truncated(String),
    /// Version discriminator does not name a known record layout
    UnknownVersion(u8),
    Nom(ErrorKind),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Truncated(s) => write!(f, "truncated record: {}", s),
            Error::UnknownVersion(v) => write!(f, "unknown record version {}", v),
            Error::Nom(_) => write!(f, "nom parse error"),
        }
    }
}

impl std::error::Error for Error {}

impl<I> ParseError<I> for Error {
    fn from_error_kind(_: I, kind: ErrorKind) -> Self {
        Error::Nom(kind)
    }

    fn append(_: I, _: ErrorKind, other: Self) -> Self {
        other
    }
}

impl From<nom::Err<Error>> for Error {
    fn from(e: nom::Err<Error>) -> Self {
        match e {
            nom::Err::Error(e) | nom::Err::Failure(e) => e,
            nom::Err::Incomplete(_) => Error::Truncated("incomplete input".to_string()),
        }
    }
}
