//! Wire format decoders.
//!
//! Every decoder here is a pure function over an input byte range: no
//! shared state, no blocking, safe to call from any thread. Failures are
//! surfaced synchronously to the immediate caller and never retried.

use std::fmt::{Display, Formatter};

use nom::error::{ErrorKind, ParseError};

pub mod ethernet;
pub mod ipv4;
pub mod udp;

pub use ipv4::parse_ip;
pub use udp::to_udp;

/// Local decode failures. The input is a fixed byte range, so none of
/// these are retryable conditions.
#[derive(Debug)]
pub enum Error {
    /// Buffer is shorter than the structure being read
    InvalidLength(String),
    /// Non-IPv4 version nibble, or an SNMP PDU shape not matching the
    /// declared message version
    UnsupportedVersion(String),
    /// The requested transform does not apply to this packet's protocol
    UnsupportedProtocol(u8),
    /// A BER tag or length cannot be read, or nested lengths exceed the
    /// remaining buffer
    MalformedTlv(String),
    Nom(ErrorKind),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidLength(s) => write!(f, "invalid length: {}", s),
            Error::UnsupportedVersion(s) => write!(f, "unsupported version: {}", s),
            Error::UnsupportedProtocol(p) => write!(f, "unsupported ip protocol({})", p),
            Error::MalformedTlv(s) => write!(f, "malformed tlv: {}", s),
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
            nom::Err::Incomplete(_) => Error::InvalidLength("incomplete input".to_string()),
        }
    }
}
