//! Capture-file frame readers.
//!
//! Both readers are synchronous, single-threaded, forward-only producers
//! over a seekable byte stream. They hold no state beyond their read
//! cursor and must not be shared across threads without external
//! synchronization. Closing the underlying stream is the caller's way of
//! cancelling further reads.

use std::fmt::{Display, Formatter};

pub mod pcap;
pub mod pcapng;

/// Link-layer types we recognize in capture headers.
pub mod link_type {
    pub const NULL: u16 = 0;
    pub const ETHERNET: u16 = 1;
    /// raw IP, no link header
    pub const RAW: u16 = 101;
}

/// One captured frame, as stored in the file.
#[derive(Clone, Debug)]
pub struct Frame {
    pub ts: libc::timeval,
    /// bytes actually stored
    pub caplen: u32,
    /// original on-wire length
    pub origlen: u32,
    pub link_type: u16,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub enum Error {
    /// Global header magic is not a pcap/pcapng signature
    InvalidMagic(u32),
    /// Block or record structure is inconsistent with its declared lengths
    CorruptBlock(String),
    /// Stream ended in the middle of a structure
    Truncated(String),
    Io(std::io::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidMagic(m) => write!(f, "invalid capture magic {:#010x}", m),
            Error::CorruptBlock(s) => write!(f, "corrupt block: {}", s),
            Error::Truncated(s) => write!(f, "truncated capture: {}", s),
            Error::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
