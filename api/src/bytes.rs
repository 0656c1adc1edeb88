//! Byte and bit level primitives shared by every decoder in the workspace.
//!
//! All multi-byte reads are network order (big-endian). Nothing in here
//! allocates except `Payload::into_owned`.

use std::ops::Deref;

/// Read a big-endian u16 at `offset`, `None` if the buffer is too short.
#[inline]
pub fn be_u16_at(buf: &[u8], offset: usize) -> Option<u16> {
    let b = buf.get(offset..offset + 2)?;
    Some((b[0] as u16) << 8 | b[1] as u16)
}

/// Read a big-endian u32 at `offset`, `None` if the buffer is too short.
#[inline]
pub fn be_u32_at(buf: &[u8], offset: usize) -> Option<u32> {
    let b = buf.get(offset..offset + 4)?;
    Some((b[0] as u32) << 24 | (b[1] as u32) << 16 | (b[2] as u32) << 8 | b[3] as u32)
}

/// Read a big-endian u64 at `offset`, `None` if the buffer is too short.
#[inline]
pub fn be_u64_at(buf: &[u8], offset: usize) -> Option<u64> {
    let b = buf.get(offset..offset + 8)?;
    let mut v = 0u64;
    for byte in b {
        v = v << 8 | *byte as u64;
    }
    Some(v)
}

/// Extract bits `hi..=lo` of a byte, `hi`/`lo` counted from 7 down to 0.
///
/// `bits(0x45, 7, 4)` is the IPv4 version nibble, `bits(0x45, 3, 0)` the
/// header length nibble.
#[inline]
pub fn bits(byte: u8, hi: u8, lo: u8) -> u8 {
    debug_assert!(hi >= lo && hi <= 7);
    (byte >> lo) & ((1u16 << (hi - lo + 1)) - 1) as u8
}

/// RFC 1071 Internet checksum over `buf`.
///
/// Sums big-endian 16-bit words (an odd trailing byte is zero padded on the
/// right), folds the carries out of the 32-bit accumulator until none
/// remain, then returns the ones' complement. A buffer that already carries
/// a correct checksum sums to zero.
pub fn internet_checksum(buf: &[u8]) -> u16 {
    let mut sum = 0u32;
    let mut chunks = buf.chunks_exact(2);
    for word in &mut chunks {
        sum += (word[0] as u32) << 8 | word[1] as u32;
    }
    if let [odd] = chunks.remainder() {
        sum += (*odd as u32) << 8;
    }
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// UDP checksum over the 12-byte IPv4 pseudo header followed by the UDP
/// header (checksum field zeroed) and payload.
///
/// `udp` must be the full datagram starting at the UDP header.
pub fn udp_checksum(src: [u8; 4], dst: [u8; 4], udp: &[u8]) -> u16 {
    let mut buf = Vec::with_capacity(12 + udp.len());
    buf.extend_from_slice(&src);
    buf.extend_from_slice(&dst);
    buf.push(0);
    buf.push(super::packet::ip_proto::UDP);
    buf.extend_from_slice(&(udp.len() as u16).to_be_bytes());
    buf.extend_from_slice(udp);
    // zero out the checksum field inside the copied UDP header
    if buf.len() >= 12 + 8 {
        buf[12 + 6] = 0;
        buf[12 + 7] = 0;
    }
    internet_checksum(&buf)
}

/// A decoded sub-range of an input buffer.
///
/// The caller decides at decode time whether results alias the input buffer
/// (`Borrowed`, valid only while the input is untouched) or are defensive
/// copies (`Owned`, safe to retain). Decoders never pick silently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload<'a> {
    Borrowed(&'a [u8]),
    Owned(Vec<u8>),
}

impl<'a> Payload<'a> {
    /// Slice `buf[range]`, borrowing when `reuse` is set.
    #[inline]
    pub fn slice(buf: &'a [u8], start: usize, end: usize, reuse: bool) -> Payload<'a> {
        let s = &buf[start..end];
        if reuse {
            Payload::Borrowed(s)
        } else {
            Payload::Owned(s.to_vec())
        }
    }

    pub fn into_owned(self) -> Payload<'static> {
        match self {
            Payload::Borrowed(s) => Payload::Owned(s.to_vec()),
            Payload::Owned(v) => Payload::Owned(v),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.as_ref().is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_ref().len()
    }
}

impl<'a> AsRef<[u8]> for Payload<'a> {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        match self {
            Payload::Borrowed(s) => s,
            Payload::Owned(v) => v.as_slice(),
        }
    }
}

impl<'a> Deref for Payload<'a> {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        self.as_ref()
    }
}

impl<'a> Default for Payload<'a> {
    fn default() -> Self {
        Payload::Borrowed(&[])
    }
}
