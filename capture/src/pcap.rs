//! Classic libpcap file framing.
//!
//! A 24 byte global header (magic, version, timezone offset, sigfigs,
//! snapshot length, link type) followed by 16 byte record headers
//! (seconds, microseconds, captured length, original length), each with
//! `caplen` bytes of frame data. The magic decides byte order and
//! timestamp resolution.

use std::io::Read;

use super::{Error, Frame};

pub const MAGIC_MICROS: u32 = 0xa1b2_c3d4;
pub const MAGIC_MICROS_BE: u32 = 0xd4c3_b2a1;
pub const MAGIC_NANOS: u32 = 0xa1b2_3c4d;
pub const MAGIC_NANOS_BE: u32 = 0x4d3c_b2a1;

/// Parsed global header.
#[derive(Clone, Copy, Debug)]
pub struct PcapHeader {
    pub magic: u32,
    pub version_major: u16,
    pub version_minor: u16,
    /// correction between GMT and the capture's local timezone
    pub thiszone: i32,
    pub sigfigs: u32,
    pub snaplen: u32,
    pub link_type: u16,
}

/// Forward-only frame reader over any `Read`.
pub struct PcapReader<R: Read> {
    input: R,
    header: PcapHeader,
    swapped: bool,
    nanos: bool,
}

impl<R: Read> PcapReader<R> {
    pub fn new(mut input: R) -> Result<PcapReader<R>, Error> {
        let mut hdr = [0u8; 24];
        input.read_exact(&mut hdr)?;

        let magic = u32::from_le_bytes([hdr[0], hdr[1], hdr[2], hdr[3]]);
        let (swapped, nanos) = match magic {
            MAGIC_MICROS => (false, false),
            MAGIC_NANOS => (false, true),
            MAGIC_MICROS_BE => (true, false),
            MAGIC_NANOS_BE => (true, true),
            other => return Err(Error::InvalidMagic(other)),
        };

        let u16_at = |off: usize| {
            let b = [hdr[off], hdr[off + 1]];
            if swapped {
                u16::from_be_bytes(b)
            } else {
                u16::from_le_bytes(b)
            }
        };
        let u32_at = |off: usize| {
            let b = [hdr[off], hdr[off + 1], hdr[off + 2], hdr[off + 3]];
            if swapped {
                u32::from_be_bytes(b)
            } else {
                u32::from_le_bytes(b)
            }
        };

        let header = PcapHeader {
            magic,
            version_major: u16_at(4),
            version_minor: u16_at(6),
            thiszone: u32_at(8) as i32,
            sigfigs: u32_at(12),
            snaplen: u32_at(16),
            link_type: u32_at(20) as u16,
        };

        Ok(PcapReader {
            input,
            header,
            swapped,
            nanos,
        })
    }

    pub fn header(&self) -> &PcapHeader {
        &self.header
    }

    /// Read the next frame; `Ok(None)` at a clean end of stream.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        let mut rec = [0u8; 16];
        match self.input.read_exact(&mut rec) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let u32_at = |off: usize| {
            let b = [rec[off], rec[off + 1], rec[off + 2], rec[off + 3]];
            if self.swapped {
                u32::from_be_bytes(b)
            } else {
                u32::from_le_bytes(b)
            }
        };

        let sec = u32_at(0);
        let frac = u32_at(4);
        let caplen = u32_at(8);
        let origlen = u32_at(12);

        if caplen > self.header.snaplen.max(65535) {
            return Err(Error::CorruptBlock(format!(
                "caplen {} above snaplen {}",
                caplen, self.header.snaplen
            )));
        }

        let mut data = vec![0u8; caplen as usize];
        self.input
            .read_exact(&mut data)
            .map_err(|_| Error::Truncated(format!("frame body of {} bytes", caplen)))?;

        let usec = if self.nanos { frac / 1000 } else { frac };
        Ok(Some(Frame {
            ts: libc::timeval {
                tv_sec: sec as libc::time_t,
                tv_usec: usec as libc::suseconds_t,
            },
            caplen,
            origlen,
            link_type: self.header.link_type,
            data,
        }))
    }
}

impl<R: Read> Iterator for PcapReader<R> {
    type Item = Result<Frame, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le_file(frames: &[(u32, u32, &[u8])]) -> Vec<u8> {
        let mut f = vec![];
        f.extend_from_slice(&MAGIC_MICROS.to_le_bytes());
        f.extend_from_slice(&2u16.to_le_bytes());
        f.extend_from_slice(&4u16.to_le_bytes());
        f.extend_from_slice(&0i32.to_le_bytes());
        f.extend_from_slice(&0u32.to_le_bytes());
        f.extend_from_slice(&65535u32.to_le_bytes());
        f.extend_from_slice(&1u32.to_le_bytes()); // ethernet
        for (sec, usec, data) in frames {
            f.extend_from_slice(&sec.to_le_bytes());
            f.extend_from_slice(&usec.to_le_bytes());
            f.extend_from_slice(&(data.len() as u32).to_le_bytes());
            f.extend_from_slice(&(data.len() as u32).to_le_bytes());
            f.extend_from_slice(data);
        }
        f
    }

    #[test]
    fn reads_two_frames() {
        let file = le_file(&[(1_515_933_236, 562_913, &[1, 2, 3]), (10, 20, &[4, 5])]);
        let mut rdr = PcapReader::new(file.as_slice()).unwrap();
        assert_eq!(rdr.header().link_type, 1);
        assert_eq!(rdr.header().snaplen, 65535);

        let f1 = rdr.next_frame().unwrap().unwrap();
        assert_eq!(f1.ts.tv_sec, 1_515_933_236);
        assert_eq!(f1.ts.tv_usec, 562_913);
        assert_eq!(f1.data, vec![1, 2, 3]);

        let f2 = rdr.next_frame().unwrap().unwrap();
        assert_eq!(f2.data, vec![4, 5]);
        assert!(rdr.next_frame().unwrap().is_none());
    }

    #[test]
    fn big_endian_magic() {
        let mut f = vec![];
        f.extend_from_slice(&MAGIC_MICROS.to_be_bytes()); // appears swapped to an le reader
        f.extend_from_slice(&2u16.to_be_bytes());
        f.extend_from_slice(&4u16.to_be_bytes());
        f.extend_from_slice(&0i32.to_be_bytes());
        f.extend_from_slice(&0u32.to_be_bytes());
        f.extend_from_slice(&4096u32.to_be_bytes());
        f.extend_from_slice(&101u32.to_be_bytes());
        f.extend_from_slice(&7u32.to_be_bytes());
        f.extend_from_slice(&0u32.to_be_bytes());
        f.extend_from_slice(&1u32.to_be_bytes());
        f.extend_from_slice(&1u32.to_be_bytes());
        f.push(0xab);
        let mut rdr = PcapReader::new(f.as_slice()).unwrap();
        assert_eq!(rdr.header().link_type, 101);
        let frame = rdr.next_frame().unwrap().unwrap();
        assert_eq!(frame.ts.tv_sec, 7);
        assert_eq!(frame.data, vec![0xab]);
    }

    #[test]
    fn nanosecond_magic_scales_to_micros() {
        let mut file = le_file(&[]);
        file[..4].copy_from_slice(&MAGIC_NANOS.to_le_bytes());
        file.extend_from_slice(&1u32.to_le_bytes());
        file.extend_from_slice(&500_000_000u32.to_le_bytes());
        file.extend_from_slice(&0u32.to_le_bytes());
        file.extend_from_slice(&0u32.to_le_bytes());
        let mut rdr = PcapReader::new(file.as_slice()).unwrap();
        let frame = rdr.next_frame().unwrap().unwrap();
        assert_eq!(frame.ts.tv_usec, 500_000);
    }

    #[test]
    fn bad_magic() {
        let r = PcapReader::new(&[0u8; 24][..]);
        assert!(matches!(r.err(), Some(Error::InvalidMagic(0))));
    }

    #[test]
    fn truncated_body() {
        let mut file = le_file(&[(0, 0, &[1, 2, 3, 4])]);
        file.truncate(file.len() - 2);
        let mut rdr = PcapReader::new(file.as_slice()).unwrap();
        assert!(matches!(
            rdr.next_frame().unwrap_err(),
            Error::Truncated(_)
        ));
    }
}
