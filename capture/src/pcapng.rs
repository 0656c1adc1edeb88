//! Next-generation capture file framing (pcapng).
//!
//! A stream of blocks, each carrying its total length twice: once up
//! front and once again as the last four bytes, which lets a parser
//! validate framing and a different consumer walk the file backwards. We
//! recognize Section Header, Interface Description and Enhanced Packet
//! blocks; anything else is surfaced as an opaque body of the declared
//! length.

use std::io::Read;

use super::{Error, Frame};

pub const BLOCK_SECTION_HEADER: u32 = 0x0a0d_0d0a;
pub const BLOCK_INTERFACE_DESCRIPTION: u32 = 0x0000_0001;
pub const BLOCK_ENHANCED_PACKET: u32 = 0x0000_0006;

pub const BYTE_ORDER_MAGIC: u32 = 0x1a2b_3c4d;

const OPT_END: u16 = 0;
const OPT_IF_NAME: u16 = 2;
const OPT_IF_DESCRIPTION: u16 = 3;
const OPT_IF_TSRESOL: u16 = 9;

/// Timestamp resolution declared by an interface: power of ten by
/// default, power of two when the option value has its high bit set.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resolution {
    Decimal(u8),
    Binary(u8),
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::Decimal(6)
    }
}

impl Resolution {
    fn ticks_per_sec(self) -> u64 {
        match self {
            Resolution::Decimal(n) => 10u64.saturating_pow(n.min(19) as u32),
            Resolution::Binary(n) => 1u64 << n.min(63),
        }
    }
}

/// One interface declared in the current section.
#[derive(Clone, Debug, Default)]
pub struct Interface {
    pub link_type: u16,
    pub snaplen: u32,
    pub name: Option<String>,
    pub description: Option<String>,
    pub resolution: Resolution,
}

/// A parsed block.
#[derive(Clone, Debug)]
pub enum Block {
    SectionHeader { major: u16, minor: u16 },
    InterfaceDescription(Interface),
    EnhancedPacket(Frame),
    /// unrecognized type, body preserved as-is
    Other { block_type: u32, body: Vec<u8> },
}

/// Forward-only block/frame reader over any `Read`.
///
/// Interface state resets at each Section Header, as the format requires.
pub struct PcapngReader<R: Read> {
    input: R,
    big_endian: bool,
    interfaces: Vec<Interface>,
}

impl<R: Read> PcapngReader<R> {
    pub fn new(input: R) -> PcapngReader<R> {
        PcapngReader {
            input,
            big_endian: false,
            interfaces: vec![],
        }
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    /// Read the next block; `Ok(None)` at a clean end of stream.
    pub fn next_block(&mut self) -> Result<Option<Block>, Error> {
        let mut head = [0u8; 8];
        match self.input.read_exact(&mut head) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let raw_type = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);
        // a section header's endianness comes from its own byte-order
        // magic, so peek before applying the section's current order
        if raw_type == BLOCK_SECTION_HEADER {
            return self.read_section_header(&head).map(Some);
        }

        let block_type = self.u32_of([head[0], head[1], head[2], head[3]]);
        let total_len = self.u32_of([head[4], head[5], head[6], head[7]]);
        let body = self.read_body(total_len)?;

        match block_type {
            BLOCK_INTERFACE_DESCRIPTION => {
                let iface = self.parse_interface(&body)?;
                self.interfaces.push(iface.clone());
                Ok(Some(Block::InterfaceDescription(iface)))
            }
            BLOCK_ENHANCED_PACKET => Ok(Some(Block::EnhancedPacket(self.parse_epb(&body)?))),
            other => Ok(Some(Block::Other {
                block_type: other,
                body,
            })),
        }
    }

    /// Read frames, skipping every non-packet block.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        loop {
            match self.next_block()? {
                None => return Ok(None),
                Some(Block::EnhancedPacket(frame)) => return Ok(Some(frame)),
                Some(_) => {}
            }
        }
    }

    fn read_section_header(&mut self, head: &[u8; 8]) -> Result<Block, Error> {
        let mut magic = [0u8; 4];
        self.input.read_exact(&mut magic)?;
        let magic_le = u32::from_le_bytes(magic);
        self.big_endian = match magic_le {
            BYTE_ORDER_MAGIC => false,
            m if m.swap_bytes() == BYTE_ORDER_MAGIC => true,
            m => return Err(Error::InvalidMagic(m)),
        };
        // a new section starts from a clean interface table
        self.interfaces.clear();

        let total_len = self.u32_of([head[4], head[5], head[6], head[7]]);
        if total_len < 12 + 4 + 4 {
            return Err(Error::CorruptBlock(format!(
                "section header of {} bytes",
                total_len
            )));
        }
        // rest of the body: version, section length, options, trailer
        let mut rest = vec![0u8; total_len as usize - 12];
        self.input
            .read_exact(&mut rest)
            .map_err(|_| Error::Truncated("section header body".to_string()))?;

        let trailer_off = rest.len() - 4;
        let trailer = self.u32_of([
            rest[trailer_off],
            rest[trailer_off + 1],
            rest[trailer_off + 2],
            rest[trailer_off + 3],
        ]);
        if trailer != total_len {
            return Err(Error::CorruptBlock(format!(
                "section trailer length {} != {}",
                trailer, total_len
            )));
        }

        let major = self.u16_of([rest[0], rest[1]]);
        let minor = self.u16_of([rest[2], rest[3]]);
        Ok(Block::SectionHeader { major, minor })
    }

    /// Read a block body of `total_len` minus the 8 byte head, validate
    /// the trailing length copy, and return the body without it.
    fn read_body(&mut self, total_len: u32) -> Result<Vec<u8>, Error> {
        if total_len < 12 || total_len % 4 != 0 {
            return Err(Error::CorruptBlock(format!(
                "block length {} not a multiple of 4 (or below minimum)",
                total_len
            )));
        }
        let mut body = vec![0u8; total_len as usize - 8];
        self.input
            .read_exact(&mut body)
            .map_err(|_| Error::Truncated(format!("block body of {} bytes", total_len)))?;

        let off = body.len() - 4;
        let trailer = self.u32_of([body[off], body[off + 1], body[off + 2], body[off + 3]]);
        if trailer != total_len {
            return Err(Error::CorruptBlock(format!(
                "trailer length {} != declared {}",
                trailer, total_len
            )));
        }
        body.truncate(off);
        Ok(body)
    }

    fn parse_interface(&self, body: &[u8]) -> Result<Interface, Error> {
        if body.len() < 8 {
            return Err(Error::CorruptBlock(
                "interface description too short".to_string(),
            ));
        }
        let mut iface = Interface {
            link_type: self.u16_of([body[0], body[1]]),
            snaplen: self.u32_of([body[4], body[5], body[6], body[7]]),
            ..Default::default()
        };
        for (code, value) in self.options(&body[8..]) {
            match code {
                OPT_IF_NAME => iface.name = Some(String::from_utf8_lossy(value).into_owned()),
                OPT_IF_DESCRIPTION => {
                    iface.description = Some(String::from_utf8_lossy(value).into_owned())
                }
                OPT_IF_TSRESOL if !value.is_empty() => {
                    let v = value[0];
                    iface.resolution = if v & 0x80 == 0 {
                        Resolution::Decimal(v)
                    } else {
                        Resolution::Binary(v & 0x7f)
                    };
                }
                _ => {}
            }
        }
        Ok(iface)
    }

    fn parse_epb(&self, body: &[u8]) -> Result<Frame, Error> {
        if body.len() < 20 {
            return Err(Error::CorruptBlock("enhanced packet too short".to_string()));
        }
        let iface_idx = self.u32_of([body[0], body[1], body[2], body[3]]) as usize;
        let ts_high = self.u32_of([body[4], body[5], body[6], body[7]]);
        let ts_low = self.u32_of([body[8], body[9], body[10], body[11]]);
        let caplen = self.u32_of([body[12], body[13], body[14], body[15]]);
        let origlen = self.u32_of([body[16], body[17], body[18], body[19]]);

        if body.len() < 20 + caplen as usize {
            return Err(Error::CorruptBlock(format!(
                "packet caplen {} exceeds block body",
                caplen
            )));
        }
        let data = body[20..20 + caplen as usize].to_vec();

        let iface = self.interfaces.get(iface_idx).ok_or_else(|| {
            Error::CorruptBlock(format!("packet references unknown interface {}", iface_idx))
        })?;

        // split 64 bit timestamp in interface resolution units
        let ticks = (ts_high as u64) << 32 | ts_low as u64;
        let per_sec = iface.resolution.ticks_per_sec();
        let sec = ticks / per_sec;
        let usec = (ticks % per_sec).saturating_mul(1_000_000) / per_sec;

        Ok(Frame {
            ts: libc::timeval {
                tv_sec: sec as libc::time_t,
                tv_usec: usec as libc::suseconds_t,
            },
            caplen,
            origlen,
            link_type: iface.link_type,
            data,
        })
    }

    /// Walk a 2-byte code / 2-byte length / padded-to-4 value option list.
    fn options<'a>(&self, mut buf: &'a [u8]) -> Vec<(u16, &'a [u8])> {
        let mut out = vec![];
        while buf.len() >= 4 {
            let code = self.u16_of([buf[0], buf[1]]);
            let len = self.u16_of([buf[2], buf[3]]) as usize;
            if code == OPT_END {
                break;
            }
            if buf.len() < 4 + len {
                break;
            }
            out.push((code, &buf[4..4 + len]));
            let padded = (len + 3) & !3;
            if buf.len() < 4 + padded {
                break;
            }
            buf = &buf[4 + padded..];
        }
        out
    }

    fn u16_of(&self, b: [u8; 2]) -> u16 {
        if self.big_endian {
            u16::from_be_bytes(b)
        } else {
            u16::from_le_bytes(b)
        }
    }

    fn u32_of(&self, b: [u8; 4]) -> u32 {
        if self.big_endian {
            u32::from_be_bytes(b)
        } else {
            u32::from_le_bytes(b)
        }
    }
}
