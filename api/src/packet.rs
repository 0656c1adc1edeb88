//! Decoded packet data model.
//!
//! Headers are plain immutable data constructed once per decode call. The
//! payload side of every packet is a [`Payload`], so the reuse-vs-copy
//! choice made by the caller is visible in the type.

use std::net::Ipv4Addr;

use serde::Serialize;

use crate::bytes::{internet_checksum, udp_checksum, Payload};

/// IANA assigned IP protocol numbers we care about.
pub mod ip_proto {
    pub const ICMP: u8 = 1;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Primitive, Serialize)]
#[repr(u8)]
pub enum Protocol {
    ICMP = 1,
    TCP = 6,
    UDP = 17,
}

/// IPv4 header, RFC 791 layout. Only version 4 is ever produced.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct IpHeader {
    pub version: u8,
    /// header length in 32 bit words
    pub ihl: u8,
    pub dscp: u8,
    pub ecn: u8,
    pub total_length: u16,
    pub id: u16,
    pub flags: u8,
    pub frag_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl IpHeader {
    /// Header length in bytes.
    #[inline]
    pub fn header_len(&self) -> usize {
        self.ihl as usize * 4
    }

    /// Recompute the checksum over the on-wire header bytes.
    ///
    /// Mismatch is informational only; capture sources with checksum
    /// offload record zeros here and decode must still succeed.
    pub fn verify_checksum(&self, raw_header: &[u8]) -> bool {
        raw_header.len() >= self.header_len() && internet_checksum(&raw_header[..self.header_len()]) == 0
    }
}

/// A decoded IP packet: header, options, payload view and arrival time.
#[derive(Debug)]
pub struct IpPacket<'a> {
    pub header: IpHeader,
    /// IP options, empty unless `ihl > 5`
    pub options: Payload<'a>,
    pub payload: Payload<'a>,
    pub ts: libc::timeval,
    /// payload protocol when it is one we know how to keep decoding
    pub protocol: Option<Protocol>,
}

impl<'a> IpPacket<'a> {
    /// Copy out of the source buffer so the packet may outlive it.
    pub fn into_owned(self) -> IpPacket<'static> {
        IpPacket {
            header: self.header,
            options: self.options.into_owned(),
            payload: self.payload.into_owned(),
            ts: self.ts,
            protocol: self.protocol,
        }
    }
}

/// UDP header, four sequential big-endian 16 bit fields.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    /// header plus payload length as declared on the wire
    pub length: u16,
    pub checksum: u16,
}

/// A decoded UDP datagram together with the IP header it arrived in.
#[derive(Debug)]
pub struct UdpDatagram<'a> {
    pub ip: IpHeader,
    pub udp: UdpHeader,
    pub payload: Payload<'a>,
    pub ts: libc::timeval,
}

impl<'a> UdpDatagram<'a> {
    /// Recompute the UDP checksum over pseudo header, header and payload.
    ///
    /// Advisory only, like [`IpHeader::verify_checksum`]. A zero on-wire
    /// checksum means "not computed" and always verifies.
    pub fn verify_checksum(&self) -> bool {
        if self.udp.checksum == 0 {
            return true;
        }
        let mut udp = Vec::with_capacity(8 + self.payload.len());
        udp.extend_from_slice(&self.udp.src_port.to_be_bytes());
        udp.extend_from_slice(&self.udp.dst_port.to_be_bytes());
        udp.extend_from_slice(&self.udp.length.to_be_bytes());
        udp.extend_from_slice(&[0, 0]);
        udp.extend_from_slice(&self.payload);
        udp_checksum(self.ip.src.octets(), self.ip.dst.octets(), &udp) == self.udp.checksum
    }

    pub fn into_owned(self) -> UdpDatagram<'static> {
        UdpDatagram {
            ip: self.ip,
            udp: self.udp,
            payload: self.payload.into_owned(),
            ts: self.ts,
        }
    }
}
