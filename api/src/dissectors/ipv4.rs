use std::net::Ipv4Addr;

use num_traits::FromPrimitive;

use super::Error;
use crate::bytes::{be_u16_at, be_u32_at, bits, Payload};
use crate::packet::{IpHeader, IpPacket, Protocol};

const MIN_HDR_LEN: usize = 20;

/// Decode an IPv4 packet out of `buf`.
///
/// Field layout per RFC 791: version and header length share byte 0,
/// DSCP/ECN share byte 1, everything else is sequential big-endian reads.
/// When `reuse` is set the returned options/payload alias `buf` and are
/// only valid while it is neither reused nor mutated; otherwise they are
/// defensive copies.
///
/// Payload length is `total_length - ihl*4`, clamped to the supplied
/// buffer so a short capture never slices out of bounds.
pub fn parse_ip<'a>(
    buf: &'a [u8],
    ts: libc::timeval,
    reuse: bool,
) -> Result<IpPacket<'a>, Error> {
    if buf.is_empty() {
        return Err(Error::InvalidLength("empty ip buffer".to_string()));
    }
    if buf.len() < MIN_HDR_LEN {
        return Err(Error::InvalidLength(format!(
            "ip packet too short ({} bytes)",
            buf.len()
        )));
    }

    let version = bits(buf[0], 7, 4);
    if version != 4 {
        return Err(Error::UnsupportedVersion(format!(
            "ip version {}, only 4 is supported",
            version
        )));
    }

    let ihl = bits(buf[0], 3, 0);
    let hdr_len = ihl as usize * 4;
    if hdr_len < MIN_HDR_LEN || buf.len() < hdr_len {
        return Err(Error::InvalidLength(format!(
            "ip header length {} exceeds buffer ({} bytes)",
            hdr_len,
            buf.len()
        )));
    }

    let total_length = be_u16_at(buf, 2).unwrap_or(0);
    if (total_length as usize) < hdr_len {
        return Err(Error::InvalidLength(format!(
            "ip total length {} below header length {}",
            total_length, hdr_len
        )));
    }

    let flags_frag = be_u16_at(buf, 6).unwrap_or(0);
    let header = IpHeader {
        version,
        ihl,
        dscp: bits(buf[1], 7, 2),
        ecn: bits(buf[1], 1, 0),
        total_length,
        id: be_u16_at(buf, 4).unwrap_or(0),
        flags: (flags_frag >> 13) as u8,
        frag_offset: flags_frag & 0x1fff,
        ttl: buf[8],
        protocol: buf[9],
        checksum: be_u16_at(buf, 10).unwrap_or(0),
        src: Ipv4Addr::from(be_u32_at(buf, 12).unwrap_or(0)),
        dst: Ipv4Addr::from(be_u32_at(buf, 16).unwrap_or(0)),
    };

    // truncated captures declare more payload than they carry
    let end = std::cmp::min(total_length as usize, buf.len());

    Ok(IpPacket {
        header,
        options: Payload::slice(buf, MIN_HDR_LEN, hdr_len, reuse),
        payload: Payload::slice(buf, hdr_len, end, reuse),
        ts,
        protocol: Protocol::from_u8(header.protocol),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::packet::ip_proto;

    fn ts() -> libc::timeval {
        libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        }
    }

    /// 78 byte UDP broadcast: header from the checksum test vector plus a
    /// NetBIOS-ish port 137/137 datagram whose UDP checksum is 0x1255.
    pub(crate) fn sample_udp_packet() -> Vec<u8> {
        let mut buf = vec![
            0x45, 0x00, 0x00, 0x4e, 0x70, 0x3a, 0x00, 0x00, 0x80, 0x11, 0xaa, 0x2a, 0x0a, 0x78,
            0x85, 0x4b, 0x0a, 0x78, 0x85, 0xff, // ip
            0x00, 0x89, 0x00, 0x89, 0x00, 0x3a, 0x12, 0x55, // udp
        ];
        buf.extend_from_slice(&[0xcb, 0xd8]);
        buf.extend_from_slice(&[0u8; 48]);
        buf
    }

    #[test]
    fn parse_sample() {
        let buf = sample_udp_packet();
        let pkt = parse_ip(&buf, ts(), true).unwrap();
        assert_eq!(pkt.header.version, 4);
        assert_eq!(pkt.header.ihl, 5);
        assert_eq!(pkt.header.total_length, 78);
        assert_eq!(pkt.header.ttl, 0x80);
        assert_eq!(pkt.header.protocol, ip_proto::UDP);
        assert_eq!(pkt.header.src, Ipv4Addr::new(10, 120, 133, 75));
        assert_eq!(pkt.header.dst, Ipv4Addr::new(10, 120, 133, 255));
        assert!(pkt.options.is_empty());
        assert_eq!(pkt.payload.len(), 78 - 20);
        assert!(matches!(pkt.protocol, Some(Protocol::UDP)));
        assert!(pkt.header.verify_checksum(&buf));
    }

    #[test]
    fn payload_len_matches_declared_total() {
        let buf = sample_udp_packet();
        let pkt = parse_ip(&buf, ts(), true).unwrap();
        assert_eq!(
            pkt.payload.len(),
            pkt.header.total_length as usize - pkt.header.header_len()
        );
    }

    #[test]
    fn empty_buffer() {
        let r = parse_ip(&[], ts(), true);
        assert!(matches!(r.unwrap_err(), Error::InvalidLength(_)));
    }

    #[test]
    fn not_ipv4() {
        let mut buf = sample_udp_packet();
        buf[0] = 0x65;
        let r = parse_ip(&buf, ts(), true);
        assert!(matches!(r.unwrap_err(), Error::UnsupportedVersion(_)));
    }

    #[test]
    fn header_longer_than_buffer() {
        let mut buf = sample_udp_packet();
        buf.truncate(20);
        buf[0] = 0x46; // ihl 6 => 24 byte header
        let r = parse_ip(&buf, ts(), true);
        assert!(matches!(r.unwrap_err(), Error::InvalidLength(_)));
    }

    #[test]
    fn truncated_capture_clamps_payload() {
        let mut buf = sample_udp_packet();
        buf.truncate(46); // declared total length stays 78
        let pkt = parse_ip(&buf, ts(), true).unwrap();
        assert_eq!(pkt.payload.len(), 46 - 20);
    }

    #[test]
    fn options_extracted() {
        // ihl 6, 4 bytes of options (NOP NOP NOP EOL), total length 32
        let mut buf = vec![
            0x46, 0x00, 0x00, 0x20, 0x00, 0x01, 0x00, 0x00, 0x40, 0x11, 0x00, 0x00, 0x0a, 0x00,
            0x00, 0x01, 0x0a, 0x00, 0x00, 0x02, 0x01, 0x01, 0x01, 0x00,
        ];
        buf.extend_from_slice(&[0xaa; 8]);
        let pkt = parse_ip(&buf, ts(), false).unwrap();
        assert_eq!(pkt.header.ihl, 6);
        assert_eq!(&*pkt.options, &[0x01, 0x01, 0x01, 0x00]);
        assert_eq!(pkt.payload.len(), 8);
    }

    #[test]
    fn copy_policy_detaches_from_input() {
        let buf = sample_udp_packet();
        let pkt = parse_ip(&buf, ts(), false).unwrap();
        assert!(matches!(pkt.payload, Payload::Owned(_)));
        let pkt = pkt.into_owned();
        drop(buf);
        assert_eq!(pkt.payload.len(), 58);
    }
}
