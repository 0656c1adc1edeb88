use super::Error;
use crate::bytes::{be_u16_at, Payload};
use crate::packet::{ip_proto, IpPacket, UdpDatagram, UdpHeader};

const HDR_LEN: usize = 8;

/// Extract the UDP datagram carried by an already decoded IP packet.
///
/// Four sequential big-endian 16 bit reads make up the header, everything
/// after the 8 header bytes is payload. `reuse` follows the same aliasing
/// contract as [`parse_ip`](super::parse_ip), against the packet's payload
/// buffer.
pub fn to_udp<'a>(pkt: &'a IpPacket<'a>, reuse: bool) -> Result<UdpDatagram<'a>, Error> {
    if pkt.header.protocol != ip_proto::UDP {
        return Err(Error::UnsupportedProtocol(pkt.header.protocol));
    }

    let buf: &[u8] = &pkt.payload;
    if buf.is_empty() {
        return Err(Error::InvalidLength("empty udp payload".to_string()));
    }
    if buf.len() < HDR_LEN {
        return Err(Error::InvalidLength(format!(
            "udp datagram too short ({} bytes)",
            buf.len()
        )));
    }

    let udp = UdpHeader {
        src_port: be_u16_at(buf, 0).unwrap_or(0),
        dst_port: be_u16_at(buf, 2).unwrap_or(0),
        length: be_u16_at(buf, 4).unwrap_or(0),
        checksum: be_u16_at(buf, 6).unwrap_or(0),
    };

    Ok(UdpDatagram {
        ip: pkt.header,
        udp,
        payload: Payload::slice(buf, HDR_LEN, buf.len(), reuse),
        ts: pkt.ts,
    })
}

#[cfg(test)]
mod tests {
    use super::super::ipv4::{parse_ip, tests::sample_udp_packet};
    use super::*;

    fn ts() -> libc::timeval {
        libc::timeval {
            tv_sec: 1,
            tv_usec: 2,
        }
    }

    #[test]
    fn sample_ports_and_checksum() {
        let buf = sample_udp_packet();
        let pkt = parse_ip(&buf, ts(), true).unwrap();
        let dg = to_udp(&pkt, true).unwrap();
        assert_eq!(dg.udp.src_port, 137);
        assert_eq!(dg.udp.dst_port, 137);
        assert_eq!(dg.udp.length, 58);
        assert_eq!(dg.udp.checksum, 0x1255);
        assert_eq!(dg.payload.len(), 50);
        assert!(dg.verify_checksum());
        assert_eq!(dg.ts.tv_sec, 1);
    }

    #[test]
    fn wrong_protocol() {
        let mut buf = sample_udp_packet();
        buf[9] = 6; // tcp
        let pkt = parse_ip(&buf, ts(), true).unwrap();
        let r = to_udp(&pkt, true);
        assert!(matches!(r.unwrap_err(), Error::UnsupportedProtocol(6)));
    }

    #[test]
    fn empty_payload() {
        // total length == header length, no udp bytes at all
        let buf = [
            0x45, 0x00, 0x00, 0x14, 0x00, 0x00, 0x00, 0x00, 0x40, 0x11, 0x00, 0x00, 0x0a, 0x00,
            0x00, 0x01, 0x0a, 0x00, 0x00, 0x02,
        ];
        let pkt = parse_ip(&buf, ts(), true).unwrap();
        let r = to_udp(&pkt, true);
        assert!(matches!(r.unwrap_err(), Error::InvalidLength(_)));
    }

    #[test]
    fn zero_checksum_always_verifies() {
        let mut buf = sample_udp_packet();
        buf[26] = 0;
        buf[27] = 0;
        let pkt = parse_ip(&buf, ts(), true).unwrap();
        let dg = to_udp(&pkt, true).unwrap();
        assert!(dg.verify_checksum());
    }
}
