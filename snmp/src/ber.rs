//! BER tag-length-value framing, X.690 section 8.1.
//!
//! Tag byte: class in bits 7-6, constructed flag in bit 5, tag number in
//! bits 4-0. The long tag form (number 31) never appears in the SNMP tag
//! set and is rejected. Length: short form below 0x80, otherwise the low
//! seven bits count the following big-endian length bytes; the indefinite
//! form is rejected.

use nom::bytes::complete::take;
use nom::number::complete::be_u8;
use nom::IResult;

use tracewire_api::dissectors::Error;

/// Tag class bits (bits 7-6)
pub mod class {
    pub const UNIVERSAL: u8 = 0x00;
    pub const APPLICATION: u8 = 0x40;
    pub const CONTEXT_SPECIFIC: u8 = 0x80;
    pub const PRIVATE: u8 = 0xc0;
}

pub const CONSTRUCTED: u8 = 0x20;

/// Universal tags used by SNMP
pub mod universal {
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;
}

/// Application tags, SNMP SMI types
pub mod application {
    pub const IP_ADDRESS: u8 = 0x40;
    pub const COUNTER32: u8 = 0x41;
    pub const GAUGE32: u8 = 0x42;
    pub const TIMETICKS: u8 = 0x43;
    pub const COUNTER64: u8 = 0x46;
}

/// PDU tags (context-specific, constructed)
pub mod pdu {
    pub const GET_REQUEST: u8 = 0xa0;
    pub const GET_NEXT_REQUEST: u8 = 0xa1;
    pub const RESPONSE: u8 = 0xa2;
    pub const SET_REQUEST: u8 = 0xa3;
    pub const TRAP_V1: u8 = 0xa4;
    pub const GET_BULK_REQUEST: u8 = 0xa5;
    pub const INFORM_REQUEST: u8 = 0xa6;
    pub const TRAP_V2: u8 = 0xa7;
    pub const REPORT: u8 = 0xa8;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize)]
pub enum Class {
    Universal,
    Application,
    ContextSpecific,
    Private,
}

/// Descriptive metadata attached to every decoded value.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize)]
pub struct Asn1TagInfo {
    pub class: Class,
    pub constructed: bool,
    pub number: u8,
}

impl Asn1TagInfo {
    pub fn from_byte(tag: u8) -> Asn1TagInfo {
        let class = match tag & 0xc0 {
            class::APPLICATION => Class::Application,
            class::CONTEXT_SPECIFIC => Class::ContextSpecific,
            class::PRIVATE => Class::Private,
            _ => Class::Universal,
        };
        Asn1TagInfo {
            class,
            constructed: tag & CONSTRUCTED != 0,
            number: tag & 0x1f,
        }
    }

    pub fn to_byte(self) -> u8 {
        let class = match self.class {
            Class::Universal => class::UNIVERSAL,
            Class::Application => class::APPLICATION,
            Class::ContextSpecific => class::CONTEXT_SPECIFIC,
            Class::Private => class::PRIVATE,
        };
        class | if self.constructed { CONSTRUCTED } else { 0 } | self.number
    }
}

/// Read one TLV, returning the raw tag byte and the value bytes.
pub fn tlv(input: &[u8]) -> IResult<&[u8], (u8, &[u8]), Error> {
    let (input, tag) = be_u8(input)?;
    if tag & 0x1f == 0x1f {
        return Err(nom::Err::Failure(Error::MalformedTlv(format!(
            "long form tag number (first byte {:#04x}) not in the snmp tag set",
            tag
        ))));
    }
    let (input, len) = length(input)?;
    if input.len() < len {
        return Err(nom::Err::Failure(Error::MalformedTlv(format!(
            "tlv length {} exceeds remaining buffer ({} bytes)",
            len,
            input.len()
        ))));
    }
    let (input, body) = take(len)(input)?;
    Ok((input, (tag, body)))
}

/// Read one TLV and insist on an exact tag byte.
pub fn expect_tlv(input: &[u8], expected: u8) -> IResult<&[u8], &[u8], Error> {
    let (remain, (tag, body)) = tlv(input)?;
    if tag != expected {
        return Err(nom::Err::Failure(Error::MalformedTlv(format!(
            "expecting tag {:#04x}, found {:#04x}",
            expected, tag
        ))));
    }
    Ok((remain, body))
}

fn length(input: &[u8]) -> IResult<&[u8], usize, Error> {
    let (input, first) = be_u8(input)?;
    if first < 0x80 {
        return Ok((input, first as usize));
    }
    let count = (first & 0x7f) as usize;
    if count == 0 {
        return Err(nom::Err::Failure(Error::MalformedTlv(
            "indefinite length form".to_string(),
        )));
    }
    if count > std::mem::size_of::<usize>() {
        return Err(nom::Err::Failure(Error::MalformedTlv(format!(
            "length of length {} too large",
            count
        ))));
    }
    let (input, bytes) = take(count)(input)?;
    let mut len = 0usize;
    for b in bytes {
        len = len << 8 | *b as usize;
    }
    Ok((input, len))
}

/// Append `tag`, the encoded length of `body`, then `body` itself.
pub fn write_tlv(out: &mut Vec<u8>, tag: u8, body: &[u8]) {
    out.push(tag);
    write_length(out, body.len());
    out.extend_from_slice(body);
}

/// Short form below 128, long form otherwise.
pub fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_form() {
        let buf = [0x04, 0x03, b'a', b'b', b'c', 0xff];
        let (remain, (tag, body)) = tlv(&buf).unwrap();
        assert_eq!(tag, universal::OCTET_STRING);
        assert_eq!(body, b"abc");
        assert_eq!(remain, &[0xff]);
    }

    #[test]
    fn long_form() {
        let mut buf = vec![0x04, 0x82, 0x01, 0x00];
        buf.extend_from_slice(&[0x55; 256]);
        let (remain, (_, body)) = tlv(&buf).unwrap();
        assert_eq!(body.len(), 256);
        assert!(remain.is_empty());
    }

    #[test]
    fn length_overruns_buffer() {
        let buf = [0x04, 0x05, b'a', b'b'];
        let r = tlv(&buf);
        assert!(matches!(
            r,
            Err(nom::Err::Failure(Error::MalformedTlv(_)))
        ));
    }

    #[test]
    fn indefinite_length_rejected() {
        let buf = [0x30, 0x80, 0x00, 0x00];
        let r = tlv(&buf);
        assert!(matches!(
            r,
            Err(nom::Err::Failure(Error::MalformedTlv(_)))
        ));
    }

    #[test]
    fn long_tag_number_rejected() {
        let buf = [0x1f, 0x81, 0x00, 0x00];
        let r = tlv(&buf);
        assert!(matches!(
            r,
            Err(nom::Err::Failure(Error::MalformedTlv(_)))
        ));
    }

    #[test]
    fn tag_info_round_trip() {
        for tag in [
            universal::INTEGER,
            universal::SEQUENCE,
            application::COUNTER64,
            pdu::TRAP_V1,
        ] {
            let info = Asn1TagInfo::from_byte(tag);
            assert_eq!(info.to_byte(), tag);
        }
        let info = Asn1TagInfo::from_byte(pdu::TRAP_V2);
        assert_eq!(info.class, Class::ContextSpecific);
        assert!(info.constructed);
        assert_eq!(info.number, 7);
    }

    #[test]
    fn write_length_forms() {
        let mut out = vec![];
        write_length(&mut out, 0x7f);
        assert_eq!(out, [0x7f]);
        out.clear();
        write_length(&mut out, 0x80);
        assert_eq!(out, [0x81, 0x80]);
        out.clear();
        write_length(&mut out, 0x0100);
        assert_eq!(out, [0x82, 0x01, 0x00]);
    }
}
