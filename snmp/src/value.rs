//! SNMP values and variable bindings.

use std::net::Ipv4Addr;

use serde::Serialize;

use tracewire_api::dissectors::Error;

use crate::ber::{self, application, universal, Asn1TagInfo};
use crate::oid::ObjectIdentifier;

/// A decoded SNMP value. The variant is determined by the BER tag.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Value {
    /// INTEGER, big-endian two's complement of exactly the encoded length
    Integer(i64),
    /// Counter32 / Gauge32 / TimeTicks / Unsigned32; which one it was is
    /// kept in the VarBind's tag info
    UInt32(u32),
    Counter64(u64),
    /// OCTET STRING raw bytes; see [`Value::as_text`] for the string view
    OctetString(Vec<u8>),
    Oid(ObjectIdentifier),
    IpAddress(Ipv4Addr),
    Null,
}

impl Value {
    /// Lossy UTF-8 view of an OCTET STRING, `None` for other variants.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::OctetString(b) => Some(String::from_utf8_lossy(b).into_owned()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_oid(&self) -> Option<&ObjectIdentifier> {
        match self {
            Value::Oid(o) => Some(o),
            _ => None,
        }
    }

    /// Decode value content bytes for `tag`.
    pub fn decode(tag: u8, body: &[u8]) -> Result<Value, Error> {
        match tag {
            universal::INTEGER => Ok(Value::Integer(decode_i64(body)?)),
            application::COUNTER32 | application::GAUGE32 | application::TIMETICKS => {
                Ok(Value::UInt32(decode_u64(body, 4)? as u32))
            }
            application::COUNTER64 => Ok(Value::Counter64(decode_u64(body, 8)?)),
            universal::OCTET_STRING => Ok(Value::OctetString(body.to_vec())),
            universal::OBJECT_IDENTIFIER => Ok(Value::Oid(ObjectIdentifier::from_ber(body)?)),
            application::IP_ADDRESS => {
                if body.len() != 4 {
                    return Err(Error::MalformedTlv(format!(
                        "ip address value of {} bytes",
                        body.len()
                    )));
                }
                Ok(Value::IpAddress(Ipv4Addr::new(
                    body[0], body[1], body[2], body[3],
                )))
            }
            universal::NULL => {
                if !body.is_empty() {
                    return Err(Error::MalformedTlv("null with content bytes".to_string()));
                }
                Ok(Value::Null)
            }
            _ => Err(Error::MalformedTlv(format!(
                "unsupported value tag {:#04x}",
                tag
            ))),
        }
    }

    /// Append this value as one TLV, using `tag` as the tag byte.
    pub fn encode(&self, tag: u8, out: &mut Vec<u8>) {
        match self {
            Value::Integer(v) => ber::write_tlv(out, tag, &encode_i64(*v)),
            Value::UInt32(v) => ber::write_tlv(out, tag, &encode_u64(*v as u64)),
            Value::Counter64(v) => ber::write_tlv(out, tag, &encode_u64(*v)),
            Value::OctetString(b) => ber::write_tlv(out, tag, b),
            Value::Oid(o) => ber::write_tlv(out, tag, &o.to_ber()),
            Value::IpAddress(a) => ber::write_tlv(out, tag, &a.octets()),
            Value::Null => ber::write_tlv(out, tag, &[]),
        }
    }

    /// The tag byte this value encodes under when the original tag info is
    /// not available. UInt32 defaults to Gauge32.
    pub fn default_tag(&self) -> u8 {
        match self {
            Value::Integer(_) => universal::INTEGER,
            Value::UInt32(_) => application::GAUGE32,
            Value::Counter64(_) => application::COUNTER64,
            Value::OctetString(_) => universal::OCTET_STRING,
            Value::Oid(_) => universal::OBJECT_IDENTIFIER,
            Value::IpAddress(_) => application::IP_ADDRESS,
            Value::Null => universal::NULL,
        }
    }
}

/// An (OID, value) binding carried in a PDU.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VarBind {
    pub oid: ObjectIdentifier,
    pub value: Value,
    pub tag: Asn1TagInfo,
}

impl VarBind {
    pub fn new(oid: ObjectIdentifier, value: Value) -> VarBind {
        let tag = Asn1TagInfo::from_byte(value.default_tag());
        VarBind { oid, value, tag }
    }
}

/// Signed big-endian two's complement of exactly `body.len()` bytes; the
/// high bit of the first byte is the sign.
pub fn decode_i64(body: &[u8]) -> Result<i64, Error> {
    if body.is_empty() || body.len() > 8 {
        return Err(Error::MalformedTlv(format!(
            "integer of {} bytes",
            body.len()
        )));
    }
    let mut v: i64 = if body[0] & 0x80 != 0 { -1 } else { 0 };
    for b in body {
        v = v << 8 | *b as i64;
    }
    Ok(v)
}

/// Unsigned big-endian; a leading 0x00 inserted for sign-avoidance does
/// not affect the magnitude and is allowed to push the length one past
/// `max_bytes`.
pub fn decode_u64(body: &[u8], max_bytes: usize) -> Result<u64, Error> {
    let body = if body.len() > 1 && body[0] == 0 {
        &body[1..]
    } else {
        body
    };
    if body.is_empty() || body.len() > max_bytes {
        return Err(Error::MalformedTlv(format!(
            "unsigned integer of {} bytes (max {})",
            body.len(),
            max_bytes
        )));
    }
    let mut v = 0u64;
    for b in body {
        v = v << 8 | *b as u64;
    }
    Ok(v)
}

/// Minimal-length two's complement: a leading 0x00 or 0xFF byte is kept
/// only when dropping it would flip the sign of the new leading byte.
pub fn encode_i64(v: i64) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let cur = bytes[start];
        let next = bytes[start + 1];
        let redundant = (cur == 0x00 && next & 0x80 == 0) || (cur == 0xff && next & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

/// Minimal-length unsigned, with a 0x00 pad byte when the leading byte
/// would otherwise read as negative.
pub fn encode_u64(v: u64) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
    let mut out = Vec::with_capacity(9);
    if bytes[skip] & 0x80 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&bytes[skip..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_boundaries() {
        for (v, expect) in [
            (0i64, vec![0x00]),
            (127, vec![0x7f]),
            (128, vec![0x00, 0x80]),
            (-1, vec![0xff]),
            (-128, vec![0x80]),
            (-129, vec![0xff, 0x7f]),
            (0x1234, vec![0x12, 0x34]),
            (i64::MIN, vec![0x80, 0, 0, 0, 0, 0, 0, 0]),
        ] {
            assert_eq!(encode_i64(v), expect, "encoding {}", v);
            assert_eq!(decode_i64(&expect).unwrap(), v, "decoding {}", v);
        }
    }

    #[test]
    fn unsigned_sign_avoidance_pad() {
        assert_eq!(encode_u64(0x80000000), vec![0x00, 0x80, 0x00, 0x00, 0x00]);
        assert_eq!(decode_u64(&[0x00, 0x80, 0x00, 0x00, 0x00], 4).unwrap(), 0x80000000);
        assert_eq!(encode_u64(0), vec![0x00]);
        assert_eq!(encode_u64(255), vec![0x00, 0xff]);
        assert_eq!(decode_u64(&[0xff], 4).unwrap(), 255);
    }

    #[test]
    fn unsigned_too_wide() {
        let r = decode_u64(&[1, 0, 0, 0, 0], 4);
        assert!(matches!(r.unwrap_err(), Error::MalformedTlv(_)));
    }

    #[test]
    fn value_decode_by_tag() {
        assert_eq!(
            Value::decode(universal::INTEGER, &[0xfe]).unwrap(),
            Value::Integer(-2)
        );
        assert_eq!(
            Value::decode(application::COUNTER32, &[0x01, 0x00]).unwrap(),
            Value::UInt32(256)
        );
        assert_eq!(
            Value::decode(application::COUNTER64, &[0x01, 0, 0, 0, 0]).unwrap(),
            Value::Counter64(1 << 32)
        );
        assert_eq!(
            Value::decode(application::IP_ADDRESS, &[10, 0, 0, 1]).unwrap(),
            Value::IpAddress(Ipv4Addr::new(10, 0, 0, 1))
        );
        assert_eq!(Value::decode(universal::NULL, &[]).unwrap(), Value::Null);
        assert!(Value::decode(application::IP_ADDRESS, &[10, 0, 0]).is_err());
        assert!(Value::decode(0x13, &[0]).is_err());
    }

    #[test]
    fn octet_string_text_view() {
        let v = Value::OctetString(b"hello".to_vec());
        assert_eq!(v.as_text().unwrap(), "hello");
        assert_eq!(v.as_bytes().unwrap(), b"hello");
        assert_eq!(Value::Null.as_text(), None);
    }
}
