//! SNMP message decode and encode.
//!
//! A message is `SEQUENCE { INTEGER version, OCTET STRING community, PDU }`.
//! The PDU variant is selected from the declared version, never guessed
//! from the buffer shape: a V1-shaped PDU under a V2c header (or the other
//! way round) is a `UnsupportedVersion` failure, not a silent misread.

use std::net::Ipv4Addr;

use serde::Serialize;

use tracewire_api::dissectors::Error;

use crate::ber::{self, pdu, universal, Asn1TagInfo};
use crate::oid::ObjectIdentifier;
use crate::value::{decode_i64, encode_i64, Value, VarBind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum Version {
    V1,
    V2c,
    V3,
}

impl Version {
    fn from_wire(v: i64) -> Result<Version, Error> {
        match v {
            0 => Ok(Version::V1),
            1 => Ok(Version::V2c),
            3 => Ok(Version::V3),
            other => Err(Error::UnsupportedVersion(format!(
                "snmp version field {}",
                other
            ))),
        }
    }

    fn to_wire(self) -> i64 {
        match self {
            Version::V1 => 0,
            Version::V2c => 1,
            Version::V3 => 3,
        }
    }
}

/// Common message header. The community string is only meaningful for
/// V1/V2c.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SnmpHeader {
    pub version: Version,
    pub community: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum PduType {
    GetRequest,
    GetNextRequest,
    Response,
    SetRequest,
    GetBulkRequest,
    InformRequest,
    TrapV2,
    Report,
}

impl PduType {
    fn from_tag(tag: u8) -> Option<PduType> {
        match tag {
            pdu::GET_REQUEST => Some(PduType::GetRequest),
            pdu::GET_NEXT_REQUEST => Some(PduType::GetNextRequest),
            pdu::RESPONSE => Some(PduType::Response),
            pdu::SET_REQUEST => Some(PduType::SetRequest),
            pdu::GET_BULK_REQUEST => Some(PduType::GetBulkRequest),
            pdu::INFORM_REQUEST => Some(PduType::InformRequest),
            pdu::TRAP_V2 => Some(PduType::TrapV2),
            pdu::REPORT => Some(PduType::Report),
            _ => None,
        }
    }

    fn to_tag(self) -> u8 {
        match self {
            PduType::GetRequest => pdu::GET_REQUEST,
            PduType::GetNextRequest => pdu::GET_NEXT_REQUEST,
            PduType::Response => pdu::RESPONSE,
            PduType::SetRequest => pdu::SET_REQUEST,
            PduType::GetBulkRequest => pdu::GET_BULK_REQUEST,
            PduType::InformRequest => pdu::INFORM_REQUEST,
            PduType::TrapV2 => pdu::TRAP_V2,
            PduType::Report => pdu::REPORT,
        }
    }
}

/// SNMPv1 trap body.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrapV1 {
    pub enterprise: ObjectIdentifier,
    pub agent_addr: Ipv4Addr,
    pub generic_trap: i32,
    pub specific_trap: i32,
    /// uptime in TimeTicks (hundredths of a second)
    pub uptime: u32,
    pub var_binds: Vec<VarBind>,
}

/// SNMPv2c request/response/trap/bulk body.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct V2cPdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    /// error-status, or non-repeaters for GetBulk
    pub error_status: i32,
    /// error-index, or max-repetitions for GetBulk
    pub error_index: i32,
    pub var_binds: Vec<VarBind>,
}

/// Version-specific PDU, a tagged union selected by the header version.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Pdu {
    TrapV1(TrapV1),
    V2c(V2cPdu),
}

impl Pdu {
    pub fn var_binds(&self) -> &[VarBind] {
        match self {
            Pdu::TrapV1(t) => &t.var_binds,
            Pdu::V2c(p) => &p.var_binds,
        }
    }
}

/// A decoded SNMP message plus where and when it arrived.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SnmpDatagram {
    pub header: SnmpHeader,
    pub source: Ipv4Addr,
    #[serde(skip)]
    pub ts: libc::timeval,
    pub pdu: Pdu,
}

impl SnmpDatagram {
    /// Decode a BER-encoded SNMP message.
    pub fn decode(buf: &[u8], source: Ipv4Addr, ts: libc::timeval) -> Result<SnmpDatagram, Error> {
        let (_, msg) = ber::expect_tlv(buf, universal::SEQUENCE).map_err(Error::from)?;

        let (msg, version_body) = ber::expect_tlv(msg, universal::INTEGER).map_err(Error::from)?;
        let version = Version::from_wire(decode_i64(version_body)?)?;
        if version == Version::V3 {
            return Err(Error::UnsupportedVersion(
                "snmp v3 messages are not decoded".to_string(),
            ));
        }

        let (msg, community) =
            ber::expect_tlv(msg, universal::OCTET_STRING).map_err(Error::from)?;
        let header = SnmpHeader {
            version,
            community: String::from_utf8_lossy(community).into_owned(),
        };

        let (_, (pdu_tag, pdu_body)) = ber::tlv(msg).map_err(Error::from)?;
        let pdu = match (version, pdu_tag) {
            (Version::V1, pdu::TRAP_V1) => Pdu::TrapV1(decode_trap_v1(pdu_body)?),
            (Version::V1, _) => {
                return Err(Error::UnsupportedVersion(format!(
                    "pdu tag {:#04x} under a v1 header",
                    pdu_tag
                )))
            }
            (Version::V2c, pdu::TRAP_V1) => {
                return Err(Error::UnsupportedVersion(
                    "v1 trap pdu under a v2c header".to_string(),
                ))
            }
            (Version::V2c, tag) => match PduType::from_tag(tag) {
                Some(pdu_type) => Pdu::V2c(decode_v2c(pdu_type, pdu_body)?),
                None => {
                    return Err(Error::MalformedTlv(format!(
                        "unknown pdu tag {:#04x}",
                        tag
                    )))
                }
            },
            (Version::V3, _) => unreachable!(),
        };

        Ok(SnmpDatagram {
            header,
            source,
            ts,
            pdu,
        })
    }

    /// Encode back into BER. `decode(encode(x))` is value-equal to `x` for
    /// every representable message.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(64);
        Value::Integer(self.header.version.to_wire())
            .encode(universal::INTEGER, &mut body);
        ber::write_tlv(
            &mut body,
            universal::OCTET_STRING,
            self.header.community.as_bytes(),
        );
        match &self.pdu {
            Pdu::TrapV1(t) => {
                let mut p = Vec::with_capacity(32);
                ber::write_tlv(&mut p, universal::OBJECT_IDENTIFIER, &t.enterprise.to_ber());
                ber::write_tlv(&mut p, crate::ber::application::IP_ADDRESS, &t.agent_addr.octets());
                ber::write_tlv(&mut p, universal::INTEGER, &encode_i64(t.generic_trap as i64));
                ber::write_tlv(&mut p, universal::INTEGER, &encode_i64(t.specific_trap as i64));
                Value::UInt32(t.uptime).encode(crate::ber::application::TIMETICKS, &mut p);
                encode_var_binds(&t.var_binds, &mut p);
                ber::write_tlv(&mut body, pdu::TRAP_V1, &p);
            }
            Pdu::V2c(v) => {
                let mut p = Vec::with_capacity(32);
                ber::write_tlv(&mut p, universal::INTEGER, &encode_i64(v.request_id as i64));
                ber::write_tlv(&mut p, universal::INTEGER, &encode_i64(v.error_status as i64));
                ber::write_tlv(&mut p, universal::INTEGER, &encode_i64(v.error_index as i64));
                encode_var_binds(&v.var_binds, &mut p);
                ber::write_tlv(&mut body, v.pdu_type.to_tag(), &p);
            }
        }

        let mut out = Vec::with_capacity(body.len() + 4);
        ber::write_tlv(&mut out, universal::SEQUENCE, &body);
        out
    }
}

fn decode_trap_v1(body: &[u8]) -> Result<TrapV1, Error> {
    let (body, enterprise) =
        ber::expect_tlv(body, universal::OBJECT_IDENTIFIER).map_err(Error::from)?;
    let enterprise = ObjectIdentifier::from_ber(enterprise)?;

    let (body, addr) =
        ber::expect_tlv(body, crate::ber::application::IP_ADDRESS).map_err(Error::from)?;
    if addr.len() != 4 {
        return Err(Error::MalformedTlv(format!(
            "agent address of {} bytes",
            addr.len()
        )));
    }
    let agent_addr = Ipv4Addr::new(addr[0], addr[1], addr[2], addr[3]);

    let (body, generic) = ber::expect_tlv(body, universal::INTEGER).map_err(Error::from)?;
    let (body, specific) = ber::expect_tlv(body, universal::INTEGER).map_err(Error::from)?;
    let (body, uptime) =
        ber::expect_tlv(body, crate::ber::application::TIMETICKS).map_err(Error::from)?;
    let uptime = crate::value::decode_u64(uptime, 4)? as u32;

    Ok(TrapV1 {
        enterprise,
        agent_addr,
        generic_trap: decode_i64(generic)? as i32,
        specific_trap: decode_i64(specific)? as i32,
        uptime,
        var_binds: decode_var_binds(body)?,
    })
}

fn decode_v2c(pdu_type: PduType, body: &[u8]) -> Result<V2cPdu, Error> {
    let (body, request_id) = ber::expect_tlv(body, universal::INTEGER).map_err(Error::from)?;
    let (body, error_status) = ber::expect_tlv(body, universal::INTEGER).map_err(Error::from)?;
    let (body, error_index) = ber::expect_tlv(body, universal::INTEGER).map_err(Error::from)?;

    Ok(V2cPdu {
        pdu_type,
        request_id: decode_i64(request_id)? as i32,
        error_status: decode_i64(error_status)? as i32,
        error_index: decode_i64(error_index)? as i32,
        var_binds: decode_var_binds(body)?,
    })
}

fn decode_var_binds(body: &[u8]) -> Result<Vec<VarBind>, Error> {
    let (_, mut list) = ber::expect_tlv(body, universal::SEQUENCE).map_err(Error::from)?;
    let mut binds = vec![];
    while !list.is_empty() {
        let (rest, entry) = ber::expect_tlv(list, universal::SEQUENCE).map_err(Error::from)?;
        let (entry, oid_body) =
            ber::expect_tlv(entry, universal::OBJECT_IDENTIFIER).map_err(Error::from)?;
        let (_, (value_tag, value_body)) = ber::tlv(entry).map_err(Error::from)?;
        binds.push(VarBind {
            oid: ObjectIdentifier::from_ber(oid_body)?,
            value: Value::decode(value_tag, value_body)?,
            tag: Asn1TagInfo::from_byte(value_tag),
        });
        list = rest;
    }
    Ok(binds)
}

fn encode_var_binds(binds: &[VarBind], out: &mut Vec<u8>) {
    let mut list = Vec::with_capacity(binds.len() * 16);
    for vb in binds {
        let mut entry = Vec::with_capacity(16);
        ber::write_tlv(&mut entry, universal::OBJECT_IDENTIFIER, &vb.oid.to_ber());
        vb.value.encode(vb.tag.to_byte(), &mut entry);
        ber::write_tlv(&mut list, universal::SEQUENCE, &entry);
    }
    ber::write_tlv(out, universal::SEQUENCE, &list);
}
