//! Projection of decoded traps onto declared result shapes.
//!
//! The original idea of "declare OID bindings on a result type, get a
//! projector" is kept, but binding discovery is a static table built once
//! at startup and evaluated by ordinary lookup, not runtime reflection.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use serde::Serialize;

use crate::msg::SnmpDatagram;
use crate::oid::ObjectIdentifier;
use crate::value::{Value, VarBind};

/// snmpTrapOID.0 — its value names the trap type.
pub const TRAP_OID_ARCS: [u32; 11] = [1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0];

/// How a bound field wants its value represented.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldRepr {
    Integer,
    UInt64,
    Text,
    /// Byte array; textual OCTET STRING values matching the hex triplet
    /// pattern are decoded as hex, anything else falls back to the UTF-8
    /// bytes of the text
    Bytes,
    Oid,
    Address,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AddrRepr {
    Text,
    Typed,
}

/// One declared binding of a shape field.
///
/// `Oid` bindings pull from the VarBind list; the other three are special
/// markers and are mutually exclusive with OID lookup.
#[derive(Clone, Debug)]
pub enum Binding {
    Oid { oid: ObjectIdentifier, repr: FieldRepr },
    AllVarBinds,
    SourceAddress(AddrRepr),
    ReceiptTime,
}

/// A declared result shape: a name, the trap-type OID that selects it, and
/// the field binding table.
#[derive(Clone, Debug)]
pub struct Shape {
    pub name: String,
    pub trap_type: ObjectIdentifier,
    pub bindings: Vec<(String, Binding)>,
}

/// A projected field value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    UInt64(u64),
    Text(String),
    Bytes(Vec<u8>),
    Oid(ObjectIdentifier),
    Address(Ipv4Addr),
    /// receipt time as unix microseconds
    Time(i64),
    VarBinds(Vec<VarBind>),
}

/// The result of projecting one datagram onto one shape.
#[derive(Clone, Debug, Serialize)]
pub struct Projection {
    pub shape: String,
    pub fields: Vec<(String, FieldValue)>,
}

/// Compiled projector over a set of shapes.
pub struct Projector {
    trap_oid: ObjectIdentifier,
    shapes: HashMap<ObjectIdentifier, Shape>,
}

impl Projector {
    pub fn new(shapes: Vec<Shape>) -> Projector {
        let shapes = shapes
            .into_iter()
            .map(|s| (s.trap_type.clone(), s))
            .collect();
        Projector {
            trap_oid: ObjectIdentifier::new(TRAP_OID_ARCS.to_vec()),
            shapes,
        }
    }

    /// Select a shape by the datagram's trap-type discriminator and
    /// evaluate its bindings. `None` when no VarBind names the trap type
    /// or no declared shape matches it; neither case is an error.
    pub fn project(&self, dg: &SnmpDatagram) -> Option<Projection> {
        let trap_type = self.discriminator(dg)?;
        let shape = self.shapes.get(trap_type)?;

        let fields = shape
            .bindings
            .iter()
            .map(|(name, binding)| (name.clone(), eval(binding, dg)))
            .collect();

        Some(Projection {
            shape: shape.name.clone(),
            fields,
        })
    }

    /// The discriminator is the value of the first VarBind whose OID is an
    /// ancestor of (or equal to) snmpTrapOID.0 — an ancestor match, not an
    /// exact one.
    fn discriminator<'a>(&self, dg: &'a SnmpDatagram) -> Option<&'a ObjectIdentifier> {
        dg.pdu
            .var_binds()
            .iter()
            .find(|vb| self.trap_oid.is_sub_oid(&vb.oid))
            .and_then(|vb| vb.value.as_oid())
    }
}

fn eval(binding: &Binding, dg: &SnmpDatagram) -> FieldValue {
    match binding {
        Binding::AllVarBinds => FieldValue::VarBinds(dg.pdu.var_binds().to_vec()),
        Binding::SourceAddress(AddrRepr::Text) => FieldValue::Text(dg.source.to_string()),
        Binding::SourceAddress(AddrRepr::Typed) => FieldValue::Address(dg.source),
        Binding::ReceiptTime => {
            FieldValue::Time(dg.ts.tv_sec as i64 * 1_000_000 + dg.ts.tv_usec as i64)
        }
        Binding::Oid { oid, repr } => {
            let value = dg
                .pdu
                .var_binds()
                .iter()
                .find(|vb| vb.oid == *oid)
                .map(|vb| &vb.value);
            match value {
                Some(v) => convert(v, *repr),
                None => default_for(*repr),
            }
        }
    }
}

/// Absent fields take their representation's default/zero value.
fn default_for(repr: FieldRepr) -> FieldValue {
    match repr {
        FieldRepr::Integer => FieldValue::Integer(0),
        FieldRepr::UInt64 => FieldValue::UInt64(0),
        FieldRepr::Text => FieldValue::Text(String::new()),
        FieldRepr::Bytes => FieldValue::Bytes(vec![]),
        FieldRepr::Oid => FieldValue::Oid(ObjectIdentifier::default()),
        FieldRepr::Address => FieldValue::Address(Ipv4Addr::UNSPECIFIED),
    }
}

fn convert(value: &Value, repr: FieldRepr) -> FieldValue {
    match repr {
        FieldRepr::Integer => FieldValue::Integer(match value {
            Value::Integer(v) => *v,
            Value::UInt32(v) => *v as i64,
            Value::Counter64(v) => *v as i64,
            _ => 0,
        }),
        FieldRepr::UInt64 => FieldValue::UInt64(match value {
            Value::Integer(v) if *v >= 0 => *v as u64,
            Value::UInt32(v) => *v as u64,
            Value::Counter64(v) => *v,
            _ => 0,
        }),
        FieldRepr::Text => FieldValue::Text(match value {
            Value::OctetString(_) => value.as_text().unwrap_or_default(),
            Value::Oid(o) => o.to_string(),
            Value::IpAddress(a) => a.to_string(),
            Value::Integer(v) => v.to_string(),
            Value::UInt32(v) => v.to_string(),
            Value::Counter64(v) => v.to_string(),
            Value::Null => String::new(),
        }),
        FieldRepr::Bytes => FieldValue::Bytes(match value {
            Value::OctetString(b) => match value.as_text() {
                Some(text) => match decode_hex_triplets(&text) {
                    Some(bytes) => bytes,
                    None => text.into_bytes(),
                },
                None => b.clone(),
            },
            _ => vec![],
        }),
        FieldRepr::Oid => FieldValue::Oid(match value {
            Value::Oid(o) => o.clone(),
            _ => ObjectIdentifier::default(),
        }),
        FieldRepr::Address => FieldValue::Address(match value {
            Value::IpAddress(a) => *a,
            _ => Ipv4Addr::UNSPECIFIED,
        }),
    }
}

/// Strict hex triplet check: pairs of hex digits separated by `-`,
/// covering the whole string, `(n+1)/3` triplets in total. A string that
/// merely looks like this shape will be (mis)read as hex; the heuristic is
/// intentionally no stricter than that.
fn decode_hex_triplets(s: &str) -> Option<Vec<u8>> {
    if s.len() < 2 || (s.len() + 1) % 3 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity((s.len() + 1) / 3);
    for (i, chunk) in s.as_bytes().chunks(3).enumerate() {
        let hi = (chunk[0] as char).to_digit(16)?;
        let lo = (chunk[1] as char).to_digit(16)?;
        if chunk.len() == 3 && chunk[2] != b'-' {
            return None;
        }
        if chunk.len() != 3 && i * 3 + chunk.len() != s.len() {
            return None;
        }
        out.push((hi << 4 | lo) as u8);
    }
    Some(out)
}
