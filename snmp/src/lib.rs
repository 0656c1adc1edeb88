//! BER codec specialized for SNMP v1/v2c protocol data units, plus the
//! projection layer that maps decoded traps onto declared result shapes.
//!
//! Only the SNMP-relevant tag set is implemented; this is not a general
//! purpose ASN.1 library. Decode and encode are pure transforms over byte
//! ranges and carry no state.

pub mod ber;
pub mod msg;
pub mod oid;
pub mod projection;
pub mod value;

pub use msg::{Pdu, PduType, SnmpDatagram, SnmpHeader, TrapV1, V2cPdu, Version};
pub use oid::ObjectIdentifier;
pub use value::{Value, VarBind};
