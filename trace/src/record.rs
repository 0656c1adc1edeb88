//! Versioned trace-record wire layouts.
//!
//! Five layouts share a leading `u8` discriminator. All integers are
//! little-endian; strings are u16-length-prefixed UTF-8, payloads
//! u32-length-prefixed. Field order is fixed per version: occurrence time,
//! receipt time, protocol, source, correlation id, then either a direct
//! payload (legacy) or package id / chunk count / chunk index / payload
//! (chunked).

use chrono::{DateTime, TimeZone, Utc};
use nom::bytes::complete::take;
use nom::number::complete::{le_i64, le_u16, le_u32, le_u8};
use nom::IResult;

use crate::{Error, Kind};

/// Protocol strings starting with this marker flag a corrupt legacy
/// record; the writer emits it in place of fields it could not resolve.
pub const ERROR_MARKER: &str = "!err:";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordVersion {
    /// legacy direct payload
    V1 = 1,
    /// legacy, tolerates the error-marker protocol prefix
    V2 = 2,
    /// legacy with a manifest name
    V3 = 3,
    /// chunked manifest
    V4 = 4,
    /// chunked event payload
    V5 = 5,
}

impl RecordVersion {
    fn from_u8(v: u8) -> Result<RecordVersion, Error> {
        match v {
            1 => Ok(RecordVersion::V1),
            2 => Ok(RecordVersion::V2),
            3 => Ok(RecordVersion::V3),
            4 => Ok(RecordVersion::V4),
            5 => Ok(RecordVersion::V5),
            other => Err(Error::UnknownVersion(other)),
        }
    }

    /// The reassembly scope chunked layouts feed, `None` for legacy ones.
    pub fn kind(self) -> Option<Kind> {
        match self {
            RecordVersion::V4 => Some(Kind::Manifest),
            RecordVersion::V5 => Some(Kind::EventPayload),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChunkInfo {
    /// correlates the chunks of one logical message
    pub package_id: u32,
    pub chunk_count: u16,
    /// 0-based
    pub chunk_index: u16,
}

/// One parsed trace record of any version.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    pub version: RecordVersion,
    pub occurred: DateTime<Utc>,
    pub received: DateTime<Utc>,
    pub protocol: String,
    pub source: String,
    pub correlation: u32,
    /// empty unless the layout carries one (V3/V4/V5)
    pub manifest: String,
    /// present only for chunked layouts
    pub chunk: Option<ChunkInfo>,
    pub payload: Vec<u8>,
}

impl Record {
    /// Parse one record, returning it and the unconsumed rest of `buf`.
    pub fn parse(buf: &[u8]) -> Result<(Record, &[u8]), Error> {
        let (rest, record) = record(buf).map_err(Error::from)?;
        Ok((record, rest))
    }

    /// Serialize back to the wire layout of `self.version`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.payload.len());
        out.push(self.version as u8);
        out.extend_from_slice(&nanos(&self.occurred).to_le_bytes());
        out.extend_from_slice(&nanos(&self.received).to_le_bytes());
        write_str(&mut out, &self.protocol);
        write_str(&mut out, &self.source);
        out.extend_from_slice(&self.correlation.to_le_bytes());
        match self.version {
            RecordVersion::V1 | RecordVersion::V2 => {}
            _ => write_str(&mut out, &self.manifest),
        }
        if let Some(chunk) = &self.chunk {
            out.extend_from_slice(&chunk.package_id.to_le_bytes());
            out.extend_from_slice(&chunk.chunk_count.to_le_bytes());
            out.extend_from_slice(&chunk.chunk_index.to_le_bytes());
        }
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

fn nanos(t: &DateTime<Utc>) -> i64 {
    t.timestamp_nanos_opt().unwrap_or(0)
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn time(input: &[u8]) -> IResult<&[u8], DateTime<Utc>, Error> {
    let (input, ns) = le_i64(input)?;
    Ok((input, Utc.timestamp_nanos(ns)))
}

fn string(input: &[u8]) -> IResult<&[u8], String, Error> {
    let (input, len) = le_u16(input)?;
    let (input, bytes) = take(len as usize)(input)?;
    Ok((input, String::from_utf8_lossy(bytes).into_owned()))
}

fn payload(input: &[u8]) -> IResult<&[u8], Vec<u8>, Error> {
    let (input, len) = le_u32(input)?;
    let (input, bytes) = take(len as usize)(input)?;
    Ok((input, bytes.to_vec()))
}

fn record(input: &[u8]) -> IResult<&[u8], Record, Error> {
    let (input, v) = le_u8(input)?;
    let version = RecordVersion::from_u8(v).map_err(nom::Err::Failure)?;

    let (input, occurred) = time(input)?;
    let (input, received) = time(input)?;
    let (input, protocol) = string(input)?;

    // V2 tolerance rule: an error-marker protocol means the rest of the
    // record is unparseable filler. Return it as a valid but empty record
    // instead of failing the whole stream.
    if version == RecordVersion::V2 && protocol.starts_with(ERROR_MARKER) {
        return Ok((
            &input[input.len()..],
            Record {
                version,
                occurred,
                received,
                protocol: String::new(),
                source: String::new(),
                correlation: 0,
                manifest: String::new(),
                chunk: None,
                payload: vec![],
            },
        ));
    }

    let (input, source) = string(input)?;
    let (input, correlation) = le_u32(input)?;
    let (input, manifest) = match version {
        RecordVersion::V1 | RecordVersion::V2 => (input, String::new()),
        _ => string(input)?,
    };
    let (input, chunk) = match version {
        RecordVersion::V4 | RecordVersion::V5 => {
            let (input, package_id) = le_u32(input)?;
            let (input, chunk_count) = le_u16(input)?;
            let (input, chunk_index) = le_u16(input)?;
            (
                input,
                Some(ChunkInfo {
                    package_id,
                    chunk_count,
                    chunk_index,
                }),
            )
        }
        _ => (input, None),
    };
    let (input, payload) = payload(input)?;

    Ok((
        input,
        Record {
            version,
            occurred,
            received,
            protocol,
            source,
            correlation,
            manifest,
            chunk,
            payload,
        },
    ))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn legacy(version: RecordVersion, payload: &[u8]) -> Record {
        Record {
            version,
            occurred: Utc.timestamp_nanos(1_600_000_000_000_000_000),
            received: Utc.timestamp_nanos(1_600_000_000_500_000_000),
            protocol: "etw".to_string(),
            source: "provider-a".to_string(),
            correlation: 9,
            manifest: match version {
                RecordVersion::V1 | RecordVersion::V2 => String::new(),
                _ => "manifest-a".to_string(),
            },
            chunk: None,
            payload: payload.to_vec(),
        }
    }

    pub(crate) fn chunked(
        version: RecordVersion,
        package_id: u32,
        chunk_count: u16,
        chunk_index: u16,
        payload: &[u8],
    ) -> Record {
        let mut r = legacy(RecordVersion::V3, payload);
        r.version = version;
        r.chunk = Some(ChunkInfo {
            package_id,
            chunk_count,
            chunk_index,
        });
        r
    }

    #[test]
    fn round_trip_every_version() {
        for version in [
            RecordVersion::V1,
            RecordVersion::V2,
            RecordVersion::V3,
        ] {
            let rec = legacy(version, b"abc");
            let wire = rec.to_bytes();
            let (back, rest) = Record::parse(&wire).unwrap();
            assert!(rest.is_empty());
            assert_eq!(back, rec);
        }
        for version in [RecordVersion::V4, RecordVersion::V5] {
            let rec = chunked(version, 5, 3, 1, b"chunk");
            let wire = rec.to_bytes();
            let (back, rest) = Record::parse(&wire).unwrap();
            assert!(rest.is_empty());
            assert_eq!(back, rec);
        }
    }

    #[test]
    fn records_parse_back_to_back() {
        let mut wire = legacy(RecordVersion::V1, b"one").to_bytes();
        wire.extend(chunked(RecordVersion::V4, 1, 1, 0, b"two").to_bytes());
        let (first, rest) = Record::parse(&wire).unwrap();
        assert_eq!(first.payload, b"one");
        let (second, rest) = Record::parse(rest).unwrap();
        assert_eq!(second.payload, b"two");
        assert!(rest.is_empty());
    }

    #[test]
    fn unknown_version() {
        let wire = [9u8, 0, 0, 0];
        assert!(matches!(
            Record::parse(&wire).unwrap_err(),
            Error::UnknownVersion(9)
        ));
    }

    #[test]
    fn truncated_record() {
        let mut wire = legacy(RecordVersion::V1, b"abc").to_bytes();
        wire.truncate(wire.len() - 1);
        assert!(Record::parse(&wire).is_err());
    }

    #[test]
    fn error_marker_yields_empty_record() {
        let mut rec = legacy(RecordVersion::V2, b"ignored");
        rec.protocol = format!("{}database unavailable", ERROR_MARKER);
        let wire = rec.to_bytes();
        let (back, _) = Record::parse(&wire).unwrap();
        // returned, not discarded, but carrying empty content
        assert_eq!(back.version, RecordVersion::V2);
        assert_eq!(back.occurred, rec.occurred);
        assert!(back.protocol.is_empty());
        assert!(back.source.is_empty());
        assert_eq!(back.correlation, 0);
        assert!(back.payload.is_empty());
    }

    #[test]
    fn v1_does_not_apply_error_marker() {
        let mut rec = legacy(RecordVersion::V1, b"kept");
        rec.protocol = format!("{}whatever", ERROR_MARKER);
        let wire = rec.to_bytes();
        let (back, _) = Record::parse(&wire).unwrap();
        assert_eq!(back.payload, b"kept");
        assert!(back.protocol.starts_with(ERROR_MARKER));
    }
}
