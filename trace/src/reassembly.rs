//! Chunk reassembly state machine.
//!
//! One `Reassembler` instance is scoped to exactly one (provider, kind)
//! pair and must be driven by a single logical sequence of records in
//! capture order. There are no locks in here: correctness rests on that
//! single-writer contract, and concurrent `accept` calls on one instance
//! are a caller bug. Desynchronization (a missing, duplicated or
//! out-of-order chunk) is a recoverable protocol condition, not an error:
//! stale state is discarded and nothing is emitted.

use crate::record::Record;
use crate::{Envelope, Kind};

/// Pending chunks of one logical message.
#[derive(Debug)]
struct Pending {
    package_id: u32,
    received: Vec<Vec<u8>>,
}

/// Reconstructs multi-chunk manifests or event payloads.
#[derive(Debug)]
pub struct Reassembler {
    kind: Kind,
    pending: Option<Pending>,
}

impl Reassembler {
    pub fn new(kind: Kind) -> Reassembler {
        Reassembler {
            kind,
            pending: None,
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// True while chunks of an incomplete message are buffered.
    pub fn is_accumulating(&self) -> bool {
        self.pending.is_some()
    }

    /// Feed the next record in capture order.
    ///
    /// Legacy (non-chunked) records pass straight through. Chunked records
    /// are buffered until their message completes; only complete messages
    /// are ever returned.
    pub fn accept(&mut self, record: &Record) -> Option<Envelope> {
        let chunk = match &record.chunk {
            None => return Some(envelope(record, record.payload.clone())),
            Some(c) => *c,
        };

        if let Some(expected) = record.version.kind() {
            debug_assert_eq!(expected, self.kind, "record fed to the wrong reassembler");
        }

        // single-chunk fast path: whatever was pending is stale
        if chunk.chunk_count == 1 {
            self.pending = None;
            return Some(envelope(record, record.payload.clone()));
        }

        let in_sync = match &self.pending {
            Some(p) => {
                p.package_id == chunk.package_id && p.received.len() == chunk.chunk_index as usize
            }
            None => chunk.chunk_index == 0,
        };

        if !in_sync {
            // desynchronized: drop what we hold; a chunk at index 0 can
            // anchor a fresh message, anything else leaves us idle
            self.pending = if chunk.chunk_index == 0 {
                Some(Pending {
                    package_id: chunk.package_id,
                    received: vec![record.payload.clone()],
                })
            } else {
                None
            };
            return None;
        }

        let pending = self.pending.get_or_insert(Pending {
            package_id: chunk.package_id,
            received: vec![],
        });
        pending.received.push(record.payload.clone());

        if chunk.chunk_index + 1 == chunk.chunk_count {
            let pending = self.pending.take()?;
            let mut payload = Vec::with_capacity(
                pending.received.iter().map(Vec::len).sum(),
            );
            for part in pending.received {
                payload.extend_from_slice(&part);
            }
            return Some(envelope(record, payload));
        }

        None
    }
}

fn envelope(record: &Record, payload: Vec<u8>) -> Envelope {
    Envelope {
        occurred: record.occurred,
        received: record.received,
        protocol: record.protocol.clone(),
        source: record.source.clone(),
        manifest: record.manifest.clone(),
        payload,
    }
}
