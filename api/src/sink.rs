//! Push interface towards the downstream demultiplexing/query layer.
//!
//! Decoders hand over one call per completed item; partially decoded or
//! partially reassembled data never crosses this boundary. The consumer on
//! the other side is out of scope for this workspace.

use anyhow::Result;

/// A consumer of completed items.
///
/// `on_end` is the end-of-sequence signal, `on_error` the error signal for
/// failures the producer cannot surface through a return value (e.g. inside
/// a reader thread). Neither implies the other.
pub trait Sink<T>: Send {
    fn on_item(&mut self, item: T) -> Result<()>;

    fn on_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_error(&mut self, err: anyhow::Error) {
        eprintln!("{}", err);
    }
}

/// Collects items into a vector. Test and debugging helper.
#[derive(Default)]
pub struct VecSink<T> {
    pub items: Vec<T>,
    pub ended: bool,
}

impl<T: Send> Sink<T> for VecSink<T> {
    fn on_item(&mut self, item: T) -> Result<()> {
        self.items.push(item);
        Ok(())
    }

    fn on_end(&mut self) -> Result<()> {
        self.ended = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_collects() {
        let mut sink = VecSink::default();
        sink.on_item(1u32).unwrap();
        sink.on_item(2).unwrap();
        sink.on_end().unwrap();
        assert_eq!(sink.items, vec![1, 2]);
        assert!(sink.ended);
    }
}
