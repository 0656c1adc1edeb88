use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::Result;

use tracewire_api as api;
use api::config::Config;
use api::sink::Sink;

/// One JSON document per line, flushed on end of sequence.
pub struct JsonLinesSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> JsonLinesSink<W> {
        JsonLinesSink { out }
    }
}

impl<W: Write + Send> Sink<serde_json::Value> for JsonLinesSink<W> {
    fn on_item(&mut self, item: serde_json::Value) -> Result<()> {
        serde_json::to_writer(&mut self.out, &item)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn on_end(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Sink writing to the configured output file, or stdout without one.
pub fn from_config(cfg: &Config) -> Result<Box<dyn Sink<serde_json::Value>>> {
    if cfg.output_file.is_empty() {
        Ok(Box::new(JsonLinesSink::new(std::io::stdout())))
    } else {
        let file = File::create(&cfg.output_file)?;
        Ok(Box::new(JsonLinesSink::new(BufWriter::new(file))))
    }
}
