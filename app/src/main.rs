#[macro_use]
extern crate clap;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use crossbeam_channel::bounded;

mod commands;
mod config;
mod decode;
mod output;
mod rx;
mod shapes;

fn main() -> Result<()> {
    let root_cmd = commands::new_root_command();
    let cfg = config::parse_args(root_cmd)?;

    signal_hook::flag::register(signal_hook::consts::SIGTERM, cfg.exit.clone())?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, cfg.exit.clone())?;

    let cfg = Arc::new(cfg);
    let mut sink = output::from_config(&cfg)?;

    if !cfg.trace_file.is_empty() {
        decode::process_trace_file(&cfg, sink.as_mut())?;
        return sink.on_end();
    }

    let files = rx::capture_files(&cfg);
    if files.is_empty() {
        return Err(anyhow!("nothing to do, pass -r, -R or -t"));
    }

    let projector = shapes::load(cfg.doc.as_ref())?;

    let (sender, receiver) = bounded(cfg.pkt_channel_size as usize);
    let mut thread = rx::RxThread {
        exit: cfg.exit.clone(),
        sender,
        files,
    };
    let builder = std::thread::Builder::new().name(thread.name());
    let handle = {
        let cfg = cfg.clone();
        builder.spawn(move || thread.spawn(cfg))?
    };

    decode::process_frames(&cfg, receiver, projector.as_ref(), sink.as_mut())?;

    match handle.join() {
        Ok(result) => result?,
        Err(e) => {
            cfg.exit.store(true, Ordering::SeqCst);
            eprintln!("{:?}", e);
        }
    };

    sink.on_end()
}
