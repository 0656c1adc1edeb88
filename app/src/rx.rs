use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use crossbeam_channel::Sender;

use tracewire_api as api;
use api::config::Config;
use tracewire_capture::pcap::PcapReader;
use tracewire_capture::pcapng::PcapngReader;
use tracewire_capture::Frame;

/// first four bytes of a pcapng Section Header, endian independent
const PCAPNG_LEAD_IN: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

/// get capture files according to command line arguments/configuration file
pub fn capture_files(cfg: &Config) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if !cfg.pcap_file.is_empty() {
        files.push(PathBuf::from(&cfg.pcap_file));
    } else if !cfg.pcap_dir.is_empty() {
        collect_dir(Path::new(&cfg.pcap_dir), cfg.recursive, &mut files);
        files.sort();
    }

    return files;
}

fn collect_dir(dir: &Path, recursive: bool, files: &mut Vec<PathBuf>) {
    let entries = match dir.read_dir() {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Failed to read directory {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries {
        if let Ok(entry) = entry {
            let buf = entry.path();
            if buf.is_dir() {
                if recursive {
                    collect_dir(&buf, recursive, files);
                }
                continue;
            }

            match buf.extension() {
                None => continue,
                Some(s) => {
                    let ext = OsString::from(s);
                    let pcap_ext = OsString::from("pcap");
                    let pcapng_ext = OsString::from("pcapng");
                    match ext {
                        _ if ext == pcap_ext => files.push(entry.path()),
                        _ if ext == pcapng_ext => files.push(entry.path()),
                        _ => {} // if file is not pcap or pcapng, skip
                    };
                }
            };
        }
    }
}

/// A capture file of either framing, picked by its leading magic.
enum Offline {
    Pcap(PcapReader<BufReader<File>>),
    Pcapng(PcapngReader<BufReader<File>>),
}

impl Offline {
    fn try_from_path<P: AsRef<Path>>(path: P) -> Result<Offline> {
        if !path.as_ref().exists() {
            return Err(anyhow!("File does not exist"));
        }

        let mut file = File::open(path.as_ref())?;
        let mut lead_in = [0u8; 4];
        file.read_exact(&mut lead_in)?;
        file.seek(SeekFrom::Start(0))?;
        let input = BufReader::new(file);

        if lead_in == PCAPNG_LEAD_IN {
            Ok(Offline::Pcapng(PcapngReader::new(input)))
        } else {
            Ok(Offline::Pcap(PcapReader::new(input)?))
        }
    }

    #[inline]
    fn next(&mut self) -> Result<Option<Frame>> {
        let frame = match self {
            Offline::Pcap(rdr) => rdr.next_frame()?,
            Offline::Pcapng(rdr) => rdr.next_frame()?,
        };
        Ok(frame)
    }
}

pub struct RxThread {
    pub exit: Arc<AtomicBool>,
    pub sender: Sender<Frame>,
    pub files: Vec<PathBuf>,
}

impl RxThread {
    pub fn spawn(&mut self, cfg: Arc<Config>) -> Result<()> {
        if !cfg.quiet {
            println!("{} started", self.name());
        }

        for file in &self.files {
            let mut cap = match Offline::try_from_path(file) {
                Ok(cap) => cap,
                Err(e) => {
                    eprintln!("{}: {}", file.display(), e);
                    continue;
                }
            };

            while !self.exit.load(Ordering::Relaxed) {
                let frame = match cap.next() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => {
                        eprintln!("{}: {}", file.display(), e);
                        break;
                    }
                };

                if self.sender.send(frame).is_err() {
                    if !cfg.quiet {
                        println!("{} channel is closed, exit", self.name());
                    }
                    return Ok(());
                }
            }
        }

        if !cfg.quiet {
            println!("{} exit", self.name());
        }

        Ok(())
    }

    pub fn name(&self) -> String {
        String::from("tracewire-replay")
    }
}
