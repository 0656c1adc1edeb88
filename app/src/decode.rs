use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};

use tracewire_api as api;
use api::config::Config;
use api::dissectors::{ethernet, parse_ip, to_udp};
use api::sink::Sink;
use tracewire_capture::{link_type, Frame};
use tracewire_snmp::projection::Projector;
use tracewire_snmp::SnmpDatagram;
use tracewire_trace::{Kind, Reassembler, Record};

/// Drain the frame channel until the producer hangs up or exit is raised,
/// decoding each frame down to SNMP and pushing the result into the sink.
pub fn process_frames(
    cfg: &Config,
    receiver: Receiver<Frame>,
    projector: Option<&Projector>,
    sink: &mut dyn Sink<serde_json::Value>,
) -> Result<()> {
    while !cfg.exit.load(Ordering::Relaxed) {
        let frame = match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if let Some(item) = decode_frame(cfg, &frame, projector) {
            sink.on_item(item)?;
        }
    }

    Ok(())
}

/// Frame → IP → UDP → SNMP → JSON. Frames that are not decodable SNMP
/// traffic are silently skipped; decoding other traffic is not this
/// program's job.
fn decode_frame(
    cfg: &Config,
    frame: &Frame,
    projector: Option<&Projector>,
) -> Option<serde_json::Value> {
    let buf = match frame.link_type {
        link_type::ETHERNET => match ethernet::dissect(&frame.data) {
            Ok((remain, etype)) if etype == ethernet::ETYPE_IPV4 => remain,
            _ => return None,
        },
        link_type::RAW => &frame.data[..],
        // BSD loopback: 4 byte address family header
        link_type::NULL if frame.data.len() > 4 => &frame.data[4..],
        _ => return None,
    };

    let pkt = match parse_ip(buf, frame.ts, cfg.reuse_buffer) {
        Ok(pkt) => pkt,
        Err(e) => {
            if cfg.verbose_mode {
                eprintln!("ip decode: {}", e);
            }
            return None;
        }
    };

    let udp = match to_udp(&pkt, cfg.reuse_buffer) {
        Ok(udp) => udp,
        Err(_) => return None, // not UDP
    };

    if !cfg.snmp_ports.contains(&udp.udp.src_port) && !cfg.snmp_ports.contains(&udp.udp.dst_port) {
        return None;
    }

    if cfg.verify_checksums && !udp.verify_checksum() && !cfg.quiet {
        eprintln!(
            "udp checksum mismatch from {}:{}",
            pkt.header.src, udp.udp.src_port
        );
    }

    let dg = match SnmpDatagram::decode(&udp.payload, pkt.header.src, udp.ts) {
        Ok(dg) => dg,
        Err(e) => {
            if cfg.verbose_mode {
                eprintln!("snmp decode from {}: {}", pkt.header.src, e);
            }
            return None;
        }
    };

    if let Some(projector) = projector {
        if let Some(projection) = projector.project(&dg) {
            return serde_json::to_value(&projection).ok();
        }
    }

    serde_json::to_value(&dg).ok()
}

/// Parse a whole trace record file and emit every completed envelope.
///
/// Reassembly state is per (source, kind): records of different providers
/// interleave freely in one capture without confusing each other.
pub fn process_trace_file(cfg: &Config, sink: &mut dyn Sink<serde_json::Value>) -> Result<()> {
    let data = std::fs::read(&cfg.trace_file)
        .map_err(|e| anyhow!("{}: {}", cfg.trace_file, e))?;

    let mut tables: HashMap<(String, Kind), Reassembler> = HashMap::new();
    let mut buf = &data[..];
    let mut total = 0usize;
    while !buf.is_empty() && !cfg.exit.load(Ordering::Relaxed) {
        let (record, rest) = Record::parse(buf)?;
        buf = rest;
        total += 1;

        let kind = record.version.kind().unwrap_or(Kind::EventPayload);
        let reassembler = tables
            .entry((record.source.clone(), kind))
            .or_insert_with(|| Reassembler::new(kind));
        if let Some(envelope) = reassembler.accept(&record) {
            sink.on_item(serde_json::to_value(&envelope)?)?;
        }
    }

    if !cfg.quiet {
        println!("{}: {} records", cfg.trace_file, total);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use api::sink::VecSink;
    use std::net::Ipv4Addr;
    use tracewire_snmp::{Pdu, TrapV1, Value, VarBind, Version};

    fn test_config() -> Config {
        Config {
            snmp_ports: vec![161, 162],
            verify_checksums: true,
            quiet: true,
            ..Default::default()
        }
    }

    fn trap_wire() -> Vec<u8> {
        let dg = SnmpDatagram {
            header: tracewire_snmp::SnmpHeader {
                version: Version::V1,
                community: "public".to_string(),
            },
            source: Ipv4Addr::new(10, 0, 0, 1),
            ts: libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
            pdu: Pdu::TrapV1(TrapV1 {
                enterprise: "1.3.6.1.4.1.9".parse().unwrap(),
                agent_addr: Ipv4Addr::new(10, 0, 0, 1),
                generic_trap: 6,
                specific_trap: 1,
                uptime: 42,
                var_binds: vec![VarBind::new(
                    "1.3.6.1.2.1.1.3.0".parse().unwrap(),
                    Value::Integer(5),
                )],
            }),
        };
        dg.encode()
    }

    fn udp_frame(dst_port: u16) -> Frame {
        let snmp = trap_wire();
        let udp_len = 8 + snmp.len() as u16;
        let total_len = 20 + udp_len;

        let mut ip = vec![
            0x45, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x40, 0x11, 0x00, 0x00, // hdr
            10, 0, 0, 1, // src
            10, 0, 0, 2, // dst
        ];
        ip[2..4].copy_from_slice(&total_len.to_be_bytes());
        ip.extend_from_slice(&5060u16.to_be_bytes()); // src port
        ip.extend_from_slice(&dst_port.to_be_bytes());
        ip.extend_from_slice(&udp_len.to_be_bytes());
        ip.extend_from_slice(&[0, 0]); // checksum 0: not verified
        ip.extend_from_slice(&snmp);

        Frame {
            ts: libc::timeval {
                tv_sec: 1,
                tv_usec: 0,
            },
            caplen: ip.len() as u32,
            origlen: ip.len() as u32,
            link_type: link_type::RAW,
            data: ip,
        }
    }

    #[test]
    fn raw_frame_decodes_to_snmp_json() {
        let cfg = test_config();
        let item = decode_frame(&cfg, &udp_frame(162), None).unwrap();
        assert_eq!(item["header"]["version"], "V1");
        assert_eq!(item["source"], "10.0.0.1");
    }

    #[test]
    fn uninteresting_port_is_skipped() {
        let cfg = test_config();
        assert!(decode_frame(&cfg, &udp_frame(53), None).is_none());
    }

    #[test]
    fn short_frame_is_skipped() {
        let cfg = test_config();
        let frame = Frame {
            ts: libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
            caplen: 3,
            origlen: 3,
            link_type: link_type::ETHERNET,
            data: vec![1, 2, 3],
        };
        assert!(decode_frame(&cfg, &frame, None).is_none());
    }

    #[test]
    fn frame_channel_drains_until_disconnect() {
        let cfg = test_config();
        let (sender, receiver) = crossbeam_channel::bounded(4);
        sender.send(udp_frame(162)).unwrap();
        sender.send(udp_frame(53)).unwrap();
        drop(sender);

        let mut sink = VecSink::default();
        process_frames(&cfg, receiver, None, &mut sink).unwrap();
        assert_eq!(sink.items.len(), 1);
    }
}
