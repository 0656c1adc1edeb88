use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Result};
use yaml_rust::YamlLoader;

use tracewire_api as api;
use api::config::Config;

use super::commands::CliArg;

/// Parse command line arguments and set configuration
pub fn parse_args(root_cmd: clap::App) -> Result<Config> {
    let mut config: Config = Default::default();
    let hn = hostname::get()?;
    let hn = hn
        .to_str()
        .ok_or(anyhow!("Hostname {:?} is not a valid UTF-8 string", hn))?;
    config.hostname = hn.to_string();
    config.node = config.hostname.clone();
    config.pkt_channel_size = 2048;
    config.verify_checksums = true;

    let matches = root_cmd.get_matches();

    if let Some(config_file) = matches.value_of(CliArg::Config.as_str()) {
        config.fpath = config_file.to_string();
        parse_config_file(config_file, &mut config)?;
    }

    set_config_by_cli_args(&mut config, &matches);

    if config.snmp_ports.is_empty() {
        config.snmp_ports = vec![161, 162];
    }

    Ok(config)
}

fn parse_config_file(config_file: &str, config: &mut Config) -> Result<()> {
    let cfg_path = Path::new(config_file);
    if !cfg_path.exists() {
        eprintln!(
            "\"{}\" does not exist! Use default configuration file instead",
            config_file
        );
    }

    let mut s = String::new();
    File::open(cfg_path)?.read_to_string(&mut s)?;

    let docs = YamlLoader::load_from_str(&s)?;
    let doc = &docs[0];
    config.doc = api::config::Yaml(doc.clone());

    config.pkt_channel_size = config.get_integer("channel.pkt.size", 2048, 128, 1000000) as u32;
    config.snmp_ports = config
        .get_int_arr("snmp.ports")
        .iter()
        .filter(|p| **p > 0 && **p <= u16::MAX as i64)
        .map(|p| *p as u16)
        .collect();
    config.reuse_buffer = config.get_boolean("reuse.buffer", false);
    config.verify_checksums = config.get_boolean("verify.checksums", true);
    config.output_file = config.get_str("output.file", "");

    // If there is a node in configuration file, use that, other wise use current machine's hostname
    config.node = config.get_str("node", config.hostname.as_str());

    Ok(())
}

/// Use command arguments overrides config file settings
fn set_config_by_cli_args(config: &mut Config, matches: &clap::ArgMatches) {
    config.quiet = matches.is_present(CliArg::Quiet.as_str());
    config.recursive = matches.is_present(CliArg::Recursive.as_str());
    config.verbose_mode = matches.is_present(CliArg::Verbose.as_str());

    if let Some(pcap_file) = matches.value_of(CliArg::PcapFile.as_str()) {
        config.pcap_file = String::from(pcap_file);
    }

    if let Some(pcap_dir) = matches.value_of(CliArg::PcapDir.as_str()) {
        config.pcap_dir = String::from(pcap_dir);
    }

    if let Some(trace_file) = matches.value_of(CliArg::TraceFile.as_str()) {
        config.trace_file = String::from(trace_file);
    }

    if let Some(output) = matches.value_of(CliArg::Output.as_str()) {
        config.output_file = String::from(output);
    }
}
