use clap::{App, Arg};

/// Avaliable command line arguments
pub enum CliArg {
    Config,
    Output,
    PcapDir,
    PcapFile,
    Quiet,
    Recursive,
    TraceFile,
    Verbose,
}

impl CliArg {
    pub fn as_str(&self) -> &str {
        match self {
            &CliArg::Config => "config",
            &CliArg::Output => "output",
            &CliArg::PcapDir => "pcap-dir",
            &CliArg::PcapFile => "pcap-file",
            &CliArg::Quiet => "quiet",
            &CliArg::Recursive => "recursive",
            &CliArg::TraceFile => "trace-file",
            &CliArg::Verbose => "verbose",
        }
    }
}

/// Construct a new clap root command
pub fn new_root_command<'a>() -> clap::App<'a, 'static> {
    let root_cmd = App::new(crate_name!())
        .version(crate_version!())
        .author(crate_authors!())
        .args(&[
            Arg::with_name(CliArg::Config.as_str())
                .short("c")
                .value_name("FILE")
                .help("Use a specific config file")
                .takes_value(true),
            Arg::with_name(CliArg::Output.as_str())
                .short("o")
                .long("output")
                .value_name("FILE")
                .help("Write decoded items to FILE instead of stdout")
                .takes_value(true),
            Arg::with_name(CliArg::PcapDir.as_str())
                .short("R")
                .value_name("PCAP-DIR")
                .help("Offline capture directory, all *.pcap/*.pcapng files will be processed")
                .takes_value(true)
                .conflicts_with(CliArg::PcapFile.as_str()),
            Arg::with_name(CliArg::PcapFile.as_str())
                .short("r")
                .value_name("PCAP-FILE")
                .help("Offline capture file")
                .takes_value(true)
                .conflicts_with(CliArg::PcapDir.as_str()),
            Arg::with_name(CliArg::Quiet.as_str())
                .short("q")
                .long("quiet")
                .help("Turn off info level logging"),
            Arg::with_name(CliArg::Recursive.as_str())
                .long("recursive")
                .help("In offline capture directory mode, recurse sub directories"),
            Arg::with_name(CliArg::TraceFile.as_str())
                .short("t")
                .value_name("TRACE-FILE")
                .help("Offline trace record file to reassemble")
                .takes_value(true),
            Arg::with_name(CliArg::Verbose.as_str())
                .short("v")
                .long("verbose")
                .help("Turn on all debugging"),
        ]);

    return root_cmd;
}
