use std::path::PathBuf;

use clap::{command, value_parser, Arg, ArgAction, Command};

use crate::{kmers::MAX_KMER_LENGTH, utils::LogLevel};

pub(super) fn cli_model() -> Command {
    command!()
        .arg(
            Arg::new("timestamp")
                .short('X')
                .long("timestamp")
                .value_parser(value_parser!(stderrlog::Timestamp))
                .value_name("GRANULARITY")
                .default_value("none")
                .help("Prepend log entries with a timestamp"),
        )
        .arg(
            Arg::new("loglevel")
                .short('l')
                .long("loglevel")
                .value_name("LOGLEVEL")
                .value_parser(value_parser!(LogLevel))
                .ignore_case(true)
                .default_value("info")
                .help("Set log level"),
        )
        .arg(
            Arg::new("quiet")
                .action(ArgAction::SetTrue)
                .long("quiet")
                .conflicts_with("loglevel")
                .help("Silence all output"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_parser(value_parser!(u64).range(1..))
                .value_name("INT")
                .help("Set number of ingest threads [default: half the available cores]"),
        )
        .arg(
            Arg::new("kmer_length")
                .short('k')
                .long("kmer_length")
                .value_parser(value_parser!(u64).range(1..=MAX_KMER_LENGTH as u64))
                .value_name("INT")
                .default_value("16")
                .help("Set k-mer length in bases"),
        )
        .arg(
            Arg::new("metadata")
                .short('m')
                .long("metadata")
                .value_parser(value_parser!(PathBuf))
                .value_name("FILE")
                .required(true)
                .help("BV-BRC AMR metadata sheet (CSV)"),
        )
        .arg(
            Arg::new("genome_dir")
                .short('d')
                .long("genome_dir")
                .value_parser(value_parser!(PathBuf))
                .value_name("DIR")
                .help("Set directory holding genome sequence files [default: saved from previous run]"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_parser(value_parser!(PathBuf))
                .value_name("FILE")
                .default_value("counts.csv")
                .help("Set output file name"),
        )
        .arg(
            Arg::new("yes")
                .short('y')
                .long("yes")
                .action(ArgAction::SetTrue)
                .help("Skip the thread count confirmation prompt"),
        )
}
