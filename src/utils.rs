use clap::{builder::PossibleValue, ArgMatches, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    None,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl ValueEnum for LogLevel {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            Self::None,
            Self::Error,
            Self::Warn,
            Self::Info,
            Self::Debug,
            Self::Trace,
        ]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(match self {
            Self::None => PossibleValue::new("none"),
            Self::Error => PossibleValue::new("error"),
            Self::Warn => PossibleValue::new("warn"),
            Self::Info => PossibleValue::new("info"),
            Self::Debug => PossibleValue::new("debug"),
            Self::Trace => PossibleValue::new("trace"),
        })
    }
}

/// Set up logging to stderr from the common command line options
pub fn init_log(m: &ArgMatches) {
    let level = *m
        .get_one::<LogLevel>("loglevel")
        .expect("Missing default argument");
    let quiet = m.get_flag("quiet") || level == LogLevel::None;
    let ts = *m
        .get_one::<stderrlog::Timestamp>("timestamp")
        .expect("Missing default argument");

    let verbosity = match level {
        LogLevel::None | LogLevel::Error => 0,
        LogLevel::Warn => 1,
        LogLevel::Info => 2,
        LogLevel::Debug => 3,
        LogLevel::Trace => 4,
    };

    stderrlog::new()
        .quiet(quiet)
        .verbosity(verbosity)
        .timestamp(ts)
        .init()
        .unwrap();
}
