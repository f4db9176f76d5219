//! Tracing subscriber setup for the command line.

use tracing_subscriber::{fmt, EnvFilter};

/// Verbosity selected by `--verbose` / `--quiet`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

impl LogLevel {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (_, true) => LogLevel::Quiet,
            (true, false) => LogLevel::Verbose,
            (false, false) => LogLevel::Normal,
        }
    }

    fn directive(&self) -> &'static str {
        match self {
            LogLevel::Quiet => "error",
            LogLevel::Normal => "koi_classifier=info,warn",
            LogLevel::Verbose => "koi_classifier=debug,info",
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set, unless a verbosity flag was given explicitly.
pub fn init(level: LogLevel) {
    let filter = match level {
        LogLevel::Normal => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()))
        }
        _ => EnvFilter::new(level.directive()),
    };
    // a second init (e.g. from tests) keeps the first subscriber
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
