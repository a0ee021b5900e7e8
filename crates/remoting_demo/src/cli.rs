//! Command-line interface handling for the remoting demo.

use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
///
/// Every option except the config path overrides a value from the file.
#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the number of scripted exchanges
    pub iterations: Option<u32>,
}

impl CliArgs {
    fn command() -> Command {
        Command::new("Member Remoting Demo")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Runs a scripted host/client remoting session over an in-memory link")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("remoting_demo.toml"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(clap::ArgAction::SetTrue),
            )
            .arg(
                Arg::new("iterations")
                    .short('n')
                    .long("iterations")
                    .value_name("COUNT")
                    .help("Number of host/client exchanges to run")
                    .value_parser(clap::value_parser!(u32)),
            )
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("remoting_demo.toml")),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            iterations: matches.get_one::<u32>("iterations").copied(),
        }
    }

    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::from_matches(&Self::command().get_matches())
    }

    /// Parses an explicit argument list.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;
        Ok(Self::from_matches(&matches))
    }
}
