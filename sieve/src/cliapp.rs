//! This module implements the definition of the command line app.

use std::path::PathBuf;

use clap::builder::ValueParser;
use clap::{Arg, Command};

pub const ABOUT: &str = "Sieve lists observed metrics and controls their visibility.";

pub fn make_app() -> Command {
    Command::new("sieve")
        .disable_help_subcommand(true)
        .subcommand_required(true)
        .propagate_version(true)
        .max_term_width(79)
        .help_template(
            "Sieve v{version}\n{about}\n\n{usage-heading} {usage}\n\n{all-args}{after-help}",
        )
        .version(env!("CARGO_PKG_VERSION"))
        .about(ABOUT)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_name("CONFIG")
                .value_parser(ValueParser::path_buf())
                .env("SIEVE_CONFIG_DIR")
                .help("The path to the config folder."),
        )
        .subcommand(
            Command::new("run")
                .about("Run the sieve server.")
                .arg(
                    Arg::new("host")
                        .long("host")
                        .value_name("HOST")
                        .env("SIEVE_HOST")
                        .help("The host dns name or IP address."),
                )
                .arg(
                    Arg::new("port")
                        .long("port")
                        .value_name("PORT")
                        .env("SIEVE_PORT")
                        .help("The port to bind for the HTTP server."),
                )
                .arg(
                    Arg::new("redis_url")
                        .long("redis-url")
                        .value_name("REDIS_URL")
                        .env("SIEVE_REDIS_URL")
                        .help("Redis server URL. Pass an empty value to use memory backends."),
                )
                .arg(
                    Arg::new("statsd")
                        .long("statsd")
                        .value_name("STATSD")
                        .env("SIEVE_STATSD_ADDR")
                        .help("The statsd server to report internal metrics to."),
                )
                .arg(
                    Arg::new("log_level")
                        .long("log-level")
                        .value_name("LEVEL")
                        .env("SIEVE_LOG_LEVEL")
                        .help("The log level: error, warn, info, debug or trace."),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Manage the sieve config.")
                .subcommand_required(true)
                .subcommand(
                    Command::new("show")
                        .about("Show the entire config out for debugging purposes."),
                ),
        )
}

/// Returns the config folder passed on the command line, if any.
pub fn config_path(matches: &clap::ArgMatches) -> Option<&PathBuf> {
    matches.get_one::<PathBuf>("config")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_assert() {
        make_app().debug_assert();
    }

    #[test]
    fn test_run_overrides() {
        let matches = make_app()
            .try_get_matches_from(["sieve", "run", "--port", "4000", "--config", "/tmp/sieve"])
            .unwrap();

        assert_eq!(
            config_path(&matches).map(PathBuf::as_path),
            Some(std::path::Path::new("/tmp/sieve"))
        );

        let (name, run) = matches.subcommand().unwrap();
        assert_eq!(name, "run");
        assert_eq!(
            run.get_one::<String>("port").map(String::as_str),
            Some("4000")
        );
    }

    #[test]
    fn test_subcommand_required() {
        assert!(make_app().try_get_matches_from(["sieve"]).is_err());
        assert!(make_app().try_get_matches_from(["sieve", "config"]).is_err());
    }
}
