use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::ArgMatches;
use sieve_config::{Config, OverridableConfig};

use crate::cliapp::{self, make_app};
use crate::setup;

/// Config folder used when none is passed on the command line.
const DEFAULT_CONFIG_PATH: &str = ".sieve";

/// Runs the command line application.
pub fn execute() -> Result<()> {
    let app = make_app();
    let matches = app.get_matches();

    let config_path = cliapp::config_path(&matches)
        .map(PathBuf::as_path)
        .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));

    let mut config = Config::from_path(config_path)?;

    // Overrides only apply to `run`; `config show` prints the folder's config.
    if let Some(run_matches) = matches.subcommand_matches("run") {
        config.apply_override(extract_config_args(run_matches))?;
    }

    sieve_log::init(config.logging(), config.sentry());

    match matches.subcommand() {
        Some(("run", _)) => run(config),
        Some(("config", config_matches)) => manage_config(&config, config_matches),
        _ => unreachable!(),
    }
}

/// Extracts config overrides from the command line and environment.
pub fn extract_config_args(matches: &ArgMatches) -> OverridableConfig {
    let arg = |name: &str| matches.get_one::<String>(name).cloned();

    OverridableConfig {
        host: arg("host"),
        port: arg("port"),
        redis_url: arg("redis_url"),
        statsd: arg("statsd"),
        log_level: arg("log_level"),
    }
}

fn manage_config(config: &Config, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", _)) => show_config(config),
        _ => bail!("unknown config subcommand"),
    }
}

#[allow(clippy::print_stdout)]
fn show_config(config: &Config) -> Result<()> {
    if config.path().as_os_str().is_empty() {
        println!("{}", console::style("# config without folder").dim());
    } else {
        let header = format!("# config from {}", config.path().display());
        println!("{}", console::style(header).dim());
    }

    print!("{}", config.to_yaml_string()?);
    Ok(())
}

fn run(config: Config) -> Result<()> {
    setup::check_config(&config)?;
    setup::dump_spawn_infos(&config);
    setup::init_metrics(&config)?;

    sieve_server::run(config)?;
    sieve_log::info!("sieve shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_config_args() {
        let matches = make_app()
            .try_get_matches_from(["sieve", "run", "--host", "0.0.0.0", "--redis-url", ""])
            .unwrap();
        let run = matches.subcommand_matches("run").unwrap();

        let overrides = extract_config_args(run);
        assert_eq!(overrides.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(overrides.redis_url.as_deref(), Some(""));
    }
}
