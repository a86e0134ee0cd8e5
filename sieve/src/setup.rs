use anyhow::{Result, bail};
use sieve_config::Config;
use sieve_statsd::MetricsClientConfig;

/// Scopes that grant access to at least one endpoint.
const KNOWN_SCOPES: &[&str] = &["org:read", "org:write", "org:admin"];

/// Validates the configuration before any service is started.
pub fn check_config(config: &Config) -> Result<()> {
    if config.max_body_size() == 0 {
        bail!("`http.max_body_size` must be greater than zero");
    }

    let sample_rate = config.metrics_sample_rate();
    if !(0.0..=1.0).contains(&sample_rate) {
        bail!("`metrics.sample_rate` must be between 0.0 and 1.0, got {sample_rate}");
    }

    if config.api_tokens().is_empty() {
        sieve_log::warn!("no API tokens configured, all metrics endpoints will reject requests");
    }

    for token in config.api_tokens() {
        if token.token.is_empty() {
            bail!("`auth.tokens` contains an empty token");
        }

        if !token.scopes.iter().any(|s| KNOWN_SCOPES.contains(&s.as_str())) {
            sieve_log::warn!(
                scopes = ?token.scopes,
                "API token has no organization scope and can only reach the health check"
            );
        }
    }

    Ok(())
}

/// Print spawn infos to the log.
pub fn dump_spawn_infos(config: &Config) {
    if config.path().as_os_str().is_empty() {
        sieve_log::info!("launching sieve without config folder");
    } else {
        sieve_log::info!(
            "launching sieve from config folder {}",
            config.path().display()
        );
    }

    match config.redis() {
        Some(_) => sieve_log::info!("  backends: redis"),
        None => sieve_log::info!("  backends: memory"),
    }
    sieve_log::info!("  indexer cache size: {}", config.indexer_cache_size());
    sieve_log::info!("  api tokens: {}", config.api_tokens().len());
    sieve_log::info!("  log level: {}", config.logging().level);
}

/// Initialize the metric system.
pub fn init_metrics(config: &Config) -> Result<()> {
    let Some(host) = config.statsd_addr() else {
        return Ok(());
    };

    let mut default_tags = config.metrics_default_tags().clone();
    if let Some(hostname_tag) = config.metrics_hostname_tag()
        && let Some(hostname) = hostname::get().ok().and_then(|s| s.into_string().ok())
    {
        default_tags.insert(hostname_tag.to_owned(), hostname);
    }

    sieve_statsd::init(MetricsClientConfig {
        prefix: config.metrics_prefix(),
        host,
        default_tags,
        default_sample_rate: config.metrics_sample_rate().into(),
    })?;

    Ok(())
}
