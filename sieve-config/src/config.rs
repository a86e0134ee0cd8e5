use std::collections::BTreeMap;
use std::env;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sieve_log::{LogConfig, SentryConfig};
use sieve_redis::RedisConfig;

/// Defines the source of a config error
#[derive(Debug, Default)]
enum ConfigErrorSource {
    /// An error occurring independently.
    #[default]
    None,
    /// An error originating from a configuration file.
    File(PathBuf),
    /// An error originating in a field override (an env var, or a CLI parameter).
    FieldOverride(String),
}

impl fmt::Display for ConfigErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigErrorSource::None => Ok(()),
            ConfigErrorSource::File(file_name) => {
                write!(f, " (file {})", file_name.display())
            }
            ConfigErrorSource::FieldOverride(name) => write!(f, " (field {name})"),
        }
    }
}

/// Indicates config related errors.
#[derive(Debug)]
pub struct ConfigError {
    source: ConfigErrorSource,
    kind: ConfigErrorKind,
    error: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl ConfigError {
    #[inline]
    fn new(kind: ConfigErrorKind) -> Self {
        Self {
            source: ConfigErrorSource::None,
            kind,
            error: None,
        }
    }

    #[inline]
    fn wrap<E>(error: E, kind: ConfigErrorKind) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            source: ConfigErrorSource::None,
            kind,
            error: Some(Box::new(error)),
        }
    }

    #[inline]
    fn for_field<E>(error: E, field: &'static str) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::wrap(error, ConfigErrorKind::InvalidValue).field(field)
    }

    #[inline]
    fn file(mut self, p: impl AsRef<Path>) -> Self {
        self.source = ConfigErrorSource::File(p.as_ref().to_path_buf());
        self
    }

    #[inline]
    fn field(mut self, name: &'static str) -> Self {
        self.source = ConfigErrorSource::FieldOverride(name.to_owned());
        self
    }

    /// Returns the error kind of the error.
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.source)
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.error.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// Indicates config related errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigErrorKind {
    /// Failed to open the file.
    #[error("could not open config file")]
    CouldNotOpenFile,
    /// Failed to save a file.
    #[error("could not write config file")]
    CouldNotWriteFile,
    /// Parsing YAML failed.
    #[error("could not parse yaml config file")]
    BadYaml,
    /// Parsing JSON failed.
    #[error("could not parse json config file")]
    BadJson,
    /// Invalid config value
    #[error("invalid config value")]
    InvalidValue,
}

trait ConfigObject: DeserializeOwned + Serialize {
    /// The basename of the config file.
    fn name() -> &'static str;

    /// The full filename of the config file, including the file extension.
    fn path(base: &Path) -> PathBuf {
        base.join(format!("{}.yml", Self::name()))
    }

    /// Loads the config file from a file within the given directory location.
    fn load(base: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(base);

        let f = fs::File::open(&path)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(&path))?;

        serde_yaml::from_reader(io::BufReader::new(f))
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml).file(&path))
    }
}

/// Structure used to hold information about configuration overrides via
/// CLI parameters or environment variables
#[derive(Debug, Default)]
pub struct OverridableConfig {
    /// The host the HTTP server should bind to (network interface).
    pub host: Option<String>,
    /// The port to bind for the HTTP server.
    pub port: Option<String>,
    /// The redis server url.
    pub redis_url: Option<String>,
    /// The statsd server to report internal metrics to.
    pub statsd: Option<String>,
    /// The log level.
    pub log_level: Option<String>,
}

/// HTTP server options.
#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
struct Http {
    /// The host the server binds to.
    host: IpAddr,
    /// The port the server binds to.
    port: u16,
    /// Maximum time in seconds to wait for in-flight requests on shutdown.
    shutdown_timeout: u64,
    /// The maximum size of request bodies in bytes.
    max_body_size: usize,
}

impl Default for Http {
    fn default() -> Self {
        Http {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            shutdown_timeout: 10,
            max_body_size: 1024 * 1024,
        }
    }
}

/// Controls internal reporting of metrics to statsd.
#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
struct Metrics {
    /// Hostname and port of the statsd server.
    ///
    /// Defaults to `None`.
    statsd: Option<String>,
    /// Common prefix that should be added to all metrics.
    ///
    /// Defaults to `"sieve"`.
    prefix: String,
    /// Default tags to apply to all metrics.
    default_tags: BTreeMap<String, String>,
    /// Tag name to report the hostname to for each metric. Defaults to not sending such a tag.
    hostname_tag: Option<String>,
    /// Global sample rate for all emitted metrics between `0.0` and `1.0`.
    ///
    /// For example, a value of `0.3` means that only 30% of the emitted metrics will be sent.
    /// Defaults to `1.0` (100%).
    sample_rate: f64,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            statsd: None,
            prefix: "sieve".into(),
            default_tags: BTreeMap::new(),
            hostname_tag: None,
            sample_rate: 1.0,
        }
    }
}

/// Options for the string indexer.
#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
struct Indexer {
    /// Number of resolved strings kept in the in-process cache.
    ///
    /// A value of `0` disables the cache.
    cache_size: usize,
}

impl Default for Indexer {
    fn default() -> Self {
        Indexer { cache_size: 10_000 }
    }
}

/// A static API token with its granted scopes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ApiToken {
    /// The bearer token as sent in the `Authorization` header.
    pub token: String,
    /// Scopes granted to this token, for example `org:read`.
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Authentication options.
#[derive(Serialize, Deserialize, Debug, Default)]
struct Auth {
    /// Statically configured API tokens.
    #[serde(default)]
    tokens: Vec<ApiToken>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct ConfigValues {
    #[serde(default)]
    http: Http,
    #[serde(default)]
    logging: LogConfig,
    #[serde(default)]
    sentry: SentryConfig,
    #[serde(default)]
    metrics: Metrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    redis: Option<RedisConfig>,
    #[serde(default)]
    indexer: Indexer,
    #[serde(default)]
    auth: Auth,
}

impl ConfigObject for ConfigValues {
    fn name() -> &'static str {
        "config"
    }
}

/// Config struct.
pub struct Config {
    values: ConfigValues,
    path: PathBuf,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("values", &self.values)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            values: ConfigValues::default(),
            path: PathBuf::new(),
        }
    }
}

impl Config {
    /// Loads a config from a given config folder.
    ///
    /// A missing `config.yml` is not an error; the defaults are used instead.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = env::current_dir()
            .map(|x| x.join(path.as_ref()))
            .unwrap_or_else(|_| path.as_ref().to_path_buf());

        let values = if Self::config_exists(&path) {
            ConfigValues::load(&path)?
        } else {
            ConfigValues::default()
        };

        Ok(Config { values, path })
    }

    /// Creates a config from a JSON value.
    ///
    /// This is mostly useful for tests.
    pub fn from_json_value(value: serde_json::Value) -> Result<Config, ConfigError> {
        Ok(Config {
            values: serde_json::from_value(value)
                .map_err(|err| ConfigError::wrap(err, ConfigErrorKind::BadJson))?,
            path: PathBuf::new(),
        })
    }

    /// Override configuration with values coming from other sources (e.g. env variables or
    /// command line parameters)
    pub fn apply_override(
        &mut self,
        overrides: OverridableConfig,
    ) -> Result<&mut Self, ConfigError> {
        let http = &mut self.values.http;

        if let Some(host) = overrides.host {
            http.host = host
                .parse::<IpAddr>()
                .map_err(|err| ConfigError::for_field(err, "host"))?;
        }

        if let Some(port) = overrides.port {
            http.port = port
                .as_str()
                .parse()
                .map_err(|err| ConfigError::for_field(err, "port"))?;
        }

        if let Some(redis) = overrides.redis_url {
            self.values.redis = match redis.as_str() {
                "" => None,
                _ => Some(RedisConfig::Single(redis)),
            };
        }

        if let Some(statsd) = overrides.statsd {
            self.values.metrics.statsd = Some(statsd).filter(|s| !s.is_empty());
        }

        if let Some(level) = overrides.log_level {
            self.values.logging.level = level
                .parse()
                .map_err(|err| ConfigError::for_field(err, "log_level"))?;
        }

        Ok(self)
    }

    /// Checks if the config is already initialized.
    pub fn config_exists<P: AsRef<Path>>(path: P) -> bool {
        fs::metadata(ConfigValues::path(path.as_ref())).is_ok()
    }

    /// Returns the path of the config folder.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dumps out a YAML string of the values.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.values)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile))
    }

    /// Returns the socket address the HTTP server binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        (self.values.http.host, self.values.http.port).into()
    }

    /// Returns the maximum time to wait for in-flight requests on shutdown.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.values.http.shutdown_timeout)
    }

    /// Returns the maximum size of request bodies.
    pub fn max_body_size(&self) -> usize {
        self.values.http.max_body_size
    }

    /// Returns the logging configuration.
    pub fn logging(&self) -> &LogConfig {
        &self.values.logging
    }

    /// Returns the Sentry configuration.
    pub fn sentry(&self) -> &SentryConfig {
        &self.values.sentry
    }

    /// Returns the address of the statsd server, if configured.
    pub fn statsd_addr(&self) -> Option<&str> {
        self.values.metrics.statsd.as_deref()
    }

    /// Returns the prefix for internal metrics.
    pub fn metrics_prefix(&self) -> &str {
        &self.values.metrics.prefix
    }

    /// Returns the default tags for internal metrics.
    pub fn metrics_default_tags(&self) -> &BTreeMap<String, String> {
        &self.values.metrics.default_tags
    }

    /// Returns the name of the tag that should carry the hostname.
    pub fn metrics_hostname_tag(&self) -> Option<&str> {
        self.values.metrics.hostname_tag.as_deref()
    }

    /// Returns the global sample rate for internal metrics.
    pub fn metrics_sample_rate(&self) -> f64 {
        self.values.metrics.sample_rate
    }

    /// Returns the redis configuration, if the service should use redis backends.
    pub fn redis(&self) -> Option<&RedisConfig> {
        self.values.redis.as_ref()
    }

    /// Returns the capacity of the indexer cache.
    pub fn indexer_cache_size(&self) -> usize {
        self.values.indexer.cache_size
    }

    /// Returns the statically configured API tokens.
    pub fn api_tokens(&self) -> &[ApiToken] {
        &self.values.auth.tokens
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use sieve_log::Level;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.indexer_cache_size(), 10_000);
        assert!(config.redis().is_none());
        assert!(config.api_tokens().is_empty());
        assert_eq!(config.metrics_prefix(), "sieve");
    }

    #[test]
    fn test_from_json_value() {
        let config = Config::from_json_value(serde_json::json!({
            "http": {"port": 8080},
            "redis": "redis://127.0.0.1:6379",
            "auth": {"tokens": [{"token": "abc", "scopes": ["org:read"]}]},
        }))
        .unwrap();

        assert_eq!(config.listen_addr().port(), 8080);
        assert_eq!(
            config.redis(),
            Some(&RedisConfig::Single("redis://127.0.0.1:6379".to_owned()))
        );
        assert_eq!(
            config.api_tokens(),
            [ApiToken {
                token: "abc".to_owned(),
                scopes: vec!["org:read".to_owned()],
            }]
        );
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = fs::File::create(dir.path().join("config.yml")).unwrap();
        writeln!(file, "indexer:\n  cache_size: 5\nlogging:\n  level: debug").unwrap();

        let config = Config::from_path(dir.path()).unwrap();
        assert_eq!(config.indexer_cache_size(), 5);
        assert_eq!(config.logging().level, Level::Debug);
    }

    #[test]
    fn test_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_path(dir.path()).unwrap();
        assert_eq!(config.indexer_cache_size(), 10_000);
    }

    #[test]
    fn test_from_path_bad_yaml() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yml"), "http: [").unwrap();

        let error = Config::from_path(dir.path()).unwrap_err();
        assert_eq!(error.kind(), ConfigErrorKind::BadYaml);
        assert!(error.to_string().contains("config.yml"));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_apply_override() {
        let mut config = Config::default();
        config
            .apply_override(OverridableConfig {
                host: Some("0.0.0.0".to_owned()),
                port: Some("9000".to_owned()),
                redis_url: Some("redis://redis:6379".to_owned()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:9000");
        assert!(config.redis().is_some());
    }

    #[test]
    fn test_apply_override_invalid_port() {
        let mut config = Config::default();
        let error = config
            .apply_override(OverridableConfig {
                port: Some("many".to_owned()),
                ..Default::default()
            })
            .unwrap_err();

        assert_eq!(error.kind(), ConfigErrorKind::InvalidValue);
        assert_eq!(error.to_string(), "invalid config value (field port)");
    }

    #[test]
    fn test_yaml_dump() {
        let config = Config::from_json_value(serde_json::json!({
            "indexer": {"cache_size": 1},
        }))
        .unwrap();

        insta::assert_snapshot!(config.to_yaml_string().unwrap(), @r###"
        http:
          host: 127.0.0.1
          port: 3000
          shutdown_timeout: 10
          max_body_size: 1048576
        logging:
          level: info
          format: auto
          enable_backtraces: false
        sentry:
          dsn: null
          enabled: false
          environment: null
        metrics:
          statsd: null
          prefix: sieve
          default_tags: {}
          hostname_tag: null
          sample_rate: 1.0
        indexer:
          cache_size: 1
        auth:
          tokens: []
        "###);
    }
}
