use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Pre-compiled regex for hostname validation (compiled once at first use)
static HOSTNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][-a-zA-Z0-9\.]*[a-zA-Z0-9]$").unwrap());

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "WOSREWARDS";

#[derive(Debug, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub database: Option<DatabaseSection>,
    #[serde(default)]
    pub queue: Option<QueueSection>,
    #[serde(default)]
    pub output: Option<OutputSection>,
    #[serde(default)]
    pub worker: Option<WorkerSection>,
    #[serde(default)]
    pub executor: Option<ExecutorSection>,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSection {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct QueueSection {
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub spool_dir: Option<String>,
    #[serde(default)]
    pub poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct OutputSection {
    #[serde(default)]
    pub directory: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WorkerSection {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub idle_delay_ms: Option<u64>,
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,
    #[serde(default)]
    pub claim_retries: Option<u32>,
    #[serde(default)]
    pub retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ExecutorSection {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Option<Vec<String>>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

/// Parse configuration from a string with optional format hint
#[inline]
fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

/// Try to parse config by attempting each enabled format
#[inline]
fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse config as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        let _ = s;
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Which transport carries pending-job descriptors to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackendKind {
    /// Spool directory on the local filesystem.
    Local,
    /// Shared redis list.
    Redis,
    /// Process-local memory; nothing survives a restart.
    Memory,
}

impl QueueBackendKind {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Redis => "redis",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for QueueBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "spool" | "file" => Ok(Self::Local),
            "redis" | "remote" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Validation(format!(
                "unsupported queue backend: {other}"
            ))),
        }
    }
}

/// Concrete application configuration with defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub output: OutputConfig,
    pub worker: WorkerConfig,
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueConfig {
    /// Explicit backend; when unset it is derived from `redis_url`.
    pub backend: Option<QueueBackendKind>,
    pub redis_url: Option<String>,
    pub name: String,
    pub spool_dir: String,
    pub poll_timeout_secs: u64,
}

impl QueueConfig {
    /// The backend to build: the explicit choice, else redis when a URL is set, else local.
    pub fn resolved_backend(&self) -> QueueBackendKind {
        match self.backend {
            Some(kind) => kind,
            None if self.redis_url.as_deref().is_some_and(|u| !u.trim().is_empty()) => {
                QueueBackendKind::Redis
            }
            None => QueueBackendKind::Local,
        }
    }

    #[inline]
    pub const fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputConfig {
    pub directory: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerConfig {
    pub enabled: bool,
    pub idle_delay_ms: u64,
    pub job_timeout_secs: u64,
    pub claim_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutorConfig {
    pub command: Option<String>,
    pub args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 6000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            database: DatabaseConfig {
                path: "sqlite://wosrewards.sqlite".to_string(),
                max_connections: None,
            },
            queue: QueueConfig {
                backend: None,
                redis_url: None,
                name: "wosrewards:jobs".to_string(),
                spool_dir: "./spool".to_string(),
                poll_timeout_secs: 5,
            },
            output: OutputConfig {
                directory: "./jobs_data".to_string(),
            },
            worker: WorkerConfig {
                enabled: true,
                idle_delay_ms: 500,
                job_timeout_secs: 900,
                claim_retries: 3,
                retry_backoff_ms: 1000,
            },
            executor: ExecutorConfig {
                command: None,
                args: Vec::new(),
            },
        }
    }
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    match s.as_bytes() {
        b"1" | b"true" | b"TRUE" | b"True" | b"yes" | b"YES" | b"Yes" | b"y" | b"Y" => Ok(true),
        b"0" | b"false" | b"FALSE" | b"False" | b"no" | b"NO" | b"No" | b"n" | b"N" => Ok(false),
        _ => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "on" => Ok(true),
            "false" | "no" | "n" | "off" => Ok(false),
            _ => Err(()),
        },
    }
}

#[inline]
fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .filter_map(|p| {
            let trimmed = p.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
    ($target:expr, $source:expr, wrap) => {
        if let Some(v) = $source {
            $target = Some(v);
        }
    };
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = path {
        let raw = load_raw_from_file(p)?;
        apply_raw(&mut cfg, raw)?;
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw(cfg: &mut Config, raw: RawConfigFile) -> Result<(), ConfigError> {
    if let Some(server) = raw.server {
        apply_opt!(cfg.server.host, server.host);
        apply_opt!(cfg.server.port, server.port);
    }
    if let Some(logging) = raw.logging {
        apply_opt!(cfg.logging.level, logging.level);
        apply_opt!(cfg.logging.json, logging.json);
    }
    if let Some(db) = raw.database {
        apply_opt!(cfg.database.path, db.path);
        apply_opt!(cfg.database.max_connections, db.max_connections, wrap);
    }
    if let Some(queue) = raw.queue {
        if let Some(backend) = queue.backend {
            cfg.queue.backend = Some(backend.parse()?);
        }
        apply_opt!(cfg.queue.redis_url, queue.redis_url, wrap);
        apply_opt!(cfg.queue.name, queue.name);
        apply_opt!(cfg.queue.spool_dir, queue.spool_dir);
        apply_opt!(cfg.queue.poll_timeout_secs, queue.poll_timeout_secs);
    }
    if let Some(output) = raw.output {
        apply_opt!(cfg.output.directory, output.directory);
    }
    if let Some(worker) = raw.worker {
        apply_opt!(cfg.worker.enabled, worker.enabled);
        apply_opt!(cfg.worker.idle_delay_ms, worker.idle_delay_ms);
        apply_opt!(cfg.worker.job_timeout_secs, worker.job_timeout_secs);
        apply_opt!(cfg.worker.claim_retries, worker.claim_retries);
        apply_opt!(cfg.worker.retry_backoff_ms, worker.retry_backoff_ms);
    }
    if let Some(executor) = raw.executor {
        apply_opt!(cfg.executor.command, executor.command, wrap);
        apply_opt!(cfg.executor.args, executor.args);
    }
    Ok(())
}

#[inline]
fn env_key(suffix: &str) -> String {
    format!("{ENV_PREFIX}_{suffix}")
}

/// Helper to parse env var as a specific type
#[inline]
fn env_parse<T: std::str::FromStr>(suffix: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    let key = env_key(suffix);
    match env::var(&key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Helper to parse env var as bool
#[inline]
fn env_bool(suffix: &str) -> Result<Option<bool>, ConfigError> {
    let key = env_key(suffix);
    match env::var(&key) {
        Ok(v) => parse_bool(v.trim())
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("invalid {}", key))),
        Err(_) => Ok(None),
    }
}

/// Helper to get env var as string
#[inline]
fn env_str(suffix: &str) -> Option<String> {
    env::var(env_key(suffix)).ok()
}

/// Apply all environment variable overrides to config
fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    // Server
    if let Some(v) = env_str("SERVER_HOST") {
        cfg.server.host = v;
    }
    if let Some(v) = env_parse::<u16>("SERVER_PORT")? {
        cfg.server.port = v;
    }

    // Logging
    if let Some(v) = env_str("LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = env_bool("LOG_JSON")? {
        cfg.logging.json = v;
    }

    // Database
    if let Some(v) = env_str("DATABASE_PATH") {
        cfg.database.path = v;
    }
    // Backwards-compatible alias
    if let Some(v) = env_str("DATABASE_URL") {
        cfg.database.path = v;
    }
    if let Some(v) = env_parse::<u32>("DATABASE_MAX_CONNECTIONS")? {
        cfg.database.max_connections = Some(v);
    }

    // Queue
    if let Some(v) = env_str("QUEUE_BACKEND") {
        cfg.queue.backend = Some(v.parse()?);
    }
    if let Some(v) = env_str("REDIS_URL") {
        cfg.queue.redis_url = Some(v);
    }
    if let Some(v) = env_str("QUEUE_REDIS_URL") {
        cfg.queue.redis_url = Some(v);
    }
    if let Some(v) = env_str("QUEUE_NAME") {
        cfg.queue.name = v;
    }
    if let Some(v) = env_str("QUEUE_SPOOL_DIR") {
        cfg.queue.spool_dir = v;
    }
    if let Some(v) = env_parse::<u64>("QUEUE_POLL_TIMEOUT_SECS")? {
        cfg.queue.poll_timeout_secs = v;
    }

    // Output
    if let Some(v) = env_str("OUTPUT_DIRECTORY") {
        cfg.output.directory = v;
    }

    // Worker
    if let Some(v) = env_bool("WORKER_ENABLED")? {
        cfg.worker.enabled = v;
    }
    if let Some(v) = env_parse::<u64>("WORKER_IDLE_DELAY_MS")? {
        cfg.worker.idle_delay_ms = v;
    }
    if let Some(v) = env_parse::<u64>("WORKER_JOB_TIMEOUT_SECS")? {
        cfg.worker.job_timeout_secs = v;
    }
    if let Some(v) = env_parse::<u32>("WORKER_CLAIM_RETRIES")? {
        cfg.worker.claim_retries = v;
    }
    if let Some(v) = env_parse::<u64>("WORKER_RETRY_BACKOFF_MS")? {
        cfg.worker.retry_backoff_ms = v;
    }

    // Executor
    if let Some(v) = env_str("EXECUTOR_COMMAND") {
        cfg.executor.command = Some(v);
    }
    if let Some(v) = env_str("EXECUTOR_ARGS") {
        cfg.executor.args = split_csv(&v);
    }

    Ok(())
}

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.server.port == 0 {
        return Err(ConfigError::Validation("server.port must be > 0".into()));
    }
    let host_ok = cfg.server.host.parse::<std::net::IpAddr>().is_ok()
        || HOSTNAME_REGEX.is_match(&cfg.server.host);
    if !host_ok {
        return Err(ConfigError::Validation(format!(
            "invalid server.host: {}",
            cfg.server.host
        )));
    }

    if cfg.database.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database.path must not be empty".into(),
        ));
    }
    if cfg.database.max_connections == Some(0) {
        return Err(ConfigError::Validation(
            "database.max_connections must be > 0".into(),
        ));
    }

    if cfg.queue.name.trim().is_empty() {
        return Err(ConfigError::Validation("queue.name must not be empty".into()));
    }
    if cfg.queue.poll_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "queue.poll_timeout_secs must be > 0".into(),
        ));
    }
    match cfg.queue.resolved_backend() {
        QueueBackendKind::Redis => {
            let raw = cfg.queue.redis_url.as_deref().unwrap_or("").trim();
            if raw.is_empty() {
                return Err(ConfigError::Validation(
                    "queue.redis_url must be set for the redis backend".into(),
                ));
            }
            match url::Url::parse(raw) {
                Ok(u) if matches!(u.scheme(), "redis" | "rediss") => {}
                Ok(u) => {
                    return Err(ConfigError::Validation(format!(
                        "queue.redis_url must use redis:// or rediss://, got {}://",
                        u.scheme()
                    )))
                }
                Err(_) => {
                    return Err(ConfigError::Validation(
                        "queue.redis_url is not a valid URL".into(),
                    ))
                }
            }
        }
        QueueBackendKind::Local => {
            if cfg.queue.spool_dir.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "queue.spool_dir must be set for the local backend".into(),
                ));
            }
        }
        QueueBackendKind::Memory => {}
    }

    if cfg.output.directory.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output.directory must not be empty".into(),
        ));
    }
    if cfg.worker.job_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "worker.job_timeout_secs must be > 0".into(),
        ));
    }
    if let Some(cmd) = cfg.executor.command.as_deref() {
        if cmd.trim().is_empty() {
            return Err(ConfigError::Validation(
                "executor.command must not be blank when set".into(),
            ));
        }
    }
    Ok(())
}
