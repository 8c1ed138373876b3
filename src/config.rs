//! Configuration for the bridge: broker connection settings and service settings.
//!
//! Values come from (lowest to highest priority) built-in defaults, a TOML
//! file, and `FIGMA_MCP_*` environment variables. Loaded values are
//! re-validated with [`BridgeConfig::validate`], which only reports warnings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::cache::DEFAULT_CACHE_TTL;
use crate::error::{BridgeError, Result};
use crate::figma::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};

pub const DEFAULT_BROKER_URL: &str = "http://localhost:3001";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Which transport the service uses for API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportMethod {
    /// Straight to the Figma REST API.
    Direct,
    /// Through the broker, falling back to direct on failure.
    Broker,
}

impl TransportMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMethod::Direct => "direct",
            TransportMethod::Broker => "broker",
        }
    }
}

impl std::str::FromStr for TransportMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" | "api" => Ok(TransportMethod::Direct),
            "broker" | "mcp" => Ok(TransportMethod::Broker),
            other => Err(format!("unknown transport '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub url: String,
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub retry_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    pub health_check: bool,
    #[serde(with = "humantime_serde")]
    pub health_check_interval: Duration,
    pub reconnect: bool,
    pub log_level: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BROKER_URL.to_string(),
            enabled: true,
            timeout: Duration::from_millis(30_000),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(1_000),
            health_check: true,
            health_check_interval: Duration::from_secs(30),
            reconnect: true,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Explicit transport; `None` means detect from the environment.
    pub transport: Option<TransportMethod>,
    pub api_base_url: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            transport: None,
            api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub broker: BrokerConfig,
    pub service: ServiceSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
}

impl ConfigWarning {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl BridgeConfig {
    /// ~/.config/figma-bridge/config.toml
    pub fn central_config_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("figma-bridge")
                .join("config.toml")
        })
    }

    /// Load config from a TOML file, the central config, or defaults, then
    /// apply environment overrides.
    /// Priority: explicit path > ~/.config/figma-bridge/config.toml > defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config, warnings) = Self::load_with_warnings(path)?;
        for warning in warnings {
            tracing::warn!(%warning, "ignoring environment override");
        }
        Ok(config)
    }

    /// Like [`load`](Self::load), but hands back rejected environment
    /// overrides for callers that install logging afterwards.
    pub fn load_with_warnings(path: Option<&Path>) -> Result<(Self, Vec<ConfigWarning>)> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<(Self, Vec<ConfigWarning>)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::central_config_path().filter(|p| p.exists()) {
                Some(central) => Self::from_file(&central)?,
                None => Self::default(),
            },
        };
        let warnings = config.apply_env_from(lookup);
        Ok((config, warnings))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
            .map_err(|e| BridgeError::Config(format!("Invalid config ({}): {}", path.display(), e)))
    }

    pub fn from_toml_str(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Apply `FIGMA_MCP_*` overrides. Unparseable values are skipped and reported.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Vec<ConfigWarning>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();
        let broker = &mut self.broker;

        if let Some(url) = lookup("FIGMA_MCP_URL") {
            broker.url = url;
        }
        if let Some(raw) = lookup("FIGMA_MCP_ENABLED") {
            match parse_bool(&raw) {
                Some(enabled) => broker.enabled = enabled,
                None => warnings.push(ConfigWarning::new(
                    "enabled",
                    format!("FIGMA_MCP_ENABLED is not a boolean: '{raw}'"),
                )),
            }
        }
        if let Some(raw) = lookup("FIGMA_MCP_TIMEOUT_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => broker.timeout = Duration::from_millis(ms),
                Err(_) => warnings.push(ConfigWarning::new(
                    "timeout",
                    format!("FIGMA_MCP_TIMEOUT_MS is not a number: '{raw}'"),
                )),
            }
        }
        if let Some(raw) = lookup("FIGMA_MCP_RETRY_ATTEMPTS") {
            match raw.trim().parse::<u32>() {
                Ok(n) => broker.retry_attempts = n,
                Err(_) => warnings.push(ConfigWarning::new(
                    "retry_attempts",
                    format!("FIGMA_MCP_RETRY_ATTEMPTS is not a number: '{raw}'"),
                )),
            }
        }
        if let Some(raw) = lookup("FIGMA_MCP_RETRY_DELAY_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => broker.retry_delay = Duration::from_millis(ms),
                Err(_) => warnings.push(ConfigWarning::new(
                    "retry_delay",
                    format!("FIGMA_MCP_RETRY_DELAY_MS is not a number: '{raw}'"),
                )),
            }
        }
        if let Some(level) = lookup("FIGMA_MCP_LOG_LEVEL") {
            broker.log_level = level;
        }
        if let Some(raw) = lookup("FIGMA_TRANSPORT") {
            match raw.parse::<TransportMethod>() {
                Ok(method) => self.service.transport = Some(method),
                Err(e) => warnings.push(ConfigWarning::new("transport", e)),
            }
        }

        warnings
    }

    /// Opportunistic re-validation; problems are reported, never fatal.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let broker = &self.broker;

        match Url::parse(&broker.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => warnings.push(ConfigWarning::new(
                "url",
                format!("unsupported scheme '{}' in broker URL", url.scheme()),
            )),
            Err(e) => warnings.push(ConfigWarning::new(
                "url",
                format!("malformed broker URL '{}': {e}", broker.url),
            )),
        }

        if broker.timeout < Duration::from_secs(1) || broker.timeout > Duration::from_secs(300) {
            warnings.push(ConfigWarning::new(
                "timeout",
                format!(
                    "timeout {}ms is outside 1000-300000ms",
                    broker.timeout.as_millis()
                ),
            ));
        }
        if broker.retry_attempts > 10 {
            warnings.push(ConfigWarning::new(
                "retry_attempts",
                format!("{} retry attempts is more than 10", broker.retry_attempts),
            ));
        }
        if broker.retry_delay < Duration::from_millis(100)
            || broker.retry_delay > Duration::from_secs(60)
        {
            warnings.push(ConfigWarning::new(
                "retry_delay",
                format!(
                    "retry delay {}ms is outside 100-60000ms",
                    broker.retry_delay.as_millis()
                ),
            ));
        }
        if broker.health_check && broker.health_check_interval < Duration::from_secs(1) {
            warnings.push(ConfigWarning::new(
                "health_check_interval",
                "health check interval is shorter than 1s",
            ));
        }
        if !LOG_LEVELS.contains(&broker.log_level.to_ascii_lowercase().as_str()) {
            warnings.push(ConfigWarning::new(
                "log_level",
                format!(
                    "unknown log level '{}', expected one of {}",
                    broker.log_level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }
        if Url::parse(&self.service.api_base_url).is_err() {
            warnings.push(ConfigWarning::new(
                "api_base_url",
                format!("malformed API base URL '{}'", self.service.api_base_url),
            ));
        }

        warnings
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
