use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{error::ConfigError, model::Location};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CITY: &str = "Sao Paulo";
pub const DEFAULT_COUNTRY_CODE: &str = "BR";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

pub const ENV_PORT: &str = "PORT";
pub const ENV_API_KEY: &str = "WEATHER_API_KEY";
pub const ENV_CITY: &str = "CITY";
pub const ENV_COUNTRY_CODE: &str = "COUNTRY_CODE";
pub const ENV_WEBHOOK_SECRET: &str = "WEBHOOK_SECRET";
pub const ENV_WEBHOOK_URL: &str = "WEBHOOK_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "POLL_INTERVAL_MS";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";

/// Raw, layered configuration: on-disk TOML first, environment on top.
///
/// Every field is optional here; [`ReceiverConfig::resolve`] and
/// [`PollerConfig::resolve`] decide what is required for each service.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// city = "Recife"
/// country_code = "BR"
/// poll_interval_ms = 300000
/// ```
#[derive(Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub api_key: Option<String>,
    pub city: Option<String>,
    pub country_code: Option<String>,
    pub webhook_secret: Option<String>,
    pub webhook_url: Option<String>,
    pub port: Option<u16>,
    pub poll_interval_ms: Option<u64>,
    pub http_timeout_secs: Option<u64>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("city", &self.city)
            .field("country_code", &self.country_code)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .field("webhook_url", &self.webhook_url)
            .field("port", &self.port)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl Config {
    /// Load config from the default location, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Load config from an explicit path; a missing file is an empty config.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-relay", "weather-relay")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Overlay values from `lookup`; set variables win over file values.
    ///
    /// An empty `WEBHOOK_SECRET` clears the secret, which disables bearer checks.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_API_KEY) {
            self.api_key = Some(v);
        }
        if let Some(v) = lookup(ENV_CITY) {
            self.city = Some(v);
        }
        if let Some(v) = lookup(ENV_COUNTRY_CODE) {
            self.country_code = Some(v);
        }
        if let Some(v) = lookup(ENV_WEBHOOK_SECRET) {
            self.webhook_secret = Some(v);
        }
        if let Some(v) = lookup(ENV_WEBHOOK_URL) {
            self.webhook_url = Some(v);
        }
        if let Some(v) = lookup(ENV_PORT) {
            self.port = Some(parse_number(ENV_PORT, &v)?);
        }
        if let Some(v) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = Some(parse_number(ENV_POLL_INTERVAL_MS, &v)?);
        }
        if let Some(v) = lookup(ENV_HTTP_TIMEOUT_SECS) {
            self.http_timeout_secs = Some(parse_number(ENV_HTTP_TIMEOUT_SECS, &v)?);
        }
        Ok(())
    }

    fn location(&self) -> Location {
        let city = non_empty(self.city.as_deref()).unwrap_or(DEFAULT_CITY);
        let country = non_empty(self.country_code.as_deref()).unwrap_or(DEFAULT_COUNTRY_CODE);
        Location::new(city.trim(), country.trim())
    }

    fn http_timeout(&self) -> Result<Duration, ConfigError> {
        match self.http_timeout_secs {
            Some(0) => Err(ConfigError::Invalid { var: ENV_HTTP_TIMEOUT_SECS, value: "0".into() }),
            Some(secs) => Ok(Duration::from_secs(secs)),
            None => Ok(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
        }
    }
}

/// Settings shared by both services once resolved.
#[derive(Clone)]
pub struct ProviderSettings {
    pub api_key: String,
    pub location: Location,
    pub http_timeout: Duration,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &"<redacted>")
            .field("location", &self.location)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

/// Immutable configuration of the webhook receiver.
#[derive(Clone)]
pub struct ReceiverConfig {
    pub provider: ProviderSettings,
    pub port: u16,
    pub webhook_secret: Option<String>,
}

impl std::fmt::Debug for ReceiverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiverConfig")
            .field("provider", &self.provider)
            .field("port", &self.port)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ReceiverConfig {
    pub fn resolve(cfg: &Config) -> Result<Self, ConfigError> {
        let api_key = non_empty(cfg.api_key.as_deref())
            .ok_or_else(|| ConfigError::Missing(vec![ENV_API_KEY]))?;

        Ok(Self {
            provider: ProviderSettings {
                api_key: api_key.to_owned(),
                location: cfg.location(),
                http_timeout: cfg.http_timeout()?,
            },
            port: cfg.port.unwrap_or(DEFAULT_PORT),
            webhook_secret: non_empty(cfg.webhook_secret.as_deref()).map(str::to_owned),
        })
    }
}

/// Immutable configuration of the webhook poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub provider: ProviderSettings,
    pub webhook_url: String,
    pub interval: Duration,
}

impl PollerConfig {
    /// Both the webhook URL and the API key are required; every missing one is reported.
    pub fn resolve(cfg: &Config) -> Result<Self, ConfigError> {
        let api_key = non_empty(cfg.api_key.as_deref());
        let webhook_url = non_empty(cfg.webhook_url.as_deref());

        let (api_key, webhook_url) = match (api_key, webhook_url) {
            (Some(key), Some(url)) => (key, url),
            (key, url) => {
                let mut missing = Vec::new();
                if url.is_none() {
                    missing.push(ENV_WEBHOOK_URL);
                }
                if key.is_none() {
                    missing.push(ENV_API_KEY);
                }
                return Err(ConfigError::Missing(missing));
            }
        };

        let interval_ms = cfg.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        if interval_ms == 0 {
            return Err(ConfigError::Invalid { var: ENV_POLL_INTERVAL_MS, value: "0".into() });
        }

        Ok(Self {
            provider: ProviderSettings {
                api_key: api_key.to_owned(),
                location: cfg.location(),
                http_timeout: cfg.http_timeout()?,
            },
            webhook_url: webhook_url.to_owned(),
            interval: Duration::from_millis(interval_ms),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { var, value: value.to_owned() })
}
