use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_YAHOO_QUERY_URL: &str = "https://query2.finance.yahoo.com";
pub const DEFAULT_YAHOO_COOKIE_URL: &str = "https://fc.yahoo.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

// Upstream endpoints for the Yahoo client
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct YahooEndpoints {
    pub query_url: String,
    pub cookie_url: String,
}

impl Default for YahooEndpoints {
    fn default() -> Self {
        Self {
            query_url: DEFAULT_YAHOO_QUERY_URL.to_string(),
            cookie_url: DEFAULT_YAHOO_COOKIE_URL.to_string(),
        }
    }
}

// YAML-serializable configuration structure
#[derive(Serialize, Deserialize, Debug)]
pub struct ConfigYaml {
    pub node_name: Option<String>,
    pub environment: Option<String>,
    pub port: Option<u16>,
    pub api_key: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub rate_limit_period_ms: Option<u64>,
    pub rate_limit_burst: Option<u32>,
    pub yahoo_query_url: Option<String>,
    pub yahoo_cookie_url: Option<String>,
}

// Holds application-wide settings
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub node_name: String,
    pub environment: String,
    pub port: u16,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub rate_limit_period: Duration,
    pub rate_limit_burst: u32,
    pub yahoo: YahooEndpoints,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_name: "yfinance-proxy".to_string(),
            environment: "development".to_string(),
            port: 8000,
            api_key: None,
            request_timeout: Duration::from_secs(30),
            rate_limit_period: Duration::from_millis(100),
            rate_limit_burst: 20,
            yahoo: YahooEndpoints::default(),
        }
    }
}

impl AppConfig {
    // Load configuration from YAML file or environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Check for CONFIG_FILE environment variable first
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            Self::from_yaml(&config_file)
        } else {
            Ok(Self::from_env())
        }
    }

    // Load configuration from YAML file, missing keys take defaults
    pub fn from_yaml(file_path: &str) -> Result<Self, ConfigError> {
        let yaml_content = fs::read_to_string(file_path).map_err(|source| ConfigError::Read {
            path: file_path.to_string(),
            source,
        })?;

        let yaml_config: ConfigYaml =
            serde_yaml::from_str(&yaml_content).map_err(|source| ConfigError::Parse {
                path: file_path.to_string(),
                source,
            })?;

        Ok(Self::from_parts(yaml_config))
    }

    // Load all configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok(); // Load .env file if present

        let parsed = |name: &str| env::var(name).ok().and_then(|s| s.parse().ok());

        Self::from_parts(ConfigYaml {
            node_name: env::var("NODE_NAME").ok(),
            environment: env::var("ENVIRONMENT").ok(),
            port: parsed("PORT").and_then(|p: u64| u16::try_from(p).ok()),
            api_key: env::var("API_KEY").ok(),
            request_timeout_secs: parsed("REQUEST_TIMEOUT"),
            rate_limit_period_ms: parsed("RATE_LIMIT_PERIOD_MS"),
            rate_limit_burst: parsed("RATE_LIMIT_BURST").and_then(|b: u64| u32::try_from(b).ok()),
            yahoo_query_url: env::var("YAHOO_QUERY_URL").ok(),
            yahoo_cookie_url: env::var("YAHOO_COOKIE_URL").ok(),
        })
    }

    fn from_parts(raw: ConfigYaml) -> Self {
        let defaults = Self::default();

        Self {
            node_name: raw.node_name.unwrap_or(defaults.node_name),
            environment: raw.environment.unwrap_or(defaults.environment),
            port: raw.port.unwrap_or(defaults.port),
            // An empty key would accept an empty header, treat it as unset
            api_key: raw.api_key.filter(|k| !k.is_empty()),
            request_timeout: raw
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            rate_limit_period: raw
                .rate_limit_period_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.rate_limit_period),
            rate_limit_burst: raw.rate_limit_burst.unwrap_or(defaults.rate_limit_burst),
            yahoo: YahooEndpoints {
                query_url: raw
                    .yahoo_query_url
                    .map(|u| u.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.yahoo.query_url),
                cookie_url: raw.yahoo_cookie_url.unwrap_or(defaults.yahoo.cookie_url),
            },
        }
    }

    pub fn rate_limit_enabled(&self) -> bool {
        !self.rate_limit_period.is_zero() && self.rate_limit_burst > 0
    }
}
