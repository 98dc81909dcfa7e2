use std::env;
use std::time::Duration;

use crate::ConfigError;

const DEFAULT_TABLE_NAME: &str = "CloudFacts";
const DEFAULT_REGION: &str = "eu-north-1";
const DEFAULT_MODEL_NAME_MARKER: &str = "claude-3-7-sonnet";
const DEFAULT_DISCOVERY_PAGE_SIZE: i32 = 100;
const MAX_DISCOVERY_PAGE_SIZE: i32 = 1000;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 3600;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Process configuration, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Fact table to scan.
    pub table_name: String,
    /// Operator-supplied model id or ARN. When set, discovery never runs.
    pub model_id_override: Option<String>,
    /// Region shared by the store, discovery and runtime clients.
    pub region: String,
    /// Case-insensitive substring a profile name must contain to match.
    pub model_name_marker: String,
    pub discovery_page_size: i32,
    /// How long a discovered model id is reused. `None` disables caching.
    pub model_cache_ttl: Option<Duration>,
    pub read_timeout: Duration,
    pub max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            model_id_override: None,
            region: DEFAULT_REGION.to_string(),
            model_name_marker: DEFAULT_MODEL_NAME_MARKER.to_string(),
            discovery_page_size: DEFAULT_DISCOVERY_PAGE_SIZE,
            model_cache_ttl: None,
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl Config {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let discovery_page_size = match get("DISCOVERY_PAGE_SIZE") {
            Some(raw) => {
                let size = parse::<i32>("DISCOVERY_PAGE_SIZE", &raw)?;
                if !(1..=MAX_DISCOVERY_PAGE_SIZE).contains(&size) {
                    return Err(ConfigError::Invalid {
                        var: "DISCOVERY_PAGE_SIZE",
                        message: format!("{size} is outside 1..={MAX_DISCOVERY_PAGE_SIZE}"),
                    });
                }
                size
            }
            None => defaults.discovery_page_size,
        };

        let model_cache_ttl = match get("MODEL_CACHE_TTL_SECS") {
            Some(raw) => match parse::<u64>("MODEL_CACHE_TTL_SECS", &raw)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            None => None,
        };

        let read_timeout = match get("BEDROCK_READ_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse::<u64>("BEDROCK_READ_TIMEOUT_SECS", &raw)?),
            None => defaults.read_timeout,
        };

        let max_attempts = match get("BEDROCK_MAX_ATTEMPTS") {
            Some(raw) => match parse::<u32>("BEDROCK_MAX_ATTEMPTS", &raw)? {
                0 => {
                    return Err(ConfigError::Invalid {
                        var: "BEDROCK_MAX_ATTEMPTS",
                        message: "must be at least 1".to_string(),
                    })
                }
                n => n,
            },
            None => defaults.max_attempts,
        };

        Ok(Self {
            table_name: get("TABLE_NAME").unwrap_or(defaults.table_name),
            model_id_override: get("MODEL_ID"),
            region: get("FACTS_REGION").unwrap_or(defaults.region),
            model_name_marker: get("MODEL_NAME_MARKER")
                .map(|m| m.to_lowercase())
                .unwrap_or(defaults.model_name_marker),
            discovery_page_size,
            model_cache_ttl,
            read_timeout,
            max_attempts,
        })
    }
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::Invalid {
        var,
        message: format!("{raw:?}: {e}"),
    })
}
