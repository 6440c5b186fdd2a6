use crate::errors::ConfigError;
use std::{env, path::PathBuf, str::FromStr, time::Duration};
use tracing::info;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_DATA_PATH: &str = "data/campus.json";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-5";
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiMode {
    Live,
    Stub,
}

impl FromStr for AiMode {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(AiMode::Live),
            "stub" | "mock" => Ok(AiMode::Stub),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub mode: AiMode,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub ai: AiConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = parse_or(get("PORT"), "PORT", DEFAULT_PORT)?;
        let data_path = get("APP_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));

        let api_key = get("OPENAI_API_KEY");
        let mode = match get("AI_MODE") {
            Some(value) => value.parse::<AiMode>().map_err(|_| ConfigError::Invalid {
                key: "AI_MODE",
                value,
            })?,
            None if api_key.is_some() => AiMode::Live,
            None => {
                info!("OPENAI_API_KEY not set, AI features run in stub mode");
                AiMode::Stub
            }
        };
        if mode == AiMode::Live && api_key.is_none() {
            return Err(ConfigError::MissingApiKey);
        }

        let timeout_secs = parse_or(get("AI_TIMEOUT_SECS"), "AI_TIMEOUT_SECS", DEFAULT_AI_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "AI_TIMEOUT_SECS",
                value: timeout_secs.to_string(),
            });
        }

        Ok(Self {
            port,
            data_path,
            ai: AiConfig {
                mode,
                api_key,
                base_url: get("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
