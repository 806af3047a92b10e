use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_HISTORY_LIMIT: usize = 10;
const DEFAULT_RATE_LIMIT: u32 = 10;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub data_folder: PathBuf,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub chat_history_limit: usize,
    pub rate_limit_per_minute: u32,
}

impl Config {
    /// Reads the configuration from the process environment.
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        Ok(Self {
            telegram_token: required("TELEGRAM_BOT_TOKEN")?,
            data_folder: PathBuf::from(required("WORKDIR")?),
            llm_api_key: required("LLM_API_KEY")?,
            llm_base_url: lookup("LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            llm_model: lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            chat_history_limit: parse_or(&lookup, "CHAT_HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT)?,
            rate_limit_per_minute: parse_or(&lookup, "RATE_LIMIT_PER_MINUTE", DEFAULT_RATE_LIMIT)?,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_folder.join("sqlitedata").join("journal.db")
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}
