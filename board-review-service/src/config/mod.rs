use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_ANTHROPIC_API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_ANALYZE_MAX_TOKENS: u32 = 4096;
const DEFAULT_CHAT_MAX_TOKENS: u32 = 1000;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 120;
/// 10 MiB; base64-encoded board packs are routinely several megabytes.
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ReviewConfig {
    pub common: core_config::Config,
    pub anthropic: AnthropicConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// Server-held credential. `None` leaves only the caller-supplied key routes usable.
    pub api_key: Option<Secret<String>>,
    pub base_url: String,
    pub api_version: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub analyze_max_tokens: u32,
    pub chat_max_tokens: u32,
    pub max_body_bytes: usize,
}

impl AnthropicConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ReviewConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(ReviewConfig {
            common: common_config,
            anthropic: AnthropicConfig {
                api_key: env::var("ANTHROPIC_API_KEY")
                    .ok()
                    .filter(|k| !k.trim().is_empty())
                    .map(Secret::new),
                base_url: get_env(
                    "ANTHROPIC_BASE_URL",
                    Some(DEFAULT_ANTHROPIC_BASE_URL),
                    is_prod,
                )?,
                api_version: get_env(
                    "ANTHROPIC_API_VERSION",
                    Some(DEFAULT_ANTHROPIC_API_VERSION),
                    is_prod,
                )?,
                model: get_env("ANTHROPIC_MODEL", Some(DEFAULT_MODEL), is_prod)?,
                timeout_secs: get_parsed(
                    "UPSTREAM_TIMEOUT_SECS",
                    DEFAULT_UPSTREAM_TIMEOUT_SECS,
                    is_prod,
                )?,
            },
            limits: LimitsConfig {
                analyze_max_tokens: get_parsed(
                    "ANALYZE_MAX_TOKENS",
                    DEFAULT_ANALYZE_MAX_TOKENS,
                    is_prod,
                )?,
                chat_max_tokens: get_parsed("CHAT_MAX_TOKENS", DEFAULT_CHAT_MAX_TOKENS, is_prod)?,
                max_body_bytes: get_parsed("MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES, is_prod)?,
            },
        })
    }

    pub fn has_server_credential(&self) -> bool {
        self.anthropic.api_key.is_some()
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn get_parsed<T>(key: &str, default: T, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr + ToString,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(&default.to_string()), is_prod)?
        .trim()
        .parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e)))
}
