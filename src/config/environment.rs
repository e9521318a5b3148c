// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses LLM endpoint and product lookup settings from environment variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriJudge

//! Environment-based configuration management
//!
//! All configuration is environment-only: there are no config files. The
//! single required variable is the LLM API key; everything else falls back
//! to sensible defaults.

use crate::errors::{AppError, AppResult, ErrorCode};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::info;
use url::Url;

/// Strongly typed log level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error level - only critical errors
    Error,
    /// Warning level - potential issues
    Warn,
    /// Info level - normal operational messages (default)
    #[default]
    Info,
    /// Debug level - detailed debugging information
    Debug,
    /// Trace level - very verbose tracing
    Trace,
}

impl LogLevel {
    /// Convert to `tracing::Level`
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
            Self::Trace => tracing::Level::TRACE,
        }
    }

    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info, // Default fallback (including "info")
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Deployment environment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment (default)
    #[default]
    Development,
    /// Production environment
    Production,
    /// Testing environment for automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development, // Default fallback (including "development" | "dev")
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Environment variable for the deployment environment
const ENVIRONMENT_ENV: &str = "NUTRIJUDGE_ENV";

/// Environment variable for the LLM API base URL
const LLM_BASE_URL_ENV: &str = "NUTRIJUDGE_LLM_BASE_URL";

/// Environment variable for the LLM API key (required)
const LLM_API_KEY_ENV: &str = "NUTRIJUDGE_LLM_API_KEY";

/// Environment variable for the grading model id
const GRADING_MODEL_ENV: &str = "NUTRIJUDGE_GRADING_MODEL";

/// Environment variable for the conversational model id
const CHAT_MODEL_ENV: &str = "NUTRIJUDGE_CHAT_MODEL";

/// Environment variable for the vision model id
const VISION_MODEL_ENV: &str = "NUTRIJUDGE_VISION_MODEL";

/// Environment variable for the Open Food Facts base URL
const LOOKUP_BASE_URL_ENV: &str = "OPENFOODFACTS_BASE_URL";

/// Environment variable for the lookup cache TTL in seconds
const LOOKUP_CACHE_TTL_ENV: &str = "OPENFOODFACTS_CACHE_TTL_SECS";

/// Environment variable for the lookup rate limit per minute
const LOOKUP_RATE_LIMIT_ENV: &str = "OPENFOODFACTS_RATE_LIMIT_PER_MINUTE";

/// Environment variable for the lookup User-Agent header
const LOOKUP_USER_AGENT_ENV: &str = "OPENFOODFACTS_USER_AGENT";

/// Default OpenAI-compatible endpoint
const DEFAULT_LLM_BASE_URL: &str = "https://api.tokenfactory.nebius.com/v1";

/// Default model for the grading call (JSON mode)
const DEFAULT_GRADING_MODEL: &str = "meta-llama/Llama-3.3-70B-Instruct-fast";

/// Default model for conversational turns
const DEFAULT_CHAT_MODEL: &str = "moonshotai/Kimi-K2-Instruct";

/// Default model for turns carrying an image attachment
const DEFAULT_VISION_MODEL: &str = "Qwen/Qwen2.5-VL-72B-Instruct";

/// Default Open Food Facts host
const DEFAULT_LOOKUP_BASE_URL: &str = "https://world.openfoodfacts.org";

/// Default lookup cache TTL (24 hours)
const DEFAULT_LOOKUP_CACHE_TTL_SECS: u64 = 86_400;

/// Default lookup rate limit (Open Food Facts asks for <= 100 product reqs/min)
const DEFAULT_LOOKUP_RATE_LIMIT_PER_MINUTE: u32 = 100;

/// LLM endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible endpoint
    pub base_url: String,
    /// API key sent as a bearer token
    pub api_key: String,
    /// Model used for the grading call
    pub grading_model: String,
    /// Model used for conversational turns (including topic kickoff)
    pub chat_model: String,
    /// Model used when a turn carries an image attachment
    pub vision_model: String,
}

/// Product lookup (Open Food Facts) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductLookupConfig {
    /// Base URL of the Open Food Facts host
    pub base_url: String,
    /// Cache TTL in seconds for product responses
    pub cache_ttl_secs: u64,
    /// Rate limit per minute
    pub rate_limit_per_minute: u32,
    /// User-Agent header value (Open Food Facts requires one)
    pub user_agent: String,
}

impl Default for ProductLookupConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LOOKUP_BASE_URL.to_owned(),
            cache_ttl_secs: DEFAULT_LOOKUP_CACHE_TTL_SECS,
            rate_limit_per_minute: DEFAULT_LOOKUP_RATE_LIMIT_PER_MINUTE,
            user_agent: default_user_agent(),
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment
    pub environment: Environment,
    /// Log level
    pub log_level: LogLevel,
    /// LLM endpoint configuration
    pub llm: LlmConfig,
    /// Product lookup configuration
    pub lookup: ProductLookupConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigMissing` if the LLM API key is unset, or
    /// `ConfigInvalid` if a provided value fails validation.
    pub fn from_env() -> AppResult<Self> {
        let environment = Environment::from_str_or_default(
            &env::var(ENVIRONMENT_ENV).unwrap_or_default(),
        );
        let log_level =
            LogLevel::from_str_or_default(&env::var("RUST_LOG").unwrap_or_default());

        let api_key = env::var(LLM_API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                AppError::new(
                    ErrorCode::ConfigMissing,
                    format!("{LLM_API_KEY_ENV} must be set"),
                )
            })?;

        let config = Self {
            environment,
            log_level,
            llm: LlmConfig {
                base_url: env_or(LLM_BASE_URL_ENV, DEFAULT_LLM_BASE_URL),
                api_key,
                grading_model: env_or(GRADING_MODEL_ENV, DEFAULT_GRADING_MODEL),
                chat_model: env_or(CHAT_MODEL_ENV, DEFAULT_CHAT_MODEL),
                vision_model: env_or(VISION_MODEL_ENV, DEFAULT_VISION_MODEL),
            },
            lookup: ProductLookupConfig {
                base_url: env_or(LOOKUP_BASE_URL_ENV, DEFAULT_LOOKUP_BASE_URL),
                cache_ttl_secs: env_parsed(LOOKUP_CACHE_TTL_ENV, DEFAULT_LOOKUP_CACHE_TTL_SECS)?,
                rate_limit_per_minute: env_parsed(
                    LOOKUP_RATE_LIMIT_ENV,
                    DEFAULT_LOOKUP_RATE_LIMIT_PER_MINUTE,
                )?,
                user_agent: env_or(LOOKUP_USER_AGENT_ENV, &default_user_agent()),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the loaded configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for malformed URLs or zero limits.
    pub fn validate(&self) -> AppResult<()> {
        for (label, value) in [
            ("LLM base URL", &self.llm.base_url),
            ("lookup base URL", &self.lookup.base_url),
        ] {
            Url::parse(value).map_err(|e| {
                AppError::new(
                    ErrorCode::ConfigInvalid,
                    format!("{label} {value:?} is not a valid URL: {e}"),
                )
            })?;
        }

        if self.lookup.rate_limit_per_minute == 0 {
            return Err(AppError::new(
                ErrorCode::ConfigInvalid,
                "lookup rate limit must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Log a configuration summary for operators (secrets redacted)
    pub fn log_summary(&self) {
        info!(
            environment = %self.environment,
            log.level = %self.log_level,
            llm.base_url = %self.llm.base_url,
            llm.grading_model = %self.llm.grading_model,
            llm.chat_model = %self.llm.chat_model,
            llm.vision_model = %self.llm.vision_model,
            lookup.base_url = %self.lookup.base_url,
            lookup.cache_ttl_secs = %self.lookup.cache_ttl_secs,
            lookup.rate_limit_per_minute = %self.lookup.rate_limit_per_minute,
            "Configuration loaded"
        );
    }
}

/// Read an environment variable with a default fallback
fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Read and parse an environment variable with a default fallback
fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| {
            AppError::new(
                ErrorCode::ConfigInvalid,
                format!("{key} value {raw:?} could not be parsed"),
            )
        }),
        Err(_) => Ok(default),
    }
}

/// Default User-Agent for Open Food Facts requests
fn default_user_agent() -> String {
    format!(
        "nutrijudge/{} (+https://github.com/nutrijudge/nutrijudge)",
        env!("CARGO_PKG_VERSION")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            ENVIRONMENT_ENV,
            LLM_BASE_URL_ENV,
            LLM_API_KEY_ENV,
            GRADING_MODEL_ENV,
            CHAT_MODEL_ENV,
            VISION_MODEL_ENV,
            LOOKUP_BASE_URL_ENV,
            LOOKUP_CACHE_TTL_ENV,
            LOOKUP_RATE_LIMIT_ENV,
            LOOKUP_USER_AGENT_ENV,
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_requires_api_key() {
        clear_env();
        let err = AppConfig::from_env().unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigMissing);
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        std::env::set_var(LLM_API_KEY_ENV, "test-key");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.llm.base_url, DEFAULT_LLM_BASE_URL);
        assert_eq!(config.llm.grading_model, DEFAULT_GRADING_MODEL);
        assert_eq!(config.lookup.base_url, DEFAULT_LOOKUP_BASE_URL);
        assert_eq!(config.lookup.cache_ttl_secs, DEFAULT_LOOKUP_CACHE_TTL_SECS);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_url() {
        clear_env();
        std::env::set_var(LLM_API_KEY_ENV, "test-key");
        std::env::set_var(LOOKUP_BASE_URL_ENV, "not a url");

        let err = AppConfig::from_env().unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalid);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_unparsable_ttl() {
        clear_env();
        std::env::set_var(LLM_API_KEY_ENV, "test-key");
        std::env::set_var(LOOKUP_CACHE_TTL_ENV, "soon");

        let err = AppConfig::from_env().unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalid);

        clear_env();
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str_or_default("DEBUG"), LogLevel::Debug);
        assert_eq!(LogLevel::from_str_or_default("bogus"), LogLevel::Info);
    }

    #[test]
    fn test_environment_parsing() {
        assert!(Environment::from_str_or_default("prod").is_production());
        assert_eq!(
            Environment::from_str_or_default(""),
            Environment::Development
        );
    }

    #[test]
    fn test_validate_rejects_zero_rate_limit() {
        let config = AppConfig {
            environment: Environment::Testing,
            log_level: LogLevel::Info,
            llm: LlmConfig {
                base_url: DEFAULT_LLM_BASE_URL.to_owned(),
                api_key: "k".to_owned(),
                grading_model: DEFAULT_GRADING_MODEL.to_owned(),
                chat_model: DEFAULT_CHAT_MODEL.to_owned(),
                vision_model: DEFAULT_VISION_MODEL.to_owned(),
            },
            lookup: ProductLookupConfig {
                rate_limit_per_minute: 0,
                ..ProductLookupConfig::default()
            },
        };

        assert!(config.validate().is_err());
    }
}
