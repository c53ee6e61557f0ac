//! Engine configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockflow_documents::FulfillmentPolicy;
use stockflow_observability::LogFormat;

pub const ENV_FULFILLMENT_POLICY: &str = "STOCKFLOW_FULFILLMENT_POLICY";
pub const ENV_DOCUMENT_RETRY_LIMIT: &str = "STOCKFLOW_DOCUMENT_RETRY_LIMIT";
pub const ENV_LOG_FORMAT: &str = "STOCKFLOW_LOG_FORMAT";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Applied to every document created through the workflow.
    pub fulfillment_policy: FulfillmentPolicy,
    /// Extra attempts after losing a per-document optimistic check.
    pub document_retry_limit: u32,
    pub log_format: LogFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fulfillment_policy: FulfillmentPolicy::Strict,
            document_retry_limit: 3,
            log_format: LogFormat::Json,
        }
    }
}

impl EngineConfig {
    /// Read overrides from `STOCKFLOW_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`], reading through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_FULFILLMENT_POLICY) {
            config.fulfillment_policy = match raw.trim().to_ascii_lowercase().as_str() {
                "strict" => FulfillmentPolicy::Strict,
                "lenient" => FulfillmentPolicy::Lenient,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: ENV_FULFILLMENT_POLICY,
                        value: raw,
                        reason: "expected 'strict' or 'lenient'".to_string(),
                    });
                }
            };
        }

        if let Some(raw) = lookup(ENV_DOCUMENT_RETRY_LIMIT) {
            config.document_retry_limit =
                raw.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                    key: ENV_DOCUMENT_RETRY_LIMIT,
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
        }

        if let Some(raw) = lookup(ENV_LOG_FORMAT) {
            config.log_format = raw.parse().map_err(|e: stockflow_observability::ParseLogFormatError| {
                ConfigError::Invalid {
                    key: ENV_LOG_FORMAT,
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        Ok(config)
    }
}
