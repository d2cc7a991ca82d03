//! Preview configuration

use serde::Deserialize;

use core_kernel::Currency;
use domain_revenue::{FeePolicy, SplitEngineConfig};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Preview configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Log level or filter directive
    pub log_level: String,
    pub log_format: LogFormat,
    /// Who carries processing fees
    pub fee_policy: FeePolicy,
    /// Currency used when the input does not name one
    pub default_currency: Currency,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Plain,
            fee_policy: FeePolicy::MerchantBorne,
            default_currency: Currency::USD,
        }
    }
}

impl PreviewConfig {
    /// Loads configuration from `SPLIT_`-prefixed environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::with_prefix("SPLIT"))
    }

    /// Loads configuration from any source, defaults filling the gaps
    pub fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
    }

    /// The engine settings carried by this configuration
    pub fn engine(&self) -> SplitEngineConfig {
        SplitEngineConfig {
            fee_policy: self.fee_policy,
            default_currency: self.default_currency,
        }
    }
}
