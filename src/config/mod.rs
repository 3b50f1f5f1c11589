//! # Configuration
//!
//! Layered configuration for the STAPI core: built-in defaults, then
//! `stapi.toml`, then `stapi.<environment>.toml`, then `STAPI__*`
//! environment variables. Later layers win.
//!
//! ```rust,no_run
//! use stapi_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let page_size = manager.config().search.default_limit;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::defaults;
use serde::{Deserialize, Serialize};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StapiConfig {
    pub environment: String,
    /// Opportunity search page sizes
    pub search: PaginationConfig,
    /// Order listing page sizes
    pub orders: PaginationConfig,
    pub events: EventsConfig,
    pub logging: LoggingConfig,
}

/// Page size bounds for a paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast buffer per subscriber; slow subscribers lag past this
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for StapiConfig {
    fn default() -> Self {
        Self {
            environment: defaults::ENVIRONMENT.to_string(),
            search: PaginationConfig::default(),
            orders: PaginationConfig::default(),
            events: EventsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: defaults::PAGE_LIMIT,
            max_limit: defaults::MAX_PAGE_LIMIT,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: defaults::EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json: false,
        }
    }
}

impl PaginationConfig {
    /// The page size to use for a request, or why the requested one is refused.
    pub fn resolve(&self, requested: Option<usize>) -> Result<usize, String> {
        match requested {
            None => Ok(self.default_limit),
            Some(limit) if (1..=self.max_limit).contains(&limit) => Ok(limit),
            Some(limit) => Err(format!(
                "limit {limit} is outside 1..={}",
                self.max_limit
            )),
        }
    }

    fn validate(&self, section: &str) -> ConfigResult<()> {
        if self.default_limit == 0 {
            return Err(ConfigurationError::invalid_value(
                format!("{section}.default_limit"),
                0,
                "page size must be greater than 0",
            ));
        }
        if self.default_limit > self.max_limit {
            return Err(ConfigurationError::invalid_value(
                format!("{section}.default_limit"),
                self.default_limit,
                format!("must not exceed {section}.max_limit ({})", self.max_limit),
            ));
        }
        Ok(())
    }
}

impl StapiConfig {
    /// Validate configuration for consistency and required fields
    pub fn validate(&self) -> ConfigResult<()> {
        if self.environment.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "environment",
                "root configuration",
            ));
        }

        self.search.validate("search")?;
        self.orders.validate("orders")?;

        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                0,
                "channel capacity must be greater than 0",
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "logging.level",
                "logging configuration",
            ));
        }

        Ok(())
    }

    pub fn is_test_environment(&self) -> bool {
        self.environment == "test"
    }

    pub fn is_production_environment(&self) -> bool {
        self.environment == "production"
    }
}
