//! Configuration Loader
//!
//! Environment-aware loading on top of the `config` crate. Files are TOML and
//! optional; a missing environment file simply contributes nothing.

use super::error::{ConfigResult, ConfigurationError};
use super::StapiConfig;
use crate::constants::defaults;
use config::{Config, Environment, File};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE: &str = "stapi.toml";
const ENV_PREFIX: &str = "STAPI";
const ENV_SEPARATOR: &str = "__";

/// Loaded, validated configuration plus where it came from.
#[derive(Debug)]
pub struct ConfigManager {
    config: StapiConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// `STAPI__*` variables are read from the process environment.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(config_dir, environment, None)
    }

    /// Like [`Self::load_from_directory_with_env`], but the variable layer
    /// comes from `variables` instead of the process environment. Useful for
    /// tests that must not touch global state.
    pub fn load_with_variables(
        config_dir: Option<PathBuf>,
        environment: &str,
        variables: HashMap<String, String>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(config_dir, environment, Some(variables))
    }

    fn build(
        config_dir: Option<PathBuf>,
        environment: &str,
        variables: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let explicit_directory = config_dir.is_some();
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);
        if explicit_directory && !config_directory.is_dir() {
            return Err(ConfigurationError::DirectoryNotFound {
                path: config_directory,
            });
        }

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config: StapiConfig = Config::builder()
            .add_source(Config::try_from(&StapiConfig::default())?)
            .add_source(File::from(config_directory.join(BASE_FILE)).required(false))
            .add_source(
                File::from(config_directory.join(Self::environment_file_name(environment)))
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(variables),
            )
            .set_override("environment", environment)?
            .build()?
            .try_deserialize()?;

        config.validate()?;

        info!(
            environment = %environment,
            config_directory = %config_directory.display(),
            search_limit = config.search.default_limit,
            orders_limit = config.orders.default_limit,
            "🔧 CONFIG: Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &StapiConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment: `STAPI_ENV`, then `APP_ENV`, then `development`
    pub fn detect_environment() -> String {
        Self::detect_environment_from(|name| env::var(name).ok())
    }

    fn detect_environment_from(lookup: impl Fn(&str) -> Option<String>) -> String {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        non_empty("STAPI_ENV")
            .or_else(|| non_empty("APP_ENV"))
            .unwrap_or_else(|| defaults::ENVIRONMENT.to_string())
            .trim()
            .to_lowercase()
    }

    fn default_config_directory() -> PathBuf {
        env::var("STAPI_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(defaults::CONFIG_DIRECTORY))
    }

    fn environment_file_name(environment: &str) -> String {
        format!("stapi.{environment}.toml")
    }
}
