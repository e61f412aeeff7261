//! # Application State and Configuration
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor. The registry and the quote manager share one
//! RuleSet store and one compatibility checker.

use std::sync::Arc;

use thiserror::Error;

use ratebook_schema::{CompatibilityChecker, SchemaCompatibilityError, SchemaVersion};
use ratebook_state::{InMemoryRuleSetStore, RegistryError, RuleSetRegistry};
use ratebook_quote::QuoteManager;

// -- Configuration ------------------------------------------------------------

/// Log output format for the server binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Errors raised while reading configuration from the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("PORT must be a port number, got \"{0}\"")]
    InvalidPort(String),

    #[error("RATEBOOK_SUPPORTED_SCHEMAS: {0}")]
    InvalidSchema(#[from] SchemaCompatibilityError),

    #[error("RATEBOOK_SUPPORTED_SCHEMAS must name at least one schema version")]
    NoSchemas,

    #[error("RATEBOOK_LOG_FORMAT must be \"text\" or \"json\", got \"{0}\"")]
    InvalidLogFormat(String),
}

/// Server configuration. Holds no secrets, so `Debug` output is safe to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    /// Schema versions the evaluator accepts natively.
    pub supported_schemas: Vec<SchemaVersion>,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            supported_schemas: vec![SchemaVersion::new(1, 0, 0), SchemaVersion::new(1, 1, 0)],
            log_format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    /// Read `PORT`, `RATEBOOK_SUPPORTED_SCHEMAS` and `RATEBOOK_LOG_FORMAT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset variables keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }

        if let Some(list) = lookup("RATEBOOK_SUPPORTED_SCHEMAS") {
            let versions = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse::<SchemaVersion>)
                .collect::<Result<Vec<SchemaVersion>, _>>()?;
            if versions.is_empty() {
                return Err(ConfigError::NoSchemas);
            }
            config.supported_schemas = versions;
        }

        if let Some(format) = lookup("RATEBOOK_LOG_FORMAT") {
            config.log_format = match format.trim().to_ascii_lowercase().as_str() {
                "" | "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => return Err(ConfigError::InvalidLogFormat(format)),
            };
        }

        Ok(config)
    }

    /// Compatibility checker for the configured versions, with the standard
    /// shims registered.
    pub fn checker(&self) -> CompatibilityChecker {
        CompatibilityChecker::new(self.supported_schemas.iter().copied()).with_standard_shims()
    }
}

// -- Application State --------------------------------------------------------

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: RuleSetRegistry,
    pub quotes: QuoteManager,
}

impl AppState {
    /// State with the default configuration and empty in-memory stores.
    pub fn new() -> Result<Self, RegistryError> {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Result<Self, RegistryError> {
        let registry = RuleSetRegistry::new(Arc::new(InMemoryRuleSetStore::new()), config.checker())?;
        let quotes = QuoteManager::new(registry.clone());
        Ok(Self {
            config: Arc::new(config),
            registry,
            quotes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn reads_every_variable() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "9090"),
            ("RATEBOOK_SUPPORTED_SCHEMAS", "1.0.0, 1.1.0,1.2.0"),
            ("RATEBOOK_LOG_FORMAT", "JSON"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.supported_schemas.len(), 3);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("PORT", "eighty")])),
            Err(ConfigError::InvalidPort(_))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("RATEBOOK_SUPPORTED_SCHEMAS", "1.0")])),
            Err(ConfigError::InvalidSchema(_))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("RATEBOOK_SUPPORTED_SCHEMAS", " , ")])),
            Err(ConfigError::NoSchemas)
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("RATEBOOK_LOG_FORMAT", "xml")])),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn checker_honours_configured_versions() {
        let config = AppConfig {
            supported_schemas: vec![SchemaVersion::new(2, 0, 0)],
            ..AppConfig::default()
        };
        let checker = config.checker();
        assert_eq!(
            checker.supported().copied().collect::<Vec<_>>(),
            vec![SchemaVersion::new(2, 0, 0)]
        );
    }
}
