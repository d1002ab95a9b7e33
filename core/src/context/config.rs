//! Engine configuration
//!
//! Re-exports the shared config types from strata-types and adds confy
//! persistence (`strata/config.toml` in the platform config directory).

use std::path::PathBuf;

pub use strata_types::{EngineConfig, MIN_SCAN_INTERVAL_MS, StoreBackend, StoreConfig};

use super::ConfigError;

const APP_NAME: &str = "strata";
const CONFIG_NAME: &str = "config";

/// Extension trait for EngineConfig persistence
pub trait EngineConfigExt: Sized {
    /// Load the stored config. A missing file yields defaults.
    fn load() -> Result<Self, ConfigError>;

    /// Like [`load`](Self::load), but a broken file also yields defaults.
    fn load_or_default() -> Self;

    fn save(&self) -> Result<(), ConfigError>;

    /// Where [`load`](Self::load) and [`save`](Self::save) read and write.
    fn config_path() -> Result<PathBuf, ConfigError>;

    /// Directory the JSON store keeps its files under.
    fn data_dir(&self) -> PathBuf;

    /// The config as it would appear on disk.
    fn to_toml(&self) -> Result<String, ConfigError>;
}

impl EngineConfigExt for EngineConfig {
    fn load() -> Result<Self, ConfigError> {
        Ok(confy::load(APP_NAME, CONFIG_NAME)?)
    }

    fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Using default engine configuration");
            Self::default()
        })
    }

    fn save(&self) -> Result<(), ConfigError> {
        confy::store(APP_NAME, CONFIG_NAME, self).map_err(ConfigError::Save)
    }

    fn config_path() -> Result<PathBuf, ConfigError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME).map_err(ConfigError::Path)
    }

    fn data_dir(&self) -> PathBuf {
        self.store
            .data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(crate::storage::default_data_dir)
    }

    fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_prefers_the_override() {
        let mut config = EngineConfig::default();
        config.store.data_dir = Some("/srv/strata".to_string());
        assert_eq!(config.data_dir(), PathBuf::from("/srv/strata"));

        config.store.data_dir = None;
        assert!(config.data_dir().ends_with("strata"));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = EngineConfig {
            scan_interval_ms: 250,
            ..EngineConfig::in_memory()
        };
        let text = config.to_toml().unwrap();
        let parsed: EngineConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.scan_interval_ms, 250);
        assert_eq!(parsed.store.backend, StoreBackend::Memory);
    }
}
