//! Shared configuration types for Strata
//!
//! This crate contains serializable configuration types that are shared between
//! the engine (strata-core) and the admin shell (strata-cli).

use serde::{Deserialize, Serialize};
use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

/// Which persistence backend holds the durable copy of effect records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local map. Effects do not survive a restart.
    Memory,
    /// One JSON document per owner under the data directory.
    #[default]
    Json,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Overrides the platform data directory when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Smallest scan interval accepted; anything lower is raised to this.
pub const MIN_SCAN_INTERVAL_MS: u64 = 50;

/// Top-level engine configuration (`strata/config.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How often the expiration scanner ticks every connected owner.
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// Longest duration an effect may be applied with. Longer requests are
    /// shortened to this value.
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,

    #[serde(default)]
    pub store: StoreConfig,
}

fn default_scan_interval_ms() -> u64 {
    1000
}

fn default_max_duration_ms() -> u64 {
    // one week
    7 * 24 * 60 * 60 * 1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: default_scan_interval_ms(),
            max_duration_ms: default_max_duration_ms(),
            store: StoreConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Scan interval with the lower bound applied.
    pub fn effective_scan_interval_ms(&self) -> u64 {
        self.scan_interval_ms.max(MIN_SCAN_INTERVAL_MS)
    }

    /// Config for an ephemeral engine that keeps nothing on disk.
    pub fn in_memory() -> Self {
        Self {
            store: StoreConfig {
                backend: StoreBackend::Memory,
                data_dir: None,
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.scan_interval_ms, 1000);
        assert_eq!(config.store.backend, StoreBackend::Json);
        assert!(config.store.data_dir.is_none());
    }

    #[test]
    fn scan_interval_has_floor() {
        let config = EngineConfig {
            scan_interval_ms: 5,
            ..EngineConfig::default()
        };
        assert_eq!(config.effective_scan_interval_ms(), MIN_SCAN_INTERVAL_MS);
    }

    #[test]
    fn backend_uses_snake_case() {
        let config: StoreConfig = serde_json::from_str(r#"{"backend":"memory"}"#).unwrap();
        assert_eq!(config.backend, StoreBackend::Memory);
    }
}
