mod background_tasks;
mod config;
mod error;

pub use background_tasks::BackgroundTasks;
pub use config::{EngineConfig, EngineConfigExt, MIN_SCAN_INTERVAL_MS, StoreBackend, StoreConfig};
pub use error::ConfigError;
