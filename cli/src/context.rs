use std::sync::Arc;

use strata_core::context::{EngineConfig, EngineConfigExt};
use strata_core::engine::{EffectEngine, EngineError};
use strata_core::host::InMemoryHost;

/// Holds all shared state for the admin shell.
///
/// Entities are simulated by an [`InMemoryHost`]; `connect`/`disconnect`
/// stand in for players joining and leaving.
pub struct CliContext {
    pub engine: EffectEngine,
    pub host: Arc<InMemoryHost>,
}

impl CliContext {
    /// Start an engine from the stored configuration.
    pub async fn start() -> Result<Self, EngineError> {
        Self::with_config(EngineConfig::load_or_default()).await
    }

    pub async fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        let host = Arc::new(InMemoryHost::new());
        let engine = EffectEngine::start(config, host.clone()).await?;
        Ok(Self { engine, host })
    }

    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    pub async fn shutdown(self) {
        self.engine.shutdown().await;
    }
}
