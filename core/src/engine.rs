//! Engine startup and shutdown
//!
//! Wires the store, the persistence writer, the manager and the scanner
//! together. Nothing here is global: every collaborator is built or passed
//! in explicitly and owned by the [`EffectEngine`].

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::context::{BackgroundTasks, EngineConfig};
use crate::effects::{EffectStackManager, ExpirationScanner};
use crate::host::{AttributeHost, MailboxExecutor, OwnerExecutor};
use crate::storage::{self, EffectStore, PersistenceWriter, StorageError};

/// Errors during engine startup
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to open effect store")]
    Store(#[from] StorageError),
}

/// Optional collaborators for [`EffectEngine::start_with`].
///
/// Anything left unset falls back to the default: a [`MailboxExecutor`],
/// the store named by the config, and the system clock.
#[derive(Default)]
pub struct EngineParts {
    pub executor: Option<Arc<dyn OwnerExecutor>>,
    pub store: Option<Arc<dyn EffectStore>>,
    pub clock: Option<Arc<dyn Clock>>,
}

pub struct EffectEngine {
    config: EngineConfig,
    manager: Arc<EffectStackManager>,
    /// Set when the engine built its own executor
    mailboxes: Option<Arc<MailboxExecutor>>,
    tasks: BackgroundTasks,
}

impl EffectEngine {
    /// Start with default collaborators.
    pub async fn start(config: EngineConfig, host: Arc<dyn AttributeHost>) -> Result<Self, EngineError> {
        Self::start_with(config, host, EngineParts::default()).await
    }

    pub async fn start_with(
        config: EngineConfig,
        host: Arc<dyn AttributeHost>,
        parts: EngineParts,
    ) -> Result<Self, EngineError> {
        let store = match parts.store {
            Some(store) => store,
            None => storage::open_store(&config.store).await?,
        };
        let (mailboxes, executor): (Option<Arc<MailboxExecutor>>, Arc<dyn OwnerExecutor>) =
            match parts.executor {
                Some(executor) => (None, executor),
                None => {
                    let mailboxes = Arc::new(MailboxExecutor::new());
                    let executor: Arc<dyn OwnerExecutor> = mailboxes.clone();
                    (Some(mailboxes), executor)
                }
            };
        let clock = parts
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let (persistence, writer) = PersistenceWriter::spawn(store);
        let manager = Arc::new(
            EffectStackManager::new(host, executor, persistence, clock)
                .with_max_duration(config.max_duration_ms),
        );

        let interval = Duration::from_millis(config.effective_scan_interval_ms());
        let scanner = ExpirationScanner::spawn(manager.clone(), interval);

        tracing::info!(
            backend = %config.store.backend,
            scan_interval_ms = config.effective_scan_interval_ms(),
            max_duration_ms = config.max_duration_ms,
            "Effect engine started"
        );

        Ok(Self {
            config,
            manager,
            mailboxes,
            tasks: BackgroundTasks {
                scanner: Some(scanner),
                writer: Some(writer),
            },
        })
    }

    pub fn manager(&self) -> &Arc<EffectStackManager> {
        &self.manager
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Disconnect every owner, stop the scanner and drain pending writes.
    pub async fn shutdown(mut self) {
        let owners = self.manager.connected_owners().len();
        self.manager.shutdown_owners().await;
        self.manager.flush_persistence().await;
        self.tasks.stop_all().await;
        if let Some(mailboxes) = self.mailboxes.take() {
            mailboxes.shutdown().await;
        }
        tracing::info!(owners, "Effect engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attribute;
    use crate::context::{StoreBackend, StoreConfig};
    use crate::effects::OwnerId;
    use crate::host::InMemoryHost;

    fn json_config(dir: &std::path::Path) -> EngineConfig {
        EngineConfig {
            store: StoreConfig {
                backend: StoreBackend::Json,
                data_dir: Some(dir.to_string_lossy().into_owned()),
            },
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn effects_survive_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let owner = OwnerId::from_name("alex");

        let host = Arc::new(InMemoryHost::new());
        let engine = EffectEngine::start(json_config(dir.path()), host.clone())
            .await
            .unwrap();
        engine.manager().on_connect(owner).await.unwrap();
        engine
            .manager()
            .apply_effect(owner, "scale", 2.0, Duration::from_secs(600), "test")
            .await
            .unwrap();
        engine.shutdown().await;

        let host = Arc::new(InMemoryHost::new());
        let engine = EffectEngine::start(json_config(dir.path()), host.clone())
            .await
            .unwrap();
        assert_eq!(engine.manager().on_connect(owner).await.unwrap(), 1);
        assert_eq!(host.value(owner, Attribute::Scale), 2.0);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_disconnects_owners() {
        let host = Arc::new(InMemoryHost::new());
        let engine = EffectEngine::start(EngineConfig::in_memory(), host).await.unwrap();
        let manager = engine.manager().clone();
        manager.on_connect(OwnerId::from_name("alex")).await.unwrap();

        engine.shutdown().await;
        assert!(manager.connected_owners().is_empty());
    }
}
