//! Expiration scanner
//!
//! One global timer. Each tick asks the manager to charge elapsed time to
//! every connected owner's running tops and to unwind the ones that ran out.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::EffectStackManager;

pub struct ExpirationScanner {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ExpirationScanner {
    /// Spawn the scan loop. The first scan runs one `interval` after start.
    pub fn spawn(manager: Arc<EffectStackManager>, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            // A slow scan shouldn't trigger a burst of catch-up scans
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        manager.scan().await;
                    }
                    _ = &mut stop_rx => break,
                }
            }
            tracing::debug!("Expiration scanner stopped");
        });

        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        tracing::info!(interval_ms, "Expiration scanner started");
        Self { stop_tx, task }
    }

    /// Stop the loop after any scan in progress completes.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attribute;
    use crate::clock::{Clock, ManualClock};
    use crate::effects::OwnerId;
    use crate::host::{InMemoryHost, MailboxExecutor};
    use crate::storage::{MemoryStore, PersistenceWriter};

    #[tokio::test]
    async fn scanner_expires_effects_on_its_own() {
        let clock = Arc::new(ManualClock::new(0));
        let host = Arc::new(InMemoryHost::new());
        let (persistence, _writer) = PersistenceWriter::spawn(Arc::new(MemoryStore::new()));
        let manager = Arc::new(EffectStackManager::new(
            host.clone(),
            Arc::new(MailboxExecutor::new()),
            persistence,
            clock.clone() as Arc<dyn Clock>,
        ));

        let owner = OwnerId::from_name("alex");
        manager.on_connect(owner).await.unwrap();
        manager
            .apply_effect(owner, "scale", 3.0, Duration::from_millis(500), "test")
            .await
            .unwrap();
        clock.advance(1_000);

        let scanner = ExpirationScanner::spawn(manager.clone(), Duration::from_millis(10));
        let mut restored = false;
        for _ in 0..100 {
            if host.value(owner, Attribute::Scale) == 1.0 {
                restored = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        scanner.stop().await;

        assert!(restored, "scanner never expired the effect");
        assert!(manager.list_active(owner).is_empty());
    }
}
