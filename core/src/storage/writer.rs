//! Ordered background writer in front of an [`EffectStore`].
//!
//! Every store operation for every owner goes through one FIFO channel and
//! is applied by a single task, so writes land in the order they were
//! issued. In particular a disconnect's final clock commit is always on disk
//! before the same owner's next connect reads it back.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{EffectStore, StorageError};
use crate::attributes::Attribute;
use crate::effects::{EffectId, EffectRecord, OwnerId};

enum StoreCommand {
    Save(EffectRecord),
    SaveAll(Vec<EffectRecord>),
    DeleteEffect(EffectId),
    DeleteOwnerAttribute(OwnerId, Attribute),
    DeleteOwner(OwnerId),
    Load {
        owner: OwnerId,
        reply: oneshot::Sender<Result<Vec<EffectRecord>, StorageError>>,
    },
    Flush(oneshot::Sender<()>),
}

impl StoreCommand {
    fn label(&self) -> &'static str {
        match self {
            StoreCommand::Save(_) => "save",
            StoreCommand::SaveAll(_) => "save_all",
            StoreCommand::DeleteEffect(_) => "delete_effect",
            StoreCommand::DeleteOwnerAttribute(..) => "delete_owner_attribute",
            StoreCommand::DeleteOwner(_) => "delete_owner",
            StoreCommand::Load { .. } => "load",
            StoreCommand::Flush(_) => "flush",
        }
    }
}

/// Cloneable sender side of the writer. Writes are fire-and-forget.
#[derive(Clone)]
pub struct PersistenceHandle {
    tx: mpsc::UnboundedSender<StoreCommand>,
}

impl PersistenceHandle {
    fn send(&self, command: StoreCommand) {
        let label = command.label();
        if self.tx.send(command).is_err() {
            tracing::warn!(op = label, "Persistence writer closed, dropping write");
        }
    }

    pub fn save(&self, record: EffectRecord) {
        self.send(StoreCommand::Save(record));
    }

    pub fn save_all(&self, records: Vec<EffectRecord>) {
        if records.is_empty() {
            return;
        }
        self.send(StoreCommand::SaveAll(records));
    }

    pub fn delete_effect(&self, effect_id: EffectId) {
        self.send(StoreCommand::DeleteEffect(effect_id));
    }

    pub fn delete_owner_attribute(&self, owner: OwnerId, attribute: Attribute) {
        self.send(StoreCommand::DeleteOwnerAttribute(owner, attribute));
    }

    pub fn delete_owner(&self, owner: OwnerId) {
        self.send(StoreCommand::DeleteOwner(owner));
    }

    /// Load an owner's rows after every write queued before this call.
    pub async fn load_by_owner(&self, owner: OwnerId) -> Result<Vec<EffectRecord>, StorageError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Load { owner, reply })
            .map_err(|_| StorageError::WriterClosed)?;
        rx.await.map_err(|_| StorageError::WriterClosed)?
    }

    /// Resolve once every command queued before this call has been applied.
    pub async fn flush(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(StoreCommand::Flush(reply)).is_ok() {
            let _ = rx.await;
        }
    }
}

/// Owns the store and the task applying queued commands.
pub struct PersistenceWriter;

impl PersistenceWriter {
    /// Spawn the writer task. It runs until every handle has been dropped.
    pub fn spawn(store: Arc<dyn EffectStore>) -> (PersistenceHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(store, rx));
        (PersistenceHandle { tx }, task)
    }
}

async fn run(store: Arc<dyn EffectStore>, mut rx: mpsc::UnboundedReceiver<StoreCommand>) {
    while let Some(command) = rx.recv().await {
        let label = command.label();
        let result = match command {
            StoreCommand::Save(record) => store.save(&record).await,
            StoreCommand::SaveAll(records) => store.save_all(&records).await,
            StoreCommand::DeleteEffect(id) => store.delete_by_effect_id(id).await,
            StoreCommand::DeleteOwnerAttribute(owner, attribute) => {
                store.delete_by_owner_attribute(owner, attribute).await
            }
            StoreCommand::DeleteOwner(owner) => store.delete_by_owner(owner).await,
            StoreCommand::Load { owner, reply } => {
                let _ = reply.send(store.load_by_owner(owner).await);
                Ok(())
            }
            StoreCommand::Flush(reply) => {
                let _ = reply.send(());
                Ok(())
            }
        };

        if let Err(e) = result {
            // Best-effort: in-memory state stays authoritative
            tracing::warn!(op = label, error = %e, "Effect persistence failed");
        }
    }
    tracing::debug!("Persistence writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn row(owner: OwnerId) -> EffectRecord {
        EffectRecord::new(owner, Attribute::Scale, 2.0, 1.0, 1_000, 0, "test")
    }

    #[tokio::test]
    async fn commands_apply_in_order() {
        let store = Arc::new(MemoryStore::new());
        let (handle, _task) = PersistenceWriter::spawn(store.clone());
        let owner = OwnerId::from_name("alex");

        let mut r = row(owner);
        handle.save(r.clone());
        r.remaining_ms = 10;
        handle.save(r.clone());
        handle.delete_effect(r.effect_id);
        handle.save(r.clone());

        let loaded = handle.load_by_owner(owner).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].remaining_ms, 10);
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let store = Arc::new(MemoryStore::new());
        let (handle, _task) = PersistenceWriter::spawn(store.clone());
        let owner = OwnerId::from_name("alex");

        store.set_failing(true);
        handle.save(row(owner));
        handle.flush().await;
        store.set_failing(false);

        handle.save(row(owner));
        handle.flush().await;
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn writer_stops_when_handles_drop() {
        let store = Arc::new(MemoryStore::new());
        let (handle, task) = PersistenceWriter::spawn(store);
        drop(handle);
        task.await.unwrap();
    }
}
