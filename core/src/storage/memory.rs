//! In-process effect store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use hashbrown::HashMap;

use super::{EffectStore, StorageError};
use crate::attributes::Attribute;
use crate::effects::{EffectId, EffectRecord, OwnerId};

/// Effect rows kept in a process-local map. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<EffectId, EffectRecord>>,
    /// When set, every operation fails (used to exercise best-effort paths)
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, effect_id: EffectId) -> Option<EffectRecord> {
        self.lock().get(&effect_id).cloned()
    }

    /// Snapshot of one owner's rows, sorted by attribute then stack index.
    pub fn rows_for(&self, owner: OwnerId) -> Vec<EffectRecord> {
        let mut rows: Vec<_> = self
            .lock()
            .values()
            .filter(|r| r.owner_id == owner)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.attribute, r.stack_index));
        rows
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<EffectId, EffectRecord>> {
        // A poisoned map is still structurally valid
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("memory store set to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EffectStore for MemoryStore {
    async fn load_by_owner(&self, owner: OwnerId) -> Result<Vec<EffectRecord>, StorageError> {
        self.check()?;
        Ok(self.rows_for(owner))
    }

    async fn save(&self, record: &EffectRecord) -> Result<(), StorageError> {
        self.check()?;
        self.lock().insert(record.effect_id, record.clone());
        Ok(())
    }

    async fn save_all(&self, records: &[EffectRecord]) -> Result<(), StorageError> {
        self.check()?;
        let mut rows = self.lock();
        for record in records {
            rows.insert(record.effect_id, record.clone());
        }
        Ok(())
    }

    async fn delete_by_effect_id(&self, effect_id: EffectId) -> Result<(), StorageError> {
        self.check()?;
        self.lock().remove(&effect_id);
        Ok(())
    }

    async fn delete_by_owner_attribute(
        &self,
        owner: OwnerId,
        attribute: Attribute,
    ) -> Result<(), StorageError> {
        self.check()?;
        self.lock()
            .retain(|_, r| !(r.owner_id == owner && r.attribute == attribute));
        Ok(())
    }

    async fn delete_by_owner(&self, owner: OwnerId) -> Result<(), StorageError> {
        self.check()?;
        self.lock().retain(|_, r| r.owner_id != owner);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(owner: &str, attribute: Attribute, index: u32) -> EffectRecord {
        let mut r = EffectRecord::new(
            OwnerId::from_name(owner),
            attribute,
            2.0,
            1.0,
            1_000,
            0,
            "test",
        );
        r.stack_index = index;
        r
    }

    #[tokio::test]
    async fn bulk_deletes_respect_owner_and_attribute() {
        let store = MemoryStore::new();
        store
            .save_all(&[
                row("alex", Attribute::Scale, 0),
                row("alex", Attribute::Scale, 1),
                row("alex", Attribute::Armor, 0),
                row("steve", Attribute::Scale, 0),
            ])
            .await
            .unwrap();
        assert_eq!(store.len(), 4);

        store
            .delete_by_owner_attribute(OwnerId::from_name("alex"), Attribute::Scale)
            .await
            .unwrap();
        assert_eq!(store.len(), 2);

        store.delete_by_owner(OwnerId::from_name("alex")).await.unwrap();
        let left = store.load_by_owner(OwnerId::from_name("steve")).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(left.len(), 1);
    }

    #[tokio::test]
    async fn failing_store_reports_backend_errors() {
        let store = MemoryStore::new();
        store.set_failing(true);
        let err = store.save(&row("alex", Attribute::Luck, 0)).await.unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
        store.set_failing(false);
        assert!(store.is_empty());
    }
}
