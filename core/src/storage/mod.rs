//! Durable shadow copy of effect records.
//!
//! The in-memory stacks are authoritative while an owner is connected; the
//! store is only read back when an owner (re)connects. Every write is
//! best-effort: failures are logged by the [`PersistenceWriter`] and never
//! undo the in-memory change.
//!
//! Rows are keyed by `effect_id`, with `(owner_id, attribute)` as the
//! secondary lookup used by bulk deletes.

mod error;
mod json;
mod memory;
mod writer;

pub use error::StorageError;
pub use json::{JsonFileStore, EFFECT_FILE_VERSION};
pub use memory::MemoryStore;
pub use writer::{PersistenceHandle, PersistenceWriter};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use strata_types::{StoreBackend, StoreConfig};

use crate::attributes::Attribute;
use crate::effects::{EffectId, EffectRecord, OwnerId};

/// Persistence contract for effect records.
///
/// Implementations must be `Send + Sync + 'static`; the writer task holds
/// the store behind an `Arc` for the lifetime of the engine.
#[async_trait]
pub trait EffectStore: Send + Sync + 'static {
    /// Every stored record for `owner`, in no particular order.
    async fn load_by_owner(&self, owner: OwnerId) -> Result<Vec<EffectRecord>, StorageError>;

    /// Insert or replace one record (keyed by `effect_id`).
    async fn save(&self, record: &EffectRecord) -> Result<(), StorageError>;

    /// Insert or replace a batch of records.
    async fn save_all(&self, records: &[EffectRecord]) -> Result<(), StorageError>;

    /// Delete one record. Deleting an unknown id is not an error.
    async fn delete_by_effect_id(&self, effect_id: EffectId) -> Result<(), StorageError>;

    async fn delete_by_owner_attribute(
        &self,
        owner: OwnerId,
        attribute: Attribute,
    ) -> Result<(), StorageError>;

    async fn delete_by_owner(&self, owner: OwnerId) -> Result<(), StorageError>;
}

/// Default data directory: `~/.local/share/strata` (or platform equivalent).
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("strata")
}

/// Directory holding the per-owner effect files below `base`.
pub fn effects_dir(base: &Path) -> PathBuf {
    base.join("effects")
}

/// Open the backend named by `config`.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn EffectStore>, StorageError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Json => {
            let base = config
                .data_dir
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir);
            let store = JsonFileStore::open(effects_dir(&base)).await?;
            Ok(Arc::new(store))
        }
    }
}
