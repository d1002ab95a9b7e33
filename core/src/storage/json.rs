//! JSON file effect store.
//!
//! Each owner gets one document, `<dir>/<owner_id>.json`:
//!
//! ```json
//! { "version": 1, "owner_id": "…", "effects": [ { "effect_id": "…", … } ] }
//! ```
//!
//! Documents are replaced atomically (write to `*.json.tmp`, then rename).
//! An `effect_id → owner_id` index is rebuilt from the directory on open so
//! single-record deletes know which document to touch.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{EffectStore, StorageError};
use crate::attributes::Attribute;
use crate::effects::{EffectId, EffectRecord, OwnerId};

/// Current on-disk document version.
pub const EFFECT_FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct EffectFile {
    version: u32,
    owner_id: OwnerId,
    #[serde(default)]
    effects: Vec<EffectRecord>,
}

#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    index: Mutex<HashMap<EffectId, OwnerId>>,
}

impl JsonFileStore {
    /// Open (creating if needed) the store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: dir.clone(),
                source,
            })?;

        let index = build_index(&dir).await?;
        tracing::debug!(dir = %dir.display(), effects = index.len(), "Opened effect store");

        Ok(Self {
            dir,
            index: Mutex::new(index),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn owner_path(&self, owner: OwnerId) -> PathBuf {
        self.dir.join(format!("{owner}.json"))
    }

    async fn read_owner(&self, owner: OwnerId) -> Result<Vec<EffectRecord>, StorageError> {
        let path = self.owner_path(owner);
        match read_file(&path).await? {
            Some(file) => Ok(file.effects),
            None => Ok(Vec::new()),
        }
    }

    async fn write_owner(
        &self,
        owner: OwnerId,
        mut effects: Vec<EffectRecord>,
    ) -> Result<(), StorageError> {
        let path = self.owner_path(owner);
        if effects.is_empty() {
            return match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(source) => Err(StorageError::WriteFile { path, source }),
            };
        }

        effects.sort_by_key(|r| (r.attribute, r.stack_index));
        let file = EffectFile {
            version: EFFECT_FILE_VERSION,
            owner_id: owner,
            effects,
        };
        let bytes = serde_json::to_vec_pretty(&file)?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|source| StorageError::WriteFile {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StorageError::WriteFile { path, source })
    }

    /// Upsert `records` (all belonging to `owner`) while holding the index.
    async fn upsert(
        &self,
        index: &mut HashMap<EffectId, OwnerId>,
        owner: OwnerId,
        records: &[&EffectRecord],
    ) -> Result<(), StorageError> {
        let mut rows = self.read_owner(owner).await?;
        for record in records {
            match rows.iter_mut().find(|r| r.effect_id == record.effect_id) {
                Some(existing) => *existing = (*record).clone(),
                None => rows.push((*record).clone()),
            }
        }
        self.write_owner(owner, rows).await?;
        for record in records {
            index.insert(record.effect_id, owner);
        }
        Ok(())
    }
}

async fn read_file(path: &Path) -> Result<Option<EffectFile>, StorageError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StorageError::ReadFile {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let file: EffectFile =
        serde_json::from_slice(&bytes).map_err(|source| StorageError::ParseFile {
            path: path.to_path_buf(),
            source,
        })?;

    if file.version != EFFECT_FILE_VERSION {
        return Err(StorageError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: file.version,
            expected: EFFECT_FILE_VERSION,
        });
    }
    Ok(Some(file))
}

async fn build_index(dir: &Path) -> Result<HashMap<EffectId, OwnerId>, StorageError> {
    let mut index = HashMap::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|source| StorageError::ReadFile {
            path: dir.to_path_buf(),
            source,
        })?;

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(source) => {
                return Err(StorageError::ReadFile {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        };
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        // One bad document must not take the whole store down
        match read_file(&path).await {
            Ok(Some(file)) => {
                for record in file.effects {
                    index.insert(record.effect_id, file.owner_id);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable effect file"),
        }
    }
    Ok(index)
}

#[async_trait]
impl EffectStore for JsonFileStore {
    async fn load_by_owner(&self, owner: OwnerId) -> Result<Vec<EffectRecord>, StorageError> {
        let _index = self.index.lock().await;
        self.read_owner(owner).await
    }

    async fn save(&self, record: &EffectRecord) -> Result<(), StorageError> {
        let mut index = self.index.lock().await;
        self.upsert(&mut index, record.owner_id, &[record]).await
    }

    async fn save_all(&self, records: &[EffectRecord]) -> Result<(), StorageError> {
        let mut by_owner: HashMap<OwnerId, Vec<&EffectRecord>> = HashMap::new();
        for record in records {
            by_owner.entry(record.owner_id).or_default().push(record);
        }

        let mut index = self.index.lock().await;
        for (owner, group) in by_owner {
            self.upsert(&mut index, owner, &group).await?;
        }
        Ok(())
    }

    async fn delete_by_effect_id(&self, effect_id: EffectId) -> Result<(), StorageError> {
        let mut index = self.index.lock().await;
        let Some(owner) = index.get(&effect_id).copied() else {
            return Ok(());
        };

        let mut rows = self.read_owner(owner).await?;
        rows.retain(|r| r.effect_id != effect_id);
        self.write_owner(owner, rows).await?;
        index.remove(&effect_id);
        Ok(())
    }

    async fn delete_by_owner_attribute(
        &self,
        owner: OwnerId,
        attribute: Attribute,
    ) -> Result<(), StorageError> {
        let mut index = self.index.lock().await;
        let rows = self.read_owner(owner).await?;
        let (removed, kept): (Vec<_>, Vec<_>) =
            rows.into_iter().partition(|r| r.attribute == attribute);
        if removed.is_empty() {
            return Ok(());
        }

        self.write_owner(owner, kept).await?;
        for record in removed {
            index.remove(&record.effect_id);
        }
        Ok(())
    }

    async fn delete_by_owner(&self, owner: OwnerId) -> Result<(), StorageError> {
        let mut index = self.index.lock().await;
        self.write_owner(owner, Vec::new()).await?;
        index.retain(|_, o| *o != owner);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(owner: OwnerId, attribute: Attribute, index: u32, remaining: i64) -> EffectRecord {
        let mut r = EffectRecord::new(owner, attribute, 3.0, 1.0, remaining, 0, "test");
        r.stack_index = index;
        r
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let owner = OwnerId::from_name("alex");
        let a = row(owner, Attribute::Scale, 0, 5_000);
        let b = row(owner, Attribute::Scale, 1, 2_000);

        {
            let store = JsonFileStore::open(tmp.path()).await.unwrap();
            store.save_all(&[a.clone(), b.clone()]).await.unwrap();
        }

        let store = JsonFileStore::open(tmp.path()).await.unwrap();
        let loaded = store.load_by_owner(owner).await.unwrap();
        assert_eq!(loaded, vec![a.clone(), b.clone()]);

        // the rebuilt index still routes single-record deletes
        store.delete_by_effect_id(a.effect_id).await.unwrap();
        let loaded = store.load_by_owner(owner).await.unwrap();
        assert_eq!(loaded, vec![b]);
    }

    #[tokio::test]
    async fn save_replaces_by_effect_id() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(tmp.path()).await.unwrap();
        let owner = OwnerId::from_name("alex");

        let mut r = row(owner, Attribute::Armor, 0, 5_000);
        store.save(&r).await.unwrap();
        r.remaining_ms = 1_234;
        r.is_paused = true;
        store.save(&r).await.unwrap();

        let loaded = store.load_by_owner(owner).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].remaining_ms, 1_234);
        assert!(loaded[0].is_paused);
    }

    #[tokio::test]
    async fn deleting_everything_removes_the_document() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(tmp.path()).await.unwrap();
        let owner = OwnerId::from_name("steve");

        store
            .save_all(&[
                row(owner, Attribute::Armor, 0, 5_000),
                row(owner, Attribute::Luck, 0, 5_000),
            ])
            .await
            .unwrap();
        assert!(tmp.path().join(format!("{owner}.json")).exists());

        store
            .delete_by_owner_attribute(owner, Attribute::Armor)
            .await
            .unwrap();
        assert_eq!(store.load_by_owner(owner).await.unwrap().len(), 1);

        store.delete_by_owner(owner).await.unwrap();
        assert!(store.load_by_owner(owner).await.unwrap().is_empty());
        assert!(!tmp.path().join(format!("{owner}.json")).exists());
    }

    #[tokio::test]
    async fn unknown_version_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let owner = OwnerId::from_name("alex");
        let path = tmp.path().join(format!("{owner}.json"));
        std::fs::write(
            &path,
            format!(r#"{{"version": 99, "owner_id": "{owner}", "effects": []}}"#),
        )
        .unwrap();

        // open skips the bad document instead of failing
        let store = JsonFileStore::open(tmp.path()).await.unwrap();
        let err = store.load_by_owner(owner).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::UnsupportedVersion { found: 99, .. }
        ));
    }

    #[tokio::test]
    async fn deleting_unknown_ids_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(tmp.path()).await.unwrap();
        store
            .delete_by_effect_id(EffectId::new_random())
            .await
            .unwrap();
    }
}
