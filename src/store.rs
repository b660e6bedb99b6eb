//! String-keyed, JSON-valued persistence.
//!
//! The storage surface mirrors a browser's local key-value store: flat
//! string keys, opaque string documents. [`ProgramStore`] layers the
//! per-exercise program snapshot on top. Snapshots hold only the
//! ordered top-level `{kind, parameter, id}` projection; children of
//! repeat and conditional blocks are reassembled by the composition
//! layer rather than persisted recursively.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::block::{Block, BlockId};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage io failure: {message}")]
    Io { message: String },

    #[error("serialize failure: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io {
            message: e.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Flat key-value storage, the shape of a browser-local store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> StoreResult<()>;
    async fn remove(&self, key: &str) -> StoreResult<()>;
}

/// In-memory store, the default for tests and headless sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        let _ = self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let _ = self.entries.remove(key);
        Ok(())
    }
}

/// One JSON document per key beneath a root directory.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are caller-controlled identifiers; anything outside the
        // safe set maps to an underscore to keep the layout flat.
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.path_for(key), value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Persisted projection of one top-level block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub kind: String,
    pub parameter: String,
    pub id: BlockId,
}

impl From<&Block> for BlockRecord {
    fn from(block: &Block) -> Self {
        Self {
            kind: block.kind().to_string(),
            parameter: block.parameter(),
            id: block.id().clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
struct ProgramSnapshot {
    blocks: Vec<BlockRecord>,
}

/// Per-exercise program snapshots over any [`KeyValueStore`].
pub struct ProgramStore {
    store: Arc<dyn KeyValueStore>,
}

impl ProgramStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key_for(exercise_id: &str) -> String {
        format!("exercise_{exercise_id}")
    }

    pub async fn save(&self, exercise_id: &str, blocks: &[Block]) -> StoreResult<()> {
        let snapshot = ProgramSnapshot {
            blocks: blocks.iter().map(BlockRecord::from).collect(),
        };
        let json = serde_json::to_string(&snapshot)?;
        debug!(exercise_id, blocks = snapshot.blocks.len(), "saving program snapshot");
        self.store.put(&Self::key_for(exercise_id), &json).await
    }

    /// Loads the saved snapshot, if any. A snapshot that fails to parse
    /// is removed and reported; the caller sees an empty program rather
    /// than an error.
    pub async fn load(&self, exercise_id: &str) -> StoreResult<Option<Vec<BlockRecord>>> {
        let key = Self::key_for(exercise_id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<ProgramSnapshot>(&raw) {
            Ok(snapshot) => Ok(Some(snapshot.blocks)),
            Err(e) => {
                warn!(exercise_id, error = %e, "discarding corrupted program snapshot");
                self.store.remove(&key).await?;
                Ok(None)
            }
        }
    }

    pub async fn reset(&self, exercise_id: &str) -> StoreResult<()> {
        self.store.remove(&Self::key_for(exercise_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::TurnDirection;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        store.put("key", "value").await.unwrap();
        assert_eq!(store.get("key").await.unwrap().as_deref(), Some("value"));
        store.remove("key").await.unwrap();
        assert_eq!(store.get("key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn program_snapshot_round_trip() {
        let programs = ProgramStore::new(Arc::new(MemoryStore::new()));
        let blocks = vec![
            Block::move_by(2),
            Block::turn(TurnDirection::Left),
            Block::repeat(3, vec![Block::move_by(1)]),
        ];

        programs.save("ex-1-1", &blocks).await.unwrap();
        let records = programs.load("ex-1-1").await.unwrap().unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].kind, "move");
        assert_eq!(records[0].parameter, "2");
        assert_eq!(records[1].parameter, "Left");
        assert_eq!(&records[2].id, blocks[2].id());
    }

    #[tokio::test]
    async fn corrupted_snapshot_is_discarded() {
        let backing = Arc::new(MemoryStore::new());
        backing.put("exercise_ex-1-1", "{not json").await.unwrap();

        let programs = ProgramStore::new(backing.clone());
        assert_eq!(programs.load("ex-1-1").await.unwrap(), None);
        // The corrupted entry is gone, not merely ignored.
        assert_eq!(backing.get("exercise_ex-1-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_snapshot_is_none() {
        let programs = ProgramStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(programs.load("ex-9-9").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.put("exercise_ex-1-1", r#"{"blocks":[]}"#).await.unwrap();
        assert_eq!(
            store.get("exercise_ex-1-1").await.unwrap().as_deref(),
            Some(r#"{"blocks":[]}"#)
        );
        assert_eq!(store.get("absent").await.unwrap(), None);

        store.remove("exercise_ex-1-1").await.unwrap();
        assert_eq!(store.get("exercise_ex-1-1").await.unwrap(), None);
        // Removing twice is fine.
        store.remove("exercise_ex-1-1").await.unwrap();
    }
}
