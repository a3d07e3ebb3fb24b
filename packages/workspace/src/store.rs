//! # Build Stores
//!
//! Persistence for [`BuildState`]. The only write path after creation is
//! [`BuildStore::compare_and_swap`], which is the conditional update the
//! reconciler's optimistic concurrency rests on: it succeeds only while the
//! stored version still equals the version the caller read.

use crate::error::StoreError;
use crate::state::BuildState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait BuildStore: Send + Sync {
    async fn load(&self, build_id: &str) -> StoreResult<Option<BuildState>>;

    /// Store a new build; fails if the id is taken
    async fn insert(&self, state: BuildState) -> StoreResult<()>;

    /// Replace the build with `state` if its stored version is still
    /// `expected_version`. Returns `false` (and writes nothing) otherwise.
    async fn compare_and_swap(&self, expected_version: u64, state: BuildState) -> StoreResult<bool>;
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    builds: RwLock<HashMap<String, BuildState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BuildStore for MemoryStore {
    async fn load(&self, build_id: &str) -> StoreResult<Option<BuildState>> {
        Ok(self.builds.read().await.get(build_id).cloned())
    }

    async fn insert(&self, state: BuildState) -> StoreResult<()> {
        let mut builds = self.builds.write().await;
        if builds.contains_key(&state.build_id) {
            return Err(StoreError::AlreadyExists(state.build_id));
        }
        builds.insert(state.build_id.clone(), state);
        Ok(())
    }

    async fn compare_and_swap(&self, expected_version: u64, state: BuildState) -> StoreResult<bool> {
        let mut builds = self.builds.write().await;
        match builds.get_mut(&state.build_id) {
            Some(current) if current.version == expected_version => {
                *current = state;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// One pretty-printed JSON file per build under a data directory
pub struct FileStore {
    root: PathBuf,
    /// Serializes writers so check-then-write is atomic
    write_lock: Mutex<()>,
}

impl FileStore {
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        tracing::info!(path = %root.display(), "opened file store");
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Percent-encodes every byte outside `[A-Za-z0-9_-]`, so distinct ids
    /// get distinct files and none can escape the data directory.
    fn build_path(&self, build_id: &str) -> PathBuf {
        let mut file_name = String::with_capacity(build_id.len());
        for byte in build_id.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                file_name.push(char::from(byte));
            } else {
                file_name.push_str(&format!("%{:02X}", byte));
            }
        }
        self.root.join(format!("{}.json", file_name))
    }

    async fn read(&self, build_id: &str) -> StoreResult<Option<BuildState>> {
        let path = self.build_path(build_id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state: BuildState = serde_json::from_str(&content)?;
        Ok(Some(state))
    }

    async fn write(&self, state: &BuildState) -> StoreResult<()> {
        let path = self.build_path(&state.build_id);
        let temp_path = path.with_extension("tmp");

        let json = serde_json::to_string_pretty(state)?;
        fs::write(&temp_path, json).await?;

        // Atomic rename
        fs::rename(&temp_path, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl BuildStore for FileStore {
    async fn load(&self, build_id: &str) -> StoreResult<Option<BuildState>> {
        self.read(build_id).await
    }

    async fn insert(&self, state: BuildState) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        if fs::metadata(self.build_path(&state.build_id)).await.is_ok() {
            return Err(StoreError::AlreadyExists(state.build_id));
        }
        self.write(&state).await
    }

    async fn compare_and_swap(&self, expected_version: u64, state: BuildState) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;
        match self.read(&state.build_id).await? {
            Some(current) if current.version == expected_version => {
                self.write(&state).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn build(id: &str) -> BuildState {
        let mut namespaces = BTreeMap::new();
        namespaces.insert("pages".to_string(), json!({ "home": { "name": "Home" } }));
        BuildState::new(id, "project", namespaces)
    }

    async fn exercise(store: &dyn BuildStore) {
        assert!(store.load("b1").await.unwrap().is_none());

        store.insert(build("b1")).await.unwrap();
        assert!(matches!(
            store.insert(build("b1")).await,
            Err(StoreError::AlreadyExists(_))
        ));

        let mut next = store.load("b1").await.unwrap().unwrap();
        next.version = 1;
        next.last_transaction_id = Some("t1".to_string());
        assert!(store.compare_and_swap(0, next.clone()).await.unwrap());

        // Stale expectation is refused and writes nothing
        let mut stale = next.clone();
        stale.version = 2;
        stale.namespaces.clear();
        assert!(!store.compare_and_swap(0, stale).await.unwrap());

        let stored = store.load("b1").await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.last_transaction_id.as_deref(), Some("t1"));
        assert_eq!(stored.namespaces["pages"], json!({ "home": { "name": "Home" } }));

        // Unknown builds never swap
        assert!(!store.compare_and_swap(0, build("missing")).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store() {
        exercise(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("builds")).await.unwrap();
        exercise(&store).await;

        // Survives reopening
        let reopened = FileStore::open(store.root().to_path_buf()).await.unwrap();
        assert_eq!(reopened.load("b1").await.unwrap().unwrap().version, 1);
        assert!(!store.root().join("b1.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_encodes_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store.insert(build("../escape")).await.unwrap();
        assert!(dir.path().join("%2E%2E%2Fescape.json").exists());

        // Ids that differ only in disallowed characters do not collide
        assert!(store.load("__/escape").await.unwrap().is_none());
        store.insert(build("__/escape")).await.unwrap();
        assert!(dir.path().join("__%2Fescape.json").exists());

        assert_eq!(store.load("../escape").await.unwrap().unwrap().build_id, "../escape");
        assert_eq!(store.load("__/escape").await.unwrap().unwrap().build_id, "__/escape");
    }
}
