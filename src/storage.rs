//! Durable key-value storage port.
//!
//! The vote ledger only ever talks to a [`KeyValueStore`]. Production wires a
//! [`JsonFileStore`]; tests use [`MemoryStore`]. [`ScopedStore`] gives each
//! visitor a private namespace while letting selected keys (the shared tally)
//! through untouched.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt store contents: {0}")]
    Corrupt(String),

    #[error("Storage quota exceeded ({used} of {quota} bytes)")]
    QuotaExceeded { used: usize, quota: usize },
}

/// String-keyed, string-valued store with synchronous best-effort writes
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Set several keys; file-backed stores write them out together
    fn set_many(&self, pairs: &[(&str, &str)]) -> StorageResult<()> {
        for (key, value) in pairs {
            self.set(key, value)?;
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// In-process store, contents are lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Store persisted as a single JSON object file.
///
/// Mutations update the in-memory map and hand a snapshot to a background
/// writer task, which replaces the file through a temp file + rename so a
/// crash never leaves a half-written store behind. Queued snapshots are
/// coalesced; only the newest one is written. Opened outside a tokio
/// runtime, the store writes inline instead.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
    quota: Option<usize>,
    writer: Option<mpsc::UnboundedSender<WriteRequest>>,
}

#[derive(Debug)]
enum WriteRequest {
    Snapshot(String),
    Flush(oneshot::Sender<()>),
}

impl JsonFileStore {
    /// Open a store, starting empty if the file is missing
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| StorageError::Corrupt(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!("Opened store {} with {} keys", path.display(), entries.len());

        Ok(Self::with_entries(path, entries))
    }

    /// Open a store, falling back to an empty one when the file is unreadable
    pub fn open_or_reset(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::open(&path) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(
                    "Failed to open store {}: {}. Starting with an empty store.",
                    path.display(),
                    e
                );
                Self::with_entries(path, BTreeMap::new())
            }
        }
    }

    fn with_entries(path: PathBuf, entries: BTreeMap<String, String>) -> Self {
        let writer = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let (tx, rx) = mpsc::unbounded_channel();
                runtime.spawn(run_writer(path.clone(), rx));
                Some(tx)
            }
            Err(_) => None,
        };

        Self {
            path,
            entries: Mutex::new(entries),
            quota: None,
            writer,
        }
    }

    /// Limit the serialized size of the store, like a browser storage quota
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait until every accepted mutation has reached the file
    pub async fn flush(&self) {
        let Some(writer) = &self.writer else {
            return;
        };
        let (done, wait) = oneshot::channel();
        if writer.send(WriteRequest::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    fn serialize(&self, entries: &BTreeMap<String, String>) -> StorageResult<String> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;

        if let Some(quota) = self.quota {
            if json.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    used: json.len(),
                    quota,
                });
            }
        }
        Ok(json)
    }

    /// Apply a mutation; the in-memory map only changes once the snapshot
    /// was accepted
    fn mutate(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> StorageResult<()> {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        apply(&mut next);
        let json = self.serialize(&next)?;

        match &self.writer {
            // Sent under the lock so snapshots queue in mutation order
            Some(writer) => {
                if writer.send(WriteRequest::Snapshot(json)).is_err() {
                    tracing::warn!("Store writer for {} has stopped", self.path.display());
                }
            }
            None => write_file_blocking(&self.path, &json)?,
        }

        *entries = next;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn set_many(&self, pairs: &[(&str, &str)]) -> StorageResult<()> {
        self.mutate(|entries| {
            for (key, value) in pairs {
                entries.insert(key.to_string(), value.to_string());
            }
        })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }
}

async fn run_writer(path: PathBuf, mut requests: mpsc::UnboundedReceiver<WriteRequest>) {
    while let Some(first) = requests.recv().await {
        let mut latest = None;
        let mut waiting = Vec::new();
        let mut next = Some(first);
        while let Some(request) = next {
            match request {
                WriteRequest::Snapshot(json) => latest = Some(json),
                WriteRequest::Flush(done) => waiting.push(done),
            }
            next = requests.try_recv().ok();
        }

        if let Some(json) = latest {
            if let Err(e) = write_file(&path, json).await {
                tracing::error!("Failed to write store {}: {}", path.display(), e);
            }
        }
        for done in waiting {
            let _ = done.send(());
        }
    }
    tracing::debug!("Store writer for {} finished", path.display());
}

fn temp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

async fn write_file(path: &Path, json: String) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await
}

fn write_file_blocking(path: &Path, json: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = temp_path(path);
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)
}

/// Namespaced view over a shared store.
///
/// Keys are stored as `{namespace}/{key}` except the ones registered with
/// [`ScopedStore::share`], which go to the underlying store verbatim.
#[derive(Clone)]
pub struct ScopedStore {
    inner: Arc<dyn KeyValueStore>,
    namespace: String,
    shared: Vec<String>,
}

impl ScopedStore {
    pub fn new(inner: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            inner,
            namespace: namespace.into(),
            shared: Vec::new(),
        }
    }

    pub fn share(mut self, key: impl Into<String>) -> Self {
        self.shared.push(key.into());
        self
    }

    fn scoped_key(&self, key: &str) -> String {
        if self.shared.iter().any(|k| k == key) {
            key.to_string()
        } else {
            format!("{}/{}", self.namespace, key)
        }
    }
}

impl KeyValueStore for ScopedStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(&self.scoped_key(key))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.inner.set(&self.scoped_key(key), value)
    }

    fn set_many(&self, pairs: &[(&str, &str)]) -> StorageResult<()> {
        let keys: Vec<String> = pairs.iter().map(|(key, _)| self.scoped_key(key)).collect();
        let scoped: Vec<(&str, &str)> = keys
            .iter()
            .zip(pairs)
            .map(|(key, (_, value))| (key.as_str(), *value))
            .collect();
        self.inner.set_many(&scoped)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.inner.remove(&self.scoped_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert!(store.get("a").unwrap().is_none());

        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.len(), 1);

        store.remove("a").unwrap();
        assert!(store.get("a").unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("votes.json");

        {
            let store = JsonFileStore::open(&path).unwrap();
            store.set("oscars_vote_2026_Best Picture", "true").unwrap();
            store.set("other", "x").unwrap();
            store.remove("other").unwrap();
        }

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            reopened
                .get("oscars_vote_2026_Best Picture")
                .unwrap()
                .as_deref(),
            Some("true")
        );
        assert!(reopened.get("other").unwrap().is_none());
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("nested/votes.json")).unwrap();
        assert!(store.get("anything").unwrap().is_none());

        // Parent directories are created on first write
        store.set("k", "v").unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("votes.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = JsonFileStore::open(&path);
        assert!(matches!(result, Err(StorageError::Corrupt(_))));

        let store = JsonFileStore::open_or_reset(&path);
        assert!(store.get("k").unwrap().is_none());
        store.set("k", "v").unwrap();
        assert_eq!(
            JsonFileStore::open(&path).unwrap().get("k").unwrap().as_deref(),
            Some("v")
        );
    }

    #[test]
    fn test_file_store_quota_rejects_write_and_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("votes.json"))
            .unwrap()
            .with_quota(32);

        store.set("a", "1").unwrap();
        let result = store.set("b", &"x".repeat(64));
        assert!(matches!(result, Err(StorageError::QuotaExceeded { .. })));

        // The failed write never reached memory either
        assert!(store.get("b").unwrap().is_none());
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_file_store_writes_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/votes.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();
        store
            .set_many(&[("receipt", "true"), ("choice", "anora")])
            .unwrap();
        // Reads see the mutation before it reaches the disk
        assert_eq!(store.get("choice").unwrap().as_deref(), Some("anora"));

        store.flush().await;
        assert!(!temp_path(&path).exists());

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("a").unwrap().as_deref(), Some("2"));
        assert_eq!(reopened.get("receipt").unwrap().as_deref(), Some("true"));
        assert_eq!(reopened.get("choice").unwrap().as_deref(), Some("anora"));
    }

    #[tokio::test]
    async fn test_set_many_over_quota_applies_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("votes.json"))
            .unwrap()
            .with_quota(32);

        let big = "x".repeat(64);
        let result = store.set_many(&[("a", "1"), ("b", big.as_str())]);
        assert!(matches!(result, Err(StorageError::QuotaExceeded { .. })));
        assert!(store.get("a").unwrap().is_none());

        store.flush().await;
        assert!(!store.path().exists());
    }

    #[test]
    fn test_scoped_store_namespaces_keys() {
        let inner: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let alice = ScopedStore::new(inner.clone(), "alice").share("shared");
        let bob = ScopedStore::new(inner.clone(), "bob").share("shared");

        alice.set("receipt", "true").unwrap();
        assert_eq!(alice.get("receipt").unwrap().as_deref(), Some("true"));
        assert!(bob.get("receipt").unwrap().is_none());
        assert_eq!(inner.get("alice/receipt").unwrap().as_deref(), Some("true"));

        alice.set("shared", "42").unwrap();
        assert_eq!(bob.get("shared").unwrap().as_deref(), Some("42"));
        assert_eq!(inner.get("shared").unwrap().as_deref(), Some("42"));

        bob.set_many(&[("receipt", "yes"), ("shared", "43")]).unwrap();
        assert_eq!(inner.get("bob/receipt").unwrap().as_deref(), Some("yes"));
        assert_eq!(alice.get("shared").unwrap().as_deref(), Some("43"));
        assert_eq!(alice.get("receipt").unwrap().as_deref(), Some("true"));
    }
}
