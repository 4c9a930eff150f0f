//! Key/value storage backends.
//!
//! A backend plays the role of the browser profile's storage area: every
//! [`UserDataStore`](super::UserDataStore) (one per "tab") shares it, and each
//! committed change is announced to all subscribers as a [`StorageEvent`].
//! [`FileStorage`] is also shared between processes.

use super::errors::{StoreError, StoreResult};
use fs2::FileExt;
use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{sync::broadcast, task::JoinHandle, time::MissedTickBehavior};
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Identity of one store instance sharing a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(Uuid);

impl TabId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Single mutation inside a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Set(String, String),
    Remove(String),
}

impl StorageOp {
    pub fn set(key: &str, value: impl Into<String>) -> Self {
        StorageOp::Set(key.to_string(), value.into())
    }

    pub fn remove(key: &str) -> Self {
        StorageOp::Remove(key.to_string())
    }
}

/// Change notification for one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    /// Value after the change; `None` when the key was removed
    pub new_value: Option<String>,
    /// Store instance that made the change
    pub origin: TabId,
}

/// Platform key/value storage shared by all store instances.
pub trait StorageBackend: Send + Sync {
    /// Read a raw value.
    fn read(&self, key: &str) -> StoreResult<Option<String>>;

    /// Apply `ops` as one unit. Readers never observe a partially applied
    /// commit. One event is published per key whose value actually changed.
    fn commit(&self, origin: TabId, ops: Vec<StorageOp>) -> StoreResult<()>;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}

/// Apply ops to `map`, returning the keys whose value changed.
fn apply_ops(
    map: &mut HashMap<String, String>,
    ops: Vec<StorageOp>,
) -> Vec<(String, Option<String>)> {
    let mut changed = Vec::new();
    for op in ops {
        match op {
            StorageOp::Set(key, value) => {
                if map.get(&key) != Some(&value) {
                    map.insert(key.clone(), value.clone());
                    changed.push((key, Some(value)));
                }
            }
            StorageOp::Remove(key) => {
                if map.remove(&key).is_some() {
                    changed.push((key, None));
                }
            }
        }
    }
    changed
}

fn publish(
    events: &broadcast::Sender<StorageEvent>,
    origin: TabId,
    changed: Vec<(String, Option<String>)>,
) {
    for (key, new_value) in changed {
        // No subscribers is not an error
        let _ = events.send(StorageEvent {
            key,
            new_value,
            origin,
        });
    }
}

/// In-process storage; lost when the process exits.
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Write a raw value without any validation. Used to seed tests with
    /// foreign or corrupted data.
    pub fn insert_raw(&self, key: &str, value: &str) -> StoreResult<()> {
        self.commit(TabId::new(), vec![StorageOp::set(key, value)])
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn commit(&self, origin: TabId, ops: Vec<StorageOp>) -> StoreResult<()> {
        let changed = {
            let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
            apply_ops(&mut entries, ops)
        };
        publish(&self.events, origin, changed);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}

/// Durable storage persisted as a JSON object in a single file.
///
/// The file is the only source of truth and may be shared by several
/// processes. Reads go to disk. A commit takes an exclusive lock on a sibling
/// `.lock` file, re-reads the file, applies its ops and rewrites it through a
/// temporary sibling and an atomic rename.
///
/// Changes made by other processes are announced by [`FileStorage::refresh`],
/// which [`FileStorage::watch_changes`] calls periodically. Such events carry
/// the instance's `external_origin` tab id.
pub struct FileStorage {
    path: PathBuf,
    lock_path: PathBuf,
    /// Contents as last announced to subscribers
    seen: Mutex<HashMap<String, String>>,
    external_origin: TabId,
    events: broadcast::Sender<StorageEvent>,
}

impl FileStorage {
    /// Open (or create) the storage file at `path`.
    ///
    /// # Errors
    ///
    /// * `StoreError::Io` - The parent directory could not be created or the
    ///   file exists but could not be read
    ///
    /// A file whose contents do not parse is treated as empty.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let seen = load_map(&path)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            lock_path: sibling(&path, ".lock"),
            path,
            seen: Mutex::new(seen),
            external_origin: TabId::new(),
            events,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tab id stamped on events for changes made outside this instance.
    pub fn external_origin(&self) -> TabId {
        self.external_origin
    }

    /// Publish events for every key another process changed since the last
    /// commit or refresh of this instance.
    ///
    /// # Returns
    ///
    /// * `StoreResult<usize>` - Number of changed keys announced
    pub fn refresh(&self) -> StoreResult<usize> {
        let current = load_map(&self.path)?;
        let changed = {
            let mut seen = self.seen.lock().map_err(|_| StoreError::Poisoned)?;
            let changed = diff_maps(&seen, &current);
            *seen = current;
            changed
        };
        let count = changed.len();
        if count > 0 {
            log::debug!("{} keys changed on disk in {}", count, self.path.display());
        }
        publish(&self.events, self.external_origin, changed);
        Ok(count)
    }

    /// Spawn a task that calls [`refresh`](Self::refresh) every `period`
    /// until the handle is aborted.
    pub fn watch_changes(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let storage = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = storage.refresh() {
                    log::warn!(
                        "Failed to reload storage file {}: {}",
                        storage.path.display(),
                        e
                    );
                }
            }
        })
    }

    fn lock(&self) -> StoreResult<File> {
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)?;
        FileExt::lock_exclusive(&lock_file)?;
        Ok(lock_file)
    }

    fn persist(&self, entries: &HashMap<String, String>) -> StoreResult<()> {
        let tmp = sibling(&self.path, ".tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(load_map(&self.path)?.remove(key))
    }

    fn commit(&self, origin: TabId, ops: Vec<StorageOp>) -> StoreResult<()> {
        let (external, changed) = {
            let mut seen = self.seen.lock().map_err(|_| StoreError::Poisoned)?;
            let lock_file = self.lock()?;

            let mut current = load_map(&self.path)?;
            let external = diff_maps(&seen, &current);
            let changed = apply_ops(&mut current, ops);
            if !changed.is_empty() {
                self.persist(&current)?;
            }
            FileExt::unlock(&lock_file)?;
            *seen = current;
            (external, changed)
        };
        publish(&self.events, self.external_origin, external);
        publish(&self.events, origin, changed);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}

/// Load the JSON map at `path`; a missing or corrupt file reads as empty.
fn load_map(path: &Path) -> StoreResult<HashMap<String, String>> {
    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<HashMap<String, String>>(&contents) {
            Ok(map) => Ok(map),
            Err(e) => {
                log::warn!(
                    "Storage file {} is corrupt, reading as empty: {}",
                    path.display(),
                    e
                );
                Ok(HashMap::new())
            }
        },
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e.into()),
    }
}

/// Keys whose value differs between `before` and `after`.
fn diff_maps(
    before: &HashMap<String, String>,
    after: &HashMap<String, String>,
) -> Vec<(String, Option<String>)> {
    let mut changed: Vec<_> = after
        .iter()
        .filter(|(key, value)| before.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), Some(value.clone())))
        .collect();
    changed.extend(
        before
            .keys()
            .filter(|key| !after.contains_key(*key))
            .map(|key| (key.clone(), None)),
    );
    changed
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("traderedge_backend_{}", Uuid::new_v4()))
            .join("state.json")
    }

    #[test]
    fn test_memory_commit_and_read() {
        let storage = MemoryStorage::new();
        let tab = TabId::new();
        storage
            .commit(
                tab,
                vec![StorageOp::set("a", "1"), StorageOp::set("b", "2")],
            )
            .unwrap();

        assert_eq!(storage.read("a").unwrap().as_deref(), Some("1"));
        assert_eq!(storage.read("b").unwrap().as_deref(), Some("2"));
        assert_eq!(storage.len(), 2);

        storage.commit(tab, vec![StorageOp::remove("a")]).unwrap();
        assert_eq!(storage.read("a").unwrap(), None);
    }

    #[test]
    fn test_events_only_for_changed_keys() {
        let storage = MemoryStorage::new();
        let mut rx = storage.subscribe();
        let tab = TabId::new();

        storage.commit(tab, vec![StorageOp::set("k", "v")]).unwrap();
        storage.commit(tab, vec![StorageOp::set("k", "v")]).unwrap();
        storage.commit(tab, vec![StorageOp::remove("missing")]).unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.key, "k");
        assert_eq!(event.new_value.as_deref(), Some("v"));
        assert_eq!(event.origin, tab);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_file_storage_survives_reopen() {
        let path = temp_path();
        {
            let storage = FileStorage::open(&path).unwrap();
            storage
                .commit(TabId::new(), vec![StorageOp::set("token", "abc")])
                .unwrap();
        }

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.read("token").unwrap().as_deref(), Some("abc"));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_storage_commit_keeps_other_instance_writes() {
        let path = temp_path();
        let first = FileStorage::open(&path).unwrap();
        let second = FileStorage::open(&path).unwrap();

        first
            .commit(TabId::new(), vec![StorageOp::set("a", "1")])
            .unwrap();
        assert_eq!(second.read("a").unwrap().as_deref(), Some("1"));

        second
            .commit(TabId::new(), vec![StorageOp::set("b", "2")])
            .unwrap();
        assert_eq!(first.read("a").unwrap().as_deref(), Some("1"));
        assert_eq!(first.read("b").unwrap().as_deref(), Some("2"));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_refresh_announces_foreign_changes() {
        let path = temp_path();
        let watcher = FileStorage::open(&path).unwrap();
        let writer = FileStorage::open(&path).unwrap();
        let mut rx = watcher.subscribe();

        writer
            .commit(
                TabId::new(),
                vec![StorageOp::set("k", "v"), StorageOp::set("gone", "x")],
            )
            .unwrap();
        assert_eq!(watcher.refresh().unwrap(), 2);
        writer
            .commit(TabId::new(), vec![StorageOp::remove("gone")])
            .unwrap();
        assert_eq!(watcher.refresh().unwrap(), 1);
        assert_eq!(watcher.refresh().unwrap(), 0);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.origin, watcher.external_origin());
            events.push((event.key, event.new_value));
        }
        events.sort();
        assert_eq!(
            events,
            vec![
                ("gone".to_string(), None),
                ("gone".to_string(), Some("x".to_string())),
                ("k".to_string(), Some("v".to_string())),
            ]
        );

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_storage_corrupt_file_opens_empty() {
        let path = temp_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();

        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.read("anything").unwrap(), None);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
