use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, Mutex};

use crate::types::{EditorPrefs, Note};

/// Top-level storage key holding the whole note map (id → record).
pub const NOTES_KEY: &str = "notes";

const SANS_FONT_KEY: &str = "sansFont";
const MONO_FONT_KEY: &str = "monoFont";
const FONT_SIZE_KEY: &str = "fontSize";

/// Capacity of the change-notification channel. Slow subscribers lag and
/// simply re-read the store on their next event — consistency is eventual.
const EVENT_CAPACITY: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The persistence backend cannot be reached. Callers treat the note
    /// list as unknown, never as empty.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Published after every successful mutation.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    NotesChanged,
}

/// Key-value storage area, modelled after the extension host's local
/// storage: top-level string keys mapping to JSON values.
pub trait StorageBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn write(&self, key: &str, value: Value) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Primary backend: one JSON object file, each storage key a field.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load_root(&self) -> Result<serde_json::Map<String, Value>, StoreError> {
        if !self.path.exists() {
            return Ok(serde_json::Map::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    /// Write the whole object atomically (temp file, then rename) so a
    /// partial write can't corrupt the store.
    fn store_root(&self, root: &serde_json::Map<String, Value>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(root)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, bytes).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.load_root()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut root = self.load_root()?;
        root.insert(key.to_string(), value);
        self.store_root(&root)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut root = self.load_root()?;
        if root.remove(key).is_some() {
            self.store_root(&root)?;
        }
        Ok(())
    }
}

/// Fallback backend for hosts without a storage area (standalone preview).
/// Contents vanish with the process.
#[derive(Default)]
pub struct MemoryBackend {
    map: std::sync::Mutex<serde_json::Map<String, Value>>,
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(key).cloned())
    }

    fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(key);
        Ok(())
    }
}

/// The sole source of truth for note records. Cheap to clone; clones share
/// the backend, the write lock, and the event channel.
#[derive(Clone)]
pub struct NoteStore {
    backend: Arc<dyn StorageBackend>,
    /// Serializes read-modify-write cycles. Reads don't take it.
    write_lock: Arc<Mutex<()>>,
    events: broadcast::Sender<StoreEvent>,
}

impl NoteStore {
    /// Open the store at `storage_path`, or fall back silently to the
    /// in-memory backend when no path is available.
    pub fn open(storage_path: Option<&Path>) -> Self {
        match storage_path {
            Some(path) => Self::with_backend(Arc::new(FileBackend::new(path))),
            None => {
                tracing::debug!("no storage path available, using in-memory backend");
                Self::in_memory()
            }
        }
    }

    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::default()))
    }

    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            write_lock: Arc::new(Mutex::new(())),
            events,
        }
    }

    /// Subscribe to change notifications. Receivers that lag are expected
    /// to re-read the store rather than replay missed events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn load_map(&self) -> Result<HashMap<String, Note>, StoreError> {
        let value = match self.backend.read(NOTES_KEY)? {
            Some(v) => v,
            None => return Ok(HashMap::new()),
        };
        let raw: serde_json::Map<String, Value> = match value {
            Value::Object(m) => m,
            other => {
                tracing::warn!("notes key holds a non-object value: {other}");
                return Ok(HashMap::new());
            }
        };
        // Skip records that no longer deserialize rather than failing the
        // whole read.
        let mut map = HashMap::with_capacity(raw.len());
        for (id, entry) in raw {
            match serde_json::from_value::<Note>(entry) {
                Ok(note) => {
                    map.insert(id, note);
                }
                Err(e) => tracing::warn!("skipping malformed note record {id}: {e}"),
            }
        }
        Ok(map)
    }

    fn store_map(&self, map: &HashMap<String, Note>) -> Result<(), StoreError> {
        let value =
            serde_json::to_value(map).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        self.backend.write(NOTES_KEY, value)
    }

    /// Upsert by id: saving an existing id overwrites, never duplicates.
    pub async fn save(&self, note: &Note) -> Result<(), StoreError> {
        debug_assert!(!note.id.is_empty() && !note.domain.is_empty());
        {
            let _guard = self.write_lock.lock().await;
            let mut map = self.load_map()?;
            map.insert(note.id.clone(), note.clone());
            self.store_map(&map)?;
        }
        let _ = self.events.send(StoreEvent::NotesChanged);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Note>, StoreError> {
        Ok(self.load_map()?.remove(id))
    }

    /// Every record, in no particular order.
    pub async fn get_all(&self) -> Result<Vec<Note>, StoreError> {
        Ok(self.load_map()?.into_values().collect())
    }

    /// Records with an exact (case-sensitive) domain match, most recently
    /// updated first.
    pub async fn get_by_domain(&self, domain: &str) -> Result<Vec<Note>, StoreError> {
        let mut notes: Vec<Note> = self
            .load_map()?
            .into_values()
            .filter(|n| n.domain == domain)
            .collect();
        sort_by_recency(&mut notes);
        Ok(notes)
    }

    /// Records whose full URL exactly equals `url`, most recent first.
    /// Drives the badge count and the open-vs-create menu decision.
    pub async fn get_by_url(&self, url: &str) -> Result<Vec<Note>, StoreError> {
        let mut notes: Vec<Note> = self
            .load_map()?
            .into_values()
            .filter(|n| n.url == url)
            .collect();
        sort_by_recency(&mut notes);
        Ok(notes)
    }

    /// Remove the record if present. Deleting an absent id is a no-op,
    /// not an error.
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let removed = {
            let _guard = self.write_lock.lock().await;
            let mut map = self.load_map()?;
            let removed = map.remove(id).is_some();
            if removed {
                self.store_map(&map)?;
            }
            removed
        };
        if removed {
            let _ = self.events.send(StoreEvent::NotesChanged);
        }
        Ok(())
    }

    pub async fn load_prefs(&self) -> Result<EditorPrefs, StoreError> {
        let defaults = EditorPrefs::default();
        let read_str = |key: &str, fallback: String| -> Result<String, StoreError> {
            Ok(self
                .backend
                .read(key)?
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or(fallback))
        };
        let sans_font = read_str(SANS_FONT_KEY, defaults.sans_font)?;
        let mono_font = read_str(MONO_FONT_KEY, defaults.mono_font)?;
        let font_size = self
            .backend
            .read(FONT_SIZE_KEY)?
            .and_then(|v| v.as_u64())
            .map(|n| n as u32)
            .unwrap_or(defaults.font_size);
        Ok(EditorPrefs {
            sans_font,
            mono_font,
            font_size,
        })
    }

    pub async fn save_prefs(&self, prefs: &EditorPrefs) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.backend
            .write(SANS_FONT_KEY, Value::from(prefs.sans_font.clone()))?;
        self.backend
            .write(MONO_FONT_KEY, Value::from(prefs.mono_font.clone()))?;
        self.backend
            .write(FONT_SIZE_KEY, Value::from(prefs.font_size))?;
        Ok(())
    }
}

/// `updatedAt` descending; ties broken by id so the order is stable across
/// reads of the same snapshot.
pub(crate) fn sort_by_recency(notes: &mut [Note]) {
    notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
}
