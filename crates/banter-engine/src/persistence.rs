//! Conversation persistence.
//!
//! Durable state is a flat string key-value store holding two entries: the
//! stage token and the JSON message log. [`ConversationStore`] reads them at
//! startup and writes back whichever entry changed after each mutation.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, warn};

use crate::conversation::{Conversation, ParseStageError, Stage};
use crate::message::Message;

/// Key holding the stage token (`greeting` or `chatting`).
pub const STAGE_KEY: &str = "conversation_stage";

/// Key holding the JSON array of messages.
pub const HISTORY_KEY: &str = "chat_history";

/// Error type for persistence operations.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Stage(#[from] ParseStageError),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Invalid conversation data: {0}")]
    InvalidData(String),
}

/// String-keyed durable storage.
pub trait KeyValueStore {
    /// Read a value, `None` if the key was never written.
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a `FileStore`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        atomic_write(&path, value.as_bytes())?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// In-process store, used in tests and for throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        (**self).remove(key)
    }
}

/// Mirrors a [`Conversation`] into a [`KeyValueStore`].
#[derive(Debug)]
pub struct ConversationStore<S> {
    store: S,
    saved_stage: Option<String>,
    saved_history: Option<String>,
}

impl<S: KeyValueStore> ConversationStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            saved_stage: None,
            saved_history: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read the stored conversation.
    ///
    /// `Ok(None)` when nothing was ever saved. A half-written pair, an
    /// unknown stage token, an unparseable log or an empty log is an error.
    pub fn try_load(&self) -> Result<Option<Conversation>, PersistenceError> {
        let stage = self.store.get(STAGE_KEY)?;
        let history = self.store.get(HISTORY_KEY)?;

        match (stage, history) {
            (None, None) => Ok(None),
            (Some(stage), Some(history)) => {
                let stage: Stage = stage.parse()?;
                let messages: Vec<Message> = serde_json::from_str(&history)?;
                if messages.is_empty() {
                    return Err(PersistenceError::InvalidData(
                        "chat history is empty".to_string(),
                    ));
                }
                Ok(Some(Conversation::from_parts(stage, messages)))
            }
            (None, Some(_)) => Err(PersistenceError::InvalidData(format!(
                "{HISTORY_KEY} present without {STAGE_KEY}"
            ))),
            (Some(_), None) => Err(PersistenceError::InvalidData(format!(
                "{STAGE_KEY} present without {HISTORY_KEY}"
            ))),
        }
    }

    /// Load the stored conversation, falling back to a fresh one.
    pub fn load(&mut self) -> Conversation {
        self.saved_stage = None;
        self.saved_history = None;

        match self.try_load() {
            Ok(Some(conversation)) => {
                debug!(
                    stage = %conversation.stage(),
                    messages = conversation.messages().len(),
                    "Restored conversation"
                );
                conversation
            }
            Ok(None) => {
                debug!("No stored conversation, starting fresh");
                Conversation::new()
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable conversation state");
                Conversation::new()
            }
        }
    }

    /// Write back whichever entries changed since the last sync.
    ///
    /// Returns the number of keys written.
    pub fn sync(&mut self, conversation: &Conversation) -> Result<usize, PersistenceError> {
        let mut written = 0;

        let stage = conversation.stage().as_str();
        if self.saved_stage.as_deref() != Some(stage) {
            self.store.set(STAGE_KEY, stage)?;
            self.saved_stage = Some(stage.to_string());
            written += 1;
        }

        let history = serde_json::to_string(conversation.messages())?;
        if self.saved_history.as_deref() != Some(history.as_str()) {
            self.store.set(HISTORY_KEY, &history)?;
            self.saved_history = Some(history);
            written += 1;
        }

        Ok(written)
    }

    /// Remove both entries.
    pub fn clear(&mut self) -> Result<(), PersistenceError> {
        self.store.remove(STAGE_KEY)?;
        self.store.remove(HISTORY_KEY)?;
        self.saved_stage = None;
        self.saved_history = None;
        Ok(())
    }
}

/// Validate a storage key for filesystem safety.
fn validate_key(key: &str) -> Result<(), PersistenceError> {
    if key.is_empty() {
        return Err(PersistenceError::InvalidKey("key cannot be empty".to_string()));
    }

    for ch in key.chars() {
        if !ch.is_ascii_alphanumeric() && ch != '-' && ch != '_' {
            return Err(PersistenceError::InvalidKey(format!(
                "key contains invalid character: {ch}"
            )));
        }
    }

    Ok(())
}

/// Write content atomically using temp file + fsync + rename.
fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("entry");
    let tmp_path = path.with_file_name(format!(".{file_name}.{nanos}.{}.tmp", std::process::id()));

    let result = (|| {
        let mut file = File::create(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Submission, SEED_GREETING};
    use tempfile::TempDir;

    fn setup_file_store() -> (TempDir, FileStore) {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path().join("storage")).unwrap();
        (temp, store)
    }

    fn greeted() -> Conversation {
        let mut conversation = Conversation::new();
        conversation.submit("Alice").unwrap();
        conversation
    }

    #[test]
    fn test_file_store_get_set_remove() {
        let (_temp, store) = setup_file_store();

        assert_eq!(store.get("color").unwrap(), None);
        store.set("color", "blue").unwrap();
        assert_eq!(store.get("color").unwrap().as_deref(), Some("blue"));
        store.set("color", "green").unwrap();
        assert_eq!(store.get("color").unwrap().as_deref(), Some("green"));

        store.remove("color").unwrap();
        assert_eq!(store.get("color").unwrap(), None);
        store.remove("color").unwrap();
    }

    #[test]
    fn test_file_store_leaves_no_temp_files() {
        let (_temp, store) = setup_file_store();
        store.set(STAGE_KEY, "chatting").unwrap();

        let names: Vec<String> = fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec![STAGE_KEY.to_string()]);
    }

    #[test]
    fn test_file_store_rejects_bad_keys() {
        let (_temp, store) = setup_file_store();
        for key in ["", "../escape", "a/b", "a.b", "with space"] {
            assert!(
                matches!(store.set(key, "x"), Err(PersistenceError::InvalidKey(_))),
                "{key:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_load_empty_store_is_fresh() {
        let mut store = ConversationStore::new(MemoryStore::new());
        assert!(store.try_load().unwrap().is_none());

        let conversation = store.load();
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.messages()[0].text, SEED_GREETING);
    }

    #[test]
    fn test_sync_and_reload_roundtrip() {
        let (_temp, files) = setup_file_store();
        let mut store = ConversationStore::new(files.clone());

        let conversation = greeted();
        assert_eq!(store.sync(&conversation).unwrap(), 2);

        let mut reopened = ConversationStore::new(files);
        let restored = reopened.load();
        assert_eq!(restored.stage(), Stage::Chatting);
        assert_eq!(restored.messages(), conversation.messages());
    }

    #[test]
    fn test_sync_writes_only_changed_keys() {
        let mut store = ConversationStore::new(MemoryStore::new());
        let mut conversation = greeted();
        store.sync(&conversation).unwrap();

        assert_eq!(store.sync(&conversation).unwrap(), 0);

        let Submission::Pending(_) = conversation.submit("hello").unwrap() else {
            panic!("expected a remote turn");
        };
        assert_eq!(store.sync(&conversation).unwrap(), 1);
    }

    #[test]
    fn test_stored_format() {
        let mut store = ConversationStore::new(MemoryStore::new());
        store.sync(&greeted()).unwrap();

        assert_eq!(
            store.store().get(STAGE_KEY).unwrap().as_deref(),
            Some("chatting")
        );
        let history = store.store().get(HISTORY_KEY).unwrap().unwrap();
        let raw: serde_json::Value = serde_json::from_str(&history).unwrap();
        assert_eq!(raw.as_array().unwrap().len(), 3);
        assert_eq!(raw[1]["sender"], "user");
        assert_eq!(raw[1]["text"], "Alice");
    }

    #[test]
    fn test_corrupt_history_falls_back() {
        let backing = MemoryStore::new();
        backing.set(STAGE_KEY, "chatting").unwrap();
        backing.set(HISTORY_KEY, "[{not json").unwrap();

        let mut store = ConversationStore::new(backing);
        assert!(matches!(store.try_load(), Err(PersistenceError::Json(_))));

        let conversation = store.load();
        assert_eq!(conversation.stage(), Stage::Greeting);
        assert_eq!(conversation.messages().len(), 1);
    }

    #[test]
    fn test_unknown_stage_falls_back() {
        let backing = MemoryStore::new();
        backing.set(STAGE_KEY, "onboarding").unwrap();
        backing.set(HISTORY_KEY, "[]").unwrap();

        let mut store = ConversationStore::new(backing);
        assert!(matches!(store.try_load(), Err(PersistenceError::Stage(_))));
        assert_eq!(store.load().stage(), Stage::Greeting);
    }

    #[test]
    fn test_empty_history_is_invalid() {
        let backing = MemoryStore::new();
        backing.set(STAGE_KEY, "chatting").unwrap();
        backing.set(HISTORY_KEY, "[]").unwrap();

        let store = ConversationStore::new(backing);
        assert!(matches!(
            store.try_load(),
            Err(PersistenceError::InvalidData(_))
        ));
    }

    #[test]
    fn test_half_written_pair_is_invalid() {
        let backing = MemoryStore::new();
        backing.set(STAGE_KEY, "chatting").unwrap();

        let mut store = ConversationStore::new(backing);
        assert!(matches!(
            store.try_load(),
            Err(PersistenceError::InvalidData(_))
        ));
        assert_eq!(store.load().messages().len(), 1);
    }

    #[test]
    fn test_clear_then_sync_rewrites() {
        let mut store = ConversationStore::new(MemoryStore::new());
        let mut conversation = greeted();
        store.sync(&conversation).unwrap();

        store.clear().unwrap();
        assert!(store.store().is_empty());

        conversation.reset();
        assert_eq!(store.sync(&conversation).unwrap(), 2);
        let restored = store.load();
        assert_eq!(restored.stage(), Stage::Greeting);
        assert_eq!(restored.messages().len(), 1);
    }
}
