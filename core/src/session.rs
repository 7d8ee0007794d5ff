//! Client-held authentication state.
//!
//! # Design
//! `Session` is the only mutation surface for the bearer token and the
//! cached user profile. It is shared by reference (usually an `Arc`) with
//! the dispatcher, which reads the token while building each request. The
//! backing [`Storage`] is a string key-value store; `Session` keeps no copy
//! of its own, so every read reflects the last write.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::config::ClientConfig;
use crate::types::{LoginResult, UserProfile};

const TOKEN_KEY: &str = "token";
const USER_KEY: &str = "userInfo";

/// Errors raised by a [`Storage`] backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("session storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("session storage holds malformed JSON: {0}")]
    Format(#[from] serde_json::Error),

    #[error("session storage lock poisoned")]
    Poisoned,
}

/// Persistent string key-value storage.
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local storage. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.read().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|_| StorageError::Poisoned)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|_| StorageError::Poisoned)?;
        items.remove(key);
        Ok(())
    }
}

/// Storage persisted as a flat JSON object in a single file.
///
/// The file is re-read on every access and replaced on every mutation. A
/// mutation writes a sibling temp file and renames it over the target, so a
/// reader sees either the previous or the next contents, never a partial
/// file. A missing file reads as empty.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, items: &HashMap<String, String>) -> Result<(), StorageError> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(serde_json::to_string_pretty(items)?.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut HashMap<String, String>)) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut items = self.load()?;
        f(&mut items);
        self.store(&items)
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.modify(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.modify(|items| {
            items.remove(key);
        })
    }
}

/// Accessors for the token and user profile over a [`Storage`].
pub struct Session {
    storage: Box<dyn Storage>,
}

impl Session {
    pub fn new(storage: impl Storage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::default())
    }

    /// File-backed when `session_file` is configured, in-memory otherwise.
    pub fn from_config(config: &ClientConfig) -> Self {
        match &config.session_file {
            Some(path) => Self::new(FileStorage::new(path)),
            None => Self::in_memory(),
        }
    }

    pub fn token(&self) -> Result<Option<String>, StorageError> {
        self.storage.get_item(TOKEN_KEY)
    }

    pub fn set_token(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set_item(TOKEN_KEY, token)
    }

    pub fn remove_token(&self) -> Result<(), StorageError> {
        self.storage.remove_item(TOKEN_KEY)
    }

    pub fn user_profile(&self) -> Result<Option<UserProfile>, StorageError> {
        match self.storage.get_item(USER_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_user_profile(&self, user: &UserProfile) -> Result<(), StorageError> {
        let raw = serde_json::to_string(user)?;
        self.storage.set_item(USER_KEY, &raw)
    }

    pub fn remove_user_profile(&self) -> Result<(), StorageError> {
        self.storage.remove_item(USER_KEY)
    }

    /// Persist both halves of a successful login.
    pub fn start(&self, login: &LoginResult) -> Result<(), StorageError> {
        self.set_token(&login.token)?;
        self.set_user_profile(&login.user)
    }

    /// Forget the token and the profile.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.remove_token()?;
        self.remove_user_profile()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}
