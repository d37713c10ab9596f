// Credential storage
//
// The client reads the access token before every request and writes the
// pair only on login, refresh and logout. Stores are injected so hosts and
// tests can supply their own.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use super::types::CredentialPair;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read credentials from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write credentials to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credentials file {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Key-value store holding the session credentials
///
/// Only `get`, `set` and `remove` are required; the token accessors are
/// expressed in terms of them with the `accessToken` / `refreshToken` keys.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Current access token; empty values count as absent
    fn access_token(&self) -> Result<Option<String>, StoreError> {
        Ok(self.get(ACCESS_TOKEN_KEY)?.filter(|v| !v.is_empty()))
    }

    /// Current refresh token; empty values count as absent
    fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        Ok(self.get(REFRESH_TOKEN_KEY)?.filter(|v| !v.is_empty()))
    }

    /// Overwrite both tokens
    fn save(&self, credentials: &CredentialPair) -> Result<(), StoreError> {
        self.set(ACCESS_TOKEN_KEY, &credentials.access_token)?;
        self.set(REFRESH_TOKEN_KEY, &credentials.refresh_token)
    }

    /// Delete both tokens
    fn clear(&self) -> Result<(), StoreError> {
        self.remove(ACCESS_TOKEN_KEY)?;
        self.remove(REFRESH_TOKEN_KEY)
    }
}

/// Process-local store, lost on exit
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a credential pair
    pub fn with_credentials(credentials: &CredentialPair) -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            ACCESS_TOKEN_KEY.to_string(),
            credentials.access_token.clone(),
        );
        entries.insert(
            REFRESH_TOKEN_KEY.to_string(),
            credentials.refresh_token.clone(),
        );
        Self {
            entries: Mutex::new(entries),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// JSON file store (`{"accessToken": "...", "refreshToken": "..."}`)
///
/// Each write rewrites the whole file through a temp file and a rename, so
/// readers in other processes never observe a half-written file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `~/.rollcall/credentials.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".rollcall/credentials.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let json = serde_json::to_string_pretty(entries).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(write_err)?;
        fs::rename(&tmp_path, &self.path).map_err(write_err)
    }

    fn update<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries()?;
        mutate(&mut entries);
        self.write_entries(&entries)
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn save(&self, credentials: &CredentialPair) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(
                ACCESS_TOKEN_KEY.to_string(),
                credentials.access_token.clone(),
            );
            entries.insert(
                REFRESH_TOKEN_KEY.to_string(),
                credentials.refresh_token.clone(),
            );
        })
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.remove(ACCESS_TOKEN_KEY);
            entries.remove(REFRESH_TOKEN_KEY);
        })
    }
}
