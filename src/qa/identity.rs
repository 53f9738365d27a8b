//! Pseudonymous voter identity persisted on the viewer's device.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use crate::models::VoterIdentity;

/// Storage key for the anonymous token.
pub const IDENTIFIER_KEY: &str = "user_identifier";

/// Minimal string key/value persistence.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
}

/// Key/value pairs kept as one JSON object in a file.
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

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> io::Result<HashMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        let _guard = self.lock.lock().map_err(|_| poisoned())?;
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let _guard = self.lock.lock().map_err(|_| poisoned())?;
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&map)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(&self.path, json)
    }
}

/// Non-durable store, for tests and headless tools.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "store lock poisoned")
}

/// Hands out the device's anonymous voter token.
pub struct IdentityResolver<K> {
    store: K,
    resolved: OnceLock<String>,
}

impl<K: KeyValueStore> IdentityResolver<K> {
    pub fn new(store: K) -> Self {
        Self {
            store,
            resolved: OnceLock::new(),
        }
    }

    /// Return the stored token, creating and persisting one on first use.
    ///
    /// When storage fails the token is kept for this resolver only; votes
    /// will not be recognised after a restart.
    pub fn get_or_create_identifier(&self) -> String {
        self.resolved.get_or_init(|| self.load_or_create()).clone()
    }

    /// Signed-in members vote as themselves, everyone else with the token.
    pub fn resolve_voter(&self, user_id: Option<&str>) -> VoterIdentity {
        match user_id {
            Some(id) if !id.trim().is_empty() => VoterIdentity::Authenticated(id.to_string()),
            _ => VoterIdentity::Anonymous(self.get_or_create_identifier()),
        }
    }

    fn load_or_create(&self) -> String {
        match self.store.get(IDENTIFIER_KEY) {
            Ok(Some(existing)) if !existing.is_empty() => return existing,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Identity storage unavailable, using a session token: {}", e);
                return new_token();
            }
        }

        let token = new_token();
        if let Err(e) = self.store.set(IDENTIFIER_KEY, &token) {
            tracing::warn!("Could not persist voter token, it will not survive restarts: {}", e);
        }
        token
    }
}

fn new_token() -> String {
    uuid::Uuid::new_v4().to_string()
}
