use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Storage key for the serialized user record
pub const USER_KEY: &str = "user";

const ALL_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

/// Credentials represents an authenticated session: the JWT pair issued by
/// the backend and the profile of the user it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    /// Short-lived bearer token
    pub access: String,
    /// Longer-lived token exchanged for new access tokens
    pub refresh: String,
    /// User profile as returned by the backend (client key casing)
    pub user: Value,
}

impl Credentials {
    /// Create a new set of credentials
    pub fn new(access: impl Into<String>, refresh: impl Into<String>, user: Value) -> Self {
        Credentials {
            access: access.into(),
            refresh: refresh.into(),
            user,
        }
    }

    /// Check if a refresh token is available
    pub fn has_refresh_token(&self) -> bool {
        !self.refresh.is_empty()
    }
}

/// Key-value persistence for credentials.
///
/// Implementations must make `set_many` and `remove_many` atomic with
/// respect to concurrent readers; the defaults are only suitable for stores
/// without concurrent access.
pub trait CredentialStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value
    fn remove(&self, key: &str) -> Result<()>;

    /// Write several values at once
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Delete several values at once
    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.values).remove(key);
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut values = lock(&self.values);
        for (key, value) in entries {
            values.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut values = lock(&self.values);
        for key in keys {
            values.remove(*key);
        }
        Ok(())
    }
}

/// Store persisted as a JSON object on disk.
///
/// Every mutation rewrites the whole file through a temporary file in the
/// same directory, so readers never observe a half-written document.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Map::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = values.len(), "opened credential file");
        Ok(FileStore {
            path,
            values: Mutex::new(values),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &Map<String, Value>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, values)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        let mut values = lock(&self.values);
        let mut next = values.clone();
        f(&mut next);
        self.persist(&next)?;
        *values = next;
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values)
            .get(key)
            .and_then(|v| v.as_str().map(|s| s.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value)])
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.remove_many(&[key])
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        self.update(|values| {
            for (key, value) in entries {
                values.insert(key.to_string(), Value::String(value.to_string()));
            }
        })
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        self.update(|values| {
            for key in keys {
                values.remove(*key);
            }
        })
    }
}

/// All-or-nothing view over a credential store.
///
/// A session is either complete (access, refresh and user present) or
/// absent; a partial state found on load is wiped.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn CredentialStore>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.has_user())
            .finish()
    }
}

impl Session {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Session { store }
    }

    /// Load the stored credentials, clearing any partial state
    pub fn load(&self) -> Result<Option<Credentials>> {
        let access = self.store.get(ACCESS_TOKEN_KEY);
        let refresh = self.store.get(REFRESH_TOKEN_KEY);
        let user = self.store.get(USER_KEY);

        match (access, refresh, user) {
            (Some(access), Some(refresh), Some(user)) => match serde_json::from_str(&user) {
                Ok(user) => Ok(Some(Credentials { access, refresh, user })),
                Err(e) => {
                    warn!(error = %e, "stored user record is unreadable, clearing session");
                    self.clear()?;
                    Ok(None)
                }
            },
            (None, None, None) => Ok(None),
            _ => {
                warn!("partial credentials in store, clearing session");
                self.clear()?;
                Ok(None)
            }
        }
    }

    /// Persist a complete session
    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        let user = serde_json::to_string(&credentials.user)?;
        self.store.set_many(&[
            (ACCESS_TOKEN_KEY, credentials.access.as_str()),
            (REFRESH_TOKEN_KEY, credentials.refresh.as_str()),
            (USER_KEY, user.as_str()),
        ])
    }

    /// Replace the access token (and the refresh token when rotated)
    pub fn update_tokens(&self, access: &str, refresh: Option<&str>) -> Result<()> {
        match refresh {
            Some(refresh) => self
                .store
                .set_many(&[(ACCESS_TOKEN_KEY, access), (REFRESH_TOKEN_KEY, refresh)]),
            None => self.store.set(ACCESS_TOKEN_KEY, access),
        }
    }

    /// Replace the stored user record, keeping the tokens
    pub fn update_user(&self, user: &Value) -> Result<()> {
        if !self.has_user() {
            return Ok(());
        }
        self.store.set(USER_KEY, &serde_json::to_string(user)?)
    }

    /// Remove every credential
    pub fn clear(&self) -> Result<()> {
        self.store.remove_many(&ALL_KEYS)
    }

    /// Current access token, if any
    pub fn access_token(&self) -> Option<String> {
        self.store.get(ACCESS_TOKEN_KEY).filter(|t| !t.is_empty())
    }

    /// Current refresh token, if any
    pub fn refresh_token(&self) -> Option<String> {
        self.store.get(REFRESH_TOKEN_KEY).filter(|t| !t.is_empty())
    }

    /// Check if a user identity is stored
    pub fn has_user(&self) -> bool {
        self.store.get(USER_KEY).is_some()
    }

    /// Stored user record, if readable
    pub fn user(&self) -> Option<Value> {
        self.store
            .get(USER_KEY)
            .and_then(|u| serde_json::from_str(&u).ok())
    }
}
