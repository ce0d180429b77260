//! Durable credential persistence.
//!
//! ARCHITECTURE
//! ============
//! The session controller talks to a [`CredentialStore`] only. A store keeps
//! three keys (access token, refresh token, serialized identity) and must
//! write or remove them together. Reads never fail: anything partial or
//! unparsable is logged and reported as "no credential", so boot falls back
//! to an anonymous session instead of a half-populated one.
//!
//! TRADE-OFFS
//! ==========
//! Operations are synchronous and infallible from the caller's side. A failed
//! write is logged, not returned; the in-memory session stays authoritative
//! until the process exits.

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

use std::collections::{BTreeMap, HashMap};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::StoreError;
use crate::types::{Identity, PersistedCredential};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const IDENTITY_KEY: &str = "userData";

/// Persistence seam for the session's durable projection.
pub trait CredentialStore: Send + Sync {
    /// Read the stored credential, or `None` when absent or corrupt.
    fn load(&self) -> Option<PersistedCredential>;

    /// Persist all three fields, replacing whatever was stored.
    fn save(&self, credential: &PersistedCredential);

    /// Remove all three fields.
    fn clear(&self);
}

// =============================================================================
// ENCODING
// =============================================================================

/// Flatten a credential into its three storage entries.
///
/// # Errors
///
/// Returns [`StoreError::Corrupt`] if the identity cannot be serialized.
pub fn encode_entries(credential: &PersistedCredential) -> Result<[(&'static str, String); 3], StoreError> {
    let identity = serde_json::to_string(&credential.identity).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    Ok([
        (ACCESS_TOKEN_KEY, credential.access_token.clone()),
        (REFRESH_TOKEN_KEY, credential.refresh_token.clone()),
        (IDENTITY_KEY, identity),
    ])
}

/// Rebuild a credential from its three storage entries.
///
/// All absent is `Ok(None)`. Anything in between is corrupt.
///
/// # Errors
///
/// Returns [`StoreError::Corrupt`] for partial entries, empty tokens, or an
/// identity that does not parse.
pub fn decode_entries(
    access_token: Option<String>,
    refresh_token: Option<String>,
    identity: Option<String>,
) -> Result<Option<PersistedCredential>, StoreError> {
    match (access_token, refresh_token, identity) {
        (None, None, None) => Ok(None),
        (Some(access_token), Some(refresh_token), Some(identity)) => {
            if access_token.is_empty() || refresh_token.is_empty() {
                return Err(StoreError::Corrupt("empty token".to_owned()));
            }
            let identity: Identity =
                serde_json::from_str(&identity).map_err(|e| StoreError::Corrupt(format!("identity: {e}")))?;
            Ok(Some(PersistedCredential { access_token, refresh_token, identity }))
        }
        _ => Err(StoreError::Corrupt("partial credential".to_owned())),
    }
}

fn load_or_warn(result: Result<Option<PersistedCredential>, StoreError>) -> Option<PersistedCredential> {
    match result {
        Ok(credential) => credential,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring stored credential");
            None
        }
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Process-local store. Used in tests and by embedders without durable media.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a credential.
    #[must_use]
    pub fn with_credential(credential: &PersistedCredential) -> Self {
        let store = Self::new();
        store.save(credential);
        store
    }

    /// Write one raw entry, bypassing encoding.
    pub fn set_raw(&self, key: &str, value: &str) {
        self.lock().insert(key.to_owned(), value.to_owned());
    }

    /// Raw entry for `key`.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<PersistedCredential> {
        let entries = self.lock();
        load_or_warn(decode_entries(
            entries.get(ACCESS_TOKEN_KEY).cloned(),
            entries.get(REFRESH_TOKEN_KEY).cloned(),
            entries.get(IDENTITY_KEY).cloned(),
        ))
    }

    fn save(&self, credential: &PersistedCredential) {
        let encoded = match encode_entries(credential) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(error = %e, "credential not persisted");
                return;
            }
        };
        let mut entries = self.lock();
        for (key, value) in encoded {
            entries.insert(key.to_owned(), value);
        }
    }

    fn clear(&self) {
        let mut entries = self.lock();
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, IDENTITY_KEY] {
            entries.remove(key);
        }
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

/// One JSON document on disk holding the three entries.
///
/// Saves go to a sibling temp file that is renamed over the target, so a
/// crash mid-write leaves either the old document or the new one.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn read(&self) -> Result<Option<PersistedCredential>, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };
        let mut entries: BTreeMap<String, String> =
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        decode_entries(
            entries.remove(ACCESS_TOKEN_KEY),
            entries.remove(REFRESH_TOKEN_KEY),
            entries.remove(IDENTITY_KEY),
        )
    }

    fn write(&self, credential: &PersistedCredential) -> Result<(), StoreError> {
        let entries: BTreeMap<&str, String> = encode_entries(credential)?.into_iter().collect();
        let body = serde_json::to_vec_pretty(&entries).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let temp = self.temp_path();
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt as _;
            options.mode(0o600);
        }
        let written = options.open(&temp).and_then(|mut file| {
            file.write_all(&body)?;
            file.sync_all()?;
            std::fs::rename(&temp, &self.path)
        });
        if let Err(e) = written {
            // The temp file holds both tokens; never leave it behind.
            let _ = std::fs::remove_file(&temp);
            return Err(StoreError::Io(e));
        }
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<PersistedCredential> {
        load_or_warn(self.read())
    }

    fn save(&self, credential: &PersistedCredential) {
        if let Err(e) = self.write(credential) {
            tracing::warn!(error = %e, path = %self.path.display(), "credential not persisted");
        }
    }

    fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(error = %e, path = %self.path.display(), "credential not cleared"),
        }
    }
}
