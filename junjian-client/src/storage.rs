//! Durable session record shared by the session store (writer) and the
//! gateway (reader).

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{Deserialize, Serialize};
use shared::{config::client::SESSION_STORAGE_NAME, models::User};
use thiserror::Error;

/// Envelope version written alongside the record.
const RECORD_VERSION: u32 = 0;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access session record at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session record at {path} is malformed: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode session record: {0}")]
    Encode(#[source] serde_json::Error),
}

/// The persisted part of a session. The loading flag is transient and never
/// stored.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub user: Option<User>,
    pub token: Option<String>,
    #[serde(default)]
    pub is_authenticated: bool,
}

impl PersistedSession {
    /// Whether this record describes a usable authenticated session.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.is_authenticated
            && self.user.is_some()
            && self.token.as_deref().is_some_and(|token| !token.is_empty())
    }

    /// The stored bearer token, ignoring empty values.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|token| !token.is_empty())
    }
}

impl std::fmt::Debug for PersistedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedSession")
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("is_authenticated", &self.is_authenticated)
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    state: PersistedSession,
    #[serde(default)]
    version: u32,
}

/// Durable storage for the session record.
///
/// Implementations must tolerate concurrent readers; writes are last writer
/// wins.
pub trait SessionStorage: Send + Sync {
    /// Read the current record, `Ok(None)` when nothing is stored.
    ///
    /// # Errors
    /// Returns an error when the record cannot be read or decoded.
    fn load(&self) -> Result<Option<PersistedSession>, StorageError>;

    /// Replace the stored record.
    ///
    /// # Errors
    /// Returns an error when the record cannot be written.
    fn save(&self, session: &PersistedSession) -> Result<(), StorageError>;

    /// Remove the record, returning what was stored before.
    ///
    /// # Errors
    /// Returns an error when the record cannot be removed.
    fn clear(&self) -> Result<Option<PersistedSession>, StorageError>;
}

/// JSON file storage, one record per file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Storage named after the fixed record name inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(format!("{SESSION_STORAGE_NAME}.json")))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn ensure_parent(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<Option<PersistedSession>, StorageError> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };
        let record: StoredRecord =
            serde_json::from_slice(&contents).map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(Some(record.state))
    }

    fn save(&self, session: &PersistedSession) -> Result<(), StorageError> {
        self.ensure_parent()?;
        let record = StoredRecord {
            state: session.clone(),
            version: RECORD_VERSION,
        };
        let encoded = serde_json::to_vec_pretty(&record).map_err(StorageError::Encode)?;
        fs::write(&self.path, encoded).map_err(|err| self.io_error(err))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .map_err(|err| self.io_error(err))?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<Option<PersistedSession>, StorageError> {
        let previous = self.load().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "discarding unreadable session record");
            None
        });
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(previous),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

/// In-process storage, used when nothing should touch the disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    record: Mutex<Option<PersistedSession>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_record(record: PersistedSession) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }

    /// Snapshot of the stored record.
    #[must_use]
    pub fn snapshot(&self) -> Option<PersistedSession> {
        self.record.lock().ok().and_then(|guard| guard.clone())
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<PersistedSession>, StorageError> {
        Ok(self.snapshot())
    }

    fn save(&self, session: &PersistedSession) -> Result<(), StorageError> {
        if let Ok(mut guard) = self.record.lock() {
            *guard = Some(session.clone());
        }
        Ok(())
    }

    fn clear(&self) -> Result<Option<PersistedSession>, StorageError> {
        Ok(self.record.lock().ok().and_then(|mut guard| guard.take()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{UserRole, UserStatus};
    use tempfile::TempDir;

    fn live_record() -> PersistedSession {
        PersistedSession {
            user: Some(User {
                id: 1,
                email: "u@x.com".to_string(),
                nickname: "u".to_string(),
                avatar: None,
                role: UserRole::Designer,
                status: UserStatus::Active,
                email_verified: true,
            }),
            token: Some("abc".to_string()),
            is_authenticated: true,
        }
    }

    #[test]
    fn file_storage_roundtrips_record() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::in_dir(dir.path().join("nested"));

        assert!(storage.load().unwrap().is_none());
        storage.save(&live_record()).unwrap();
        assert_eq!(storage.load().unwrap(), Some(live_record()));
        assert!(storage.path().ends_with("auth-storage.json"));
    }

    #[test]
    fn file_storage_writes_envelope_without_loading_flag() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::in_dir(dir.path());
        storage.save(&live_record()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(storage.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], 0);
        assert_eq!(raw["state"]["token"], "abc");
        assert_eq!(raw["state"]["isAuthenticated"], true);
        assert!(raw["state"].get("isLoading").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn file_storage_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let storage = FileStorage::in_dir(dir.path());
        storage.save(&live_record()).unwrap();

        let mode = fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn file_storage_clear_reports_previous_record() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::in_dir(dir.path());
        storage.save(&live_record()).unwrap();

        assert_eq!(storage.clear().unwrap(), Some(live_record()));
        assert!(!storage.path().exists());
        assert_eq!(storage.clear().unwrap(), None);
    }

    #[test]
    fn file_storage_reports_corrupt_record() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::in_dir(dir.path());
        fs::write(storage.path(), "{ definitely not json").unwrap();

        assert!(matches!(storage.load(), Err(StorageError::Corrupt { .. })));
        assert_eq!(storage.clear().unwrap(), None);
        assert!(!storage.path().exists());
    }

    #[test]
    fn memory_storage_take_on_clear() {
        let storage = MemoryStorage::with_record(live_record());
        assert_eq!(storage.clear().unwrap(), Some(live_record()));
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn liveness_requires_all_fields() {
        assert!(live_record().is_live());

        let mut record = live_record();
        record.token = Some(String::new());
        assert!(!record.is_live());
        assert_eq!(record.bearer_token(), None);

        let mut record = live_record();
        record.user = None;
        assert!(!record.is_live());

        assert!(!PersistedSession::default().is_live());
    }

    #[test]
    fn debug_output_redacts_token() {
        let debug = format!("{:?}", live_record());
        assert!(!debug.contains("abc"));
        assert!(debug.contains("<redacted>"));
    }
}
