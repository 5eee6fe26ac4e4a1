//! Session store: the bearer credential and where it is persisted.
//!
//! A [`SessionContext`] is created once at startup from the persisted store
//! and handed explicitly to whatever needs it; nothing reads it ambiently.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{StorageError, StorageResult};

/// Opaque bearer token.
///
/// "Valid-looking" means non-empty with no whitespace; the client never
/// inspects the token further.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() || token.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Persistence backend for the credential
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> StorageResult<Option<Credential>>;

    async fn save(&self, credential: &Credential) -> StorageResult<()>;

    async fn clear(&self) -> StorageResult<()>;
}

/// On-disk layout of the credential file
#[derive(Debug, Serialize, Deserialize)]
struct PersistedCredential {
    access_token: String,
    saved_at: DateTime<Utc>,
}

/// JSON file store, `~/.parley/credentials/session.json` by default
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> StorageResult<Option<Credential>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        let persisted: PersistedCredential = serde_json::from_str(&content)?;
        let credential = Credential::new(persisted.access_token)
            .ok_or_else(|| StorageError::invalid_credential("persisted token is blank"))?;
        Ok(Some(credential))
    }

    async fn save(&self, credential: &Credential) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let persisted = PersistedCredential {
            access_token: credential.as_str().to_string(),
            saved_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&persisted)?;
        tokio::fs::write(&self.path, content).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&self.path, perms).await?;
        }

        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        if self.path.exists() {
            tokio::fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}

/// In-memory store, for tests and `--ephemeral` runs
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> StorageResult<Option<Credential>> {
        Ok(self.credential.lock().await.clone())
    }

    async fn save(&self, credential: &Credential) -> StorageResult<()> {
        *self.credential.lock().await = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        *self.credential.lock().await = None;
        Ok(())
    }
}

/// The signed-in state of this client process
#[derive(Clone)]
pub struct SessionContext {
    credential: Option<Credential>,
    store: Arc<dyn CredentialStore>,
}

impl SessionContext {
    /// Restore from the store. An unreadable or malformed file means "signed out".
    pub async fn restore(store: Arc<dyn CredentialStore>) -> Self {
        let credential = match store.load().await {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!("Ignoring persisted credential: {}", e);
                None
            }
        };

        if credential.is_some() {
            tracing::debug!("Restored persisted session");
        }

        Self { credential, store }
    }

    /// Store the credential; it takes effect even if persisting it fails
    pub async fn login(&mut self, credential: Credential) -> StorageResult<()> {
        self.credential = Some(credential.clone());
        self.store.save(&credential).await
    }

    /// Forget the credential here and in the store
    pub async fn logout(&mut self) -> StorageResult<()> {
        self.credential = None;
        self.store.clear().await
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_credential_must_look_valid() {
        assert!(Credential::new("abc.def.ghi").is_some());
        assert!(Credential::new("").is_none());
        assert!(Credential::new("has space").is_none());
        assert_eq!(Credential::new("tok").unwrap().bearer(), "Bearer tok");
        assert_eq!(format!("{:?}", Credential::new("secret").unwrap()), "Credential(***)");
    }

    #[tokio::test]
    async fn test_file_store_round_trip_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(temp_dir.path().join("creds").join("session.json"));

        assert!(store.load().await.unwrap().is_none());

        store.save(&Credential::new("token-1").unwrap()).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.as_str(), "token-1");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        store.clear().await.unwrap();
        assert!(!store.path().exists());
        store.clear().await.unwrap();
    }

    #[test]
    fn test_memory_store_starts_with_seeded_credential() {
        let store = Arc::new(MemoryCredentialStore::with_credential(
            Credential::new("seeded").unwrap(),
        ));
        let session = tokio_test::block_on(SessionContext::restore(store));
        assert_eq!(session.credential().map(Credential::as_str), Some("seeded"));
    }

    #[tokio::test]
    async fn test_restore_survives_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        let session = SessionContext::restore(Arc::new(FileCredentialStore::new(&path))).await;
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_persists_and_logout_clears() {
        let store = Arc::new(MemoryCredentialStore::new());
        let mut session = SessionContext::restore(store.clone()).await;
        assert!(!session.is_authenticated());

        session.login(Credential::new("abc").unwrap()).await.unwrap();
        assert!(session.is_authenticated());

        let reloaded = SessionContext::restore(store.clone()).await;
        assert_eq!(reloaded.credential().map(Credential::as_str), Some("abc"));

        session.logout().await.unwrap();
        assert!(!session.is_authenticated());
        assert!(store.load().await.unwrap().is_none());
    }
}
