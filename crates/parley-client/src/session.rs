//! Startup wiring shared by the binaries.

use std::path::PathBuf;
use std::sync::Arc;

use parley_config::{expand_tilde, ApiConfig, SessionConfig};
use parley_core::{BackendResult, CredentialStore, FileCredentialStore, SessionContext};

use crate::api::ApiClient;

/// File store at the configured credential path
pub fn credential_store(config: &SessionConfig) -> Arc<dyn CredentialStore> {
    let path = expand_tilde(&config.credential_path)
        .unwrap_or_else(|| PathBuf::from(&config.credential_path));
    Arc::new(FileCredentialStore::new(path))
}

/// Read the persisted credential, if any
pub async fn restore_session(config: &SessionConfig) -> SessionContext {
    SessionContext::restore(credential_store(config)).await
}

/// Client carrying the session's credential when there is one
pub fn session_client(config: &ApiConfig, session: &SessionContext) -> BackendResult<ApiClient> {
    let client = ApiClient::from_config(config)?;
    Ok(match session.credential() {
        Some(credential) => client.with_credential(credential.clone()),
        None => client,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::Credential;

    #[tokio::test]
    async fn test_restore_from_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let config = SessionConfig {
            credential_path: path.to_string_lossy().to_string(),
        };

        let mut session = restore_session(&config).await;
        assert!(!session.is_authenticated());
        assert!(!session_client(&ApiConfig::default(), &session)
            .unwrap()
            .is_authenticated());

        session.login(Credential::new("abc").unwrap()).await.unwrap();
        let restored = restore_session(&config).await;
        assert_eq!(restored.credential().map(|c| c.as_str()), Some("abc"));
        assert!(session_client(&ApiConfig::default(), &restored)
            .unwrap()
            .is_authenticated());
    }
}
