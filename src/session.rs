//! The session store: the access token, the refresh token and the user's profile.
//!
//! A `SessionStore` is handed to the `ApiClient` when it is built, so tests and multiple sessions
//! can each have their own. `SessionStore::global()` is a process-wide in-memory default for
//! callers that do not care.
//!
//! When created with `load`, every change is written to a JSON file so that the session survives
//! between runs of the program. Reading never fails: a missing or corrupt file is an empty session.

use crate::model::User;
use crate::utils;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// The two bearer credentials returned by a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens {
    pub access: String,
    pub refresh: String,
}

impl Tokens {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

/// The serialization format of the session file. The three slots are independent; the user is
/// kept as raw JSON so that a profile that no longer parses only loses itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<serde_json::Value>,
}

/// Durable storage of the current session. Cloning shares the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    state: Arc<RwLock<SessionFile>>,
    path: Option<PathBuf>,
}

static GLOBAL: OnceLock<SessionStore> = OnceLock::new();

impl SessionStore {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// The process-wide default store (in memory).
    pub fn global() -> &'static SessionStore {
        GLOBAL.get_or_init(SessionStore::in_memory)
    }

    /// A store persisted at `path`. Whatever is currently in the file becomes the session.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = if path.is_file() {
            match utils::deserialize::<SessionFile>(&path).await {
                Ok(state) => state,
                Err(e) => {
                    warn!("Ignoring unreadable session file: {e:#}");
                    SessionFile::default()
                }
            }
        } else {
            SessionFile::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            path: Some(path),
        }
    }

    /// The file backing this store, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Stores both tokens and the user profile. Token contents are not inspected.
    pub async fn set_session(&self, tokens: Tokens, user: &User) {
        let mut state = self.state.write().await;
        state.access_token = Some(tokens.access);
        state.refresh_token = Some(tokens.refresh);
        state.user = serde_json::to_value(user).ok();
        self.persist(&state).await;
    }

    /// Replaces the access token after a refresh.
    pub async fn set_access_token(&self, token: impl Into<String>) {
        let mut state = self.state.write().await;
        state.access_token = Some(token.into());
        self.persist(&state).await;
    }

    /// Replaces the refresh token when the server rotates it.
    pub async fn set_refresh_token(&self, token: impl Into<String>) {
        let mut state = self.state.write().await;
        state.refresh_token = Some(token.into());
        self.persist(&state).await;
    }

    /// Replaces the stored profile, keeping the tokens.
    pub async fn set_user(&self, user: &User) {
        let mut state = self.state.write().await;
        state.user = serde_json::to_value(user).ok();
        self.persist(&state).await;
    }

    pub async fn access_token(&self) -> Option<String> {
        let state = self.state.read().await;
        present(&state.access_token)
    }

    pub async fn refresh_token(&self) -> Option<String> {
        let state = self.state.read().await;
        present(&state.refresh_token)
    }

    /// The stored profile. A profile that does not parse is treated as absent.
    pub async fn user(&self) -> Option<User> {
        let state = self.state.read().await;
        let value = state.user.clone()?;
        match serde_json::from_value(value) {
            Ok(user) => Some(user),
            Err(e) => {
                debug!("Stored user profile is unreadable: {e}");
                None
            }
        }
    }

    /// Removes all three stored values. Calling it on an empty store does nothing.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        if *state == SessionFile::default() {
            return;
        }
        *state = SessionFile::default();
        self.persist(&state).await;
    }

    /// True iff an access token is present. Expiry is not checked here; an expired token is only
    /// discovered when the server rejects it.
    pub async fn is_authenticated(&self) -> bool {
        self.access_token().await.is_some()
    }

    /// Writes the state while the caller still holds the write lock, so writes land in order.
    /// Failing to write is logged and otherwise ignored; memory stays authoritative.
    async fn persist(&self, state: &SessionFile) {
        let Some(path) = &self.path else {
            return;
        };
        let result = match serde_json::to_string_pretty(state) {
            Ok(json) => utils::write_private(path, json).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!("Unable to save the session to {}: {e:#}", path.display());
        }
    }
}

fn present(token: &Option<String>) -> Option<String> {
    token.clone().filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_empty_store() {
        let store = SessionStore::in_memory();
        assert_eq!(store.access_token().await, None);
        assert_eq!(store.refresh_token().await, None);
        assert_eq!(store.user().await, None);
        assert!(!store.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_set_and_clear() {
        let store = SessionStore::in_memory();
        store
            .set_session(Tokens::new("a1", "r1"), &User::new("ana"))
            .await;
        assert!(store.is_authenticated().await);
        assert_eq!(store.access_token().await.as_deref(), Some("a1"));
        assert_eq!(store.refresh_token().await.as_deref(), Some("r1"));
        assert_eq!(store.user().await.unwrap().username, "ana");

        store.clear().await;
        assert!(!store.is_authenticated().await);
        assert_eq!(store.refresh_token().await, None);
        assert_eq!(store.user().await, None);

        // idempotent
        store.clear().await;
        assert!(!store.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_empty_access_token_is_absent() {
        let store = SessionStore::in_memory();
        store.set_session(Tokens::new("", "r1"), &User::new("ana")).await;
        assert!(!store.is_authenticated().await);
        assert_eq!(store.refresh_token().await.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = SessionStore::in_memory();
        let other = store.clone();
        store.set_access_token("shared").await;
        assert_eq!(other.access_token().await.as_deref(), Some("shared"));
    }

    #[tokio::test]
    async fn test_persisted_between_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let store = SessionStore::load(&path).await;
        store
            .set_session(Tokens::new("a1", "r1"), &User::new("luis"))
            .await;
        store.set_access_token("a2").await;

        let reloaded = SessionStore::load(&path).await;
        assert_eq!(reloaded.access_token().await.as_deref(), Some("a2"));
        assert_eq!(reloaded.refresh_token().await.as_deref(), Some("r1"));
        assert_eq!(reloaded.user().await.unwrap().username, "luis");

        reloaded.clear().await;
        let cleared = SessionStore::load(&path).await;
        assert!(!cleared.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_empty_session() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        utils::write(&path, "{ not json").await.unwrap();

        let store = SessionStore::load(&path).await;
        assert!(!store.is_authenticated().await);
        assert_eq!(store.user().await, None);
    }

    #[tokio::test]
    async fn test_corrupt_user_is_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        utils::write(
            &path,
            r#"{"access_token":"a1","refresh_token":"r1","user":"definitely not a user"}"#,
        )
        .await
        .unwrap();

        let store = SessionStore::load(&path).await;
        assert!(store.is_authenticated().await);
        assert_eq!(store.user().await, None);
    }

    #[tokio::test]
    async fn test_global_is_shared() {
        let a = SessionStore::global();
        let b = SessionStore::global();
        assert!(std::ptr::eq(a, b));
    }
}
