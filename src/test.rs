//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::api::{ApiClient, FakeApi};
use crate::session::SessionStore;
use crate::Config;
use std::sync::Arc;
use tempfile::TempDir;

/// Test environment with a finanzas home directory and a seeded `FakeApi`.
/// Holds TempDir to keep the directory alive for the duration of the test.
pub struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
    fake: Arc<FakeApi>,
}

impl TestEnv {
    /// Creates the home directory and config. Nobody is logged in.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("finanzas");
        let config = Config::create(&root, "http://localhost:8000")
            .await
            .unwrap();
        Self {
            _temp_dir: temp_dir,
            config,
            fake: Arc::new(FakeApi::seeded()),
        }
    }

    /// Like `new`, with the `demo` user logged in and the session saved.
    pub async fn logged_in() -> Self {
        let env = Self::new().await;
        env.client().await.login("demo", "demo").await.unwrap();
        env
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn fake(&self) -> &FakeApi {
        &self.fake
    }

    /// A client talking to the fake, with the session loaded from the home directory the way a
    /// new run of the program would load it.
    pub async fn client(&self) -> ApiClient {
        let session = SessionStore::load(self.config.session_path()).await;
        ApiClient::new(self.fake.clone(), session)
    }
}
