//! Talking to the finance API.
//!
//! The network is behind the `Transport` trait. `HttpTransport` sends requests with `reqwest`;
//! `FakeApi` answers them from memory so the program can run, top to bottom, without a server.
//! `ApiClient` sits on top of either one and handles credentials.

mod auth;
mod client;
mod fake;
mod http;

use crate::error::Res;
use crate::session::SessionStore;
use crate::Config;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

pub use auth::{PasswordChange, ProfileUpdate, Registration};
pub use client::{ApiClient, RequestOptions};
pub use fake::FakeApi;
pub use http::HttpTransport;
pub(crate) use http::parse_base_url;

/// Every endpoint lives under this prefix.
pub(crate) const API_PREFIX: &str = "api/finanzas";

pub(crate) const LOGIN: &str = "login";
pub(crate) const REGISTER: &str = "register";
pub(crate) const TOKEN_REFRESH: &str = "token/refresh";
pub(crate) const PROFILE_UPDATE: &str = "user/update";
pub(crate) const PASSWORD_CHANGE: &str = "user/change-password";

pub(crate) const AUTHORIZATION: &str = "Authorization";
pub(crate) const CONTENT_TYPE: &str = "Content-Type";
pub(crate) const APPLICATION_JSON: &str = "application/json";

/// Builds the path of an endpoint relative to the base URL, e.g. `api/finanzas/gastos/4/`.
pub(crate) fn endpoint(path: &str) -> String {
    format!("{API_PREFIX}/{}/", path.trim_matches('/'))
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

serde_plain::derive_display_from_serialize!(Method);
serde_plain::derive_fromstr_from_deserialize!(Method);

/// One HTTP request, already carrying all of its headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    /// Relative to the base URL.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// The value of the first header named `name`, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a request and returns whatever the server answered. Only failing to get an answer at all
/// is an error here; status codes are interpreted by the `ApiClient`.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Res<HttpResponse>;
}

/// Determines whether we are using the real API or an in-memory fake.
#[derive(Default, Debug, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Remote,
    Test,
}

impl Mode {
    /// `Mode::Test` when `FINANZAS_IN_TEST_MODE` is set and non-empty, otherwise `Mode::Remote`.
    pub fn from_env() -> Self {
        match std::env::var("FINANZAS_IN_TEST_MODE") {
            Ok(v) if !v.is_empty() => Mode::Test,
            _ => Mode::Remote,
        }
    }
}

/// Creates the transport for `mode`. In test mode the fake accepts the tokens in `session`, so a
/// login survives from one command to the next even though the data does not.
pub async fn transport(
    config: &Config,
    mode: Mode,
    session: &SessionStore,
) -> crate::Result<Arc<dyn Transport>> {
    debug!("Using {mode:?} transport");
    Ok(match mode {
        Mode::Remote => Arc::new(HttpTransport::new(config.base_url())?),
        Mode::Test => {
            let fake = FakeApi::seeded();
            if let Some(user) = session.user().await {
                fake.accept_tokens(
                    session.access_token().await.as_deref(),
                    session.refresh_token().await.as_deref(),
                    &user.username,
                );
            }
            Arc::new(fake)
        }
    })
}
