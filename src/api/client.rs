//! The authenticated HTTP client.
//!
//! Each call to `ApiClient::request` is one logical request:
//! 1. Take the access token from the session, refreshing first if there is none.
//! 2. Send the request with `Authorization: Bearer <token>` and a JSON content type.
//! 3. On `401`, refresh once and send once more. A second `401`, or a failed refresh, clears the
//!    session and ends in `SessionExpired`.
//! 4. `204` resolves to no body; anything else is parsed as JSON.
//!
//! Refreshes are serialized: callers that hit `401` at the same time wait for a single refresh and
//! then reuse its token.

use crate::api::{
    endpoint, HttpRequest, HttpResponse, Method, Transport, APPLICATION_JSON, AUTHORIZATION,
    CONTENT_TYPE, TOKEN_REFRESH,
};
use crate::error::{ClientError, Res, GENERIC_FAILURE};
use crate::session::SessionStore;
use crate::Config;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

const UNAUTHORIZED: u16 = 401;
const NO_CONTENT: u16 = 204;

/// Method, body and extra headers for a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self::with_body(Method::Post, body)
    }

    pub fn put(body: Value) -> Self {
        Self::with_body(Method::Put, body)
    }

    pub fn delete() -> Self {
        Self {
            method: Method::Delete,
            ..Self::default()
        }
    }

    fn with_body(method: Method, body: Value) -> Self {
        Self {
            method,
            body: Some(body),
            headers: Vec::new(),
        }
    }

    /// Adds a header. It may replace the JSON content type but never the authorization header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Performs requests against the API with the credentials held in a `SessionStore`. Cloning is
/// cheap and clones share the session and the refresh lock.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: SessionStore,
    refresh_lock: Arc<Mutex<()>>,
}

impl Debug for ApiClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("session", &self.session.path())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    access: Option<String>,
    #[serde(default)]
    refresh: Option<String>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, session: SessionStore) -> Self {
        Self {
            transport,
            session,
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Creates a client for the API in `config`, using the session file in the finanzas home.
    pub async fn from_config(config: &Config, mode: crate::api::Mode) -> crate::Result<Self> {
        let session = SessionStore::load(config.session_path()).await;
        let transport = crate::api::transport(config, mode, &session).await?;
        Ok(Self::new(transport, session))
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Performs one logical authenticated request. `Ok(None)` means the server sent no content.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Res<Option<Value>> {
        let path = endpoint(path);
        debug!("{} {path}", options.method);

        // A refresh may happen at most once per logical request, whether it was needed up front
        // or after a rejection.
        let mut refreshed = false;
        let mut token = match self.session.access_token().await {
            Some(token) => token,
            None => {
                debug!("No access token, attempting a refresh before {path}");
                refreshed = true;
                self.renew(None).await.ok_or(ClientError::Unauthenticated)?
            }
        };

        loop {
            let request = build_request(&path, &options, Some(&token));
            let response = self.transport.send(request).await?;
            if response.status != UNAUTHORIZED {
                return interpret(response);
            }

            if refreshed {
                warn!("Still unauthorized after refreshing the token, ending the session");
                self.session.clear().await;
                return Err(ClientError::SessionExpired);
            }
            refreshed = true;

            debug!("Unauthorized, refreshing the access token and retrying {path}");
            match self.renew(Some(&token)).await {
                Some(new_token) => token = new_token,
                None => {
                    self.session.clear().await;
                    return Err(ClientError::SessionExpired);
                }
            }
        }
    }

    /// Performs a request that carries no credentials and never refreshes, e.g. login.
    pub(crate) async fn request_public(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Res<Option<Value>> {
        let path = endpoint(path);
        debug!("{} {path} (unauthenticated)", options.method);
        let response = self
            .transport
            .send(build_request(&path, &options, None))
            .await?;
        interpret(response)
    }

    /// `request` followed by deserializing the body into `T`. A missing body is a parse failure.
    pub async fn fetch<T>(&self, path: &str, options: RequestOptions) -> Res<T>
    where
        T: DeserializeOwned,
    {
        let value = self
            .request(path, options)
            .await?
            .ok_or_else(|| ClientError::parse("the response has no content"))?;
        serde_json::from_value(value).map_err(ClientError::parse)
    }

    /// Obtains a new access token with the stored refresh token and stores it.
    ///
    /// Returns `None` without touching the network when there is no refresh token, and `None` on
    /// any failure. It never clears the session; that is up to the caller.
    pub async fn refresh(&self) -> Option<String> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refreshes unless another caller already replaced `stale` while we waited for the lock.
    async fn renew(&self, stale: Option<&str>) -> Option<String> {
        let _guard = self.refresh_lock.lock().await;
        if let Some(current) = self.session.access_token().await {
            if stale != Some(current.as_str()) {
                trace!("The access token was refreshed by another request");
                return Some(current);
            }
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Option<String> {
        let refresh_token = self.session.refresh_token().await?;
        let body = serde_json::json!({ "refresh": refresh_token });
        let request = build_request(
            &endpoint(TOKEN_REFRESH),
            &RequestOptions::post(body),
            None,
        );

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Token refresh failed: {e}");
                return None;
            }
        };
        if !response.is_success() {
            warn!("Token refresh was rejected with status {}", response.status);
            return None;
        }
        let parsed: RefreshResponse = match serde_json::from_str(&response.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Token refresh response is not valid: {e}");
                return None;
            }
        };
        let Some(access) = parsed.access.filter(|t| !t.is_empty()) else {
            warn!("Token refresh response has no access token");
            return None;
        };

        self.session.set_access_token(access.clone()).await;
        if let Some(rotated) = parsed.refresh.filter(|t| !t.is_empty()) {
            self.session.set_refresh_token(rotated).await;
        }
        debug!("Access token refreshed");
        Some(access)
    }
}

/// JSON content type first, then the caller's headers, then the bearer credential, which the
/// caller cannot override.
fn build_request(path: &str, options: &RequestOptions, token: Option<&str>) -> HttpRequest {
    let mut headers = vec![(CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string())];
    for (name, value) in &options.headers {
        if name.eq_ignore_ascii_case(AUTHORIZATION) {
            continue;
        }
        headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        headers.push((name.clone(), value.clone()));
    }
    if let Some(token) = token {
        headers.push((AUTHORIZATION.to_string(), format!("Bearer {token}")));
    }
    HttpRequest {
        method: options.method,
        path: path.to_string(),
        headers,
        body: options.body.as_ref().map(Value::to_string),
    }
}

/// Turns a response that is not a `401` into the result of the request.
fn interpret(response: HttpResponse) -> Res<Option<Value>> {
    if response.status == NO_CONTENT {
        return Ok(None);
    }

    let parsed = serde_json::from_str::<Value>(&response.body);
    if !response.is_success() {
        let message = parsed
            .ok()
            .as_ref()
            .and_then(server_message)
            .unwrap_or_else(|| format!("{GENERIC_FAILURE} with status {}", response.status));
        debug!("Request failed with status {}: {message}", response.status);
        return Err(ClientError::request_failed(Some(response.status), message));
    }

    if response.body.trim().is_empty() {
        return Ok(None);
    }
    parsed.map(Some).map_err(ClientError::parse)
}

/// The message a server put in an error body, if it put one in a field we know.
fn server_message(body: &Value) -> Option<String> {
    ["detail", "message", "error"]
        .iter()
        .filter_map(|key| body.get(key))
        .find_map(|v| v.as_str().map(str::to_string))
        .filter(|m| !m.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FakeApi, LOGIN};
    use crate::model::{Transaction, User};
    use crate::session::Tokens;
    use serde_json::json;

    async fn logged_in(fake: &Arc<FakeApi>) -> ApiClient {
        let (access, refresh) = fake.issue_tokens("demo");
        let session = SessionStore::in_memory();
        session
            .set_session(Tokens::new(access, refresh), &User::new("demo"))
            .await;
        ApiClient::new(fake.clone(), session)
    }

    #[test]
    fn test_build_request_headers() {
        let options = RequestOptions::get()
            .header("authorization", "Bearer evil")
            .header("X-Trace", "1")
            .header("content-type", "application/merge-patch+json");
        let request = build_request("api/finanzas/ingresos/", &options, Some("tok"));
        assert_eq!(request.header(AUTHORIZATION), Some("Bearer tok"));
        assert_eq!(request.header("x-trace"), Some("1"));
        assert_eq!(
            request.header(CONTENT_TYPE),
            Some("application/merge-patch+json")
        );
        assert_eq!(
            request
                .headers
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case(AUTHORIZATION))
                .count(),
            1
        );
    }

    #[test]
    fn test_interpret_no_content() {
        assert_eq!(interpret(HttpResponse::new(204, "")).unwrap(), None);
    }

    #[test]
    fn test_interpret_server_message() {
        let err = interpret(HttpResponse::new(400, r#"{"detail":"Monto inválido"}"#)).unwrap_err();
        assert_eq!(
            err,
            ClientError::request_failed(Some(400), "Monto inválido")
        );

        let err = interpret(HttpResponse::new(500, r#"{"message":"boom"}"#)).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_interpret_generic_message() {
        let err = interpret(HttpResponse::new(404, "<html>Not Found</html>")).unwrap_err();
        assert_eq!(
            err,
            ClientError::request_failed(Some(404), "Request failed with status 404")
        );
        let err = interpret(HttpResponse::new(400, r#"{"amount":["required"]}"#)).unwrap_err();
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_interpret_parse_failure() {
        let err = interpret(HttpResponse::new(200, "<html>")).unwrap_err();
        assert!(matches!(err, ClientError::ParseFailed(_)));
    }

    #[tokio::test]
    async fn test_authenticated_request() {
        let fake = Arc::new(FakeApi::seeded());
        let client = logged_in(&fake).await;
        let incomes: Vec<Transaction> = client
            .fetch("ingresos", RequestOptions::get())
            .await
            .unwrap();
        assert!(!incomes.is_empty());
        assert_eq!(fake.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_then_retry_after_401() {
        let fake = Arc::new(FakeApi::seeded());
        let client = logged_in(&fake).await;
        let before = client.session().access_token().await.unwrap();

        // The server forgets the access token, so the next call gets one 401.
        fake.revoke_access_tokens();
        let result = client.request("ingresos", RequestOptions::get()).await;

        assert!(result.unwrap().is_some());
        let after = client.session().access_token().await.unwrap();
        assert_ne!(before, after);
        assert_eq!(fake.refresh_calls(), 1);
        assert_eq!(fake.requests_to("api/finanzas/ingresos/"), 2);
    }

    #[tokio::test]
    async fn test_always_401_is_bounded() {
        let fake = Arc::new(FakeApi::seeded());
        let client = logged_in(&fake).await;
        fake.reject_all_authenticated(true);

        let err = client
            .request("ingresos", RequestOptions::get())
            .await
            .unwrap_err();

        assert_eq!(err, ClientError::SessionExpired);
        assert_eq!(fake.refresh_calls(), 1);
        assert_eq!(fake.requests_to("api/finanzas/ingresos/"), 2);
        assert!(!client.session().is_authenticated().await);
        assert_eq!(client.session().refresh_token().await, None);
        assert_eq!(client.session().user().await, None);
    }

    #[tokio::test]
    async fn test_failed_refresh_expires_session() {
        let fake = Arc::new(FakeApi::seeded());
        let client = logged_in(&fake).await;
        fake.revoke_access_tokens();
        fake.revoke_refresh_tokens();

        let err = client
            .request("gastos", RequestOptions::get())
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::SessionExpired);
        assert_eq!(fake.requests_to("api/finanzas/gastos/"), 1);
        assert!(!client.session().is_authenticated().await);
    }

    #[tokio::test]
    async fn test_no_tokens_is_unauthenticated_without_network() {
        let fake = Arc::new(FakeApi::seeded());
        let client = ApiClient::new(fake.clone(), SessionStore::in_memory());

        let err = client
            .request("ingresos", RequestOptions::get())
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Unauthenticated);
        assert_eq!(fake.total_requests(), 0);
    }

    #[tokio::test]
    async fn test_missing_access_token_refreshes_first() {
        let fake = Arc::new(FakeApi::seeded());
        let (_, refresh) = fake.issue_tokens("demo");
        let session = SessionStore::in_memory();
        session.set_refresh_token(refresh).await;
        let client = ApiClient::new(fake.clone(), session);

        let result = client.request("ingresos", RequestOptions::get()).await;
        assert!(result.is_ok());
        assert_eq!(fake.refresh_calls(), 1);
        assert!(client.session().is_authenticated().await);
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token() {
        let fake = Arc::new(FakeApi::seeded());
        let client = ApiClient::new(fake.clone(), SessionStore::in_memory());
        assert_eq!(client.refresh().await, None);
        assert_eq!(fake.total_requests(), 0);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_session() {
        let fake = Arc::new(FakeApi::seeded());
        let client = logged_in(&fake).await;
        fake.revoke_refresh_tokens();
        assert_eq!(client.refresh().await, None);
        assert!(client.session().is_authenticated().await);
        assert!(client.session().refresh_token().await.is_some());
    }

    #[tokio::test]
    async fn test_refresh_response_without_access_token() {
        let fake = Arc::new(FakeApi::seeded());
        let client = logged_in(&fake).await;
        fake.override_response(TOKEN_REFRESH, 200, r#"{"token":"nope"}"#);
        assert_eq!(client.refresh().await, None);
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_one_refresh() {
        let fake = Arc::new(FakeApi::seeded());
        let client = logged_in(&fake).await;
        fake.revoke_access_tokens();

        let a = client.clone();
        let b = client.clone();
        let (ra, rb) = tokio::join!(
            a.request("ingresos", RequestOptions::get()),
            b.request("gastos", RequestOptions::get())
        );
        assert!(ra.is_ok());
        assert!(rb.is_ok());
        assert_eq!(fake.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_request_failed() {
        let fake = Arc::new(FakeApi::seeded());
        let client = logged_in(&fake).await;
        let err = client
            .request("gastos/99999", RequestOptions::delete())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(matches!(err, ClientError::RequestFailed { .. }));
        assert!(client.session().is_authenticated().await);
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_failure() {
        let fake = Arc::new(FakeApi::seeded());
        let client = logged_in(&fake).await;
        fake.override_response("ingresos", 200, "this is not json");
        let err = client
            .request("ingresos", RequestOptions::get())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ParseFailed(_)));
    }

    #[tokio::test]
    async fn test_fetch_shape_mismatch_is_parse_failure() {
        let fake = Arc::new(FakeApi::seeded());
        let client = logged_in(&fake).await;
        fake.override_response("ingresos", 200, r#"{"results":"surprise"}"#);
        let err = client
            .fetch::<Vec<Value>>("ingresos", RequestOptions::get())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ParseFailed(_)));
    }

    #[tokio::test]
    async fn test_public_request_has_no_credentials() {
        let fake = Arc::new(FakeApi::seeded());
        let client = logged_in(&fake).await;
        let body = json!({"username": "demo", "password": "wrong"});
        let err = client
            .request_public(LOGIN, RequestOptions::post(body))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(fake.refresh_calls(), 0);
        assert!(fake
            .last_request()
            .unwrap()
            .header(AUTHORIZATION)
            .is_none());
    }

    #[tokio::test]
    async fn test_test_mode_login_carries_over_to_the_next_client() {
        let env = crate::test::TestEnv::new().await;
        let first = ApiClient::from_config(env.config(), crate::Mode::Test)
            .await
            .unwrap();
        first.login("demo", "demo").await.unwrap();

        // A new process gets a new fake, but the saved session still works against it
        let second = ApiClient::from_config(env.config(), crate::Mode::Test)
            .await
            .unwrap();
        let incomes = crate::resources::Resources::new(&second)
            .incomes
            .list()
            .await
            .unwrap();
        assert!(!incomes.is_empty());

        second.logout().await;
        let third = ApiClient::from_config(env.config(), crate::Mode::Test)
            .await
            .unwrap();
        let err = crate::resources::Resources::new(&third)
            .incomes
            .list()
            .await
            .unwrap_err();
        assert!(err.is_auth());
    }
}
