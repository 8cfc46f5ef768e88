//! Account operations: login, registration, logout and profile changes.

use crate::api::{
    ApiClient, RequestOptions, LOGIN, PASSWORD_CHANGE, PROFILE_UPDATE, REGISTER,
};
use crate::error::{ClientError, Res};
use crate::model::User;
use crate::session::Tokens;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// The body of a registration request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Registration {
    pub fn validate(&self) -> Res<()> {
        if self.username.trim().is_empty() {
            return Err(ClientError::validation("a username is required"));
        }
        if self.password.is_empty() {
            return Err(ClientError::validation("a password is required"));
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(ClientError::validation(format!(
                    "'{email}' is not an email address"
                )));
            }
        }
        Ok(())
    }
}

/// The fields of the profile that can be changed. Absent fields are left alone by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self == &ProfileUpdate::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

impl PasswordChange {
    pub fn validate(&self) -> Res<()> {
        if self.old_password.is_empty() || self.new_password.is_empty() {
            return Err(ClientError::validation(
                "both the current and the new password are required",
            ));
        }
        if self.old_password == self.new_password {
            return Err(ClientError::validation(
                "the new password must be different from the current one",
            ));
        }
        Ok(())
    }
}

/// What `login/` and, sometimes, `register/` answer with.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    access: Option<String>,
    #[serde(default)]
    refresh: Option<String>,
    #[serde(default)]
    user: Option<Value>,
}

impl LoginResponse {
    fn tokens(&self) -> Option<Tokens> {
        match (&self.access, &self.refresh) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some(Tokens::new(access, refresh))
            }
            _ => None,
        }
    }

    /// The profile the server sent, or one holding just `username` when it sent none we can read.
    fn user(&self, username: &str) -> User {
        self.user
            .clone()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_else(|| User::new(username))
    }
}

impl ApiClient {
    /// Exchanges credentials for tokens and stores them along with the user's profile. A failed
    /// login leaves the current session as it was.
    pub async fn login(&self, username: &str, password: &str) -> Res<User> {
        let body = serde_json::json!({ "username": username, "password": password });
        let value = self
            .request_public(LOGIN, RequestOptions::post(body))
            .await?
            .ok_or_else(|| ClientError::parse("the login response has no content"))?;
        let response: LoginResponse = serde_json::from_value(value).map_err(ClientError::parse)?;
        let tokens = response
            .tokens()
            .ok_or_else(|| ClientError::parse("the login response has no tokens"))?;
        let user = response.user(username);
        self.session().set_session(tokens, &user).await;
        info!("Logged in as {}", user.username);
        Ok(user)
    }

    /// Creates an account. When the server answers with tokens the new user is logged in, which is
    /// reported by returning `Some`.
    pub async fn register(&self, registration: &Registration) -> Res<Option<User>> {
        registration.validate()?;
        let body = serde_json::to_value(registration).map_err(ClientError::parse)?;
        let Some(value) = self
            .request_public(REGISTER, RequestOptions::post(body))
            .await?
        else {
            return Ok(None);
        };
        let response: LoginResponse = match serde_json::from_value(value) {
            Ok(response) => response,
            Err(e) => {
                debug!("Registration response is not a login response: {e}");
                return Ok(None);
            }
        };
        let Some(tokens) = response.tokens() else {
            debug!("Registration did not log the user in");
            return Ok(None);
        };
        let user = response.user(&registration.username);
        self.session().set_session(tokens, &user).await;
        info!("Registered and logged in as {}", user.username);
        Ok(Some(user))
    }

    /// Forgets the session. Nothing is sent to the server.
    pub async fn logout(&self) {
        self.session().clear().await;
        info!("Logged out");
    }

    /// Sends the changed profile fields and stores the profile the server returns.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Res<User> {
        if update.is_empty() {
            return Err(ClientError::validation("nothing to update"));
        }
        let body = serde_json::to_value(update).map_err(ClientError::parse)?;
        let user: User = self
            .fetch(PROFILE_UPDATE, RequestOptions::put(body))
            .await?;
        self.session().set_user(&user).await;
        Ok(user)
    }

    pub async fn change_password(&self, change: &PasswordChange) -> Res<()> {
        change.validate()?;
        let body = serde_json::to_value(change).map_err(ClientError::parse)?;
        self.request(PASSWORD_CHANGE, RequestOptions::post(body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FakeApi;
    use crate::session::SessionStore;
    use std::sync::Arc;

    fn client(fake: &Arc<FakeApi>) -> ApiClient {
        ApiClient::new(fake.clone(), SessionStore::in_memory())
    }

    #[tokio::test]
    async fn test_login_stores_session() {
        let fake = Arc::new(FakeApi::seeded());
        let client = client(&fake);
        let user = client.login("demo", "demo").await.unwrap();
        assert_eq!(user.username, "demo");
        assert!(client.session().is_authenticated().await);
        assert!(client.session().refresh_token().await.is_some());
        assert_eq!(client.session().user().await.unwrap().username, "demo");
    }

    #[tokio::test]
    async fn test_bad_login_keeps_state() {
        let fake = Arc::new(FakeApi::seeded());
        let client = client(&fake);
        let err = client.login("demo", "wrong").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(
            err.to_string(),
            "No active account found with the given credentials"
        );
        assert!(!client.session().is_authenticated().await);
        // a 401 on login is not a session problem and must not trigger a refresh
        assert_eq!(fake.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_login_without_user_falls_back_to_username() {
        let fake = Arc::new(FakeApi::new());
        fake.override_response(LOGIN, 200, r#"{"access":"a","refresh":"r"}"#);
        let client = client(&fake);
        let user = client.login("maria", "pw").await.unwrap();
        assert_eq!(user, User::new("maria"));
        assert_eq!(client.session().access_token().await.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_register_logs_in() {
        let fake = Arc::new(FakeApi::new());
        let client = client(&fake);
        let registration = Registration {
            username: "nuevo".into(),
            password: "secreto".into(),
            email: Some("nuevo@example.com".into()),
        };
        let user = client.register(&registration).await.unwrap().unwrap();
        assert_eq!(user.field("email"), Some("nuevo@example.com"));
        assert!(client.session().is_authenticated().await);

        // the same username again is rejected with the server's message
        let err = client.register(&registration).await.unwrap_err();
        assert_eq!(err.to_string(), "A user with that username already exists.");
    }

    #[tokio::test]
    async fn test_register_validates_first() {
        let fake = Arc::new(FakeApi::new());
        let client = client(&fake);
        let registration = Registration {
            username: " ".into(),
            password: "x".into(),
            email: None,
        };
        let err = client.register(&registration).await.unwrap_err();
        assert!(matches!(err, ClientError::ValidationFailed(_)));
        assert_eq!(fake.total_requests(), 0);
    }

    #[tokio::test]
    async fn test_register_without_tokens() {
        let fake = Arc::new(FakeApi::new());
        fake.override_response(REGISTER, 201, r#"{"username":"pepe"}"#);
        let client = client(&fake);
        let registration = Registration {
            username: "pepe".into(),
            password: "x".into(),
            email: None,
        };
        assert_eq!(client.register(&registration).await.unwrap(), None);
        assert!(!client.session().is_authenticated().await);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let fake = Arc::new(FakeApi::seeded());
        let client = client(&fake);
        client.login("demo", "demo").await.unwrap();
        client.logout().await;
        assert!(!client.session().is_authenticated().await);
        assert_eq!(client.session().refresh_token().await, None);
        assert_eq!(client.session().user().await, None);
        client.logout().await;
        assert!(!client.session().is_authenticated().await);
    }

    #[tokio::test]
    async fn test_update_profile() {
        let fake = Arc::new(FakeApi::seeded());
        let client = client(&fake);
        client.login("demo", "demo").await.unwrap();
        let update = ProfileUpdate {
            email: Some("demo@example.com".into()),
            ..Default::default()
        };
        let user = client.update_profile(&update).await.unwrap();
        assert_eq!(user.field("email"), Some("demo@example.com"));
        let stored = client.session().user().await.unwrap();
        assert_eq!(stored.field("email"), Some("demo@example.com"));
        assert!(client.session().is_authenticated().await);
    }

    #[tokio::test]
    async fn test_update_profile_requires_a_change() {
        let fake = Arc::new(FakeApi::seeded());
        let client = client(&fake);
        let err = client
            .update_profile(&ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_change_password() {
        let fake = Arc::new(FakeApi::seeded());
        let client = client(&fake);
        client.login("demo", "demo").await.unwrap();

        let same = PasswordChange {
            old_password: "demo".into(),
            new_password: "demo".into(),
        };
        assert!(matches!(
            client.change_password(&same).await.unwrap_err(),
            ClientError::ValidationFailed(_)
        ));

        let change = PasswordChange {
            old_password: "demo".into(),
            new_password: "nueva".into(),
        };
        client.change_password(&change).await.unwrap();
        client.logout().await;
        assert!(client.login("demo", "demo").await.is_err());
        client.login("demo", "nueva").await.unwrap();
    }
}
