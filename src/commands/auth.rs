//! Account commands: `register`, `login`, `logout`, `status`, `profile` and `password`.

use crate::api::{ApiClient, PasswordChange, ProfileUpdate, Registration};
use crate::commands::Out;
use crate::model::User;
use crate::Result;
use serde::Serialize;

pub async fn register(client: &ApiClient, registration: &Registration) -> Result<Out<Option<User>>> {
    let user = client.register(registration).await?;
    let message = match &user {
        Some(user) => format!("Registered and logged in as {}", user.username),
        None => format!(
            "Registered {}. Now run 'finanzas login {}'",
            registration.username, registration.username
        ),
    };
    Ok(Out::new(message, user))
}

pub async fn login(client: &ApiClient, username: &str, password: &str) -> Result<Out<User>> {
    let user = client.login(username, password).await?;
    Ok(Out::new(format!("Logged in as {}", user.username), user))
}

pub async fn logout(client: &ApiClient) -> Result<Out<()>> {
    client.logout().await;
    Ok("Logged out".into())
}

/// What `finanzas status` reports.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub authenticated: bool,
    pub user: Option<User>,
}

/// Reports the stored session. The server is not contacted, so an expired token still counts as
/// logged in until a request is rejected.
pub async fn status(client: &ApiClient) -> Result<Out<Status>> {
    let session = client.session();
    let status = Status {
        authenticated: session.is_authenticated().await,
        user: session.user().await,
    };
    let message = match (&status.user, status.authenticated) {
        (Some(user), true) => format!("Logged in as {}", user.username),
        (None, true) => "Logged in".to_string(),
        (_, false) => "Not logged in".to_string(),
    };
    Ok(Out::new(message, status))
}

/// Shows the stored profile when `update` is empty, otherwise sends it.
pub async fn profile(client: &ApiClient, update: &ProfileUpdate) -> Result<Out<User>> {
    if update.is_empty() {
        let Some(user) = client.session().user().await else {
            anyhow::bail!("No profile is stored, run 'finanzas login <USERNAME>'");
        };
        return Ok(Out::new(describe(&user), user));
    }
    let user = client.update_profile(update).await?;
    Ok(Out::new(format!("Updated: {}", describe(&user)), user))
}

pub async fn password(client: &ApiClient, change: &PasswordChange) -> Result<Out<()>> {
    client.change_password(change).await?;
    Ok("Password changed".into())
}

fn describe(user: &User) -> String {
    let mut s = user.username.clone();
    let names: Vec<&str> = ["first_name", "last_name"]
        .iter()
        .filter_map(|f| user.field(f))
        .filter(|n| !n.is_empty())
        .collect();
    if !names.is_empty() {
        s.push_str(&format!(" ({})", names.join(" ")));
    }
    if let Some(email) = user.field("email") {
        s.push_str(&format!(" <{email}>"));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_login_status_logout() {
        let env = TestEnv::new().await;
        let client = env.client().await;

        let out = status(&client).await.unwrap();
        assert_eq!(out.message(), "Not logged in");

        let out = login(&client, "demo", "demo").await.unwrap();
        assert_eq!(out.message(), "Logged in as demo");

        // a new client reads the same session file
        let out = status(&env.client().await).await.unwrap();
        assert_eq!(out.message(), "Logged in as demo");
        assert!(out.structure().unwrap().authenticated);

        logout(&client).await.unwrap();
        let out = status(&env.client().await).await.unwrap();
        assert!(!out.structure().unwrap().authenticated);
    }

    #[tokio::test]
    async fn test_bad_password() {
        let env = TestEnv::new().await;
        let err = login(&env.client().await, "demo", "nope").await.unwrap_err();
        let client_error = err.downcast_ref::<ClientError>().unwrap();
        assert_eq!(client_error.status(), Some(401));
    }

    #[tokio::test]
    async fn test_register() {
        let env = TestEnv::new().await;
        let registration = Registration {
            username: "lucia".into(),
            password: "pw".into(),
            email: None,
        };
        let out = register(&env.client().await, &registration).await.unwrap();
        assert_eq!(out.message(), "Registered and logged in as lucia");
    }

    #[tokio::test]
    async fn test_profile() {
        let env = TestEnv::logged_in().await;
        let client = env.client().await;

        let out = profile(&client, &ProfileUpdate::default()).await.unwrap();
        assert_eq!(out.message(), "demo");

        let update = ProfileUpdate {
            first_name: Some("Demo".into()),
            email: Some("demo@example.com".into()),
            ..Default::default()
        };
        let out = profile(&client, &update).await.unwrap();
        assert_eq!(out.message(), "Updated: demo (Demo) <demo@example.com>");
    }

    #[tokio::test]
    async fn test_profile_when_logged_out() {
        let env = TestEnv::new().await;
        let result = profile(&env.client().await, &ProfileUpdate::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_password() {
        let env = TestEnv::logged_in().await;
        let change = PasswordChange {
            old_password: "demo".into(),
            new_password: "otra".into(),
        };
        let out = password(&env.client().await, &change).await.unwrap();
        assert_eq!(out.message(), "Password changed");
    }
}
