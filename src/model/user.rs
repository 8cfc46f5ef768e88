use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The profile of the logged-in user. Only `username` is relied upon; anything else the server
/// sends (email, names, ...) is kept in `other_fields` so that it survives a save and reload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(flatten)]
    pub other_fields: BTreeMap<String, Value>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            other_fields: BTreeMap::new(),
        }
    }

    /// A string field other than `username`, e.g. `email`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.other_fields.get(name).and_then(Value::as_str)
    }
}

#[test]
fn test_user_keeps_unknown_fields() {
    let json = r#"{"username":"ana","email":"ana@example.com","id":4}"#;
    let user: User = serde_json::from_str(json).unwrap();
    assert_eq!(user.username, "ana");
    assert_eq!(user.field("email"), Some("ana@example.com"));
    assert_eq!(user.field("id"), None);

    let back = serde_json::to_value(&user).unwrap();
    assert_eq!(back["id"], 4);
}

#[test]
fn test_user_requires_username() {
    assert!(serde_json::from_str::<User>(r#"{"email":"x@example.com"}"#).is_err());
}
