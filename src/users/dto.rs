use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Role, UserAccount};

/// Input for registering an account. The plaintext password is hashed on
/// construction of the record and dropped with this value.
#[derive(Clone, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

impl NewAccount {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            role: Role::default(),
            avatar_url: None,
            provider: None,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// Partial profile change. Absent fields stay as they are; `avatar_url:
/// null` clears the avatar.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar_url: Option<Option<String>>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub provider: Option<String>,
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Externally visible part of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicAccount {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub avatar_url: Option<String>,
    pub provider: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&UserAccount> for PublicAccount {
    fn from(account: &UserAccount) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            email: account.email.clone(),
            role: account.role,
            avatar_url: account.avatar_url.clone(),
            provider: account.provider.clone(),
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_debug_hides_password() {
        let input = NewAccount::new("Ada", "ada@example.com", "s3cret-value");
        let rendered = format!("{input:?}");
        assert!(!rendered.contains("s3cret-value"));
        assert!(rendered.contains("ada@example.com"));
    }

    #[test]
    fn new_account_deserializes_with_defaults() {
        let input: NewAccount = serde_json::from_str(
            r#"{"name":"Ada","email":"ada@example.com","password":"pw"}"#,
        )
        .unwrap();
        assert_eq!(input.role, Role::User);
        assert!(input.avatar_url.is_none());
        assert!(input.provider.is_none());
    }

    #[test]
    fn new_account_rejects_unknown_role() {
        let result = serde_json::from_str::<NewAccount>(
            r#"{"name":"Ada","email":"ada@example.com","password":"pw","role":"root"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn profile_update_distinguishes_null_from_absent_avatar() {
        let absent: ProfileUpdate = serde_json::from_str(r#"{"name":"Ada"}"#).unwrap();
        assert_eq!(absent.avatar_url, None);

        let cleared: ProfileUpdate = serde_json::from_str(r#"{"avatar_url":null}"#).unwrap();
        assert_eq!(cleared.avatar_url, Some(None));

        let set: ProfileUpdate =
            serde_json::from_str(r#"{"avatar_url":"https://cdn.example.com/a.png"}"#).unwrap();
        assert_eq!(
            set.avatar_url,
            Some(Some("https://cdn.example.com/a.png".to_string()))
        );
    }
}
