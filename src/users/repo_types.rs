use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AccountError;

pub const LOCAL_PROVIDER: &str = "local";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Host,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Host => "host",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "host" => Ok(Self::Host),
            "admin" => Ok(Self::Admin),
            other => Err(AccountError::Validation(format!("unknown role: {other:?}"))),
        }
    }
}

/// One user's account and authentication material.
///
/// `password_hash` is `None` when the record was loaded without credential
/// data; only [`AccountStore::find_by_email_with_credentials`] fills it in.
///
/// [`AccountStore::find_by_email_with_credentials`]: super::AccountStore::find_by_email_with_credentials
#[derive(Clone, Serialize)]
pub struct UserAccount {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) email: String,
    #[serde(skip_serializing)]
    pub(crate) password_hash: Option<String>, // argon2 PHC string, never exposed
    pub(crate) role: Role,
    pub(crate) avatar_url: Option<String>,
    pub(crate) provider: String,
    #[serde(skip_serializing)]
    pub(crate) reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub(crate) reset_token_expires_at: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub(crate) version: i32, // bumped by the store on every update
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) updated_at: OffsetDateTime,
}

impl fmt::Debug for UserAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserAccount")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("provider", &self.provider)
            .field("has_credentials", &self.password_hash.is_some())
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl UserAccount {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn reset_token(&self) -> Option<&str> {
        self.reset_token.as_deref()
    }

    pub fn reset_token_expires_at(&self) -> Option<OffsetDateTime> {
        self.reset_token_expires_at
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn updated_at(&self) -> OffsetDateTime {
        self.updated_at
    }

    pub fn has_credentials(&self) -> bool {
        self.password_hash.is_some()
    }

    pub(crate) fn password_hash(&self) -> Option<&str> {
        self.password_hash.as_deref()
    }

    /// Same record with credential data dropped.
    pub(crate) fn without_credentials(mut self) -> Self {
        self.password_hash = None;
        self
    }
}

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
pub(crate) struct AccountRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: String,
    pub avatar_url: Option<String>,
    pub provider: String,
    pub reset_token: Option<String>,
    pub reset_token_expires_at: Option<OffsetDateTime>,
    pub version: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<AccountRow> for UserAccount {
    type Error = AccountError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse()?,
            avatar_url: row.avatar_url,
            provider: row.provider,
            reset_token: row.reset_token,
            reset_token_expires_at: row.reset_token_expires_at,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_only_known_values() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("host".parse::<Role>().unwrap(), Role::Host);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!(matches!("root".parse::<Role>(), Err(AccountError::Validation(_))));
        assert!(matches!("Admin".parse::<Role>(), Err(AccountError::Validation(_))));
    }

    #[test]
    fn role_defaults_to_user_and_serializes_lowercase() {
        assert_eq!(Role::default(), Role::User);
        assert_eq!(serde_json::to_string(&Role::Host).unwrap(), "\"host\"");
        let parsed: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(parsed, Role::Admin);
        assert!(serde_json::from_str::<Role>("\"superuser\"").is_err());
    }

    #[test]
    fn row_with_unknown_role_is_rejected() {
        let now = OffsetDateTime::now_utc();
        let row = AccountRow {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: None,
            role: "owner".into(),
            avatar_url: None,
            provider: LOCAL_PROVIDER.into(),
            reset_token: None,
            reset_token_expires_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(UserAccount::try_from(row), Err(AccountError::Validation(_))));
    }
}
