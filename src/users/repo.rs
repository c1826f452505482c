use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::instrument;
use uuid::Uuid;

use super::repo_types::{AccountRow, UserAccount};
use crate::error::{AccountError, AccountResult};

/// Persistence collaborator for accounts.
///
/// Implementations own email uniqueness: a second account with an email
/// that is already stored must fail with [`AccountError::DuplicateEmail`].
/// Records returned from anything but `find_by_email_with_credentials` carry
/// no password hash.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Persist a new account. The record must carry a password hash.
    async fn create(&self, account: &UserAccount) -> AccountResult<UserAccount>;

    async fn find_by_id(&self, id: Uuid) -> AccountResult<Option<UserAccount>>;

    /// The only lookup that loads the password hash.
    async fn find_by_email_with_credentials(
        &self,
        email: &str,
    ) -> AccountResult<Option<UserAccount>>;

    /// Write name, email, role, avatar and provider. Fails with
    /// [`AccountError::Conflict`] if the stored version moved on.
    async fn update_profile(&self, account: &UserAccount) -> AccountResult<UserAccount>;

    /// Write the password hash only, with the same version check.
    async fn update_password(&self, account: &UserAccount) -> AccountResult<UserAccount>;
}

const PUBLIC_COLUMNS: &str = r#"id, name, email, NULL::text AS password_hash, role, avatar_url, provider,
       reset_token, reset_token_expires_at, version, created_at, updated_at"#;

const CREDENTIAL_COLUMNS: &str = r#"id, name, email, password_hash, role, avatar_url, provider,
       reset_token, reset_token_expires_at, version, created_at, updated_at"#;

fn map_unique_violation(e: sqlx::Error, email: &str) -> AccountError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return AccountError::DuplicateEmail(email.to_string());
        }
    }
    AccountError::Storage(e)
}

/// Postgres-backed [`AccountStore`].
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> AccountResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> AccountResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run users migrations")?;
        Ok(())
    }

    /// Tells a stale version apart from a missing row after a failed update.
    async fn missing_or_stale(&self, account: &UserAccount) -> AccountError {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)"#,
        )
        .bind(account.id)
        .fetch_one(&self.pool)
        .await;

        match exists {
            Ok(true) => AccountError::Conflict(format!(
                "account {} changed since version {}",
                account.id, account.version
            )),
            Ok(false) => AccountError::NotFound(account.id),
            Err(e) => AccountError::Storage(e),
        }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    #[instrument(skip(self, account), fields(account_id = %account.id))]
    async fn create(&self, account: &UserAccount) -> AccountResult<UserAccount> {
        let password_hash = account.password_hash().ok_or(AccountError::Credential)?;
        let sql = format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, avatar_url, provider,
                               reset_token, reset_token_expires_at, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, $10, $10)
            RETURNING {PUBLIC_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(account.id)
            .bind(&account.name)
            .bind(&account.email)
            .bind(password_hash)
            .bind(account.role.as_str())
            .bind(&account.avatar_url)
            .bind(&account.provider)
            .bind(&account.reset_token)
            .bind(account.reset_token_expires_at)
            .bind(account.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, &account.email))?;
        row.try_into()
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AccountResult<Option<UserAccount>> {
        let sql = format!("SELECT {PUBLIC_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(UserAccount::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_email_with_credentials(
        &self,
        email: &str,
    ) -> AccountResult<Option<UserAccount>> {
        let sql = format!("SELECT {CREDENTIAL_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(UserAccount::try_from).transpose()
    }

    #[instrument(skip(self, account), fields(account_id = %account.id))]
    async fn update_profile(&self, account: &UserAccount) -> AccountResult<UserAccount> {
        let sql = format!(
            r#"
            UPDATE users
            SET name = $3, email = $4, role = $5, avatar_url = $6, provider = $7,
                version = version + 1, updated_at = now()
            WHERE id = $1 AND version = $2
            RETURNING {PUBLIC_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(account.id)
            .bind(account.version)
            .bind(&account.name)
            .bind(&account.email)
            .bind(account.role.as_str())
            .bind(&account.avatar_url)
            .bind(&account.provider)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, &account.email))?;

        match row {
            Some(row) => row.try_into(),
            None => Err(self.missing_or_stale(account).await),
        }
    }

    #[instrument(skip(self, account), fields(account_id = %account.id))]
    async fn update_password(&self, account: &UserAccount) -> AccountResult<UserAccount> {
        let password_hash = account.password_hash().ok_or(AccountError::Credential)?;
        let sql = format!(
            r#"
            UPDATE users
            SET password_hash = $3, version = version + 1, updated_at = now()
            WHERE id = $1 AND version = $2
            RETURNING {PUBLIC_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(account.id)
            .bind(account.version)
            .bind(password_hash)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into(),
            None => Err(self.missing_or_stale(account).await),
        }
    }
}
