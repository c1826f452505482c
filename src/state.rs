use std::sync::Arc;

use crate::{
    auth::{Claims, PasswordService, TokenIssuer},
    config::AppConfig,
    error::AccountResult,
    users::{AccountStore, MemoryAccountStore, PgAccountStore, PublicAccount, UserAccount},
};

/// Everything a caller needs to register and authenticate accounts.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AccountStore>,
    pub config: Arc<AppConfig>,
    pub hasher: PasswordService,
    pub tokens: TokenIssuer,
}

/// Result of a successful login.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Session {
    pub token: String,
    pub account: PublicAccount,
}

impl AppState {
    /// Postgres-backed state. Fails on a missing database URL or an
    /// unusable token secret before any connection is made.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let tokens = TokenIssuer::new(&config.jwt)?;
        let hasher = PasswordService::new(config.password)?;
        let database_url = config
            .database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let store = PgAccountStore::connect(database_url).await?;
        store.migrate().await?;

        Ok(Self::from_parts(Arc::new(store), Arc::new(config), hasher, tokens))
    }

    pub fn from_parts(
        store: Arc<dyn AccountStore>,
        config: Arc<AppConfig>,
        hasher: PasswordService,
        tokens: TokenIssuer,
    ) -> Self {
        Self {
            store,
            config,
            hasher,
            tokens,
        }
    }

    /// In-memory state for tests and local tooling.
    pub fn in_memory(config: AppConfig) -> AccountResult<Self> {
        let tokens = TokenIssuer::new(&config.jwt)?;
        let hasher = PasswordService::new(config.password)?;
        Ok(Self::from_parts(
            Arc::new(MemoryAccountStore::new()),
            Arc::new(config),
            hasher,
            tokens,
        ))
    }

    /// Verifies credentials and issues a bearer token. `Ok(None)` covers
    /// both an unknown email and a wrong password.
    pub async fn login(&self, email: &str, password: &str) -> AccountResult<Option<Session>> {
        let Some(account) =
            UserAccount::find_by_credentials(self.store.as_ref(), email, password, &self.hasher)
                .await?
        else {
            return Ok(None);
        };
        let token = account.issue_token(&self.tokens)?;
        Ok(Some(Session {
            token,
            account: account.to_external_view(),
        }))
    }

    /// Resolves a presented bearer token to its claims.
    pub fn authenticate(&self, token: &str) -> AccountResult<Claims> {
        Ok(self.tokens.verify(token)?)
    }
}
