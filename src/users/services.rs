use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tokio::task::spawn_blocking;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{NewAccount, ProfileUpdate, PublicAccount},
    repo::AccountStore,
    repo_types::{UserAccount, LOCAL_PROVIDER},
};
use crate::{
    auth::{PasswordService, TokenIssuer},
    error::{AccountError, AccountResult},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validated_email(raw: &str) -> AccountResult<String> {
    let email = normalize_email(raw);
    if !is_valid_email(&email) {
        return Err(AccountError::Validation(format!("invalid email: {email:?}")));
    }
    Ok(email)
}

fn validated_name(raw: &str) -> AccountResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AccountError::Validation("name must not be empty".into()));
    }
    Ok(name.to_string())
}

fn validated_provider(raw: Option<&str>) -> AccountResult<String> {
    let provider = raw.map(str::trim).unwrap_or(LOCAL_PROVIDER);
    if provider.is_empty() {
        return Err(AccountError::Validation("provider must not be empty".into()));
    }
    Ok(provider.to_string())
}

fn blank_to_none(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

async fn run_blocking<T, F>(task: F) -> AccountResult<T>
where
    F: FnOnce() -> AccountResult<T> + Send + 'static,
    T: Send + 'static,
{
    spawn_blocking(task)
        .await
        .map_err(|e| AccountError::Internal(anyhow::Error::new(e).context("password task failed")))?
}

impl UserAccount {
    /// Validates the input and builds an unsaved record with the password
    /// already hashed.
    pub fn new(input: NewAccount, hasher: &PasswordService) -> AccountResult<Self> {
        let now = OffsetDateTime::now_utc();
        let mut account = Self {
            id: Uuid::new_v4(),
            name: validated_name(&input.name)?,
            email: validated_email(&input.email)?,
            password_hash: None,
            role: input.role,
            avatar_url: blank_to_none(input.avatar_url),
            provider: validated_provider(input.provider.as_deref())?,
            reset_token: None,
            reset_token_expires_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        account.set_password(&input.password, hasher)?;
        Ok(account)
    }

    /// Replaces the stored hash with a fresh hash of `plain`.
    pub fn set_password(&mut self, plain: &str, hasher: &PasswordService) -> AccountResult<()> {
        if plain.is_empty() {
            return Err(AccountError::Validation("password must not be empty".into()));
        }
        self.password_hash = Some(hasher.hash(plain)?);
        Ok(())
    }

    /// `Ok(false)` for a wrong password; `Err(Credential)` only when the
    /// record was loaded without its hash.
    pub fn verify_password(&self, candidate: &str, hasher: &PasswordService) -> AccountResult<bool> {
        let hash = self.password_hash().ok_or(AccountError::Credential)?;
        Ok(hasher.compare(candidate, hash))
    }

    pub fn issue_token(&self, issuer: &TokenIssuer) -> AccountResult<String> {
        issuer.sign(self.id, self.role)
    }

    pub fn to_external_view(&self) -> PublicAccount {
        PublicAccount::from(self)
    }

    /// Validates and applies a profile change in memory. The password hash
    /// is never touched.
    pub fn apply_profile(&mut self, changes: ProfileUpdate) -> AccountResult<()> {
        let name = changes.name.as_deref().map(validated_name).transpose()?;
        let email = changes.email.as_deref().map(validated_email).transpose()?;
        let provider = match changes.provider.as_deref() {
            Some(raw) => Some(validated_provider(Some(raw))?),
            None => None,
        };

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(email) = email {
            self.email = email;
        }
        if let Some(provider) = provider {
            self.provider = provider;
        }
        if let Some(role) = changes.role {
            self.role = role;
        }
        if let Some(avatar_url) = changes.avatar_url {
            self.avatar_url = blank_to_none(avatar_url);
        }
        Ok(())
    }

    /// Creates and persists a new account, hashing off the async executor.
    #[instrument(skip(store, input, hasher), fields(email = %input.email))]
    pub async fn register(
        store: &dyn AccountStore,
        input: NewAccount,
        hasher: &PasswordService,
    ) -> AccountResult<UserAccount> {
        let hasher = hasher.clone();
        let account = run_blocking(move || UserAccount::new(input, &hasher)).await?;
        let created = store.create(&account).await.map_err(|e| {
            if let AccountError::DuplicateEmail(email) = &e {
                warn!(%email, "email already registered");
            }
            e
        })?;
        info!(account_id = %created.id, email = %created.email, "account registered");
        Ok(created)
    }

    pub async fn find_by_id(store: &dyn AccountStore, id: Uuid) -> AccountResult<Option<UserAccount>> {
        store.find_by_id(id).await
    }

    /// Returns the account only if `email` exists and `password` matches.
    /// Unknown email and wrong password both yield `Ok(None)`.
    #[instrument(skip(store, password, hasher))]
    pub async fn find_by_credentials(
        store: &dyn AccountStore,
        email: &str,
        password: &str,
        hasher: &PasswordService,
    ) -> AccountResult<Option<UserAccount>> {
        let email = normalize_email(email);
        let found = if is_valid_email(&email) {
            store.find_by_email_with_credentials(&email).await?
        } else {
            None
        };

        let hasher = hasher.clone();
        let password = password.to_owned();
        let verified = run_blocking(move || match found {
            Some(account) => {
                let ok = account.verify_password(&password, &hasher)?;
                Ok(ok.then_some(account))
            }
            None => {
                // Burn a comparable amount of work so timing does not reveal
                // whether the email is registered.
                hasher.hash(&password)?;
                Ok(None)
            }
        })
        .await?;

        match &verified {
            Some(account) => info!(account_id = %account.id, "credentials verified"),
            None => warn!(%email, "credential check failed"),
        }
        Ok(verified)
    }

    /// Validates `changes` and persists them. On failure `self` is left as it
    /// was.
    #[instrument(skip(self, store, changes), fields(account_id = %self.id))]
    pub async fn update_profile(
        &mut self,
        store: &dyn AccountStore,
        changes: ProfileUpdate,
    ) -> AccountResult<()> {
        let mut staged = self.clone();
        staged.apply_profile(changes)?;
        *self = store.update_profile(&staged).await?;
        Ok(())
    }

    /// Rehashes and persists a new password. The returned record state has
    /// no credential data loaded.
    #[instrument(skip(self, store, password, hasher), fields(account_id = %self.id))]
    pub async fn change_password(
        &mut self,
        store: &dyn AccountStore,
        password: &str,
        hasher: &PasswordService,
    ) -> AccountResult<()> {
        let mut staged = self.clone();
        let hasher = hasher.clone();
        let password = password.to_owned();
        let staged = run_blocking(move || {
            staged.set_password(&password, &hasher)?;
            Ok(staged)
        })
        .await?;
        *self = store.update_password(&staged).await?;
        info!(account_id = %self.id, "password changed");
        Ok(())
    }
}
