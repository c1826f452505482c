use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;

use super::{repo::AccountStore, repo_types::UserAccount};
use crate::error::{AccountError, AccountResult};

#[derive(Default)]
struct Tables {
    by_id: HashMap<Uuid, UserAccount>,
    by_email: HashMap<String, Uuid>, // unique index
}

/// In-process [`AccountStore`] for tests and local tooling.
#[derive(Default)]
pub struct MemoryAccountStore {
    tables: RwLock<Tables>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn check_version<'a>(
    tables: &'a mut Tables,
    account: &UserAccount,
) -> AccountResult<&'a mut UserAccount> {
    let stored = tables
        .by_id
        .get_mut(&account.id)
        .ok_or(AccountError::NotFound(account.id))?;
    if stored.version != account.version {
        return Err(AccountError::Conflict(format!(
            "account {} changed since version {}",
            account.id, account.version
        )));
    }
    Ok(stored)
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    #[instrument(skip(self, account), fields(account_id = %account.id))]
    async fn create(&self, account: &UserAccount) -> AccountResult<UserAccount> {
        if account.password_hash.is_none() {
            return Err(AccountError::Credential);
        }
        let mut tables = self.tables.write().await;
        if tables.by_email.contains_key(&account.email) {
            return Err(AccountError::DuplicateEmail(account.email.clone()));
        }

        let mut stored = account.clone();
        stored.version = 0;
        stored.updated_at = stored.created_at;
        tables.by_email.insert(stored.email.clone(), stored.id);
        tables.by_id.insert(stored.id, stored.clone());
        Ok(stored.without_credentials())
    }

    async fn find_by_id(&self, id: Uuid) -> AccountResult<Option<UserAccount>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_id
            .get(&id)
            .cloned()
            .map(UserAccount::without_credentials))
    }

    async fn find_by_email_with_credentials(
        &self,
        email: &str,
    ) -> AccountResult<Option<UserAccount>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_email
            .get(email)
            .and_then(|id| tables.by_id.get(id))
            .cloned())
    }

    #[instrument(skip(self, account), fields(account_id = %account.id))]
    async fn update_profile(&self, account: &UserAccount) -> AccountResult<UserAccount> {
        let mut tables = self.tables.write().await;
        if let Some(owner) = tables.by_email.get(&account.email) {
            if *owner != account.id {
                return Err(AccountError::DuplicateEmail(account.email.clone()));
            }
        }

        let stored = check_version(&mut tables, account)?;
        let previous_email = std::mem::replace(&mut stored.email, account.email.clone());
        stored.name = account.name.clone();
        stored.role = account.role;
        stored.avatar_url = account.avatar_url.clone();
        stored.provider = account.provider.clone();
        stored.version += 1;
        stored.updated_at = OffsetDateTime::now_utc();
        let updated = stored.clone();

        if previous_email != updated.email {
            tables.by_email.remove(&previous_email);
            tables.by_email.insert(updated.email.clone(), updated.id);
        }
        Ok(updated.without_credentials())
    }

    #[instrument(skip(self, account), fields(account_id = %account.id))]
    async fn update_password(&self, account: &UserAccount) -> AccountResult<UserAccount> {
        let password_hash = account
            .password_hash
            .clone()
            .ok_or(AccountError::Credential)?;
        let mut tables = self.tables.write().await;
        let stored = check_version(&mut tables, account)?;
        stored.password_hash = Some(password_hash);
        stored.version += 1;
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone().without_credentials())
    }
}
