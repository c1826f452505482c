//! Postgres store tests. Need a reachable `DATABASE_URL`; run with
//! `cargo test -- --ignored`.

use accounts::{
    auth::{HashCost, PasswordService},
    AccountError, AccountStore, NewAccount, PgAccountStore, ProfileUpdate, UserAccount,
};
use sqlx::PgPool;

fn hasher() -> PasswordService {
    PasswordService::new(HashCost {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn duplicate_email_is_rejected_by_the_unique_index(pool: PgPool) {
    let store = PgAccountStore::new(pool);
    UserAccount::register(&store, NewAccount::new("A", "A@x.com", "pw"), &hasher())
        .await
        .unwrap();

    let err = UserAccount::register(&store, NewAccount::new("B", "a@x.com", "pw"), &hasher())
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::DuplicateEmail(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn credentials_are_loaded_only_on_request(pool: PgPool) {
    let store = PgAccountStore::new(pool);
    let created = UserAccount::register(&store, NewAccount::new("A", "a@x.com", "pw"), &hasher())
        .await
        .unwrap();
    assert!(!created.has_credentials());

    let by_id = store.find_by_id(created.id()).await.unwrap().unwrap();
    assert!(!by_id.has_credentials());

    let found = UserAccount::find_by_credentials(&store, "a@x.com", "pw", &hasher())
        .await
        .unwrap();
    assert!(found.is_some_and(|a| a.has_credentials()));

    let wrong = UserAccount::find_by_credentials(&store, "a@x.com", "nope", &hasher())
        .await
        .unwrap();
    assert!(wrong.is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn updates_bump_version_and_detect_stale_copies(pool: PgPool) {
    let store = PgAccountStore::new(pool);
    let mut fresh = UserAccount::register(&store, NewAccount::new("A", "a@x.com", "pw"), &hasher())
        .await
        .unwrap();
    let mut stale = fresh.clone();

    fresh
        .change_password(&store, "pw2", &hasher())
        .await
        .unwrap();
    let err = stale
        .update_profile(&store, ProfileUpdate { name: Some("B".into()), ..ProfileUpdate::default() })
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Conflict(_)));

    let ok = UserAccount::find_by_credentials(&store, "a@x.com", "pw2", &hasher())
        .await
        .unwrap();
    assert!(ok.is_some());
}
