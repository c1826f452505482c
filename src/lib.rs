//! User account records: password credentials, lookup by credentials and
//! bearer token issuance over a pluggable account store.

pub mod auth;
pub mod config;
pub mod error;
pub mod state;
pub mod users;

pub use error::{AccountError, AccountResult, TokenError};
pub use state::{AppState, Session};
pub use users::{
    AccountStore, MemoryAccountStore, NewAccount, PgAccountStore, ProfileUpdate, PublicAccount,
    Role, UserAccount,
};
