mod dto;
mod memory;
mod repo;
mod repo_types;
mod services;

pub use dto::{NewAccount, ProfileUpdate, PublicAccount};
pub use memory::MemoryAccountStore;
pub use repo::{AccountStore, PgAccountStore};
pub use repo_types::{Role, UserAccount, LOCAL_PROVIDER};
pub use services::normalize_email;
