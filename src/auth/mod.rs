//! Password hashing and bearer token issuance.

pub mod claims;
pub mod jwt;
pub mod password;

pub use claims::Claims;
pub use jwt::TokenIssuer;
pub use password::{HashCost, PasswordService};
