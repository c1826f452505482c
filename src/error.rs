use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by account records, stores and the token issuer.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    /// The record was loaded without its password hash.
    #[error("credential data not loaded for this account")]
    Credential,

    #[error("configuration error: {0}")]
    Configuration(String),

    /// The stored record changed since it was read.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("account not found: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("password hashing failed: {0}")]
    Hashing(#[from] argon2::password_hash::Error),

    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Why a bearer token was rejected.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

pub type AccountResult<T> = Result<T, AccountError>;
