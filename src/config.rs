use std::{fmt, time::Duration};

use lazy_static::lazy_static;
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;
use tracing::warn;

use crate::auth::password::HashCost;
use crate::error::{AccountError, AccountResult};

/// Default bearer token lifetime (7 days).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Longest accepted token lifetime (5 years).
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(5 * 365 * 24 * 60 * 60);

pub const MIN_SECRET_LEN: usize = 32;

const EPHEMERAL_SECRET_LEN: usize = 64;

/// Values that ship in sample `.env` files and must never sign real tokens.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change_this_secret",
    "changeme",
    "change_me",
    "change-me",
    "secret",
    "jwt_secret",
    "your_jwt_secret",
    "your-secret-key",
    "default",
    "password",
    "test",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Staging,
    Production,
}

impl Environment {
    pub fn parse(raw: &str) -> AccountResult<Self> {
        match raw.trim().to_lowercase().as_str() {
            "" | "dev" | "development" => Ok(Self::Development),
            "test" | "testing" => Ok(Self::Test),
            "stage" | "staging" => Ok(Self::Staging),
            "prod" | "production" => Ok(Self::Production),
            other => Err(AccountError::Configuration(format!(
                "unknown APP_ENV value: {other}"
            ))),
        }
    }

    /// Only local development may run with a generated signing secret.
    pub fn allows_ephemeral_secret(self) -> bool {
        matches!(self, Self::Development)
    }
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub password: HashCost,
}

impl AppConfig {
    pub fn from_env() -> AccountResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup instead of the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> AccountResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV") {
            Some(raw) => Environment::parse(&raw)?,
            None => Environment::default(),
        };

        let ttl = match lookup("JWT_EXPIRES_IN") {
            Some(raw) => validate_ttl(parse_duration(&raw)?)?,
            None => DEFAULT_TOKEN_TTL,
        };

        let jwt = JwtConfig {
            secret: resolve_secret(environment, lookup("JWT_SECRET"))?,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "accounts".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "accounts-users".into()),
            ttl,
        };

        let defaults = HashCost::default();
        let password = HashCost {
            memory_kib: parse_number(&lookup, "PASSWORD_MEMORY_KIB")?
                .unwrap_or(defaults.memory_kib),
            iterations: parse_number(&lookup, "PASSWORD_ITERATIONS")?
                .unwrap_or(defaults.iterations),
            parallelism: parse_number(&lookup, "PASSWORD_PARALLELISM")?
                .unwrap_or(defaults.parallelism),
        };
        // Reject unusable costs at startup rather than on the first hash.
        password.params()?;

        Ok(Self {
            environment,
            database_url: lookup("DATABASE_URL"),
            jwt,
            password,
        })
    }
}

fn validate_ttl(ttl: Duration) -> AccountResult<Duration> {
    if ttl < Duration::from_secs(1) {
        return Err(AccountError::Configuration(
            "JWT_EXPIRES_IN must be at least one second".into(),
        ));
    }
    if ttl > MAX_TOKEN_TTL {
        return Err(AccountError::Configuration(format!(
            "JWT_EXPIRES_IN must not exceed {} days",
            MAX_TOKEN_TTL.as_secs() / 86_400
        )));
    }
    Ok(ttl)
}

fn parse_number<F>(lookup: &F, key: &str) -> AccountResult<Option<u32>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<u32>()
                .map_err(|e| AccountError::Configuration(format!("{key}: {e}")))
        })
        .transpose()
}

/// Checks that a secret is fit to sign tokens.
pub fn validate_secret(secret: &str) -> AccountResult<()> {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return Err(AccountError::Configuration("JWT_SECRET is empty".into()));
    }
    let lowered = trimmed.to_lowercase();
    if PLACEHOLDER_SECRETS.contains(&lowered.as_str()) {
        return Err(AccountError::Configuration(
            "JWT_SECRET is a placeholder value".into(),
        ));
    }
    if trimmed.len() < MIN_SECRET_LEN {
        return Err(AccountError::Configuration(format!(
            "JWT_SECRET must be at least {MIN_SECRET_LEN} bytes, got {}",
            trimmed.len()
        )));
    }
    Ok(())
}

fn resolve_secret(environment: Environment, raw: Option<String>) -> AccountResult<String> {
    let problem = match raw {
        Some(secret) => match validate_secret(&secret) {
            Ok(()) => return Ok(secret),
            Err(e) => e,
        },
        None => AccountError::Configuration("JWT_SECRET is not set".into()),
    };

    if !environment.allows_ephemeral_secret() {
        return Err(problem);
    }

    warn!(
        ?environment,
        reason = %problem,
        "using an ephemeral JWT secret; tokens will not survive a restart"
    );
    Ok(generate_secret(EPHEMERAL_SECRET_LEN))
}

pub fn generate_secret(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Parses `7d`, `12h`, `30m`, `45s`, `2w` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> AccountResult<Duration> {
    lazy_static! {
        static ref DURATION_RE: Regex = Regex::new(r"^\s*(\d+)\s*(s|m|h|d|w)?\s*$").unwrap();
    }
    let caps = DURATION_RE.captures(raw).ok_or_else(|| {
        AccountError::Configuration(format!("invalid duration: {raw:?}"))
    })?;
    let amount: u64 = caps[1]
        .parse()
        .map_err(|e| AccountError::Configuration(format!("invalid duration {raw:?}: {e}")))?;

    let seconds_per_unit = match caps.get(2).map(|m| m.as_str()) {
        None | Some("s") => 1,
        Some("m") => 60,
        Some("h") => 60 * 60,
        Some("d") => 24 * 60 * 60,
        Some("w") => 7 * 24 * 60 * 60,
        Some(other) => {
            return Err(AccountError::Configuration(format!(
                "unknown duration unit: {other}"
            )))
        }
    };
    amount
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| AccountError::Configuration(format!("duration overflows: {raw:?}")))
}
