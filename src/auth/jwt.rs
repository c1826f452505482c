use std::time::Duration;

use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error};
use uuid::Uuid;

use super::claims::Claims;
use crate::{
    config::{validate_secret, JwtConfig},
    error::{AccountError, AccountResult, TokenError},
    users::Role,
};

/// Signs and verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Refuses empty, short or placeholder secrets.
    pub fn new(config: &JwtConfig) -> AccountResult<Self> {
        validate_secret(&config.secret)?;
        Ok(Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: config.ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn sign(&self, id: Uuid, role: Role) -> AccountResult<String> {
        self.sign_with_ttl(id, role, self.ttl)
    }

    pub fn sign_with_ttl(&self, id: Uuid, role: Role, ttl: Duration) -> AccountResult<String> {
        let now = OffsetDateTime::now_utc();
        let exp = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(|secs| now.checked_add(TimeDuration::seconds(secs)))
            .ok_or_else(|| {
                AccountError::Configuration(format!("token lifetime out of range: {ttl:?}"))
            })?;
        let claims = Claims {
            id,
            role,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            error!(error = %e, "jwt encode error");
            AccountError::Signing(e)
        })?;
        debug!(account_id = %id, %role, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e),
            }
        })?;
        debug!(account_id = %data.claims.id, role = %data.claims.role, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::DEFAULT_TOKEN_TTL;

    pub(crate) const TEST_SECRET: &str = "test-secret-key-that-is-long-enough-for-hs256";

    fn make_config(secret: &str, issuer: &str, audience: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl: DEFAULT_TOKEN_TTL,
        }
    }

    pub(crate) fn test_issuer() -> TokenIssuer {
        TokenIssuer::new(&make_config(TEST_SECRET, "test-issuer", "test-aud")).expect("valid config")
    }

    #[test]
    fn sign_and_verify_admin_token() {
        let issuer = test_issuer();
        let id = Uuid::new_v4();
        let token = issuer.sign(id, Role::Admin).expect("sign");
        let claims = issuer.verify(&token).expect("verify");
        assert_eq!(claims.id, id);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[test]
    fn default_expiry_is_seven_days() {
        let issuer = test_issuer();
        let token = issuer.sign(Uuid::new_v4(), Role::User).unwrap();
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn expired_token_fails_verification() {
        let issuer = test_issuer();
        let token = issuer
            .sign_with_ttl(Uuid::new_v4(), Role::Host, Duration::ZERO)
            .unwrap();
        std::thread::sleep(Duration::from_millis(2_100));
        let err = issuer.verify(&token).unwrap_err();
        assert!(matches!(err, TokenError::Expired));
    }

    #[test]
    fn oversized_ttl_is_an_error() {
        let issuer = test_issuer();
        for ttl in [Duration::from_secs(u64::MAX), Duration::from_secs(1_000_000_000 * 604_800)] {
            let err = issuer.sign_with_ttl(Uuid::new_v4(), Role::User, ttl).unwrap_err();
            assert!(matches!(err, AccountError::Configuration(_)), "{ttl:?}");
        }
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let other = TokenIssuer::new(&make_config(
            "another-secret-key-that-is-long-enough-too",
            "test-issuer",
            "test-aud",
        ))
        .unwrap();
        let token = other.sign(Uuid::new_v4(), Role::User).unwrap();
        let err = test_issuer().verify(&token).unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)));
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good = test_issuer();
        let bad = TokenIssuer::new(&make_config(TEST_SECRET, "bad-iss", "bad-aud")).unwrap();
        let token = good.sign(Uuid::new_v4(), Role::User).unwrap();
        assert!(matches!(bad.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn verify_rejects_garbage() {
        let err = test_issuer().verify("invalid.token.here").unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)));
    }

    #[test]
    fn refuses_placeholder_secret() {
        let err = TokenIssuer::new(&make_config("change_this_secret", "i", "a")).unwrap_err();
        assert!(matches!(err, AccountError::Configuration(_)));
    }
}
