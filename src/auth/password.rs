use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::{error, warn};

use crate::error::{AccountError, AccountResult};

/// Argon2id work factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl HashCost {
    pub fn params(&self) -> AccountResult<Params> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| AccountError::Configuration(format!("invalid password hash cost: {e}")))
    }
}

/// Salted, adaptive one-way password hashing.
///
/// Hashes are PHC strings that embed their own parameters, so raising the
/// cost later does not invalidate stored hashes.
#[derive(Clone, Default)]
pub struct PasswordService {
    params: Params,
}

impl std::fmt::Debug for PasswordService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordService")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .finish()
    }
}

impl PasswordService {
    pub fn new(cost: HashCost) -> AccountResult<Self> {
        Ok(Self {
            params: cost.params()?,
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, plain: &str) -> AccountResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                AccountError::Hashing(e)
            })?
            .to_string();
        Ok(hash)
    }

    /// Never errors: a malformed stored hash compares as a mismatch.
    pub fn compare(&self, plain: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "stored password hash is malformed");
                return false;
            }
        };
        self.argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Smallest cost argon2 accepts; keeps tests fast.
    pub(crate) fn fast_hasher() -> PasswordService {
        PasswordService::new(HashCost {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        })
        .expect("minimal cost is valid")
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = fast_hasher();
        let password = "Secur3P@ssw0rd!";
        let hash = hasher.hash(password).expect("hashing should succeed");
        assert!(hasher.compare(password, &hash));
        assert_ne!(hash, password);
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hasher = fast_hasher();
        let hash = hasher.hash("correct-horse-battery-staple").unwrap();
        assert!(!hasher.compare("wrong-password", &hash));
    }

    #[test]
    fn malformed_hash_compares_false() {
        let hasher = fast_hasher();
        assert!(!hasher.compare("anything", "not-a-valid-hash"));
        assert!(!hasher.compare("anything", ""));
    }

    #[test]
    fn same_password_hashes_differently() {
        let hasher = fast_hasher();
        let first = hasher.hash("hunter22").unwrap();
        let second = hasher.hash("hunter22").unwrap();
        assert_ne!(first, second);
        assert!(hasher.compare("hunter22", &first));
        assert!(hasher.compare("hunter22", &second));
    }

    #[test]
    fn different_passwords_hash_differently() {
        let hasher = fast_hasher();
        assert_ne!(hasher.hash("alpha").unwrap(), hasher.hash("bravo").unwrap());
    }

    #[test]
    fn hash_embeds_argon2id_and_cost() {
        let hasher = PasswordService::new(HashCost {
            memory_kib: 16,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        let hash = hasher.hash("pw").unwrap();
        assert!(hash.starts_with("$argon2id$v=19$"));
        assert!(hash.contains("m=16,t=2,p=1"));
    }

    #[test]
    fn hashes_verify_after_cost_change() {
        let old = fast_hasher().hash("rotate-me").unwrap();
        let stronger = PasswordService::new(HashCost {
            memory_kib: 32,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        assert!(stronger.compare("rotate-me", &old));
    }

    #[test]
    fn rejects_invalid_cost() {
        let err = PasswordService::new(HashCost {
            memory_kib: 8,
            iterations: 0,
            parallelism: 1,
        })
        .unwrap_err();
        assert!(matches!(err, AccountError::Configuration(_)));
    }

    #[test]
    fn default_cost_matches_argon2_defaults() {
        let cost = HashCost::default();
        assert_eq!(cost.memory_kib, 19 * 1024);
        assert_eq!(cost.iterations, 2);
        assert_eq!(cost.parallelism, 1);
    }
}
