use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;

use crate::error::AppError;

/// Salted Argon2id hashing. Verification is delegated to argon2, which
/// compares digests in constant time.
#[derive(Clone, Default)]
pub struct Passwords {
    argon2: Argon2<'static>,
}

impl Passwords {
    /// Custom cost parameters (tests use cheap ones).
    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {e}")))?;
        Ok(hash.to_string())
    }

    /// `Ok(false)` on a wrong password; an unparseable stored hash is an internal error.
    pub fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, AppError> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt password hash: {e}")))?;

        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Hash of a random secret nobody is told. Used for accounts that never
    /// sign in with a password (guest, federated).
    pub fn unusable_hash(&self) -> Result<String, AppError> {
        let secret: [u8; 32] = rand::random();
        self.hash(&B64.encode(secret))
    }
}

#[cfg(test)]
pub(crate) fn cheap() -> Passwords {
    Passwords::with_params(Params::new(8, 1, 1, None).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let passwords = cheap();
        let hash = passwords.hash("correct horse").unwrap();

        assert_ne!(hash, "correct horse");
        assert!(passwords.verify("correct horse", &hash).unwrap());
        assert!(!passwords.verify("wrong horse", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let passwords = cheap();
        assert_ne!(passwords.hash("pw123456").unwrap(), passwords.hash("pw123456").unwrap());
    }

    #[test]
    fn corrupt_stored_hash_is_internal_error() {
        let result = cheap().verify("pw", "not-a-phc-string");
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
