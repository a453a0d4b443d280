//! Client secret value object.
//!
//! Secrets exist in plaintext exactly once, at generation time. Afterwards
//! only the hash is stored; there is no constructor for arbitrary strings.

use base64::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

use super::password::PasswordHasher;

/// Hashed client secret held by a confidential client aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSecret(String);

/// Result of secret generation: the one-time plaintext plus the stored form.
pub struct GeneratedSecret {
    /// Returned to the registrant once; unrecoverable afterwards.
    pub plaintext: String,
    pub hashed: ClientSecret,
}

impl ClientSecret {
    /// Generate a cryptographically random secret and hash it for storage.
    pub fn generate(hasher: &PasswordHasher) -> Result<GeneratedSecret, DomainError> {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 32];
        rng.fill(&mut bytes);
        let plaintext = BASE64_URL_SAFE_NO_PAD.encode(bytes);
        let hashed = ClientSecret(hasher.hash(&plaintext)?);
        Ok(GeneratedSecret { plaintext, hashed })
    }

    /// Wrap an already-hashed value loaded from storage.
    pub fn from_hashed(hash: String) -> Self {
        Self(hash)
    }

    pub fn hash(&self) -> &str {
        &self.0
    }

    /// Check a presented plaintext secret against the stored hash.
    pub fn verify(&self, hasher: &PasswordHasher, presented: &str) -> bool {
        hasher.verify(presented, &self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_secret_verifies() {
        let hasher = PasswordHasher::new();
        let generated = ClientSecret::generate(&hasher).unwrap();
        assert!(generated.hashed.verify(&hasher, &generated.plaintext));
        assert!(!generated.hashed.verify(&hasher, "guess"));
    }

    #[test]
    fn test_plaintext_never_stored() {
        let hasher = PasswordHasher::new();
        let generated = ClientSecret::generate(&hasher).unwrap();
        assert_ne!(generated.hashed.hash(), generated.plaintext);
    }

    #[test]
    fn test_generated_secrets_are_unique() {
        let hasher = PasswordHasher::new();
        let a = ClientSecret::generate(&hasher).unwrap();
        let b = ClientSecret::generate(&hasher).unwrap();
        assert_ne!(a.plaintext, b.plaintext);
    }
}
