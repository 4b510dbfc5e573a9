//! Session key derivation.
//!
//! Generated keys are a one-way hash of fresh UUID v4 material, optionally
//! salted. The hash hides the raw UUID and makes keys from different
//! deployments (different salts) look unrelated. It is obfuscation, not a
//! security boundary: unguessability comes from the 122 random bits of the
//! UUID, and a known salt adds nothing to it.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};

use domainhost_core_types::SessionKey;

pub trait KeyObfuscator: Send + Sync {
    /// Deterministically maps raw key material to the externally visible key.
    fn derive(&self, raw: &str) -> SessionKey;

    fn generate(&self) -> SessionKey {
        self.derive(&SessionKey::raw_random())
    }
}

/// `base64url(sha256(salt || raw))`.
#[derive(Clone, Debug, Default)]
pub struct HashedKeys {
    salt: Option<String>,
}

impl HashedKeys {
    pub fn new(salt: Option<String>) -> Self {
        Self {
            salt: salt.filter(|s| !s.is_empty()),
        }
    }
}

impl KeyObfuscator for HashedKeys {
    fn derive(&self, raw: &str) -> SessionKey {
        let mut hasher = Sha256::new();
        if let Some(salt) = &self.salt {
            hasher.update(salt.as_bytes());
        }
        hasher.update(raw.as_bytes());
        SessionKey(URL_SAFE_NO_PAD.encode(hasher.finalize()))
    }
}
