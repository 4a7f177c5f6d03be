//! Salted one-way password hashing
//!
//! Hashes are Argon2id PHC strings (`$argon2id$v=19$m=..,t=..,p=1$salt$hash`),
//! so the salt and cost travel with the hash and older hashes keep verifying
//! after the configured cost changes.

use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use log::error;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::constants::{DEFAULT_HASH_ITERATIONS, DEFAULT_HASH_MEMORY_KIB};
use crate::error::{EcoshareError, Result};

const SALT_LENGTH: usize = 16;

/// Argon2 cost parameters (memory in KiB, single lane)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingCost {
    pub memory_kib: u32,
    pub iterations: u32,
}

impl HashingCost {
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self> {
        Params::new(memory_kib, iterations, 1, None).map_err(|e| {
            EcoshareError::ConfigError(format!("Invalid password hashing cost: {}", e))
        })?;
        Ok(Self {
            memory_kib,
            iterations,
        })
    }

    /// Cheapest parameters Argon2 accepts. Only suitable for tests.
    pub fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
        }
    }

    fn params(&self) -> Result<Params> {
        Params::new(self.memory_kib, self.iterations, 1, None)
            .map_err(|e| EcoshareError::HashingError(format!("Invalid Argon2 parameters: {}", e)))
    }
}

impl Default for HashingCost {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_HASH_MEMORY_KIB,
            iterations: DEFAULT_HASH_ITERATIONS,
        }
    }
}

/// Stateless password hasher
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    pub fn new(cost: HashingCost) -> Result<Self> {
        Ok(Self {
            params: cost.params()?,
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a plaintext password with a fresh random salt.
    ///
    /// Fails only when the OS entropy source cannot produce a salt.
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        let mut salt_bytes = [0u8; SALT_LENGTH];
        OsRng.try_fill_bytes(&mut salt_bytes).map_err(|e| {
            EcoshareError::HashingError(format!("Entropy source unavailable: {}", e))
        })?;

        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| EcoshareError::HashingError(format!("Salt encoding failed: {}", e)))?;

        self.argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| EcoshareError::HashingError(format!("Argon2 hashing failed: {}", e)))
    }

    /// Check a plaintext password against a stored hash.
    ///
    /// The digest comparison is constant time. A wrong password or an
    /// unreadable stored hash yields `false`, never an error.
    pub fn verify(&self, plaintext: &str, stored_hash: &str) -> bool {
        let parsed = match PasswordHash::new(stored_hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("Stored password hash could not be parsed: {}", e);
                return false;
            }
        };

        self.argon2()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

    /// `hash` on the blocking thread pool
    pub async fn hash_async(&self, plaintext: String) -> Result<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext)).await?
    }

    /// `verify` on the blocking thread pool
    pub async fn verify_async(&self, plaintext: String, stored_hash: String) -> Result<bool> {
        let hasher = self.clone();
        let matches =
            tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &stored_hash)).await?;
        Ok(matches)
    }
}
