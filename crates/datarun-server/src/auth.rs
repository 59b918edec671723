//! Shared api key check for task creation.
//!
//! The server never keeps the plaintext key, only its SHA-256 hash.

use sha2::{Digest, Sha256};

use datarun_core::CoreError;

/// Hash a key for storage/comparison.
///
/// Returns the SHA-256 hash as a hex string.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Validates the `api_key` carried in task-creation requests.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyGuard {
    key_hash: Option<String>,
}

impl ApiKeyGuard {
    /// Build a guard. `None` (or an empty key) disables the check.
    pub fn new(key: Option<&str>) -> Self {
        Self {
            key_hash: key.filter(|k| !k.is_empty()).map(hash_key),
        }
    }

    /// Whether a key is required.
    pub fn is_enabled(&self) -> bool {
        self.key_hash.is_some()
    }

    /// Check a presented key.
    pub fn verify(&self, presented: Option<&str>) -> Result<(), CoreError> {
        let Some(expected) = &self.key_hash else {
            return Ok(());
        };

        match presented {
            None | Some("") => Err(CoreError::Authentication("api_key is required".to_string())),
            Some(key) if constant_time_eq(hash_key(key).as_bytes(), expected.as_bytes()) => Ok(()),
            Some(_) => Err(CoreError::Authentication("invalid api_key".to_string())),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
