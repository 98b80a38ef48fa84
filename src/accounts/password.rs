//! Argon2id password hashing.
//!
//! Stored form is `base64(salt)$base64(hash)` with a random 32-byte salt
//! per password and Argon2id default parameters.

use anyhow::{anyhow, Result};
use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::Rng;

const SALT_LEN: usize = 32;
const HASH_LEN: usize = 32;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt: [u8; SALT_LEN] = rand::thread_rng().gen();
    let hash = derive(password, &salt)?;

    Ok(format!("{}${}", BASE64.encode(salt), BASE64.encode(hash)))
}

/// Verify a password against a stored `salt$hash` value.
///
/// Malformed stored values verify as false rather than erroring; the
/// caller cannot distinguish them from a wrong password.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_b64, hash_b64)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (BASE64.decode(salt_b64), BASE64.decode(hash_b64)) else {
        return false;
    };

    match derive(password, &salt) {
        Ok(computed) => computed.as_slice() == expected.as_slice(),
        Err(_) => false,
    }
}

fn derive(password: &str, salt: &[u8]) -> Result<[u8; HASH_LEN]> {
    let mut hash = [0u8; HASH_LEN];
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut hash)
        .map_err(|e| anyhow!("password hashing failed: {}", e))?;
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verify() {
        let stored = hash_password("Passw0rd!").unwrap();

        assert!(verify_password("Passw0rd!", &stored));
        assert!(!verify_password("wrong_password", &stored));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_stored_value() {
        assert!(!verify_password("anything", "not-a-stored-hash"));
        assert!(!verify_password("anything", "bad!$base64!"));
    }
}
