//! AES-256-GCM encryption for integration tokens at rest.
//!
//! Each value is encrypted with a fresh random nonce; the stored form is
//! `base64(nonce) "." base64(ciphertext)`. The master key comes from the
//! environment and lives only in memory.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Key size in bytes (256 bits).
const KEY_SIZE: usize = 32;

/// GCM nonce size in bytes (96 bits).
const NONCE_SIZE: usize = 12;

/// Decode and length-check a base64 master key.
pub fn validate_key(key_base64: &str) -> Result<Vec<u8>> {
    let key_bytes = BASE64
        .decode(key_base64)
        .context("Failed to decode base64 encryption key")?;

    if key_bytes.len() != KEY_SIZE {
        return Err(anyhow!(
            "Encryption key must be {} bytes (256 bits), got {} bytes",
            KEY_SIZE,
            key_bytes.len()
        ));
    }

    Ok(key_bytes)
}

/// Encrypt a value, returning the combined `nonce.ciphertext` form.
pub fn encrypt(plaintext: &str, key: &[u8]) -> Result<String> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    // Fresh nonce per value; nonce reuse breaks GCM.
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    Ok(format!(
        "{}.{}",
        BASE64.encode(nonce),
        BASE64.encode(ciphertext)
    ))
}

/// Decrypt a combined `nonce.ciphertext` value.
pub fn decrypt(stored: &str, key: &[u8]) -> Result<String> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
    }

    let (nonce_b64, ciphertext_b64) = stored
        .split_once('.')
        .ok_or_else(|| anyhow!("Invalid stored token format"))?;

    let nonce_bytes = BASE64
        .decode(nonce_b64)
        .context("Failed to decode token nonce")?;
    if nonce_bytes.len() != NONCE_SIZE {
        return Err(anyhow!(
            "Nonce must be {} bytes, got {}",
            NONCE_SIZE,
            nonce_bytes.len()
        ));
    }

    let ciphertext = BASE64
        .decode(ciphertext_b64)
        .context("Failed to decode token ciphertext")?;

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| anyhow!("Decryption failed (wrong key or tampered data)"))?;

    String::from_utf8(plaintext).context("Decrypted data is not valid UTF-8")
}
