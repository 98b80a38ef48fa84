//! Stateless session tokens.
//!
//! A token is `base64url(claims_json) "." base64url(signature)` where the
//! signature is Ed25519 over the encoded claims. Nothing is persisted:
//! a token is valid iff its signature verifies and it has not expired.
//!
//! There is no server-side revocation list, so issued tokens stay valid
//! until expiry; logout is client-side deletion only.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64URL, Engine};
use chrono::Utc;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

/// Validity window for login/registration sessions: 7 days.
pub const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Short validity window surfaced to clients for cached expiry display: 24 hours.
pub const DISPLAY_TTL_SECS: i64 = 24 * 60 * 60;

/// Claims carried inside a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Owning user id.
    pub sub: String,
    /// Email at issue time.
    pub email: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

/// Structured verification failures. Verification never panics on
/// arbitrary input.
#[derive(Debug, PartialEq, Clone)]
pub enum VerifyError {
    /// Not a parseable token (wrong shape, bad base64, bad JSON).
    Malformed,
    /// Claims expired (checked before the signature so that an expired
    /// token always reports as expired).
    Expired,
    /// Signature does not match the claims.
    BadSignature,
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::Malformed => write!(f, "malformed token"),
            VerifyError::Expired => write!(f, "token expired"),
            VerifyError::BadSignature => write!(f, "invalid token signature"),
        }
    }
}

impl std::error::Error for VerifyError {}

/// Issues and verifies signed session tokens.
#[derive(Clone)]
pub struct TokenService {
    signing: SigningKey,
    verifying: VerifyingKey,
}

impl TokenService {
    /// Create a service from a 32-byte Ed25519 seed.
    pub fn new(seed: &[u8; 32]) -> Self {
        let signing = SigningKey::from_bytes(seed);
        let verifying = signing.verifying_key();
        Self { signing, verifying }
    }

    /// Create a service from a base64-encoded 32-byte seed.
    pub fn from_base64(key: &str) -> anyhow::Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(key)
            .map_err(|e| anyhow::anyhow!("invalid token key encoding: {}", e))?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("token key must be 32 bytes, got {}", bytes.len()))?;
        Ok(Self::new(&seed))
    }

    /// Issue a token for `user_id`/`email` valid for `ttl_secs` from now.
    ///
    /// Stateless: two tokens with identical claims differ only in `iat`.
    pub fn issue(&self, user_id: &str, email: &str, ttl_secs: i64) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now,
            exp: now + ttl_secs,
        };

        // Claims are plain strings and ints; serialization cannot fail.
        let payload = B64URL.encode(serde_json::to_vec(&claims).expect("claims serialize"));
        let signature = self.signing.sign(payload.as_bytes());

        format!("{}.{}", payload, B64URL.encode(signature.to_bytes()))
    }

    /// Verify a token, returning its claims or a structured reason.
    pub fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        let (payload, sig) = token.split_once('.').ok_or(VerifyError::Malformed)?;

        let claims_bytes = B64URL.decode(payload).map_err(|_| VerifyError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&claims_bytes).map_err(|_| VerifyError::Malformed)?;

        // Wall-clock expiry check. Runs before the signature check so an
        // expired token reports `Expired` regardless of signature validity.
        if Utc::now().timestamp() >= claims.exp {
            return Err(VerifyError::Expired);
        }

        let sig_bytes = B64URL.decode(sig).map_err(|_| VerifyError::Malformed)?;
        let signature =
            Signature::from_slice(&sig_bytes).map_err(|_| VerifyError::Malformed)?;
        self.verifying
            .verify(payload.as_bytes(), &signature)
            .map_err(|_| VerifyError::BadSignature)?;

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(&[7u8; 32])
    }

    #[test]
    fn test_issue_and_verify_roundtrip() {
        let svc = service();
        let token = svc.issue("user-1", "alice@example.com", SESSION_TTL_SECS);

        let claims = svc.verify(&token).expect("token should verify");
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "alice@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_expired_token_rejected() {
        let svc = service();
        let token = svc.issue("user-1", "alice@example.com", -60);

        assert_eq!(svc.verify(&token), Err(VerifyError::Expired));
    }

    #[test]
    fn test_expired_reported_even_with_bad_signature() {
        let svc = service();
        let token = svc.issue("user-1", "alice@example.com", -60);

        // Corrupt the signature half; expiry must still win.
        let payload = token.split_once('.').unwrap().0;
        let tampered = format!("{}.{}", payload, B64URL.encode([0u8; 64]));
        assert_eq!(svc.verify(&tampered), Err(VerifyError::Expired));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let svc = service();
        let token = svc.issue("user-1", "alice@example.com", SESSION_TTL_SECS);
        let (_, sig) = token.split_once('.').unwrap();

        let forged_claims = Claims {
            sub: "user-2".to_string(),
            email: "mallory@example.com".to_string(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + SESSION_TTL_SECS,
        };
        let forged_payload = B64URL.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{}.{}", forged_payload, sig);

        assert_eq!(svc.verify(&forged), Err(VerifyError::BadSignature));
    }

    #[test]
    fn test_token_from_other_key_rejected() {
        let svc = service();
        let other = TokenService::new(&[9u8; 32]);
        let token = other.issue("user-1", "alice@example.com", SESSION_TTL_SECS);

        assert_eq!(svc.verify(&token), Err(VerifyError::BadSignature));
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let svc = service();

        assert_eq!(svc.verify(""), Err(VerifyError::Malformed));
        assert_eq!(svc.verify("no-dot-here"), Err(VerifyError::Malformed));
        assert_eq!(svc.verify("!!!.@@@"), Err(VerifyError::Malformed));
        assert_eq!(
            svc.verify(&format!("{}.sig", B64URL.encode(b"not json"))),
            Err(VerifyError::Malformed)
        );
    }

    #[test]
    fn test_from_base64_rejects_bad_keys() {
        assert!(TokenService::from_base64("short").is_err());
        assert!(TokenService::from_base64("not-valid-base64!@#$").is_err());
    }
}
