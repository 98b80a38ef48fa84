//! Bearer-token extraction and the request auth gate.
//!
//! The gate performs no I/O: it parses the `Authorization` header, hands
//! the token to the token service, and yields the caller's identity for
//! handlers to pass along explicitly.

use axum::http::HeaderMap;

use crate::token::{TokenService, VerifyError};


/// Authenticated caller identity attached to a request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
}

/// Why a request was rejected at the gate.
#[derive(Debug, PartialEq, Clone)]
pub enum AuthRejection {
    /// Authorization header not present.
    NoCredentials,
    /// Header present but not `Bearer <token>` (or empty token).
    BadFormat,
    /// Token service rejected the token.
    Invalid(VerifyError),
}

impl std::fmt::Display for AuthRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthRejection::NoCredentials => write!(f, "Authentication token not provided"),
            AuthRejection::BadFormat => write!(f, "Invalid authorization header format"),
            AuthRejection::Invalid(reason) => write!(f, "Invalid token: {}", reason),
        }
    }
}

impl std::error::Error for AuthRejection {}

/// Extract the bearer token from HTTP headers.
///
/// Expected format: "Authorization: Bearer <token>"
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AuthRejection> {
    let auth_header = headers
        .get("authorization")
        .ok_or(AuthRejection::NoCredentials)?
        .to_str()
        .map_err(|_| AuthRejection::BadFormat)?;

    parse_bearer_token(auth_header)
}

/// Parse a bearer token from an Authorization header value.
fn parse_bearer_token(header_value: &str) -> Result<String, AuthRejection> {
    let parts: Vec<&str> = header_value.splitn(2, ' ').collect();

    if parts.len() != 2 || !parts[0].eq_ignore_ascii_case("bearer") {
        return Err(AuthRejection::BadFormat);
    }

    let token = parts[1].trim();
    if token.is_empty() {
        return Err(AuthRejection::BadFormat);
    }

    Ok(token.to_string())
}

/// Authenticate a request from its headers.
///
/// Extraction failures map to `NoCredentials`/`BadFormat`; verification
/// failures propagate the token service's structured reason.
pub fn authenticate(
    headers: &HeaderMap,
    tokens: &TokenService,
) -> Result<AuthUser, AuthRejection> {
    let token = extract_bearer_token(headers)?;
    let claims = tokens.verify(&token).map_err(AuthRejection::Invalid)?;

    Ok(AuthUser {
        user_id: claims.sub,
        email: claims.email,
    })
}
