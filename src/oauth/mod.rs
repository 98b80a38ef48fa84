//! OAuth authorization flow for the Uber integration.
//!
//! Authorization code flow:
//! 1. Client requests an auth URL; a single-use state nonce is bound to
//!    the authenticated user
//! 2. Client is sent to the provider's authorization page
//! 3. Provider redirects back with a code
//! 4. Code is exchanged for tokens, profile fetched best-effort
//! 5. Integration record upserted for `(owner, provider)`
//!
//! Every failure maps to a reason surfaced as a redirect query parameter;
//! nothing is persisted unless the token exchange succeeded.

mod state;

pub use state::{run_state_cleanup, PendingAuth, StateRegistry};

use crate::store::{Integration, IntegrationUpsert, Storage, StoreError};
use crate::uber::UberClient;

pub const PROVIDER_UBER: &str = "uber";

/// Why a callback failed. `reason()` is the value carried in the redirect
/// query string.
#[derive(Debug)]
pub enum CallbackError {
    /// The provider reported an authorization error (user declined).
    Declined(String),
    /// Callback arrived without an authorization code.
    NoAuthCode,
    /// State nonce missing, unknown, expired, or already used.
    InvalidState,
    /// Token endpoint returned a failure; nothing was persisted.
    ExchangeFailed(String),
    /// Persistence failed after a successful exchange.
    Server(String),
}

impl CallbackError {
    pub fn reason(&self) -> &'static str {
        match self {
            CallbackError::Declined(_) => "uber_auth_declined",
            CallbackError::NoAuthCode => "no_auth_code",
            CallbackError::InvalidState => "invalid_state",
            CallbackError::ExchangeFailed(_) => "token_exchange_failed",
            CallbackError::Server(_) => "server_error",
        }
    }
}

impl std::fmt::Display for CallbackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackError::Declined(e) => write!(f, "authorization declined: {}", e),
            CallbackError::NoAuthCode => write!(f, "no authorization code received"),
            CallbackError::InvalidState => write!(f, "invalid or expired state"),
            CallbackError::ExchangeFailed(e) => write!(f, "token exchange failed: {}", e),
            CallbackError::Server(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CallbackError {}

/// Complete a provider callback: exchange the code, fetch the profile
/// (best-effort), and upsert the integration for the bound user.
pub async fn complete_authorization(
    store: &dyn Storage,
    uber: &UberClient,
    pending: PendingAuth,
    code: &str,
) -> Result<Integration, CallbackError> {
    let grant = uber
        .exchange_code(code)
        .await
        .map_err(|e| CallbackError::ExchangeFailed(e.to_string()))?;

    // Profile enrichment only; the integration record is valid without it.
    let external_user_data = match uber.fetch_profile(&grant.access_token).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(user_id = %pending.user_id, error = %e, "Uber profile fetch failed");
            serde_json::json!({})
        }
    };

    let integration = store
        .upsert_integration(&IntegrationUpsert {
            owner_id: pending.user_id.clone(),
            provider: pending.provider.clone(),
            access_token: grant.access_token.clone(),
            refresh_token: grant.refresh_token.clone(),
            token_expires_at: grant.expires_at(),
            external_user_data,
        })
        .map_err(|e| CallbackError::Server(format!("failed to persist integration: {}", e)))?;

    tracing::info!(
        user_id = %pending.user_id,
        provider = %pending.provider,
        has_refresh_token = grant.refresh_token.is_some(),
        "OAuth flow completed"
    );

    Ok(integration)
}

/// Deactivate an integration and clear its tokens. Safe to call on an
/// already-inactive integration.
pub fn disconnect(
    store: &dyn Storage,
    owner_id: &str,
    provider: &str,
) -> Result<(), StoreError> {
    store.deactivate_integration(owner_id, provider)?;
    tracing::info!(user_id = %owner_id, provider = %provider, "integration disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use chrono::Utc;

    fn test_store() -> SqliteStore {
        SqliteStore::new(":memory:", &BASE64.encode([0u8; 32])).unwrap()
    }

    fn test_client(base: &str) -> UberClient {
        UberClient::new(
            "cid".to_string(),
            "secret".to_string(),
            "http://localhost/integrations/uber/callback".to_string(),
            base.to_string(),
            base.to_string(),
        )
    }

    fn pending() -> PendingAuth {
        PendingAuth {
            provider: PROVIDER_UBER.to_string(),
            user_id: "u1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_callback_persists_integration() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/v2/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"at-1","refresh_token":"rt-1","expires_in":3600}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v1.2/me")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"first_name":"Alice"}"#)
            .create_async()
            .await;

        let store = test_store();
        let integration =
            complete_authorization(&store, &test_client(&server.url()), pending(), "code-1")
                .await
                .unwrap();

        assert!(integration.active);
        assert_eq!(integration.access_token.as_deref(), Some("at-1"));
        assert_eq!(integration.external_user_data["first_name"], "Alice");
    }

    #[tokio::test]
    async fn test_failed_exchange_persists_nothing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/v2/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let store = test_store();
        let err =
            complete_authorization(&store, &test_client(&server.url()), pending(), "bad-code")
                .await
                .unwrap_err();

        assert_eq!(err.reason(), "token_exchange_failed");
        assert!(store.integration("u1", PROVIDER_UBER).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_profile_failure_does_not_abort() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/v2/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"at-1"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v1.2/me")
            .with_status(500)
            .create_async()
            .await;

        let store = test_store();
        let integration =
            complete_authorization(&store, &test_client(&server.url()), pending(), "code-1")
                .await
                .unwrap();

        assert!(integration.active);
        assert_eq!(integration.external_user_data, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_disconnect_idempotent() {
        let store = test_store();
        // Disconnecting a never-connected provider is a no-op, not an error.
        disconnect(&store, "u1", PROVIDER_UBER).unwrap();
        disconnect(&store, "u1", PROVIDER_UBER).unwrap();
    }
}
