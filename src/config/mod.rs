//! Environment-driven configuration.
//!
//! All settings come from `FINPRO_*` environment variables with sensible
//! defaults for local development. Key material (`FINPRO_TOKEN_KEY`,
//! `FINPRO_ENCRYPTION_KEY`) is base64-encoded 32-byte keys; when absent,
//! `main` generates ephemeral keys and warns.

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server on.
    pub port: u16,
    /// Path to the SQLite database file.
    pub database_path: String,
    /// Continue with the no-op store when the database cannot be opened.
    pub allow_degraded: bool,
    /// Base64-encoded 32-byte Ed25519 seed for session token signing.
    pub token_key: Option<String>,
    /// Base64-encoded 32-byte AES-256-GCM key for tokens at rest.
    pub encryption_key: Option<String>,
    /// Uber OAuth application client id.
    pub uber_client_id: String,
    /// Uber OAuth application client secret.
    pub uber_client_secret: String,
    /// Base URL of Uber's auth host (authorize + token endpoints).
    pub uber_auth_base: String,
    /// Base URL of Uber's API host (profile + history endpoints).
    pub uber_api_base: String,
    /// Publicly reachable base URL of this service, used to build the
    /// OAuth redirect URI.
    pub public_base_url: String,
    /// Frontend path the OAuth callback redirects back to.
    pub frontend_redirect: String,
    /// How long issued OAuth state nonces remain valid.
    pub oauth_state_ttl_seconds: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            database_path: "finpro.db".to_string(),
            allow_degraded: false,
            token_key: None,
            encryption_key: None,
            uber_client_id: String::new(),
            uber_client_secret: String::new(),
            uber_auth_base: "https://auth.uber.com".to_string(),
            uber_api_base: "https://api.uber.com".to_string(),
            public_base_url: "http://localhost:8080".to_string(),
            frontend_redirect: "/profile.html".to_string(),
            oauth_state_ttl_seconds: 600,
        }
    }
}

impl AppConfig {
    /// Build from env vars, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("FINPRO_PORT") {
            if let Ok(n) = v.parse::<u16>() {
                cfg.port = n;
            }
        }
        if let Ok(v) = std::env::var("FINPRO_DB_PATH") {
            cfg.database_path = v;
        }
        if let Ok(v) = std::env::var("FINPRO_ALLOW_DEGRADED") {
            if let Ok(b) = v.parse::<bool>() {
                cfg.allow_degraded = b;
            }
        }
        if let Ok(v) = std::env::var("FINPRO_TOKEN_KEY") {
            cfg.token_key = Some(v);
        }
        if let Ok(v) = std::env::var("FINPRO_ENCRYPTION_KEY") {
            cfg.encryption_key = Some(v);
        }
        if let Ok(v) = std::env::var("FINPRO_UBER_CLIENT_ID") {
            cfg.uber_client_id = v;
        }
        if let Ok(v) = std::env::var("FINPRO_UBER_CLIENT_SECRET") {
            cfg.uber_client_secret = v;
        }
        if let Ok(v) = std::env::var("FINPRO_UBER_AUTH_BASE") {
            cfg.uber_auth_base = v;
        }
        if let Ok(v) = std::env::var("FINPRO_UBER_API_BASE") {
            cfg.uber_api_base = v;
        }
        if let Ok(v) = std::env::var("FINPRO_PUBLIC_BASE_URL") {
            cfg.public_base_url = v;
        }
        if let Ok(v) = std::env::var("FINPRO_FRONTEND_REDIRECT") {
            cfg.frontend_redirect = v;
        }
        if let Ok(v) = std::env::var("FINPRO_OAUTH_STATE_TTL_SECONDS") {
            if let Ok(n) = v.parse::<i64>() {
                cfg.oauth_state_ttl_seconds = n;
            }
        }

        cfg
    }

    /// Redirect URI registered with the OAuth provider.
    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}/integrations/uber/callback", self.public_base_url)
    }
}
