use std::sync::Arc;

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::Rng;
use tracing::{info, warn};

use finpro::api::{create_router, AppState};
use finpro::config::AppConfig;
use finpro::oauth::{run_state_cleanup, StateRegistry};
use finpro::store::{NoopStore, SqliteStore, Storage};
use finpro::token::TokenService;
use finpro::uber::UberClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "finpro=info".into()),
        )
        .init();

    let cfg = AppConfig::from_env();

    let token_key = match &cfg.token_key {
        Some(key) => key.clone(),
        None => {
            warn!("FINPRO_TOKEN_KEY not set; using an ephemeral signing key, sessions will not survive a restart");
            BASE64.encode(rand::thread_rng().gen::<[u8; 32]>())
        }
    };
    let tokens = TokenService::from_base64(&token_key)?;

    let encryption_key = match &cfg.encryption_key {
        Some(key) => key.clone(),
        None => {
            warn!("FINPRO_ENCRYPTION_KEY not set; using an ephemeral key, stored integration tokens will not survive a restart");
            BASE64.encode(rand::thread_rng().gen::<[u8; 32]>())
        }
    };

    // Degraded mode is an explicit operator choice, never a silent swap.
    let store: Arc<dyn Storage> = match SqliteStore::new(&cfg.database_path, &encryption_key) {
        Ok(store) => {
            info!(path = %cfg.database_path, "database opened");
            Arc::new(store)
        }
        Err(e) if cfg.allow_degraded => {
            warn!(
                path = %cfg.database_path,
                error = %e,
                "DATABASE UNAVAILABLE - serving in degraded mode, all writes will fail"
            );
            Arc::new(NoopStore)
        }
        Err(e) => return Err(e),
    };

    let states = StateRegistry::new(cfg.oauth_state_ttl_seconds);
    tokio::spawn(run_state_cleanup(states.clone(), 60));

    let uber = UberClient::new(
        cfg.uber_client_id.clone(),
        cfg.uber_client_secret.clone(),
        cfg.oauth_redirect_uri(),
        cfg.uber_auth_base.clone(),
        cfg.uber_api_base.clone(),
    );

    let app = create_router(AppState {
        store,
        tokens,
        states,
        uber,
        frontend_redirect: cfg.frontend_redirect.clone(),
    });

    let bind_address = format!("0.0.0.0:{}", cfg.port);
    info!("Server listening on {}...", bind_address);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
