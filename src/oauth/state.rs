//! OAuth state nonces for CSRF protection.
//!
//! The `state` parameter is never a raw user id: an unguessable,
//! single-use nonce is bound server-side to the authenticated user when
//! the authorization URL is issued, and validated-and-consumed when the
//! provider calls back. Expired or unknown states are rejected before any
//! provider call.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// What an outstanding state nonce is bound to.
#[derive(Clone, Debug)]
pub struct PendingAuth {
    pub provider: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Registry of outstanding state nonces with automatic expiry.
#[derive(Clone)]
pub struct StateRegistry {
    states: Arc<Mutex<HashMap<String, PendingAuth>>>,
    ttl: Duration,
}

impl StateRegistry {
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    /// Issue a nonce bound to `(provider, user_id)`.
    pub fn issue(&self, provider: &str, user_id: &str) -> String {
        let state = Uuid::new_v4().to_string();
        let entry = PendingAuth {
            provider: provider.to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };

        let mut states = self.states.lock().unwrap();
        states.insert(state.clone(), entry);

        state
    }

    /// Validate and consume a nonce (single-use). Returns the binding if
    /// the nonce exists and has not expired.
    pub fn consume(&self, state: &str) -> Option<PendingAuth> {
        let mut states = self.states.lock().unwrap();

        let entry = states.remove(state)?;

        if Utc::now() - entry.created_at > self.ttl {
            return None;
        }

        Some(entry)
    }

    /// Drop expired nonces; called periodically.
    pub fn cleanup_expired(&self) {
        let mut states = self.states.lock().unwrap();
        let now = Utc::now();
        states.retain(|_, entry| now - entry.created_at <= self.ttl);
    }

    pub fn count(&self) -> usize {
        self.states.lock().unwrap().len()
    }
}

/// Background task that periodically drops expired states.
pub async fn run_state_cleanup(registry: StateRegistry, interval_seconds: u64) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        registry.cleanup_expired();
        tracing::debug!(remaining = registry.count(), "OAuth state cleanup complete");
    }
}
