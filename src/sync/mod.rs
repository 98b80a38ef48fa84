//! Trip sync engine: reconcile Uber trip history into imported trips and
//! derived expense transactions.
//!
//! One sync call makes a single history fetch; a fetch failure leaves all
//! local state untouched. Per-trip outcomes are independent: a failing
//! trip is counted and logged, never aborts the rest. Dedup rides on the
//! store's uniqueness keys (`(owner, external_trip_id)` for trips,
//! `(owner, source, source_id)` for transactions), so concurrent syncs
//! for the same user converge instead of duplicating.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::oauth::PROVIDER_UBER;
use crate::store::{
    EntryType, ImportedTrip, Integration, IntegrationUpsert, Storage, StoreError, Transaction,
    TxnSource,
};
use crate::uber::{TripHistory, UberClient, UberTrip};

/// Category imported trips are filed under.
const IMPORT_CATEGORY: &str = "transport";

/// Aggregate result of one sync call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    /// Trips reported upstream.
    pub total: usize,
    /// New trips imported this call.
    pub inserted: usize,
    /// Already-known trips refreshed this call.
    pub updated: usize,
    /// Transactions created this call (one per inserted trip).
    pub transactions_created: usize,
    /// Trips whose processing failed; the rest of the batch still ran.
    pub failed: usize,
}

#[derive(Debug)]
pub enum SyncError {
    /// No active Uber integration for this user.
    IntegrationNotFound,
    /// Access token expired and could not be renewed.
    TokenExpired,
    /// History fetch failed; nothing was modified.
    UpstreamFetch(String),
    Store(StoreError),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::IntegrationNotFound => {
                write!(f, "Uber integration not found or inactive")
            }
            SyncError::TokenExpired => {
                write!(f, "Access token expired, reconnect your Uber account")
            }
            SyncError::UpstreamFetch(e) => write!(f, "Failed to fetch Uber trips: {}", e),
            SyncError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        SyncError::Store(e)
    }
}

/// Run a full sync for one user.
pub async fn sync_trips(
    store: &dyn Storage,
    uber: &UberClient,
    owner_id: &str,
) -> Result<SyncReport, SyncError> {
    let integration = store
        .integration(owner_id, PROVIDER_UBER)?
        .filter(|i| i.active)
        .ok_or(SyncError::IntegrationNotFound)?;

    let access_token = ensure_fresh_token(store, uber, &integration).await?;

    let history = uber
        .fetch_history(&access_token)
        .await
        .map_err(|e| SyncError::UpstreamFetch(e.to_string()))?;

    let report = reconcile(store, &integration, &history);
    tracing::info!(
        user_id = %owner_id,
        total = report.total,
        inserted = report.inserted,
        updated = report.updated,
        failed = report.failed,
        "trip sync finished"
    );
    Ok(report)
}

/// Token-expiry check with the renewal hook: an expired access token is
/// refreshed in place when a refresh token exists; `TokenExpired` is the
/// fallback, not the first resort.
async fn ensure_fresh_token(
    store: &dyn Storage,
    uber: &UberClient,
    integration: &Integration,
) -> Result<String, SyncError> {
    let access_token = integration
        .access_token
        .clone()
        .ok_or(SyncError::TokenExpired)?;

    let expired = integration
        .token_expires_at
        .map(|exp| exp <= Utc::now())
        .unwrap_or(false);
    if !expired {
        return Ok(access_token);
    }

    let Some(refresh_token) = integration.refresh_token.as_deref() else {
        return Err(SyncError::TokenExpired);
    };

    tracing::info!(user_id = %integration.owner_id, "access token expired, attempting refresh");
    let grant = uber.refresh(refresh_token).await.map_err(|e| {
        tracing::warn!(user_id = %integration.owner_id, error = %e, "token refresh failed");
        SyncError::TokenExpired
    })?;

    // Providers may or may not rotate the refresh token; keep the old one
    // when none is returned.
    store.upsert_integration(&IntegrationUpsert {
        owner_id: integration.owner_id.clone(),
        provider: integration.provider.clone(),
        access_token: grant.access_token.clone(),
        refresh_token: grant
            .refresh_token
            .clone()
            .or_else(|| integration.refresh_token.clone()),
        token_expires_at: grant.expires_at(),
        external_user_data: integration.external_user_data.clone(),
    })?;

    Ok(grant.access_token)
}

enum TripOutcome {
    Inserted,
    Updated,
}

/// Reconcile a fetched history page into the store. Infallible at the
/// batch level: per-trip failures are accumulated in the report.
pub fn reconcile(
    store: &dyn Storage,
    integration: &Integration,
    history: &TripHistory,
) -> SyncReport {
    let mut report = SyncReport {
        total: history.total(),
        ..Default::default()
    };

    for trip in &history.history {
        match reconcile_trip(store, integration, trip) {
            Ok(TripOutcome::Inserted) => {
                report.inserted += 1;
                report.transactions_created += 1;
            }
            Ok(TripOutcome::Updated) => report.updated += 1,
            Err(e) => {
                report.failed += 1;
                tracing::error!(
                    user_id = %integration.owner_id,
                    trip_id = %trip.uuid,
                    error = %e,
                    "failed to process trip"
                );
            }
        }
    }

    report
}

fn reconcile_trip(
    store: &dyn Storage,
    integration: &Integration,
    trip: &UberTrip,
) -> Result<TripOutcome, StoreError> {
    if let Some(existing) = store.trip_by_external_id(&integration.owner_id, &trip.uuid)? {
        update_existing(store, existing, trip)?;
        return Ok(TripOutcome::Updated);
    }

    match insert_new(store, integration, trip) {
        Err(StoreError::Conflict(_)) => {
            // Lost a race with a concurrent sync; converge on the update path.
            match store.trip_by_external_id(&integration.owner_id, &trip.uuid)? {
                Some(existing) => {
                    update_existing(store, existing, trip)?;
                    Ok(TripOutcome::Updated)
                }
                None => Err(StoreError::Backend(
                    "trip conflict without existing row".to_string(),
                )),
            }
        }
        other => other.map(|_| TripOutcome::Inserted),
    }
}

/// Refresh an already-imported trip and, when linked, its transaction.
fn update_existing(
    store: &dyn Storage,
    mut existing: ImportedTrip,
    trip: &UberTrip,
) -> Result<(), StoreError> {
    existing.date = trip.requested_at();
    existing.amount = trip.fare_value();
    existing.origin = trip.origin().to_string();
    existing.destination = trip.destination().to_string();
    existing.status = trip.status.clone().unwrap_or_default();
    store.update_trip(&existing)?;

    if let Some(transaction_id) = &existing.linked_transaction_id {
        store.update_transaction_import(
            transaction_id,
            existing.amount,
            &existing.date.to_rfc3339(),
            &trip_title(trip),
        )?;
    }

    Ok(())
}

/// Import a new trip and its derived expense transaction. The trip is
/// linked only after the transaction persisted.
fn insert_new(
    store: &dyn Storage,
    integration: &Integration,
    trip: &UberTrip,
) -> Result<(), StoreError> {
    let trip_row = ImportedTrip {
        id: Uuid::new_v4().to_string(),
        owner_id: integration.owner_id.clone(),
        integration_id: integration.id.clone(),
        external_trip_id: trip.uuid.clone(),
        date: trip.requested_at(),
        amount: trip.fare_value(),
        origin: trip.origin().to_string(),
        destination: trip.destination().to_string(),
        status: trip.status.clone().unwrap_or_default(),
        linked_transaction_id: None,
    };
    store.insert_trip(&trip_row)?;

    let transaction = Transaction {
        id: Uuid::new_v4().to_string(),
        owner_id: integration.owner_id.clone(),
        title: trip_title(trip),
        amount: trip_row.amount,
        kind: EntryType::Expense,
        category_key: IMPORT_CATEGORY.to_string(),
        date: trip_row.date.to_rfc3339(),
        note: format!("Imported automatically from Uber trip history. Trip id: {}", trip.uuid),
        created_at: Utc::now(),
        source: TxnSource::UberImport,
        source_id: Some(trip.uuid.clone()),
    };
    store.insert_transaction(&transaction)?;

    store.link_trip_transaction(&trip_row.id, &transaction.id)?;
    Ok(())
}

fn trip_title(trip: &UberTrip) -> String {
    format!(
        "Uber trip: {} → {}",
        endpoint_label(trip.origin()),
        endpoint_label(trip.destination())
    )
}

fn endpoint_label(name: &str) -> &str {
    if name.is_empty() {
        "Unknown"
    } else {
        name
    }
}
