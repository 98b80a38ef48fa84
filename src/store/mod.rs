//! Persistent storage for the tracker.
//!
//! All persistence goes through the [`Storage`] capability trait so the
//! rest of the service never touches a database driver directly. Two
//! implementations exist: [`SqliteStore`] (the real store, integration
//! tokens encrypted at rest) and [`NoopStore`] (degraded mode, selected
//! explicitly at startup when the database cannot be opened).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod encryption;
mod noop;
mod sqlite;

pub use noop::NoopStore;
pub use sqlite::SqliteStore;

/// Income or expense, on both categories and transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Income,
    Expense,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Income => "income",
            EntryType::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(EntryType::Income),
            "expense" => Some(EntryType::Expense),
            _ => None,
        }
    }
}

/// Where a transaction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnSource {
    #[serde(rename = "manual")]
    Manual,
    #[serde(rename = "uber-import")]
    UberImport,
}

impl TxnSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnSource::Manual => "manual",
            TxnSource::UberImport => "uber-import",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(TxnSource::Manual),
            "uber-import" => Some(TxnSource::UberImport),
            _ => None,
        }
    }
}

/// User projection safe for client responses (no password hash).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Full user record as persisted.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    /// Slug, unique per owner; transactions reference categories by key.
    pub key: String,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub icon: String,
    pub color: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub category_key: String,
    /// Calendar date (`YYYY-MM-DD`) for manual entries, RFC 3339 for imports.
    pub date: String,
    #[serde(default)]
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub source: TxnSource,
    /// External id for imported transactions; `(owner_id, source, source_id)`
    /// is unique when set — the import dedup invariant.
    pub source_id: Option<String>,
}

/// OAuth integration record. Deliberately not `Serialize`: stored tokens
/// must never reach a client; the API layer builds explicit projections.
#[derive(Debug, Clone)]
pub struct Integration {
    pub id: String,
    pub owner_id: String,
    pub provider: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub external_user_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written on integration upsert, keyed by `(owner_id, provider)`.
#[derive(Debug, Clone)]
pub struct IntegrationUpsert {
    pub owner_id: String,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub external_user_data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedTrip {
    pub id: String,
    pub owner_id: String,
    pub integration_id: String,
    /// Provider-assigned trip id, unique per owner — the trip dedup key.
    pub external_trip_id: String,
    pub date: DateTime<Utc>,
    pub amount: f64,
    pub origin: String,
    pub destination: String,
    pub status: String,
    pub linked_transaction_id: Option<String>,
}

/// Optional filters for transaction listing.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub kind: Option<EntryType>,
    pub category: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Storage failures, with unique-constraint violations distinguished so
/// operations can surface duplicates to callers.
#[derive(Debug)]
pub enum StoreError {
    /// A uniqueness constraint was violated.
    Conflict(String),
    /// The store is running in degraded mode and cannot serve the request.
    Unavailable,
    /// Any other backend failure.
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Conflict(what) => write!(f, "conflict: {}", what),
            StoreError::Unavailable => write!(f, "storage unavailable (degraded mode)"),
            StoreError::Backend(msg) => write!(f, "storage error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistence capability used by every operation in the service.
pub trait Storage: Send + Sync {
    // users
    fn create_user(&self, record: &UserRecord) -> Result<(), StoreError>;
    fn user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
    fn user_by_id(&self, id: &str) -> Result<Option<UserRecord>, StoreError>;
    fn update_profile(&self, id: &str, display_name: &str, email: &str)
        -> Result<(), StoreError>;
    fn update_password_hash(&self, id: &str, password_hash: &str) -> Result<(), StoreError>;

    // categories
    fn categories(&self, owner_id: &str) -> Result<Vec<Category>, StoreError>;
    fn insert_category(&self, category: &Category) -> Result<(), StoreError>;
    fn category_by_id(&self, owner_id: &str, id: &str) -> Result<Option<Category>, StoreError>;
    fn category_name_exists(&self, owner_id: &str, name: &str) -> Result<bool, StoreError>;
    fn delete_category(&self, owner_id: &str, id: &str) -> Result<bool, StoreError>;
    fn reassign_category(
        &self,
        owner_id: &str,
        from_key: &str,
        to_key: &str,
    ) -> Result<usize, StoreError>;

    // transactions
    fn transactions(
        &self,
        owner_id: &str,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError>;
    fn insert_transaction(&self, transaction: &Transaction) -> Result<(), StoreError>;
    fn delete_transaction(&self, owner_id: &str, id: &str) -> Result<bool, StoreError>;
    fn update_transaction_import(
        &self,
        id: &str,
        amount: f64,
        date: &str,
        title: &str,
    ) -> Result<(), StoreError>;

    // integrations
    fn upsert_integration(&self, upsert: &IntegrationUpsert)
        -> Result<Integration, StoreError>;
    fn integration(
        &self,
        owner_id: &str,
        provider: &str,
    ) -> Result<Option<Integration>, StoreError>;
    fn deactivate_integration(&self, owner_id: &str, provider: &str) -> Result<(), StoreError>;

    // imported trips
    fn trip_by_external_id(
        &self,
        owner_id: &str,
        external_trip_id: &str,
    ) -> Result<Option<ImportedTrip>, StoreError>;
    fn insert_trip(&self, trip: &ImportedTrip) -> Result<(), StoreError>;
    fn update_trip(&self, trip: &ImportedTrip) -> Result<(), StoreError>;
    fn link_trip_transaction(
        &self,
        trip_id: &str,
        transaction_id: &str,
    ) -> Result<(), StoreError>;
}
