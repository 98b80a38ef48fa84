//! SQLite-backed storage.
//!
//! Uniqueness invariants live in the schema: user email, category key per
//! owner, `(owner_id, source, source_id)` on transactions (NULL source_id
//! rows are exempt, matching SQLite's distinct-NULL semantics), trip
//! external id per owner, and one integration per `(owner_id, provider)`.
//! Integration tokens are encrypted before they touch disk.
//!
//! The connection is wrapped in a `Mutex`; SQLite serializes writes anyway
//! and every operation here is a single statement or a short read.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

use super::{
    encryption, Category, EntryType, ImportedTrip, Integration, IntegrationUpsert, StoreError,
    Storage, Transaction, TransactionFilter, TxnSource, User, UserRecord,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    display_name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS categories (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    name TEXT NOT NULL,
    key TEXT NOT NULL,
    type TEXT NOT NULL,
    icon TEXT NOT NULL,
    color TEXT NOT NULL,
    is_default INTEGER NOT NULL,
    UNIQUE(owner_id, key)
);

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    title TEXT NOT NULL,
    amount REAL NOT NULL,
    type TEXT NOT NULL,
    category_key TEXT NOT NULL,
    date TEXT NOT NULL,
    note TEXT NOT NULL,
    created_at TEXT NOT NULL,
    source TEXT NOT NULL,
    source_id TEXT,
    UNIQUE(owner_id, source, source_id)
);

CREATE TABLE IF NOT EXISTS integrations (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    provider TEXT NOT NULL,
    access_token TEXT,
    refresh_token TEXT,
    token_expires_at TEXT,
    active INTEGER NOT NULL,
    external_user_data TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(owner_id, provider)
);

CREATE TABLE IF NOT EXISTS imported_trips (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    integration_id TEXT NOT NULL,
    external_trip_id TEXT NOT NULL,
    date TEXT NOT NULL,
    amount REAL NOT NULL,
    origin TEXT NOT NULL,
    destination TEXT NOT NULL,
    status TEXT NOT NULL,
    linked_transaction_id TEXT,
    UNIQUE(owner_id, external_trip_id)
);

CREATE INDEX IF NOT EXISTS idx_transactions_owner ON transactions(owner_id, date);
CREATE INDEX IF NOT EXISTS idx_categories_owner ON categories(owner_id);
CREATE INDEX IF NOT EXISTS idx_trips_owner ON imported_trips(owner_id);
"#;

/// The real store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    encryption_key: Vec<u8>,
}

impl SqliteStore {
    /// Open (or create) the database and its schema.
    ///
    /// `encryption_key` is the base64-encoded 32-byte master key used for
    /// integration tokens at rest.
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str) -> anyhow::Result<Self> {
        let key_bytes = encryption::validate_key(encryption_key)?;

        let conn = Connection::open(db_path)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            encryption_key: key_bytes,
        })
    }
}

/// Translate a driver error, mapping unique-constraint violations to
/// `Conflict` so callers can surface duplicates.
fn store_err(context: &str, err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(e, _) = &err {
        if e.code == rusqlite::ErrorCode::ConstraintViolation {
            return StoreError::Conflict(context.to_string());
        }
    }
    StoreError::Backend(format!("{}: {}", context, err))
}

/// Column conversion failure inside a row-mapping closure.
fn conv_err(msg: impl Into<String>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        msg.into().into(),
    )
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conv_err(format!("bad timestamp '{}': {}", s, e)))
}

fn parse_entry_type(s: &str) -> Result<EntryType, rusqlite::Error> {
    EntryType::parse(s).ok_or_else(|| conv_err(format!("bad entry type '{}'", s)))
}

fn parse_source(s: &str) -> Result<TxnSource, rusqlite::Error> {
    TxnSource::parse(s).ok_or_else(|| conv_err(format!("bad transaction source '{}'", s)))
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<UserRecord, rusqlite::Error> {
    let created_at: String = row.get(4)?;
    Ok(UserRecord {
        user: User {
            id: row.get(0)?,
            email: row.get(1)?,
            display_name: row.get(3)?,
            created_at: parse_timestamp(&created_at)?,
        },
        password_hash: row.get(2)?,
    })
}

fn row_to_category(row: &rusqlite::Row<'_>) -> Result<Category, rusqlite::Error> {
    let kind: String = row.get(4)?;
    Ok(Category {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        key: row.get(3)?,
        kind: parse_entry_type(&kind)?,
        icon: row.get(5)?,
        color: row.get(6)?,
        is_default: row.get(7)?,
    })
}

fn row_to_transaction(row: &rusqlite::Row<'_>) -> Result<Transaction, rusqlite::Error> {
    let kind: String = row.get(4)?;
    let created_at: String = row.get(8)?;
    let source: String = row.get(9)?;
    Ok(Transaction {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        amount: row.get(3)?,
        kind: parse_entry_type(&kind)?,
        category_key: row.get(5)?,
        date: row.get(6)?,
        note: row.get(7)?,
        created_at: parse_timestamp(&created_at)?,
        source: parse_source(&source)?,
        source_id: row.get(10)?,
    })
}

fn row_to_trip(row: &rusqlite::Row<'_>) -> Result<ImportedTrip, rusqlite::Error> {
    let date: String = row.get(4)?;
    Ok(ImportedTrip {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        integration_id: row.get(2)?,
        external_trip_id: row.get(3)?,
        date: parse_timestamp(&date)?,
        amount: row.get(5)?,
        origin: row.get(6)?,
        destination: row.get(7)?,
        status: row.get(8)?,
        linked_transaction_id: row.get(9)?,
    })
}

const USER_COLS: &str = "id, email, password_hash, display_name, created_at";
const CATEGORY_COLS: &str = "id, owner_id, name, key, type, icon, color, is_default";
const TRANSACTION_COLS: &str =
    "id, owner_id, title, amount, type, category_key, date, note, created_at, source, source_id";
const TRIP_COLS: &str = "id, owner_id, integration_id, external_trip_id, date, amount, origin, \
                         destination, status, linked_transaction_id";

impl Storage for SqliteStore {
    fn create_user(&self, record: &UserRecord) -> Result<(), StoreError> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO users (id, email, password_hash, display_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.user.id,
                    record.user.email,
                    record.password_hash,
                    record.user.display_name,
                    record.user.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| store_err("email already registered", e))?;
        Ok(())
    }

    fn user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", USER_COLS),
            params![email],
            row_to_user,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            e => Err(store_err("user lookup failed", e)),
        })
    }

    fn user_by_id(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
            params![id],
            row_to_user,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            e => Err(store_err("user lookup failed", e)),
        })
    }

    fn update_profile(
        &self,
        id: &str,
        display_name: &str,
        email: &str,
    ) -> Result<(), StoreError> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE users SET display_name = ?2, email = ?3 WHERE id = ?1",
                params![id, display_name, email],
            )
            .map_err(|e| store_err("email already in use", e))?;
        Ok(())
    }

    fn update_password_hash(&self, id: &str, password_hash: &str) -> Result<(), StoreError> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE users SET password_hash = ?2 WHERE id = ?1",
                params![id, password_hash],
            )
            .map_err(|e| store_err("password update failed", e))?;
        Ok(())
    }

    fn categories(&self, owner_id: &str) -> Result<Vec<Category>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM categories WHERE owner_id = ?1 ORDER BY is_default DESC, name",
                CATEGORY_COLS
            ))
            .map_err(|e| store_err("category list failed", e))?;

        stmt.query_map(params![owner_id], row_to_category)
            .and_then(|rows| rows.collect())
            .map_err(|e| store_err("category list failed", e))
    }

    fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO categories (id, owner_id, name, key, type, icon, color, is_default)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    category.id,
                    category.owner_id,
                    category.name,
                    category.key,
                    category.kind.as_str(),
                    category.icon,
                    category.color,
                    category.is_default,
                ],
            )
            .map_err(|e| store_err("category key already exists", e))?;
        Ok(())
    }

    fn category_by_id(
        &self,
        owner_id: &str,
        id: &str,
    ) -> Result<Option<Category>, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!(
                "SELECT {} FROM categories WHERE owner_id = ?1 AND id = ?2",
                CATEGORY_COLS
            ),
            params![owner_id, id],
            row_to_category,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            e => Err(store_err("category lookup failed", e)),
        })
    }

    fn category_name_exists(&self, owner_id: &str, name: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM categories WHERE owner_id = ?1 AND lower(name) = lower(?2)",
            params![owner_id, name],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n > 0)
        .map_err(|e| store_err("category name check failed", e))
    }

    fn delete_category(&self, owner_id: &str, id: &str) -> Result<bool, StoreError> {
        let affected = self
            .conn
            .lock()
            .unwrap()
            .execute(
                "DELETE FROM categories WHERE owner_id = ?1 AND id = ?2",
                params![owner_id, id],
            )
            .map_err(|e| store_err("category delete failed", e))?;
        Ok(affected > 0)
    }

    fn reassign_category(
        &self,
        owner_id: &str,
        from_key: &str,
        to_key: &str,
    ) -> Result<usize, StoreError> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE transactions SET category_key = ?3
                 WHERE owner_id = ?1 AND category_key = ?2",
                params![owner_id, from_key, to_key],
            )
            .map_err(|e| store_err("category reassignment failed", e))
    }

    fn transactions(
        &self,
        owner_id: &str,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut sql = format!(
            "SELECT {} FROM transactions WHERE owner_id = ?1",
            TRANSACTION_COLS
        );
        let mut args: Vec<String> = vec![owner_id.to_string()];

        if let Some(kind) = filter.kind {
            args.push(kind.as_str().to_string());
            sql.push_str(&format!(" AND type = ?{}", args.len()));
        }
        if let Some(category) = &filter.category {
            args.push(category.clone());
            sql.push_str(&format!(" AND category_key = ?{}", args.len()));
        }
        if let Some(start) = &filter.start_date {
            args.push(start.clone());
            sql.push_str(&format!(" AND date >= ?{}", args.len()));
        }
        if let Some(end) = &filter.end_date {
            args.push(end.clone());
            sql.push_str(&format!(" AND date <= ?{}", args.len()));
        }
        sql.push_str(" ORDER BY date DESC, created_at DESC");

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| store_err("transaction list failed", e))?;

        stmt.query_map(rusqlite::params_from_iter(args.iter()), row_to_transaction)
            .and_then(|rows| rows.collect())
            .map_err(|e| store_err("transaction list failed", e))
    }

    fn insert_transaction(&self, transaction: &Transaction) -> Result<(), StoreError> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO transactions
                 (id, owner_id, title, amount, type, category_key, date, note, created_at,
                  source, source_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    transaction.id,
                    transaction.owner_id,
                    transaction.title,
                    transaction.amount,
                    transaction.kind.as_str(),
                    transaction.category_key,
                    transaction.date,
                    transaction.note,
                    transaction.created_at.to_rfc3339(),
                    transaction.source.as_str(),
                    transaction.source_id,
                ],
            )
            .map_err(|e| store_err("transaction already imported", e))?;
        Ok(())
    }

    fn delete_transaction(&self, owner_id: &str, id: &str) -> Result<bool, StoreError> {
        let affected = self
            .conn
            .lock()
            .unwrap()
            .execute(
                "DELETE FROM transactions WHERE owner_id = ?1 AND id = ?2",
                params![owner_id, id],
            )
            .map_err(|e| store_err("transaction delete failed", e))?;
        Ok(affected > 0)
    }

    fn update_transaction_import(
        &self,
        id: &str,
        amount: f64,
        date: &str,
        title: &str,
    ) -> Result<(), StoreError> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE transactions SET amount = ?2, date = ?3, title = ?4 WHERE id = ?1",
                params![id, amount, date, title],
            )
            .map_err(|e| store_err("transaction update failed", e))?;
        Ok(())
    }

    fn upsert_integration(
        &self,
        upsert: &IntegrationUpsert,
    ) -> Result<Integration, StoreError> {
        let access_token = encryption::encrypt(&upsert.access_token, &self.encryption_key)
            .map_err(|e| StoreError::Backend(format!("token encryption failed: {}", e)))?;
        let refresh_token = upsert
            .refresh_token
            .as_deref()
            .map(|t| encryption::encrypt(t, &self.encryption_key))
            .transpose()
            .map_err(|e| StoreError::Backend(format!("token encryption failed: {}", e)))?;

        let now = Utc::now().to_rfc3339();
        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO integrations
                 (id, owner_id, provider, access_token, refresh_token, token_expires_at,
                  active, external_user_data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?8)
                 ON CONFLICT(owner_id, provider) DO UPDATE SET
                     access_token = excluded.access_token,
                     refresh_token = excluded.refresh_token,
                     token_expires_at = excluded.token_expires_at,
                     active = 1,
                     external_user_data = excluded.external_user_data,
                     updated_at = excluded.updated_at",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    upsert.owner_id,
                    upsert.provider,
                    access_token,
                    refresh_token,
                    upsert.token_expires_at.map(|dt| dt.to_rfc3339()),
                    upsert.external_user_data.to_string(),
                    now,
                ],
            )
            .map_err(|e| store_err("integration upsert failed", e))?;

        self.integration(&upsert.owner_id, &upsert.provider)?
            .ok_or_else(|| StoreError::Backend("integration missing after upsert".to_string()))
    }

    fn integration(
        &self,
        owner_id: &str,
        provider: &str,
    ) -> Result<Option<Integration>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, owner_id, provider, access_token, refresh_token, token_expires_at,
                        active, external_user_data, created_at, updated_at
                 FROM integrations WHERE owner_id = ?1 AND provider = ?2",
                params![owner_id, provider],
                |row| {
                    let expires: Option<String> = row.get(5)?;
                    let user_data: String = row.get(7)?;
                    let created_at: String = row.get(8)?;
                    let updated_at: String = row.get(9)?;
                    Ok((
                        Integration {
                            id: row.get(0)?,
                            owner_id: row.get(1)?,
                            provider: row.get(2)?,
                            access_token: None,
                            refresh_token: None,
                            token_expires_at: expires
                                .map(|s| parse_timestamp(&s))
                                .transpose()?,
                            active: row.get(6)?,
                            external_user_data: serde_json::from_str(&user_data)
                                .unwrap_or(serde_json::Value::Null),
                            created_at: parse_timestamp(&created_at)?,
                            updated_at: parse_timestamp(&updated_at)?,
                        },
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                e => Err(store_err("integration lookup failed", e)),
            })?;

        let Some((mut integration, access_enc, refresh_enc)) = row else {
            return Ok(None);
        };

        integration.access_token = access_enc
            .map(|t| encryption::decrypt(&t, &self.encryption_key))
            .transpose()
            .map_err(|e| StoreError::Backend(format!("token decryption failed: {}", e)))?;
        integration.refresh_token = refresh_enc
            .map(|t| encryption::decrypt(&t, &self.encryption_key))
            .transpose()
            .map_err(|e| StoreError::Backend(format!("token decryption failed: {}", e)))?;

        Ok(Some(integration))
    }

    fn deactivate_integration(&self, owner_id: &str, provider: &str) -> Result<(), StoreError> {
        // Tokens are cleared outright; safe to repeat on an inactive row.
        self.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE integrations
                 SET active = 0, access_token = NULL, refresh_token = NULL, updated_at = ?3
                 WHERE owner_id = ?1 AND provider = ?2",
                params![owner_id, provider, Utc::now().to_rfc3339()],
            )
            .map_err(|e| store_err("integration deactivate failed", e))?;
        Ok(())
    }

    fn trip_by_external_id(
        &self,
        owner_id: &str,
        external_trip_id: &str,
    ) -> Result<Option<ImportedTrip>, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!(
                "SELECT {} FROM imported_trips WHERE owner_id = ?1 AND external_trip_id = ?2",
                TRIP_COLS
            ),
            params![owner_id, external_trip_id],
            row_to_trip,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            e => Err(store_err("trip lookup failed", e)),
        })
    }

    fn insert_trip(&self, trip: &ImportedTrip) -> Result<(), StoreError> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO imported_trips
                 (id, owner_id, integration_id, external_trip_id, date, amount, origin,
                  destination, status, linked_transaction_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    trip.id,
                    trip.owner_id,
                    trip.integration_id,
                    trip.external_trip_id,
                    trip.date.to_rfc3339(),
                    trip.amount,
                    trip.origin,
                    trip.destination,
                    trip.status,
                    trip.linked_transaction_id,
                ],
            )
            .map_err(|e| store_err("trip already imported", e))?;
        Ok(())
    }

    fn update_trip(&self, trip: &ImportedTrip) -> Result<(), StoreError> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE imported_trips
                 SET date = ?2, amount = ?3, origin = ?4, destination = ?5, status = ?6
                 WHERE id = ?1",
                params![
                    trip.id,
                    trip.date.to_rfc3339(),
                    trip.amount,
                    trip.origin,
                    trip.destination,
                    trip.status,
                ],
            )
            .map_err(|e| store_err("trip update failed", e))?;
        Ok(())
    }

    fn link_trip_transaction(
        &self,
        trip_id: &str,
        transaction_id: &str,
    ) -> Result<(), StoreError> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE imported_trips SET linked_transaction_id = ?2 WHERE id = ?1",
                params![trip_id, transaction_id],
            )
            .map_err(|e| store_err("trip link failed", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    fn test_store() -> SqliteStore {
        let key = BASE64.encode([0u8; 32]);
        SqliteStore::new(":memory:", &key).expect("failed to create test store")
    }

    fn test_user(id: &str, email: &str) -> UserRecord {
        UserRecord {
            user: User {
                id: id.to_string(),
                email: email.to_string(),
                display_name: "Test User".to_string(),
                created_at: Utc::now(),
            },
            password_hash: "salt$hash".to_string(),
        }
    }

    fn test_upsert(owner: &str) -> IntegrationUpsert {
        IntegrationUpsert {
            owner_id: owner.to_string(),
            provider: "uber".to_string(),
            access_token: "access-123".to_string(),
            refresh_token: Some("refresh-456".to_string()),
            token_expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
            external_user_data: serde_json::json!({"first_name": "Alice"}),
        }
    }

    #[test]
    fn test_duplicate_email_is_conflict() {
        let store = test_store();
        store.create_user(&test_user("u1", "a@example.com")).unwrap();

        let err = store
            .create_user(&test_user("u2", "a@example.com"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_user_lookup_roundtrip() {
        let store = test_store();
        store.create_user(&test_user("u1", "a@example.com")).unwrap();

        let by_email = store.user_by_email("a@example.com").unwrap().unwrap();
        assert_eq!(by_email.user.id, "u1");
        assert_eq!(by_email.password_hash, "salt$hash");

        assert!(store.user_by_email("missing@example.com").unwrap().is_none());
    }

    #[test]
    fn test_integration_tokens_encrypted_at_rest() {
        let store = test_store();
        store.create_user(&test_user("u1", "a@example.com")).unwrap();
        store.upsert_integration(&test_upsert("u1")).unwrap();

        // Raw row must not contain the plaintext token.
        let raw: String = store
            .conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT access_token FROM integrations WHERE owner_id = 'u1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(!raw.contains("access-123"));

        // Read path decrypts transparently.
        let integration = store.integration("u1", "uber").unwrap().unwrap();
        assert_eq!(integration.access_token.as_deref(), Some("access-123"));
        assert_eq!(integration.refresh_token.as_deref(), Some("refresh-456"));
        assert!(integration.active);
    }

    #[test]
    fn test_integration_upsert_replaces_tokens_and_keeps_one_row() {
        let store = test_store();
        store.upsert_integration(&test_upsert("u1")).unwrap();

        let mut second = test_upsert("u1");
        second.access_token = "access-789".to_string();
        let integration = store.upsert_integration(&second).unwrap();
        assert_eq!(integration.access_token.as_deref(), Some("access-789"));

        let count: i64 = store
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM integrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_deactivate_is_idempotent_and_clears_tokens() {
        let store = test_store();
        store.upsert_integration(&test_upsert("u1")).unwrap();

        store.deactivate_integration("u1", "uber").unwrap();
        store.deactivate_integration("u1", "uber").unwrap();

        let integration = store.integration("u1", "uber").unwrap().unwrap();
        assert!(!integration.active);
        assert!(integration.access_token.is_none());
        assert!(integration.refresh_token.is_none());
    }

    #[test]
    fn test_reconnect_reactivates() {
        let store = test_store();
        store.upsert_integration(&test_upsert("u1")).unwrap();
        store.deactivate_integration("u1", "uber").unwrap();

        store.upsert_integration(&test_upsert("u1")).unwrap();
        let integration = store.integration("u1", "uber").unwrap().unwrap();
        assert!(integration.active);
        assert!(integration.access_token.is_some());
    }

    #[test]
    fn test_import_dedup_constraint() {
        let store = test_store();
        let txn = Transaction {
            id: "t1".to_string(),
            owner_id: "u1".to_string(),
            title: "Uber trip: A → B".to_string(),
            amount: 30.0,
            kind: EntryType::Expense,
            category_key: "transport".to_string(),
            date: "2024-01-10".to_string(),
            note: String::new(),
            created_at: Utc::now(),
            source: TxnSource::UberImport,
            source_id: Some("trip-1".to_string()),
        };
        store.insert_transaction(&txn).unwrap();

        let mut dup = txn.clone();
        dup.id = "t2".to_string();
        let err = store.insert_transaction(&dup).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // NULL source_id rows are exempt from the constraint.
        let mut manual = txn.clone();
        manual.id = "t3".to_string();
        manual.source = TxnSource::Manual;
        manual.source_id = None;
        let mut manual2 = manual.clone();
        manual2.id = "t4".to_string();
        store.insert_transaction(&manual).unwrap();
        store.insert_transaction(&manual2).unwrap();
    }

    #[test]
    fn test_transaction_filters() {
        let store = test_store();
        let base = Transaction {
            id: String::new(),
            owner_id: "u1".to_string(),
            title: "x".to_string(),
            amount: 1.0,
            kind: EntryType::Expense,
            category_key: "food".to_string(),
            date: "2024-01-10".to_string(),
            note: String::new(),
            created_at: Utc::now(),
            source: TxnSource::Manual,
            source_id: None,
        };

        let mut a = base.clone();
        a.id = "a".to_string();
        let mut b = base.clone();
        b.id = "b".to_string();
        b.kind = EntryType::Income;
        b.category_key = "salary".to_string();
        b.date = "2024-02-01".to_string();
        store.insert_transaction(&a).unwrap();
        store.insert_transaction(&b).unwrap();

        let all = store
            .transactions("u1", &TransactionFilter::default())
            .unwrap();
        assert_eq!(all.len(), 2);
        // Newest first
        assert_eq!(all[0].id, "b");

        let expenses = store
            .transactions(
                "u1",
                &TransactionFilter {
                    kind: Some(EntryType::Expense),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].id, "a");

        let january = store
            .transactions(
                "u1",
                &TransactionFilter {
                    start_date: Some("2024-01-01".to_string()),
                    end_date: Some("2024-01-31".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(january.len(), 1);
        assert_eq!(january[0].id, "a");
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finpro.db");
        let key = BASE64.encode([0u8; 32]);

        {
            let store = SqliteStore::new(&path, &key).unwrap();
            store.create_user(&test_user("u1", "a@example.com")).unwrap();
            store.upsert_integration(&test_upsert("u1")).unwrap();
        }

        let reopened = SqliteStore::new(&path, &key).unwrap();
        assert!(reopened.user_by_email("a@example.com").unwrap().is_some());
        let integration = reopened.integration("u1", "uber").unwrap().unwrap();
        assert_eq!(integration.access_token.as_deref(), Some("access-123"));
    }

    #[test]
    fn test_trip_link_roundtrip() {
        let store = test_store();
        let trip = ImportedTrip {
            id: "trip-row-1".to_string(),
            owner_id: "u1".to_string(),
            integration_id: "i1".to_string(),
            external_trip_id: "U1".to_string(),
            date: Utc::now(),
            amount: 30.0,
            origin: "Home".to_string(),
            destination: "Airport".to_string(),
            status: "completed".to_string(),
            linked_transaction_id: None,
        };
        store.insert_trip(&trip).unwrap();
        store.link_trip_transaction("trip-row-1", "txn-1").unwrap();

        let loaded = store.trip_by_external_id("u1", "U1").unwrap().unwrap();
        assert_eq!(loaded.linked_transaction_id.as_deref(), Some("txn-1"));

        let mut dup = trip.clone();
        dup.id = "trip-row-2".to_string();
        assert!(matches!(
            store.insert_trip(&dup),
            Err(StoreError::Conflict(_))
        ));
    }
}
