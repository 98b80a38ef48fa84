//! User account operations: registration, login, profile and password
//! changes.
//!
//! Lookup failures and hash mismatches both collapse into
//! [`AccountError::InvalidCredentials`] so responses cannot be used to
//! probe which emails are registered. Email matching is case-sensitive
//! exact.

use chrono::Utc;
use uuid::Uuid;

use crate::store::{Storage, StoreError, User, UserRecord};

pub mod password;

#[derive(Debug)]
pub enum AccountError {
    /// Email already registered (or taken by another user on profile update).
    DuplicateEmail,
    /// Unknown email, wrong password, or wrong current password. One
    /// variant on purpose.
    InvalidCredentials,
    /// User id no longer resolves to a record.
    NotFound,
    Store(StoreError),
    Internal(String),
}

impl std::fmt::Display for AccountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountError::DuplicateEmail => write!(f, "This email is already in use"),
            AccountError::InvalidCredentials => write!(f, "Invalid email or password"),
            AccountError::NotFound => write!(f, "User not found"),
            AccountError::Store(e) => write!(f, "{}", e),
            AccountError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AccountError {}

impl From<StoreError> for AccountError {
    fn from(e: StoreError) -> Self {
        AccountError::Store(e)
    }
}

/// Create a user. The raw password is hashed before it reaches the store
/// and is never logged.
pub fn register(
    store: &dyn Storage,
    email: &str,
    password: &str,
    display_name: &str,
) -> Result<User, AccountError> {
    let password_hash = password::hash_password(password)
        .map_err(|e| AccountError::Internal(e.to_string()))?;

    let record = UserRecord {
        user: User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        },
        password_hash,
    };

    match store.create_user(&record) {
        Ok(()) => {
            tracing::info!(user_id = %record.user.id, "user registered");
            Ok(record.user)
        }
        Err(StoreError::Conflict(_)) => Err(AccountError::DuplicateEmail),
        Err(e) => Err(e.into()),
    }
}

/// Check credentials and return the user on success.
pub fn authenticate(
    store: &dyn Storage,
    email: &str,
    password: &str,
) -> Result<User, AccountError> {
    let Some(record) = store.user_by_email(email)? else {
        return Err(AccountError::InvalidCredentials);
    };

    if !password::verify_password(password, &record.password_hash) {
        return Err(AccountError::InvalidCredentials);
    }

    Ok(record.user)
}

/// Fetch a user by id.
pub fn fetch(store: &dyn Storage, user_id: &str) -> Result<Option<User>, AccountError> {
    Ok(store.user_by_id(user_id)?.map(|r| r.user))
}

/// Change display name and email. A `Conflict` from the store means the
/// email belongs to another user.
pub fn update_profile(
    store: &dyn Storage,
    user_id: &str,
    display_name: &str,
    email: &str,
) -> Result<User, AccountError> {
    if store.user_by_id(user_id)?.is_none() {
        return Err(AccountError::NotFound);
    }

    match store.update_profile(user_id, display_name, email) {
        Ok(()) => {}
        Err(StoreError::Conflict(_)) => return Err(AccountError::DuplicateEmail),
        Err(e) => return Err(e.into()),
    }

    tracing::info!(user_id = %user_id, "profile updated");
    store
        .user_by_id(user_id)?
        .map(|r| r.user)
        .ok_or(AccountError::NotFound)
}

/// Re-hash and persist a new password after verifying the current one.
pub fn change_password(
    store: &dyn Storage,
    user_id: &str,
    current_password: &str,
    new_password: &str,
) -> Result<(), AccountError> {
    let Some(record) = store.user_by_id(user_id)? else {
        return Err(AccountError::NotFound);
    };

    if !password::verify_password(current_password, &record.password_hash) {
        return Err(AccountError::InvalidCredentials);
    }

    let new_hash = password::hash_password(new_password)
        .map_err(|e| AccountError::Internal(e.to_string()))?;
    store.update_password_hash(user_id, &new_hash)?;

    tracing::info!(user_id = %user_id, "password changed");
    Ok(())
}
