//! Transaction categories: per-user defaults, custom categories, and
//! delete-with-reassignment.
//!
//! Every user gets the default set seeded on first list. Defaults cannot
//! be deleted; deleting a custom category moves its transactions to
//! `other` so no transaction is left pointing at a missing key.

use uuid::Uuid;

use crate::store::{Category, EntryType, Storage, StoreError};

/// Catch-all category; reassignment target on delete.
pub const OTHER_KEY: &str = "other";

/// `(name, key, type, icon, color)` seeded for every new user.
const DEFAULT_CATEGORIES: &[(&str, &str, EntryType, &str, &str)] = &[
    ("Salary", "salary", EntryType::Income, "money-bill-wave", "#2e7d32"),
    ("Freelance", "freelance", EntryType::Income, "laptop", "#00897b"),
    ("Investments", "investments", EntryType::Income, "chart-line", "#1565c0"),
    ("Food", "food", EntryType::Expense, "utensils", "#ef6c00"),
    ("Transport", "transport", EntryType::Expense, "car", "#5e35b1"),
    ("Housing", "housing", EntryType::Expense, "home", "#6d4c41"),
    ("Health", "health", EntryType::Expense, "heartbeat", "#c62828"),
    ("Education", "education", EntryType::Expense, "graduation-cap", "#283593"),
    ("Entertainment", "entertainment", EntryType::Expense, "film", "#ad1457"),
    ("Shopping", "shopping", EntryType::Expense, "shopping-cart", "#00838f"),
    ("Bills", "bills", EntryType::Expense, "file-invoice-dollar", "#546e7a"),
    ("Other", "other", EntryType::Expense, "question-circle", "#757575"),
];

#[derive(Debug)]
pub enum CategoryError {
    /// A category with this name (case-insensitive) or key already exists.
    Duplicate,
    /// Default categories cannot be deleted.
    IsDefault,
    NotFound,
    Store(StoreError),
}

impl std::fmt::Display for CategoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CategoryError::Duplicate => write!(f, "A category with this name already exists"),
            CategoryError::IsDefault => write!(f, "Default categories cannot be deleted"),
            CategoryError::NotFound => write!(f, "Category not found"),
            CategoryError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CategoryError {}

impl From<StoreError> for CategoryError {
    fn from(e: StoreError) -> Self {
        CategoryError::Store(e)
    }
}

/// Derive a stable slug from a category name: lowercase, everything
/// outside `[a-z0-9]` becomes `_`.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// List a user's categories, seeding the defaults on first access.
pub fn list(store: &dyn Storage, owner_id: &str) -> Result<Vec<Category>, CategoryError> {
    let existing = store.categories(owner_id)?;
    if !existing.is_empty() {
        return Ok(existing);
    }

    for (name, key, kind, icon, color) in DEFAULT_CATEGORIES {
        let category = Category {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            key: key.to_string(),
            kind: *kind,
            icon: icon.to_string(),
            color: color.to_string(),
            is_default: true,
        };
        // A concurrent first access may have seeded the same key already;
        // converge instead of failing.
        match store.insert_category(&category) {
            Ok(()) | Err(StoreError::Conflict(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(owner_id = %owner_id, "seeded default categories");
    Ok(store.categories(owner_id)?)
}

/// Create a custom category. Name uniqueness is case-insensitive across
/// all of the owner's categories.
pub fn create(
    store: &dyn Storage,
    owner_id: &str,
    name: &str,
    kind: EntryType,
    icon: &str,
    color: &str,
) -> Result<Category, CategoryError> {
    if store.category_name_exists(owner_id, name)? {
        return Err(CategoryError::Duplicate);
    }

    let category = Category {
        id: Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        name: name.to_string(),
        key: slugify(name),
        kind,
        icon: icon.to_string(),
        color: color.to_string(),
        is_default: false,
    };

    match store.insert_category(&category) {
        Ok(()) => Ok(category),
        Err(StoreError::Conflict(_)) => Err(CategoryError::Duplicate),
        Err(e) => Err(e.into()),
    }
}

/// Delete a custom category, reassigning its transactions to `other`.
/// Returns how many transactions were reassigned.
pub fn remove(store: &dyn Storage, owner_id: &str, id: &str) -> Result<usize, CategoryError> {
    let Some(category) = store.category_by_id(owner_id, id)? else {
        return Err(CategoryError::NotFound);
    };

    if category.is_default {
        return Err(CategoryError::IsDefault);
    }

    if !store.delete_category(owner_id, id)? {
        return Err(CategoryError::NotFound);
    }

    let reassigned = store.reassign_category(owner_id, &category.key, OTHER_KEY)?;
    tracing::info!(
        owner_id = %owner_id,
        category = %category.key,
        reassigned,
        "category deleted"
    );
    Ok(reassigned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SqliteStore, Transaction, TransactionFilter, TxnSource};
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use chrono::Utc;

    fn test_store() -> SqliteStore {
        SqliteStore::new(":memory:", &BASE64.encode([0u8; 32])).unwrap()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Coffee & Snacks"), "coffee___snacks");
        assert_eq!(slugify("Pets"), "pets");
        assert_eq!(slugify("Gym 2024"), "gym_2024");
    }

    #[test]
    fn test_first_list_seeds_defaults() {
        let store = test_store();

        let categories = list(&store, "u1").unwrap();
        assert_eq!(categories.len(), 12);
        assert!(categories.iter().all(|c| c.is_default));
        assert!(categories.iter().any(|c| c.key == OTHER_KEY));

        // Second list does not reseed.
        let again = list(&store, "u1").unwrap();
        assert_eq!(again.len(), 12);
    }

    #[test]
    fn test_create_duplicate_name_case_insensitive() {
        let store = test_store();
        list(&store, "u1").unwrap();

        create(&store, "u1", "Pets", EntryType::Expense, "paw", "#111111").unwrap();
        let err =
            create(&store, "u1", "PETS", EntryType::Expense, "paw", "#111111").unwrap_err();
        assert!(matches!(err, CategoryError::Duplicate));

        // Clashing with a default name is also a duplicate.
        let err =
            create(&store, "u1", "food", EntryType::Expense, "utensils", "#222222").unwrap_err();
        assert!(matches!(err, CategoryError::Duplicate));
    }

    #[test]
    fn test_delete_default_rejected() {
        let store = test_store();
        let categories = list(&store, "u1").unwrap();
        let food = categories.iter().find(|c| c.key == "food").unwrap();

        let err = remove(&store, "u1", &food.id).unwrap_err();
        assert!(matches!(err, CategoryError::IsDefault));
    }

    #[test]
    fn test_delete_reassigns_to_other() {
        let store = test_store();
        list(&store, "u1").unwrap();
        let pets = create(&store, "u1", "Pets", EntryType::Expense, "paw", "#111111").unwrap();

        store
            .insert_transaction(&Transaction {
                id: "t1".to_string(),
                owner_id: "u1".to_string(),
                title: "Vet".to_string(),
                amount: 80.0,
                kind: EntryType::Expense,
                category_key: pets.key.clone(),
                date: "2024-03-01".to_string(),
                note: String::new(),
                created_at: Utc::now(),
                source: TxnSource::Manual,
                source_id: None,
            })
            .unwrap();

        let reassigned = remove(&store, "u1", &pets.id).unwrap();
        assert_eq!(reassigned, 1);

        let transactions = store
            .transactions("u1", &TransactionFilter::default())
            .unwrap();
        assert_eq!(transactions[0].category_key, OTHER_KEY);
    }

    #[test]
    fn test_delete_missing_category() {
        let store = test_store();
        assert!(matches!(
            remove(&store, "u1", "nope"),
            Err(CategoryError::NotFound)
        ));
    }
}
