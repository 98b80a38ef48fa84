//! Degraded-mode storage stub.
//!
//! Used when the real database cannot be opened and the operator has
//! explicitly allowed degraded startup. Reads return nothing, writes fail
//! with [`StoreError::Unavailable`]; nothing is ever swapped in silently.

use super::{
    Category, ImportedTrip, Integration, IntegrationUpsert, StoreError, Storage, Transaction,
    TransactionFilter, UserRecord,
};

pub struct NoopStore;

impl Storage for NoopStore {
    fn create_user(&self, _record: &UserRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    fn user_by_email(&self, _email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(None)
    }

    fn user_by_id(&self, _id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(None)
    }

    fn update_profile(
        &self,
        _id: &str,
        _display_name: &str,
        _email: &str,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    fn update_password_hash(&self, _id: &str, _password_hash: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    fn categories(&self, _owner_id: &str) -> Result<Vec<Category>, StoreError> {
        Ok(Vec::new())
    }

    fn insert_category(&self, _category: &Category) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    fn category_by_id(
        &self,
        _owner_id: &str,
        _id: &str,
    ) -> Result<Option<Category>, StoreError> {
        Ok(None)
    }

    fn category_name_exists(&self, _owner_id: &str, _name: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    fn delete_category(&self, _owner_id: &str, _id: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable)
    }

    fn reassign_category(
        &self,
        _owner_id: &str,
        _from_key: &str,
        _to_key: &str,
    ) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable)
    }

    fn transactions(
        &self,
        _owner_id: &str,
        _filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError> {
        Ok(Vec::new())
    }

    fn insert_transaction(&self, _transaction: &Transaction) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    fn delete_transaction(&self, _owner_id: &str, _id: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable)
    }

    fn update_transaction_import(
        &self,
        _id: &str,
        _amount: f64,
        _date: &str,
        _title: &str,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    fn upsert_integration(
        &self,
        _upsert: &IntegrationUpsert,
    ) -> Result<Integration, StoreError> {
        Err(StoreError::Unavailable)
    }

    fn integration(
        &self,
        _owner_id: &str,
        _provider: &str,
    ) -> Result<Option<Integration>, StoreError> {
        Ok(None)
    }

    fn deactivate_integration(&self, _owner_id: &str, _provider: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    fn trip_by_external_id(
        &self,
        _owner_id: &str,
        _external_trip_id: &str,
    ) -> Result<Option<ImportedTrip>, StoreError> {
        Ok(None)
    }

    fn insert_trip(&self, _trip: &ImportedTrip) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    fn update_trip(&self, _trip: &ImportedTrip) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    fn link_trip_transaction(
        &self,
        _trip_id: &str,
        _transaction_id: &str,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }
}
