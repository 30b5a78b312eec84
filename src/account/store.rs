//! Persistence façade for account records
//!
//! The backing store only guarantees atomicity per document. Inserts of
//! uniquely keyed rows are the race backstop: when two callers insert the same
//! key, exactly one wins and the other gets [`StoreError::Duplicate`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::{Account, Address, Label, Token, TokenType};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("duplicate key in {table}: {key}")]
    Duplicate { table: &'static str, key: String },
    #[error("{table} record not found: {key}")]
    Missing { table: &'static str, key: String },
    #[error("{table} record kept changing: {key}")]
    Contended { table: &'static str, key: String },
    #[error("storage error: {0}")]
    Backend(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of the reservation uniqueness read. Both flags are always filled in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReservationConflicts {
    pub address_taken: bool,
    pub alt_email_used: bool,
}

impl ReservationConflicts {
    pub fn any(&self) -> bool {
        self.address_taken || self.alt_email_used
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, id: &str) -> StoreResult<Option<Account>>;

    async fn get_address(&self, id: &str) -> StoreResult<Option<Address>>;

    async fn addresses_by_owner(&self, owner: &str) -> StoreResult<Vec<Address>>;

    async fn get_token(&self, id: &str) -> StoreResult<Option<Token>>;

    async fn labels_by_owner(&self, owner: &str) -> StoreResult<Vec<Label>>;

    /// Whether `address_id` exists and whether an account already uses `alt_email`.
    async fn reservation_conflicts(&self, address_id: &str, alt_email: &str) -> StoreResult<ReservationConflicts>;

    /// Fetch a token together with its owner, but only when the token exists
    /// and is of `kind`. The owner is not read otherwise.
    async fn token_with_owner(&self, token_id: &str, kind: TokenType) -> StoreResult<Option<(Token, Option<Account>)>>;

    /// Fails with `Duplicate` if the id (table `accounts`) or the alternate
    /// email (table `accounts_by_alt_email`) is taken.
    async fn insert_account(&self, account: &Account) -> StoreResult<()>;

    /// Fails with `Duplicate` if the address id is taken.
    async fn insert_address(&self, address: &Address) -> StoreResult<()>;

    /// Replace a stored account, but only while it still equals `previous`.
    /// Returns `false` when the row changed since `previous` was read. Fails
    /// with `Missing` if it does not exist.
    async fn update_account(&self, previous: &Account, account: &Account) -> StoreResult<bool>;

    /// Mark an inactive account active. Returns `false` if it already was.
    /// Fails with `Missing` if it does not exist.
    async fn activate_account(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool>;

    async fn insert_token(&self, token: &Token) -> StoreResult<()>;

    /// Remove a token. Returns `true` only for the call that removed it.
    async fn delete_token(&self, id: &str) -> StoreResult<bool>;

    async fn insert_labels(&self, labels: &[Label]) -> StoreResult<()>;
}
