//! Shared fixtures for the account and storage tests

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::access::Identity;
use super::activation::Activation;
use super::credentials::CredentialManager;
use super::reservation::Reservation;
use super::saga::{LogReconciler, PartialCommit, Reconciler};
use super::scope::Scope;
use super::service::AccountService;
use super::store::{AccountStore, ReservationConflicts, StoreError, StoreResult};
use super::types::{Account, Address, Label, Token, TokenType};
use crate::config::{AccountSettings, CredentialConfig};
use crate::storage::MemoryStore;

/// Argon2 parameters small enough to keep the test suite fast
pub(crate) fn cheap_credentials() -> CredentialManager {
    CredentialManager::new(&CredentialConfig {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}

pub(crate) fn pending_account(name: &str) -> Account {
    Account::pending(
        format!("{}@pgp.st", name),
        format!("{}@example.com", name),
        "beta".to_string(),
    )
}

pub(crate) fn service_with<S: AccountStore + 'static>(store: Arc<S>) -> AccountService {
    AccountService::new(store, cheap_credentials(), AccountSettings::default())
}

pub(crate) fn service() -> (AccountService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (service_with(store.clone()), store)
}

/// Reserve and activate `username`, returning the stored account.
pub(crate) async fn activated_account(service: &AccountService, username: &str, password: &str) -> (Account, Vec<Label>) {
    let view = service
        .reserve(&Reservation {
            username: username.to_string(),
            alt_email: format!("{}@example.com", username),
            password: Some(password.to_string()),
        })
        .await
        .unwrap();
    let token = service
        .issue_token(TokenType::Activate, &view.id, Duration::hours(1), vec![])
        .await
        .unwrap();
    service
        .activate(&Activation {
            token: token.id,
            address: view.main_address.clone(),
        })
        .await
        .unwrap();

    let account = service.store().get_account(&view.id).await.unwrap().unwrap();
    let labels = service.store().labels_by_owner(&view.id).await.unwrap();
    (account, labels)
}

/// Authenticate as `account_id` with a freshly issued auth token.
pub(crate) async fn identity(service: &AccountService, account_id: &str, scope: Vec<Scope>) -> Identity {
    let token = service
        .issue_token(TokenType::Auth, account_id, Duration::hours(1), scope)
        .await
        .unwrap();
    service.authenticate(&token.id).await.unwrap()
}

/// Keeps every partial commit it is given
#[derive(Debug, Default)]
pub(crate) struct RecordingReconciler {
    records: Mutex<Vec<PartialCommit>>,
}

impl RecordingReconciler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn records(&self) -> Vec<PartialCommit> {
        self.records.lock().unwrap().clone()
    }
}

impl Reconciler for RecordingReconciler {
    fn partial_commit(&self, record: PartialCommit) {
        LogReconciler.partial_commit(record.clone());
        self.records.lock().unwrap().push(record);
    }
}

/// A store operation that should fail on its next call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum FailPoint {
    InsertAddressDuplicate,
    InsertAccount,
    InsertAccountDuplicate,
    InsertLabels,
    /// Another activation lands just before ours
    ActivateConcurrently,
    /// An admin resets the password just before our update is written
    ResetPasswordConcurrently,
}

/// Memory store with one-shot injected failures
pub(crate) struct FlakyStore {
    pub inner: MemoryStore,
    pub reconciler: Arc<RecordingReconciler>,
    failpoints: Mutex<HashSet<FailPoint>>,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            reconciler: Arc::new(RecordingReconciler::new()),
            failpoints: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) fn fail(&self, point: FailPoint) {
        self.failpoints.lock().unwrap().insert(point);
    }

    fn trip(&self, point: FailPoint) -> bool {
        self.failpoints.lock().unwrap().remove(&point)
    }
}

pub(crate) fn flaky_service(store: &Arc<FlakyStore>) -> AccountService {
    service_with(store.clone()).with_reconciler(store.reconciler.clone())
}

/// The password written by `FailPoint::ResetPasswordConcurrently`
pub(crate) const RESET_PASSWORD: &str = "reset by admin";

fn injected() -> StoreError {
    StoreError::Backend("injected failure".to_string())
}

#[async_trait]
impl AccountStore for FlakyStore {
    async fn get_account(&self, id: &str) -> StoreResult<Option<Account>> {
        self.inner.get_account(id).await
    }

    async fn get_address(&self, id: &str) -> StoreResult<Option<Address>> {
        self.inner.get_address(id).await
    }

    async fn addresses_by_owner(&self, owner: &str) -> StoreResult<Vec<Address>> {
        self.inner.addresses_by_owner(owner).await
    }

    async fn get_token(&self, id: &str) -> StoreResult<Option<Token>> {
        self.inner.get_token(id).await
    }

    async fn labels_by_owner(&self, owner: &str) -> StoreResult<Vec<Label>> {
        self.inner.labels_by_owner(owner).await
    }

    async fn reservation_conflicts(&self, address_id: &str, alt_email: &str) -> StoreResult<ReservationConflicts> {
        self.inner.reservation_conflicts(address_id, alt_email).await
    }

    async fn token_with_owner(&self, token_id: &str, kind: TokenType) -> StoreResult<Option<(Token, Option<Account>)>> {
        self.inner.token_with_owner(token_id, kind).await
    }

    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        if self.trip(FailPoint::InsertAccount) {
            return Err(injected());
        }
        if self.trip(FailPoint::InsertAccountDuplicate) {
            return Err(StoreError::Duplicate {
                table: "accounts_by_alt_email",
                key: account.alt_email.clone(),
            });
        }
        self.inner.insert_account(account).await
    }

    async fn insert_address(&self, address: &Address) -> StoreResult<()> {
        if self.trip(FailPoint::InsertAddressDuplicate) {
            return Err(StoreError::Duplicate {
                table: "addresses",
                key: address.id.clone(),
            });
        }
        self.inner.insert_address(address).await
    }

    async fn update_account(&self, previous: &Account, account: &Account) -> StoreResult<bool> {
        if self.trip(FailPoint::ResetPasswordConcurrently) {
            let mut reset = previous.clone();
            cheap_credentials()
                .set_password(&mut reset, RESET_PASSWORD.as_bytes())
                .unwrap();
            self.inner.update_account(previous, &reset).await?;
        }
        self.inner.update_account(previous, account).await
    }

    async fn activate_account(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        if self.trip(FailPoint::ActivateConcurrently) {
            self.inner.activate_account(id, at).await?;
        }
        self.inner.activate_account(id, at).await
    }

    async fn insert_token(&self, token: &Token) -> StoreResult<()> {
        self.inner.insert_token(token).await
    }

    async fn delete_token(&self, id: &str) -> StoreResult<bool> {
        self.inner.delete_token(id).await
    }

    async fn insert_labels(&self, labels: &[Label]) -> StoreResult<()> {
        if self.trip(FailPoint::InsertLabels) {
            return Err(injected());
        }
        self.inner.insert_labels(labels).await
    }
}
