//! Reserving a username and creating the pending account

use serde::Deserialize;
use tracing::{info, warn};

use super::credentials::CredentialManager;
use super::normalize::{is_email, Username};
use super::saga::{Saga, SagaStep};
use super::service::AccountService;
use super::store::{ReservationConflicts, StoreError};
use super::types::{Account, AccountView, Address};
use crate::error::AccountError;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 32;

const USERNAME_TAKEN: &str = "This username is taken.";
const ALT_EMAIL_USED: &str = "This email address is used.";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Reservation {
    pub username: String,
    pub alt_email: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl AccountService {
    /// Create an inactive account and its primary address.
    pub async fn reserve(&self, request: &Reservation) -> Result<AccountView, AccountError> {
        let username = Username::parse(&request.username);
        validate(&username, request)?;

        let address_id = username.address(&self.settings.domain);
        let conflicts = self
            .store
            .reservation_conflicts(&address_id, &request.alt_email)
            .await?;
        if conflicts.any() {
            info!("Reservation of {} rejected: naming conflict", address_id);
            return Err(conflict(conflicts));
        }

        let mut account = Account::pending(
            address_id.clone(),
            request.alt_email.clone(),
            self.settings.default_subscription.clone(),
        );
        if let Some(password) = request.password.as_deref() {
            self.credentials.set_password(&mut account, password.as_bytes())?;
        }
        let address = Address {
            id: address_id,
            styled_id: username.styled_address(&self.settings.domain),
            date_created: account.date_created,
            owner: account.id.clone(),
        };

        let mut saga = Saga::new(&account.id, Some(&address.id));

        if let Err(e) = self.store.insert_address(&address).await {
            return Err(insert_failure(e));
        }
        saga.done(SagaStep::InsertAddress);

        if let Err(e) = self.store.insert_account(&account).await {
            warn!("Reservation of {} left an orphan address: {}", address.id, e);
            saga.fail(SagaStep::InsertAccount, &e, self.reconciler.as_ref());
            return Err(insert_failure(e));
        }

        info!("Reserved {} for account {}", address.id, account.id);
        Ok(account.view())
    }
}

fn validate(username: &Username, request: &Reservation) -> Result<(), AccountError> {
    let mut errors = Vec::new();

    if username.len() < USERNAME_MIN {
        errors.push("Username too short. It must be 3-32 characters long.".to_string());
    }
    if username.len() > USERNAME_MAX {
        errors.push("Username too long. It must be 3-32 characters long.".to_string());
    }
    if !username.has_valid_charset() {
        errors.push("Username may only contain letters, digits, dots, dashes and underscores.".to_string());
    }
    if !is_email(&request.alt_email) {
        errors.push("Invalid alternative e-mail format.".to_string());
    }
    if let Some(password) = request.password.as_deref() {
        if CredentialManager::validate(password.as_bytes()).is_err() {
            errors.push("Invalid password format.".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AccountError::validation("Validation failed.", errors))
    }
}

fn conflict(conflicts: ReservationConflicts) -> AccountError {
    let mut errors = Vec::new();
    if conflicts.address_taken {
        errors.push(USERNAME_TAKEN.to_string());
    }
    if conflicts.alt_email_used {
        errors.push(ALT_EMAIL_USED.to_string());
    }
    AccountError::Conflict { errors }
}

/// A lost insert race is a naming conflict, not a server error. An account
/// id collision is not something the caller can fix and stays a store error.
fn insert_failure(err: StoreError) -> AccountError {
    match err {
        StoreError::Duplicate { table: "addresses", .. } => AccountError::Conflict {
            errors: vec![USERNAME_TAKEN.to_string()],
        },
        StoreError::Duplicate { table: "accounts_by_alt_email", .. } => AccountError::Conflict {
            errors: vec![ALT_EMAIL_USED.to_string()],
        },
        other => other.into(),
    }
}
