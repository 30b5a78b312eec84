//! Turning a reserved account into an active one
//!
//! The activation token is deleted as soon as it has been matched to its
//! account, before expiry and status are looked at. A token that fails those
//! later checks is gone too, and the user has to request a new one.

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use super::normalize::{canonical_address, is_email};
use super::saga::{Saga, SagaStep};
use super::service::AccountService;
use super::types::{AccountId, AccountStatus, Label, TokenType, SYSTEM_LABELS};
use crate::error::{AccountError, ActivationFailure};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Activation {
    pub token: String,
    pub address: String,
}

impl AccountService {
    /// Consume an activation token and activate its account.
    pub async fn activate(&self, request: &Activation) -> Result<AccountId, AccountError> {
        let mut errors = Vec::new();
        if !is_email(&request.address) {
            errors.push("Invalid address format".to_string());
        }
        if request.token.is_empty() {
            errors.push("Token is missing".to_string());
        }
        if !errors.is_empty() {
            return Err(AccountError::validation("Validation failed", errors));
        }

        let target = canonical_address(&request.address);

        let (token, account) = match self
            .store
            .token_with_owner(&request.token, TokenType::Activate)
            .await?
        {
            Some((token, Some(account))) => (token, account),
            _ => {
                info!("Activation of {} rejected: invalid token", target);
                return Err(AccountError::activation(ActivationFailure::InvalidToken));
            }
        };

        if account.main_address != target {
            info!("Activation of {} rejected: token belongs to another address", target);
            return Err(AccountError::activation(ActivationFailure::AddressMismatch));
        }

        // Whoever removes the token owns this activation attempt.
        if !self.store.delete_token(&token.id).await? {
            info!("Activation of {} rejected: token already consumed", target);
            return Err(AccountError::activation(ActivationFailure::InvalidToken));
        }

        let mut failures = Vec::new();
        if token.is_expired() {
            failures.push(ActivationFailure::TokenExpired);
        }
        if account.status != AccountStatus::Inactive {
            failures.push(ActivationFailure::AlreadyActive);
        }
        if !failures.is_empty() {
            info!("Activation of {} rejected after consuming token: {:?}", target, failures);
            return Err(AccountError::Activation(failures));
        }

        let mut saga = Saga::new(&account.id, Some(&account.main_address));

        // Two tokens for the same account can both get this far.
        if !self.store.activate_account(&account.id, Utc::now()).await? {
            info!("Activation of {} rejected: activated concurrently", target);
            return Err(AccountError::activation(ActivationFailure::AlreadyActive));
        }
        saga.done(SagaStep::ActivateAccount);

        let labels: Vec<Label> = SYSTEM_LABELS
            .iter()
            .map(|name| Label::system(&account.id, name))
            .collect();
        if let Err(e) = self.store.insert_labels(&labels).await {
            warn!("Account {} activated without its system labels: {}", account.id, e);
            saga.fail(SagaStep::ProvisionLabels, &e, self.reconciler.as_ref());
            return Err(e.into());
        }

        info!("Activated account {} ({})", account.id, account.main_address);
        Ok(account.id)
    }
}
