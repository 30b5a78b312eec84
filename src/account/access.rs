//! Scope-gated account reads and updates

use chrono::Utc;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::credentials::CredentialManager;
use super::normalize::canonical_address;
use super::scope::{satisfies, Scope};
use super::service::AccountService;
use super::store::StoreError;
use super::types::{Account, AccountView, AccountWithAddresses, Token};
use crate::error::AccountError;

/// An authenticated caller: the token presented and the account it belongs to
#[derive(Debug, Clone)]
pub struct Identity {
    pub account: Account,
    pub token: Token,
}

impl Identity {
    pub fn scopes(&self) -> HashSet<Scope> {
        self.token.scope.iter().copied().collect()
    }

    pub fn require(&self, required: &[Scope]) -> Result<(), AccountError> {
        if satisfies(&self.scopes(), required) {
            Ok(())
        } else {
            warn!(
                "Account {} denied: token lacks {:?}",
                self.account.id,
                required.iter().map(Scope::as_str).collect::<Vec<_>>()
            );
            Err(AccountError::Forbidden)
        }
    }
}

/// Whose account a request is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Own,
    Other(String),
}

impl Target {
    /// `me` and the caller's own id both mean the caller.
    pub fn resolve(id: &str, caller: &Account) -> Self {
        if id == "me" || id == caller.id {
            Target::Own
        } else {
            Target::Other(id.to_string())
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountUpdate {
    #[serde(default)]
    pub main_address: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
    #[serde(default)]
    pub old_password: Option<String>,
}

/// How often an update is retried when the row keeps changing
const UPDATE_ATTEMPTS: usize = 3;

fn not_found() -> AccountError {
    AccountError::NotFound("Account not found".to_string())
}

impl AccountService {
    pub async fn read_account(&self, identity: &Identity, target: &Target) -> Result<AccountWithAddresses, AccountError> {
        let account = match target {
            Target::Own => {
                identity.require(&[Scope::AccountRead])?;
                identity.account.clone()
            }
            Target::Other(id) => {
                identity.require(&[Scope::Admin])?;
                self.store.get_account(id).await?.ok_or_else(not_found)?
            }
        };

        let addresses = self.store.addresses_by_owner(&account.id).await?;
        Ok(AccountWithAddresses {
            account: account.view(),
            addresses,
        })
    }

    /// Apply a password and/or main address change. Nothing is written
    /// unless every check passes.
    ///
    /// Checks run against the stored row, and the write only lands if that
    /// row is unchanged. Otherwise the row is read again and checked again.
    pub async fn update_account(
        &self,
        identity: &Identity,
        target: &Target,
        update: &AccountUpdate,
    ) -> Result<AccountView, AccountError> {
        let id = match target {
            Target::Own => {
                identity.require(&[Scope::AccountModify])?;
                identity.account.id.as_str()
            }
            Target::Other(id) => {
                identity.require(&[Scope::Admin])?;
                id.as_str()
            }
        };

        for _ in 0..UPDATE_ATTEMPTS {
            let current = self.store.get_account(id).await?.ok_or_else(not_found)?;
            let account = self.apply_update(identity, target, &current, update).await?;

            if self.store.update_account(&current, &account).await? {
                info!("Updated account {} (by {})", account.id, identity.account.id);
                return Ok(account.view());
            }
            debug!("Account {} changed during update, checking again", id);
        }

        warn!("Account {} update gave up after {} attempts", id, UPDATE_ATTEMPTS);
        Err(StoreError::Contended {
            table: "accounts",
            key: id.to_string(),
        }
        .into())
    }

    /// Check `update` against `current` and build the row to write.
    async fn apply_update(
        &self,
        identity: &Identity,
        target: &Target,
        current: &Account,
        update: &AccountUpdate,
    ) -> Result<Account, AccountError> {
        if *target == Target::Own {
            let old = update.old_password.as_deref().unwrap_or_default();
            if !self.credentials.verify_password(current, old.as_bytes())? {
                info!("Account {} update rejected: bad password", current.id);
                return Err(AccountError::InvalidCredential);
            }
        }

        let new_password = update
            .new_password
            .as_deref()
            .filter(|p| !p.is_empty());
        if let Some(password) = new_password {
            CredentialManager::validate(password.as_bytes())?;
        }

        let new_address = match update.main_address.as_deref().filter(|a| !a.is_empty()) {
            Some(requested) => {
                let address = self
                    .store
                    .get_address(&canonical_address(requested))
                    .await?
                    .ok_or(AccountError::UnknownAddress)?;
                if address.owner != current.id {
                    warn!(
                        "Account {} tried to take address {} owned by {} (caller {})",
                        current.id, address.id, address.owner, identity.account.id
                    );
                    return Err(AccountError::AddressNotOwned);
                }
                Some(address.id)
            }
            None => None,
        };

        let mut account = current.clone();
        if let Some(password) = new_password {
            self.credentials.set_password(&mut account, password.as_bytes())?;
        }
        if let Some(address) = new_address {
            account.main_address = address;
        }
        account.date_modified = Utc::now();
        Ok(account)
    }
}
