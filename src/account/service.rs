//! Entry point for every account workflow

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use super::access::Identity;
use super::credentials::CredentialManager;
use super::saga::{LogReconciler, Reconciler};
use super::scope::Scope;
use super::store::AccountStore;
use super::types::{Label, Token, TokenType, SYSTEM_LABELS};
use crate::config::AccountSettings;
use crate::error::AccountError;

fn lifetime_out_of_range() -> AccountError {
    AccountError::validation("Invalid token lifetime", vec!["Token lifetime is out of range".to_string()])
}

/// A token lifetime of `hours`, rejecting values chrono cannot represent
pub fn ttl_hours(hours: i64) -> Result<Duration, AccountError> {
    Duration::try_hours(hours).ok_or_else(lifetime_out_of_range)
}

/// Account workflows over a shared store handle. Holds no mutable state of
/// its own, so one instance serves every concurrent request.
pub struct AccountService {
    pub(crate) store: Arc<dyn AccountStore>,
    pub(crate) credentials: CredentialManager,
    pub(crate) settings: AccountSettings,
    pub(crate) reconciler: Arc<dyn Reconciler>,
}

impl AccountService {
    pub fn new(store: Arc<dyn AccountStore>, credentials: CredentialManager, settings: AccountSettings) -> Self {
        Self {
            store,
            credentials,
            settings,
            reconciler: Arc::new(LogReconciler),
        }
    }

    pub fn with_reconciler(mut self, reconciler: Arc<dyn Reconciler>) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    pub fn settings(&self) -> &AccountSettings {
        &self.settings
    }

    /// Resolve a bearer token to the caller's identity
    pub async fn authenticate(&self, bearer: &str) -> Result<Identity, AccountError> {
        let invalid = || AccountError::Unauthenticated("Invalid authentication token".to_string());

        let identity = match self.store.token_with_owner(bearer, TokenType::Auth).await? {
            Some((token, Some(account))) if !token.is_expired() => Identity { account, token },
            Some((token, _)) => {
                debug!("rejected auth token for {}: expired or orphaned", token.owner);
                return Err(invalid());
            }
            None => return Err(invalid()),
        };
        Ok(identity)
    }

    /// Create a token for `owner`. Stands in for the external issuer.
    pub async fn issue_token(
        &self,
        kind: TokenType,
        owner: &str,
        ttl: Duration,
        scope: Vec<Scope>,
    ) -> Result<Token, AccountError> {
        if self.store.get_account(owner).await?.is_none() {
            return Err(AccountError::NotFound("Account not found".to_string()));
        }

        let expiry = Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(lifetime_out_of_range)?;
        let token = Token::new(kind, owner.to_string(), expiry, scope);
        self.store.insert_token(&token).await?;
        info!("Issued {:?} token for account {}", kind, owner);
        Ok(token)
    }

    /// Activation token lifetime from the configuration
    pub fn activation_ttl(&self) -> Result<Duration, AccountError> {
        ttl_hours(self.settings.activation_token_ttl_hours)
    }

    /// Insert whichever system labels an active account is missing.
    /// Returns the number of labels created.
    pub async fn repair_system_labels(&self, account_id: &str) -> Result<usize, AccountError> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or_else(|| AccountError::NotFound("Account not found".to_string()))?;

        if !account.is_active() {
            debug!("account {} is not active, no labels to repair", account_id);
            return Ok(0);
        }

        let existing = self.store.labels_by_owner(account_id).await?;
        let missing: Vec<Label> = SYSTEM_LABELS
            .iter()
            .filter(|name| !existing.iter().any(|l| l.system && l.name == **name))
            .map(|name| Label::system(account_id, name))
            .collect();

        if !missing.is_empty() {
            self.store.insert_labels(&missing).await?;
            info!("Repaired {} system labels for account {}", missing.len(), account_id);
        }
        Ok(missing.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::testing::{activated_account, service};

    #[tokio::test]
    async fn test_authenticate() {
        let (service, _) = service();
        let (account, _) = activated_account(&service, "alice", "pw-alice").await;

        let token = service
            .issue_token(TokenType::Auth, &account.id, Duration::hours(1), vec![Scope::AccountRead])
            .await
            .unwrap();
        let identity = service.authenticate(&token.id).await.unwrap();
        assert_eq!(identity.account.id, account.id);
        assert_eq!(identity.token.scope, vec![Scope::AccountRead]);

        assert!(matches!(
            service.authenticate("nope").await,
            Err(AccountError::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_and_activation_tokens_do_not_authenticate() {
        let (service, _) = service();
        let (account, _) = activated_account(&service, "alice", "pw-alice").await;

        let expired = service
            .issue_token(TokenType::Auth, &account.id, Duration::hours(-1), vec![Scope::Admin])
            .await
            .unwrap();
        assert!(service.authenticate(&expired.id).await.is_err());

        let activation = service
            .issue_token(TokenType::Activate, &account.id, Duration::hours(1), vec![])
            .await
            .unwrap();
        assert!(service.authenticate(&activation.id).await.is_err());
    }

    #[tokio::test]
    async fn test_issue_token_requires_owner() {
        let (service, _) = service();
        assert!(matches!(
            service.issue_token(TokenType::Auth, "ghost", Duration::hours(1), vec![]).await,
            Err(AccountError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_out_of_range_lifetime_is_rejected() {
        let (service, store) = service();
        let (account, _) = activated_account(&service, "alice", "pw-alice").await;

        assert!(matches!(ttl_hours(i64::MAX), Err(AccountError::Validation { .. })));
        assert_eq!(ttl_hours(2).unwrap(), Duration::hours(2));

        // Representable as a duration, but not once added to now
        let err = service
            .issue_token(TokenType::Auth, &account.id, Duration::hours(1_000_000_000_000), vec![])
            .await
            .unwrap_err();
        match err {
            AccountError::Validation { message, .. } => assert_eq!(message, "Invalid token lifetime"),
            other => panic!("unexpected {:?}", other),
        }

        let mut settings = service.settings.clone();
        settings.activation_token_ttl_hours = i64::MAX;
        let misconfigured = AccountService::new(store, service.credentials.clone(), settings);
        assert!(misconfigured.activation_ttl().is_err());
    }

    #[tokio::test]
    async fn test_repair_system_labels() {
        let (service, store) = service();
        let (account, _) = activated_account(&service, "alice", "pw-alice").await;

        assert_eq!(service.repair_system_labels(&account.id).await.unwrap(), 0);

        // Simulate a crash that lost part of the label batch
        let fresh = crate::storage::MemoryStore::new();
        let active = store.get_account(&account.id).await.unwrap().unwrap();
        fresh.insert_account(&active).await.unwrap();
        fresh.insert_labels(&[Label::system(&account.id, "Inbox")]).await.unwrap();
        let repaired = AccountService::new(Arc::new(fresh), service.credentials.clone(), service.settings.clone());

        assert_eq!(repaired.repair_system_labels(&account.id).await.unwrap(), 3);
        let labels = repaired.store().labels_by_owner(&account.id).await.unwrap();
        assert_eq!(labels.len(), 4);
    }
}
