use chrono::Duration;
use std::sync::Arc;
use tracing::info;

use crate::account::scope::parse_list;
use crate::account::service::ttl_hours;
use crate::account::{AccountService, CredentialManager, Token, TokenType};
use crate::api::ApiServer;
use crate::config::MailgateConfig;
use crate::storage;

pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Wire the store, hasher and settings from the configuration.
pub fn build_service(config: &MailgateConfig) -> CliResult<Arc<AccountService>> {
    let store = storage::open(&config.storage)?;
    let credentials = CredentialManager::new(&config.credentials)?;
    Ok(Arc::new(AccountService::new(store, credentials, config.accounts.clone())))
}

pub async fn serve(config: &MailgateConfig) -> CliResult<()> {
    let service = build_service(config)?;
    info!(
        "Serving accounts for @{} (storage: {:?})",
        config.accounts.domain, config.storage.backend
    );
    ApiServer::new(service, &config.server.bind_addr, config.server.port)
        .start()
        .await?;
    Ok(())
}

pub async fn issue_token(
    service: &AccountService,
    owner: &str,
    kind: &str,
    scope: &str,
    lifetime_hours: Option<i64>,
) -> CliResult<Token> {
    let kind: TokenType = kind.parse()?;
    let scope = parse_list(scope)?;
    let ttl = match (lifetime_hours, kind) {
        (Some(hours), _) => ttl_hours(hours)?,
        (None, TokenType::Activate) => service.activation_ttl()?,
        (None, TokenType::Auth) => Duration::hours(24),
    };

    Ok(service.issue_token(kind, owner, ttl, scope).await?)
}

pub async fn repair_labels(service: &AccountService, account: &str) -> CliResult<usize> {
    let created = service.repair_system_labels(account).await?;
    info!("Label repair for {} created {} labels", account, created);
    Ok(created)
}
