use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::account::store::{AccountStore, ReservationConflicts, StoreError, StoreResult};
use crate::account::types::{Account, AccountStatus, Address, Label, Token, TokenType};

#[derive(Default)]
struct Tables {
    accounts: HashMap<String, Account>,
    addresses: HashMap<String, Address>,
    tokens: HashMap<String, Token>,
    labels: HashMap<String, Label>,
}

/// Non-persistent account store. Each call takes the table lock once, so every
/// operation is atomic on its own, just like a single sled write.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the table lock, reporting poison as a backend failure
    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|e| {
            tracing::error!("Mutex poisoned: {}", e);
            StoreError::Backend("memory store lock poisoned".to_string())
        })
    }
}

fn missing(table: &'static str, key: &str) -> StoreError {
    StoreError::Missing {
        table,
        key: key.to_string(),
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get_account(&self, id: &str) -> StoreResult<Option<Account>> {
        Ok(self.tables()?.accounts.get(id).cloned())
    }

    async fn get_address(&self, id: &str) -> StoreResult<Option<Address>> {
        Ok(self.tables()?.addresses.get(id).cloned())
    }

    async fn addresses_by_owner(&self, owner: &str) -> StoreResult<Vec<Address>> {
        let tables = self.tables()?;
        let mut owned: Vec<Address> = tables
            .addresses
            .values()
            .filter(|a| a.owner == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(owned)
    }

    async fn get_token(&self, id: &str) -> StoreResult<Option<Token>> {
        Ok(self.tables()?.tokens.get(id).cloned())
    }

    async fn labels_by_owner(&self, owner: &str) -> StoreResult<Vec<Label>> {
        let tables = self.tables()?;
        Ok(tables.labels.values().filter(|l| l.owner == owner).cloned().collect())
    }

    async fn reservation_conflicts(&self, address_id: &str, alt_email: &str) -> StoreResult<ReservationConflicts> {
        let tables = self.tables()?;
        Ok(ReservationConflicts {
            address_taken: tables.addresses.contains_key(address_id),
            alt_email_used: tables.accounts.values().any(|a| a.alt_email == alt_email),
        })
    }

    async fn token_with_owner(&self, token_id: &str, kind: TokenType) -> StoreResult<Option<(Token, Option<Account>)>> {
        let tables = self.tables()?;
        match tables.tokens.get(token_id) {
            Some(token) if token.kind == kind => {
                let owner = tables.accounts.get(&token.owner).cloned();
                Ok(Some((token.clone(), owner)))
            }
            _ => Ok(None),
        }
    }

    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        let mut tables = self.tables()?;
        if tables.accounts.contains_key(&account.id) {
            return Err(StoreError::Duplicate {
                table: "accounts",
                key: account.id.clone(),
            });
        }
        if tables.accounts.values().any(|a| a.alt_email == account.alt_email) {
            return Err(StoreError::Duplicate {
                table: "accounts_by_alt_email",
                key: account.alt_email.clone(),
            });
        }
        tables.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn insert_address(&self, address: &Address) -> StoreResult<()> {
        let mut tables = self.tables()?;
        if tables.addresses.contains_key(&address.id) {
            return Err(StoreError::Duplicate {
                table: "addresses",
                key: address.id.clone(),
            });
        }
        tables.addresses.insert(address.id.clone(), address.clone());
        Ok(())
    }

    async fn update_account(&self, previous: &Account, account: &Account) -> StoreResult<bool> {
        let mut tables = self.tables()?;
        let stored = tables
            .accounts
            .get_mut(&account.id)
            .ok_or_else(|| missing("accounts", &account.id))?;
        if stored != previous {
            return Ok(false);
        }
        *stored = account.clone();
        Ok(true)
    }

    async fn activate_account(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.tables()?;
        let account = tables.accounts.get_mut(id).ok_or_else(|| missing("accounts", id))?;
        if account.status == AccountStatus::Active {
            return Ok(false);
        }
        account.status = AccountStatus::Active;
        account.date_modified = at;
        Ok(true)
    }

    async fn insert_token(&self, token: &Token) -> StoreResult<()> {
        let mut tables = self.tables()?;
        if tables.tokens.contains_key(&token.id) {
            return Err(StoreError::Duplicate {
                table: "tokens",
                key: token.id.clone(),
            });
        }
        tables.tokens.insert(token.id.clone(), token.clone());
        Ok(())
    }

    async fn delete_token(&self, id: &str) -> StoreResult<bool> {
        Ok(self.tables()?.tokens.remove(id).is_some())
    }

    async fn insert_labels(&self, labels: &[Label]) -> StoreResult<()> {
        let mut tables = self.tables()?;
        for label in labels {
            tables.labels.insert(label.id.clone(), label.clone());
        }
        Ok(())
    }
}
