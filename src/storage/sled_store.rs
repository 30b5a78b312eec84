use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sled::{Batch, Db, Tree};
use std::path::Path;
use tracing::{debug, info};

use crate::account::store::{AccountStore, ReservationConflicts, StoreError, StoreResult};
use crate::account::types::{Account, AccountStatus, Address, Label, Token, TokenType};

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Account store on an embedded sled database.
///
/// Every record type lives in its own tree, keyed by id. Secondary indexes
/// are separate trees keyed by `<indexed value>\0<id>` (or just the value for
/// unique indexes), so a prefix scan yields every row for an owner.
pub struct SledStore {
    db: Db,
    accounts: Tree,
    accounts_by_alt_email: Tree,
    addresses: Tree,
    addresses_by_owner: Tree,
    tokens: Tree,
    labels: Tree,
    labels_by_owner: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        info!("Persistence: opening sled DB at '{}'", path.as_ref().display());
        Self::from_db(sled::open(path)?)
    }

    /// A throwaway database, removed when dropped
    pub fn temporary() -> StoreResult<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        Ok(Self {
            accounts: db.open_tree("accounts")?,
            accounts_by_alt_email: db.open_tree("accounts_by_alt_email")?,
            addresses: db.open_tree("addresses")?,
            addresses_by_owner: db.open_tree("addresses_by_owner")?,
            tokens: db.open_tree("tokens")?,
            labels: db.open_tree("labels")?,
            labels_by_owner: db.open_tree("labels_by_owner")?,
            db,
        })
    }

    pub async fn flush(&self) -> StoreResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

// Generic helpers

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn get<T: DeserializeOwned>(tree: &Tree, key: &str) -> StoreResult<Option<T>> {
    match tree.get(key.as_bytes())? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

/// Write `value` under `key` only if the key is vacant.
fn insert_unique(tree: &Tree, table: &'static str, key: &str, value: Vec<u8>) -> StoreResult<()> {
    match tree.compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(value))? {
        Ok(()) => Ok(()),
        Err(_) => Err(StoreError::Duplicate {
            table,
            key: key.to_string(),
        }),
    }
}

/// Read-modify-write a single document, retrying if it changed underneath us.
/// `f` returns `false` to leave the document alone, which is passed back.
fn modify<T, F>(tree: &Tree, table: &'static str, key: &str, mut f: F) -> StoreResult<bool>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(&mut T) -> bool,
{
    loop {
        let current = tree.get(key.as_bytes())?.ok_or_else(|| StoreError::Missing {
            table,
            key: key.to_string(),
        })?;
        let mut value: T = decode(&current)?;
        if !f(&mut value) {
            return Ok(false);
        }

        match tree.compare_and_swap(key.as_bytes(), Some(&current), Some(encode(&value)?))? {
            Ok(()) => return Ok(true),
            Err(_) => debug!("{} {} changed during update, retrying", table, key),
        }
    }
}

fn index_key(owner: &str, id: &str) -> String {
    format!("{}\0{}", owner, id)
}

/// Load every row of `data` referenced by `owner` in `index`.
fn scan_owned<T: DeserializeOwned>(index: &Tree, data: &Tree, owner: &str) -> StoreResult<Vec<T>> {
    let prefix = format!("{}\0", owner);
    let mut rows = Vec::new();
    for entry in index.scan_prefix(prefix.as_bytes()) {
        let (key, _) = entry?;
        let id = &key[prefix.len()..];
        // Index rows may outlive a failed data write; skip them.
        if let Some(bytes) = data.get(id)? {
            rows.push(decode(&bytes)?);
        }
    }
    Ok(rows)
}

#[async_trait]
impl AccountStore for SledStore {
    async fn get_account(&self, id: &str) -> StoreResult<Option<Account>> {
        get(&self.accounts, id)
    }

    async fn get_address(&self, id: &str) -> StoreResult<Option<Address>> {
        get(&self.addresses, id)
    }

    async fn addresses_by_owner(&self, owner: &str) -> StoreResult<Vec<Address>> {
        scan_owned(&self.addresses_by_owner, &self.addresses, owner)
    }

    async fn get_token(&self, id: &str) -> StoreResult<Option<Token>> {
        get(&self.tokens, id)
    }

    async fn labels_by_owner(&self, owner: &str) -> StoreResult<Vec<Label>> {
        scan_owned(&self.labels_by_owner, &self.labels, owner)
    }

    async fn reservation_conflicts(&self, address_id: &str, alt_email: &str) -> StoreResult<ReservationConflicts> {
        Ok(ReservationConflicts {
            address_taken: self.addresses.contains_key(address_id.as_bytes())?,
            alt_email_used: self.accounts_by_alt_email.contains_key(alt_email.as_bytes())?,
        })
    }

    async fn token_with_owner(&self, token_id: &str, kind: TokenType) -> StoreResult<Option<(Token, Option<Account>)>> {
        match get::<Token>(&self.tokens, token_id)? {
            Some(token) if token.kind == kind => {
                let owner = get(&self.accounts, &token.owner)?;
                Ok(Some((token, owner)))
            }
            _ => Ok(None),
        }
    }

    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        insert_unique(
            &self.accounts_by_alt_email,
            "accounts_by_alt_email",
            &account.alt_email,
            account.id.as_bytes().to_vec(),
        )?;

        if let Err(e) = insert_unique(&self.accounts, "accounts", &account.id, encode(account)?) {
            self.accounts_by_alt_email.remove(account.alt_email.as_bytes())?;
            return Err(e);
        }
        Ok(())
    }

    async fn insert_address(&self, address: &Address) -> StoreResult<()> {
        insert_unique(&self.addresses, "addresses", &address.id, encode(address)?)?;
        self.addresses_by_owner
            .insert(index_key(&address.owner, &address.id).as_bytes(), &[] as &[u8])?;
        Ok(())
    }

    async fn update_account(&self, previous: &Account, account: &Account) -> StoreResult<bool> {
        modify(&self.accounts, "accounts", &account.id, |stored: &mut Account| {
            if stored != previous {
                return false;
            }
            *stored = account.clone();
            true
        })
    }

    async fn activate_account(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        modify(&self.accounts, "accounts", id, |account: &mut Account| {
            if account.status == AccountStatus::Active {
                return false;
            }
            account.status = AccountStatus::Active;
            account.date_modified = at;
            true
        })
    }

    async fn insert_token(&self, token: &Token) -> StoreResult<()> {
        insert_unique(&self.tokens, "tokens", &token.id, encode(token)?)
    }

    async fn delete_token(&self, id: &str) -> StoreResult<bool> {
        Ok(self.tokens.remove(id.as_bytes())?.is_some())
    }

    async fn insert_labels(&self, labels: &[Label]) -> StoreResult<()> {
        let mut rows = Batch::default();
        let mut index = Batch::default();
        for label in labels {
            rows.insert(label.id.as_bytes(), encode(label)?);
            index.insert(index_key(&label.owner, &label.id).as_bytes(), &[] as &[u8]);
        }
        self.labels.apply_batch(rows)?;
        self.labels_by_owner.apply_batch(index)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::testing::pending_account;
    use chrono::Duration;

    fn address_for(account: &Account) -> Address {
        Address {
            id: account.main_address.clone(),
            styled_id: account.main_address.clone(),
            date_created: Utc::now(),
            owner: account.id.clone(),
        }
    }

    #[tokio::test]
    async fn test_account_round_trip() {
        let store = SledStore::temporary().unwrap();
        let account = pending_account("alice");

        store.insert_account(&account).await.unwrap();
        assert_eq!(store.get_account(&account.id).await.unwrap(), Some(account.clone()));
        assert!(store.get_account("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_alt_email() {
        let store = SledStore::temporary().unwrap();
        let first = pending_account("alice");
        let mut second = pending_account("alice2");
        second.alt_email = first.alt_email.clone();

        store.insert_account(&first).await.unwrap();
        let err = store.insert_account(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { table: "accounts_by_alt_email", .. }));
        assert!(store.get_account(&second.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_address_and_owner_index() {
        let store = SledStore::temporary().unwrap();
        let account = pending_account("alice");
        let address = address_for(&account);

        store.insert_address(&address).await.unwrap();
        assert!(matches!(
            store.insert_address(&address).await,
            Err(StoreError::Duplicate { table: "addresses", .. })
        ));

        let owned = store.addresses_by_owner(&account.id).await.unwrap();
        assert_eq!(owned, vec![address]);
        assert!(store.addresses_by_owner("someone-else").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reservation_conflicts() {
        let store = SledStore::temporary().unwrap();
        let account = pending_account("alice");
        store.insert_address(&address_for(&account)).await.unwrap();
        store.insert_account(&account).await.unwrap();

        let both = store
            .reservation_conflicts(&account.main_address, &account.alt_email)
            .await
            .unwrap();
        assert!(both.address_taken && both.alt_email_used);

        let none = store
            .reservation_conflicts("bob@pgp.st", "bob@example.com")
            .await
            .unwrap();
        assert!(!none.any());
    }

    #[tokio::test]
    async fn test_token_branch_read_and_delete() {
        let store = SledStore::temporary().unwrap();
        let account = pending_account("alice");
        store.insert_account(&account).await.unwrap();

        let token = Token::new(TokenType::Activate, account.id.clone(), Utc::now() + Duration::hours(1), vec![]);
        store.insert_token(&token).await.unwrap();

        let (found, owner) = store
            .token_with_owner(&token.id, TokenType::Activate)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, token);
        assert_eq!(owner, Some(account));

        assert!(store.token_with_owner(&token.id, TokenType::Auth).await.unwrap().is_none());

        assert!(store.delete_token(&token.id).await.unwrap());
        assert!(!store.delete_token(&token.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_activate_and_update() {
        let store = SledStore::temporary().unwrap();
        let mut account = pending_account("alice");
        store.insert_account(&account).await.unwrap();

        let at = Utc::now();
        assert!(store.activate_account(&account.id, at).await.unwrap());
        let stored = store.get_account(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AccountStatus::Active);
        assert_eq!(stored.date_modified, at);

        // Only the first activation flips the status
        assert!(!store.activate_account(&account.id, Utc::now()).await.unwrap());
        assert_eq!(store.get_account(&account.id).await.unwrap().unwrap().date_modified, at);

        account.main_address = "other@pgp.st".to_string();
        assert!(store.update_account(&stored, &account).await.unwrap());
        let updated = store.get_account(&account.id).await.unwrap().unwrap();
        assert_eq!(updated.main_address, "other@pgp.st");

        // A write based on the older snapshot is refused
        let mut late = stored.clone();
        late.alt_email = "late@example.com".to_string();
        assert!(!store.update_account(&stored, &late).await.unwrap());
        assert_eq!(store.get_account(&account.id).await.unwrap().unwrap(), updated);

        assert!(matches!(
            store.activate_account("missing", at).await,
            Err(StoreError::Missing { .. })
        ));
    }

    #[tokio::test]
    async fn test_label_batch() {
        let store = SledStore::temporary().unwrap();
        let labels = vec![Label::system("owner", "Inbox"), Label::system("owner", "Spam")];

        store.insert_labels(&labels).await.unwrap();
        let mut stored = store.labels_by_owner("owner").await.unwrap();
        stored.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].name, "Inbox");
        assert!(store.labels_by_owner("owner2").await.unwrap().is_empty());
    }
}
