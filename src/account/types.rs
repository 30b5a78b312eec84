//! Record types for accounts, addresses, tokens and labels

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids;
use super::scope::Scope;

/// Account identifier - opaque generated string
pub type AccountId = String;

/// Names of the folders every account gets at activation.
pub const SYSTEM_LABELS: [&str; 4] = ["Inbox", "Spam", "Sent", "Starred"];

/// Lifecycle state of an account
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Inactive,
    Active,
}

/// Main account structure
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    pub main_address: String,
    pub alt_email: String,

    /// Argon2id PHC string. Never leaves the crate through `AccountView`.
    pub password: Option<String>,

    pub status: AccountStatus,
    pub subscription: String,
}

impl Account {
    /// Build a fresh, inactive account pointing at `main_address`.
    pub fn pending(main_address: String, alt_email: String, subscription: String) -> Self {
        let now = Utc::now();
        Self {
            id: ids::generate(),
            date_created: now,
            date_modified: now,
            main_address,
            alt_email,
            password: None,
            status: AccountStatus::Inactive,
            subscription,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Public projection of this account
    pub fn view(&self) -> AccountView {
        AccountView::from(self)
    }
}

/// What callers get to see of an account. Carries no credential field, so a
/// password hash cannot be serialized into a response by accident.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AccountView {
    pub id: AccountId,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    pub main_address: String,
    pub alt_email: String,
    pub status: AccountStatus,
    pub subscription: String,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            date_created: account.date_created,
            date_modified: account.date_modified,
            main_address: account.main_address.clone(),
            alt_email: account.alt_email.clone(),
            status: account.status,
            subscription: account.subscription.clone(),
        }
    }
}

/// Account view enriched with the addresses the account owns
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AccountWithAddresses {
    #[serde(flatten)]
    pub account: AccountView,
    pub addresses: Vec<Address>,
}

/// A mailbox identifier. `id` is the canonical address and doubles as the key.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Address {
    pub id: String,
    pub styled_id: String,
    pub date_created: DateTime<Utc>,
    pub owner: AccountId,
}

/// What a token may be used for
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Single-use account activation grant
    Activate,
    /// Bearer credential for the authenticated endpoints
    Auth,
}

impl std::str::FromStr for TokenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activate" => Ok(TokenType::Activate),
            "auth" => Ok(TokenType::Auth),
            other => Err(format!("unknown token type: {}", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Token {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TokenType,
    pub owner: AccountId,
    pub date_created: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
    #[serde(default)]
    pub scope: Vec<Scope>,
}

impl Token {
    pub fn new(kind: TokenType, owner: AccountId, expiry: DateTime<Utc>, scope: Vec<Scope>) -> Self {
        Self {
            id: ids::generate(),
            kind,
            owner,
            date_created: Utc::now(),
            expiry,
            scope,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expiry < Utc::now()
    }
}

/// A mail folder
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Label {
    pub id: String,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    pub owner: AccountId,
    pub name: String,
    pub system: bool,
}

impl Label {
    /// A non-deletable default folder
    pub fn system(owner: &str, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: ids::generate(),
            date_created: now,
            date_modified: now,
            owner: owner.to_string(),
            name: name.to_string(),
            system: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_pending_account_is_inactive() {
        let account = Account::pending(
            "alice@pgp.st".to_string(),
            "alice@example.com".to_string(),
            "beta".to_string(),
        );

        assert_eq!(account.status, AccountStatus::Inactive);
        assert!(account.password.is_none());
        assert_eq!(account.id.len(), ids::ID_LEN);
    }

    #[test]
    fn test_view_has_no_password() {
        let mut account = Account::pending(
            "alice@pgp.st".to_string(),
            "alice@example.com".to_string(),
            "beta".to_string(),
        );
        account.password = Some("$argon2id$secret".to_string());

        let json = serde_json::to_value(account.view()).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["status"], "inactive");
    }

    #[test]
    fn test_token_expiry() {
        let past = Token::new(TokenType::Activate, "a".into(), Utc::now() - Duration::hours(1), vec![]);
        let future = Token::new(TokenType::Activate, "a".into(), Utc::now() + Duration::hours(1), vec![]);

        assert!(past.is_expired());
        assert!(!future.is_expired());
    }

    #[test]
    fn test_token_type_serializes_as_type() {
        let token = Token::new(TokenType::Auth, "a".into(), Utc::now(), vec![Scope::AccountRead]);
        let json = serde_json::to_value(&token).unwrap();

        assert_eq!(json["type"], "auth");
        assert_eq!(json["scope"][0], "account:read");
    }
}
