//! Permission scopes carried by tokens
//!
//! Scopes form a two-level hierarchy. A coarse scope such as `account` implies
//! every `account:*` sub-scope, but not the reverse. Two scopes sit outside the
//! hierarchy:
//!
//! - `admin` grants access to other users' accounts and is never implied.
//! - `password_grant` is held by tokens obtained with the account password.
//!   The first non-`admin` requirement it meets settles the whole check; an
//!   `admin` requirement listed before that still has to be held.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown scope: {0}")]
pub struct ScopeParseError(pub String);

macro_rules! scopes {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// A capability from the closed scope vocabulary
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Scope {
            $($variant),*
        }

        impl Scope {
            /// Every scope in the vocabulary
            pub const ALL: &'static [Scope] = &[$(Scope::$variant),*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Scope::$variant => $name),*
                }
            }
        }

        impl FromStr for Scope {
            type Err = ScopeParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Scope::$variant),)*
                    other => Err(ScopeParseError(other.to_string())),
                }
            }
        }
    };
}

scopes! {
    PasswordGrant => "password_grant",
    Admin => "admin",

    Account => "account",
    AccountRead => "account:read",
    AccountAddress => "account:address",
    AccountModify => "account:modify",
    AccountDelete => "account:delete",

    Addresses => "addresses",
    AddressesRead => "addresses:read",
    AddressesModify => "addresses:modify",
    AddressesDelete => "addresses:delete",

    Applications => "applications",
    ApplicationsRead => "applications:read",
    ApplicationsModify => "applications:modify",
    ApplicationsDelete => "applications:delete",

    Emails => "emails",
    EmailsSend => "emails:send",
    EmailsRead => "emails:read",
    EmailsModify => "emails:modify",
    EmailsDelete => "emails:delete",

    Keys => "keys",
    KeysRead => "keys:read",

    Labels => "labels",
    LabelsRead => "labels:read",
    LabelsModify => "labels:modify",
    LabelsDelete => "labels:delete",

    Resources => "resources",
    ResourcesRead => "resources:read",
    ResourcesModify => "resources:modify",
    ResourcesDelete => "resources:delete",

    Threads => "threads",
    ThreadsRead => "threads:read",
    ThreadsModify => "threads:modify",
    ThreadsDelete => "threads:delete",

    Tokens => "tokens",
    TokensRead => "tokens:read",
    TokensOauth => "tokens:oauth",
    TokensLogout => "tokens:logout",
    TokensModify => "tokens:modify",
    TokensDelete => "tokens:delete",
}

impl Scope {
    /// The coarse scope that implies this one, e.g. `account` for `account:read`.
    pub fn parent(&self) -> Option<Scope> {
        let (prefix, _) = self.as_str().split_once(':')?;
        prefix.parse().ok()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Scope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse a comma separated scope list, rejecting unknown entries.
pub fn parse_list(input: &str) -> Result<Vec<Scope>, ScopeParseError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

/// Decide whether `held` covers every scope in `required`.
pub fn satisfies(held: &HashSet<Scope>, required: &[Scope]) -> bool {
    let password_grant = held.contains(&Scope::PasswordGrant);

    for r in required {
        if password_grant && *r != Scope::Admin {
            return true;
        }
        if held.contains(r) {
            continue;
        }
        match r.parent() {
            Some(parent) if held.contains(&parent) => continue,
            _ => return false,
        }
    }

    true
}

/// String form of [`satisfies`]. Unknown held scopes are ignored; an unknown
/// required scope can never be satisfied.
pub fn satisfies_str(held: &[&str], required: &[&str]) -> bool {
    let held: HashSet<Scope> = held.iter().filter_map(|s| s.parse().ok()).collect();
    let mut parsed = Vec::with_capacity(required.len());
    for r in required {
        match r.parse() {
            Ok(scope) => parsed.push(scope),
            Err(_) => return false,
        }
    }
    satisfies(&held, &parsed)
}
