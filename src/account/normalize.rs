//! Username and address normalization

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL: Regex = Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$"
    )
    .expect("email pattern is valid");
    static ref LOCAL_PART: Regex = Regex::new(r"^[a-z0-9._-]*$").expect("local part pattern is valid");
}

/// Styled and canonical forms of a requested username
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Username {
    /// As the user typed it, minus surrounding whitespace
    pub styled: String,
    /// Lower-cased with dots removed; the part that must be unique
    pub canonical: String,
}

impl Username {
    pub fn parse(input: &str) -> Self {
        let styled = input.trim().to_string();
        let canonical = canonicalize_local(&styled);
        Self { styled, canonical }
    }

    /// Canonical address id under `domain`
    pub fn address(&self, domain: &str) -> String {
        format!("{}@{}", self.canonical, domain)
    }

    /// Display form of the address under `domain`
    pub fn styled_address(&self, domain: &str) -> String {
        format!("{}@{}", self.styled, domain)
    }

    /// Length in characters of the canonical form
    pub fn len(&self) -> usize {
        self.canonical.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    pub fn has_valid_charset(&self) -> bool {
        LOCAL_PART.is_match(&self.canonical)
    }
}

fn canonicalize_local(local: &str) -> String {
    local.to_lowercase().chars().filter(|c| *c != '.').collect()
}

/// Canonical id for a full address: the local part gets the username
/// treatment, the domain is only lower-cased.
pub fn canonical_address(address: &str) -> String {
    let address = address.trim();
    match address.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", canonicalize_local(local), domain.to_lowercase()),
        None => canonicalize_local(address),
    }
}

pub fn is_email(input: &str) -> bool {
    input.len() <= 254 && EMAIL.is_match(input)
}
