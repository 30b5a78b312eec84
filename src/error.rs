use std::fmt;
use thiserror::Error;

use crate::account::credentials::CredentialError;
use crate::account::store::StoreError;

/// Why an activation attempt was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationFailure {
    InvalidToken,
    AddressMismatch,
    TokenExpired,
    AlreadyActive,
}

impl fmt::Display for ActivationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ActivationFailure::InvalidToken => "Invalid token",
            ActivationFailure::AddressMismatch => "Address does not match token",
            ActivationFailure::TokenExpired => "Token expired",
            ActivationFailure::AlreadyActive => "Account already active",
        };
        f.write_str(msg)
    }
}

#[derive(Error, Debug)]
pub enum AccountError {
    /// User-correctable input problems, all of them at once
    #[error("{message}")]
    Validation { message: String, errors: Vec<String> },
    #[error("Naming conflict")]
    Conflict { errors: Vec<String> },
    #[error("Activation failed")]
    Activation(Vec<ActivationFailure>),
    #[error("Invalid new password format")]
    InvalidPasswordFormat,
    #[error("No such address exists")]
    UnknownAddress,
    #[error("User does not own that address")]
    AddressNotOwned,
    #[error("Your token has insufficient scope")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid password")]
    InvalidCredential,
    #[error("{0}")]
    Unauthenticated(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Hashing(String),
}

impl AccountError {
    pub fn validation(message: &str, errors: Vec<String>) -> Self {
        AccountError::Validation { message: message.to_string(), errors }
    }

    pub fn activation(failure: ActivationFailure) -> Self {
        AccountError::Activation(vec![failure])
    }

    /// Itemised detail for the response body, if this error carries any
    pub fn details(&self) -> Option<Vec<String>> {
        match self {
            AccountError::Validation { errors, .. } if !errors.is_empty() => Some(errors.clone()),
            AccountError::Conflict { errors } => Some(errors.clone()),
            AccountError::Activation(failures) => Some(failures.iter().map(ToString::to_string).collect()),
            _ => None,
        }
    }
}

impl From<CredentialError> for AccountError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::InvalidFormat => AccountError::InvalidPasswordFormat,
            CredentialError::Hashing(msg) => AccountError::Hashing(msg),
        }
    }
}
