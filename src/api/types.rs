// Request and response bodies for the accounts API
use serde::{Deserialize, Serialize};

use crate::account::{Activation, Reservation};

/// Body of `POST /accounts`. Which fields matter depends on `action`.
#[derive(Deserialize, Debug, Default)]
pub struct CreateAccountRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub alt_email: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub address: String,
}

impl CreateAccountRequest {
    pub fn reservation(self) -> Reservation {
        Reservation {
            username: self.username,
            alt_email: self.alt_email,
            password: self.password,
        }
    }

    pub fn activation(self) -> Activation {
        Activation {
            token: self.token,
            address: self.address,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ActivationResponse {
    pub id: String,
    pub message: String,
}

/// Envelope for every error response. `code` is always 0.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>, errors: Option<Vec<String>>) -> Self {
        Self {
            code: 0,
            message: message.into(),
            errors,
        }
    }
}
