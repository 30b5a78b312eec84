use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use super::types::ErrorBody;
use crate::error::AccountError;

impl AccountError {
    pub fn status(&self) -> StatusCode {
        match self {
            AccountError::Validation { .. }
            | AccountError::Conflict { .. }
            | AccountError::Activation(_)
            | AccountError::InvalidPasswordFormat
            | AccountError::UnknownAddress
            | AccountError::AddressNotOwned => StatusCode::UNPROCESSABLE_ENTITY,
            AccountError::Forbidden => StatusCode::FORBIDDEN,
            AccountError::NotFound(_) => StatusCode::NOT_FOUND,
            AccountError::InvalidCredential | AccountError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AccountError::Store(_) | AccountError::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if status.is_server_error() {
            error!("Request failed: {}", self);
            ErrorBody::new("Internal server error", None)
        } else {
            ErrorBody::new(self.to_string(), self.details())
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AccountError {
    fn from(rejection: JsonRejection) -> Self {
        AccountError::validation("Invalid request body", vec![rejection.body_text()])
    }
}
