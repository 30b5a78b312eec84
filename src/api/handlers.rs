use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::debug;

use super::types::{ActivationResponse, CreateAccountRequest};
use super::ApiState;
use crate::account::{AccountUpdate, AccountView, AccountWithAddresses, Identity, Target};
use crate::error::AccountError;

/// `POST /accounts`: dispatch on `action`.
pub async fn create_account(
    State(state): State<ApiState>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<Response, AccountError> {
    let Json(req) = payload?;
    debug!("Account request: action={}", req.action);

    match req.action.as_str() {
        "reserve" => {
            let view = state.service.reserve(&req.reservation()).await?;
            Ok((StatusCode::CREATED, Json(view)).into_response())
        }
        "activate" => {
            let id = state.service.activate(&req.activation()).await?;
            let body = ActivationResponse {
                id,
                message: "Activation successful".to_string(),
            };
            Ok((StatusCode::CREATED, Json(body)).into_response())
        }
        _ => Err(AccountError::validation("Invalid action", vec![])),
    }
}

/// `GET /accounts/:id`
pub async fn get_account(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    identity: Identity,
) -> Result<Json<AccountWithAddresses>, AccountError> {
    let target = Target::resolve(&id, &identity.account);
    let account = state.service.read_account(&identity, &target).await?;
    Ok(Json(account))
}

/// `PATCH /accounts/:id`
pub async fn update_account(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    identity: Identity,
    payload: Result<Json<AccountUpdate>, JsonRejection>,
) -> Result<Json<AccountView>, AccountError> {
    let Json(update) = payload?;
    let target = Target::resolve(&id, &identity.account);
    let account = state.service.update_account(&identity, &target, &update).await?;
    Ok(Json(account))
}
