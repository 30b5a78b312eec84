pub mod auth;
pub mod error;
pub mod handlers;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::account::AccountService;

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<AccountService>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/accounts", post(handlers::create_account))
        .route(
            "/accounts/:id",
            get(handlers::get_account).patch(handlers::update_account),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct ApiServer {
    state: ApiState,
    bind_addr: String,
}

impl ApiServer {
    pub fn new(service: Arc<AccountService>, bind_addr: &str, port: u16) -> Self {
        Self {
            state: ApiState { service },
            bind_addr: format!("{}:{}", bind_addr, port),
        }
    }

    pub async fn start(self) -> std::io::Result<()> {
        let app = router(self.state);

        let listener = tokio::net::TcpListener::bind(&self.bind_addr).await?;
        info!("Account API listening on {}", self.bind_addr);
        axum::serve(listener, app).await
    }
}
