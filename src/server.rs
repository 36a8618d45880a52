//! HTTP surface for the form platform
//!
//! `POST /attendance_callbackurl/manual-punching` takes the envelope JSON and
//! answers `200 text/plain` with the encrypted reply. Envelope failures answer
//! `421`, which tells the platform to refresh the service's public key; the
//! body never says which check failed.

use crate::error::Error;
use crate::exchange::ExchangeOrchestrator;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use log::error;
use std::sync::Arc;

/// Path the platform posts form submissions to
pub const EXCHANGE_PATH: &str = "/attendance_callbackurl/manual-punching";

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    orchestrator: Arc<ExchangeOrchestrator>,
}

/// Builds the service router
pub fn router(orchestrator: Arc<ExchangeOrchestrator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(EXCHANGE_PATH, post(exchange))
        .with_state(AppState { orchestrator })
}

async fn health() -> &'static str {
    "ok"
}

async fn exchange(State(state): State<AppState>, body: Bytes) -> Response {
    match state.orchestrator.handle(&body).await {
        Ok(encrypted) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            encrypted,
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_response(error: &Error) -> Response {
    if error.is_transport_level() {
        return (StatusCode::MISDIRECTED_REQUEST, "Unable to decrypt request").into_response();
    }

    error!("exchange failed without a reply: {}", error);
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
}
