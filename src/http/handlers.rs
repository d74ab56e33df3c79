//! Route handlers for the record store.

use std::error::Error as StdError;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::store::{Order, Store, User};
use crate::telemetry::reporter::{ErrorReporter, Failure};

/// State shared by handlers and the failure middleware.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub reporter: ErrorReporter,
}

/// Handler error.
///
/// `Internal` responses carry a [`Failure`] extension; the failure middleware
/// records it and replaces the body with a generic one.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error(transparent)]
    Internal(Box<dyn StdError + Send + Sync>),
}

impl AppError {
    pub fn internal(err: impl StdError + Send + Sync + 'static) -> Self {
        AppError::Internal(Box::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
            }
            AppError::Internal(err) => {
                let failure = Failure::from_error(err.as_ref());
                let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
                response.extensions_mut().insert(failure);
                response
            }
        }
    }
}

/// Raised by `GET /users` on every call, to exercise error reporting.
#[derive(Debug, Error)]
#[error("Something went wrong")]
pub struct UsersUnavailable;

/// Single-record envelope.
#[derive(Debug, Serialize)]
pub struct Row<T> {
    pub row: T,
}

pub async fn list_users(State(state): State<AppState>) -> Json<Vec<User>> {
    Json(state.store.users().to_vec())
}

pub async fn list_orders(State(state): State<AppState>) -> Json<Vec<Order>> {
    Json(state.store.orders().to_vec())
}

pub async fn users_unavailable() -> Result<Json<Vec<User>>, AppError> {
    Err(AppError::internal(UsersUnavailable))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Row<User>>, AppError> {
    let user = parse_id(&id)
        .and_then(|id| state.store.user(id))
        .ok_or(AppError::NotFound)?;
    Ok(Json(Row { row: user.clone() }))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Row<Order>>, AppError> {
    let order = parse_id(&id)
        .and_then(|id| state.store.order(id))
        .ok_or(AppError::NotFound)?;
    Ok(Json(Row { row: order.clone() }))
}

// Non-numeric ids simply match nothing.
fn parse_id(raw: &str) -> Option<u64> {
    raw.parse().ok()
}
