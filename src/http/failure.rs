//! Failure reporting middleware.
//!
//! Handler errors and panics reach this layer as a 500 response carrying a
//! [`Failure`] extension. The layer records one error span via the
//! [`ErrorReporter`] and sends the client a generic body instead.

use std::any::Any;

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::http::handlers::AppState;
use crate::http::request::request_id_of;
use crate::telemetry::reporter::{Failure, RouteLabel};

pub async fn report_failures(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string());
    let request_id = request_id_of(&request).map(str::to_string);

    let mut response = next.run(request).await;

    let Some(failure) = response.extensions_mut().remove::<Failure>() else {
        return response;
    };

    let label = match route {
        Some(route) => RouteLabel::new(method, route),
        None => RouteLabel::unresolved(method),
    };
    tracing::debug!(request_id = ?request_id, route = %label, "Reporting handler failure");
    state.reporter.report_error(&label, &failure);

    internal_error()
}

/// Response for a panicking handler; reported by [`report_failures`].
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
    response
        .extensions_mut()
        .insert(Failure::from_panic(payload.as_ref()));
    response
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal Server Error" })),
    )
        .into_response()
}
