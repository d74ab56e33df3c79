//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID, failure reporting)
//! - Serve on a bound listener until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::failure;
use crate::http::handlers::{self, AppState};
use crate::http::request::{request_id_header, UuidRequestId};
use crate::store::Store;
use crate::telemetry::reporter::ErrorReporter;

/// HTTP server for the record store.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &AppConfig, store: Arc<Store>, reporter: ErrorReporter) -> Self {
        let state = AppState { store, reporter };
        let router = Self::build_router(config, state, Self::routes());
        Self { router }
    }

    fn routes() -> Router<AppState> {
        Router::new()
            .route("/", get(handlers::list_users))
            .route("/orders", get(handlers::list_orders))
            .route("/products", get(handlers::list_orders))
            .route("/users", get(handlers::users_unavailable))
            .route("/users/{id}", get(handlers::get_user))
            .route("/orders/{id}", get(handlers::get_order))
    }

    /// Wrap `routes` in all middleware layers.
    ///
    /// Layers run outermost-last: request ID → trace → timeout → failure
    /// reporting → panic catching → handler.
    ///
    /// The timeout sits outside failure reporting. A request that exceeds
    /// `timeouts.request_secs` gets a 408 and records no error span; only
    /// handler errors and panics are reported.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState, routes: Router<AppState>) -> Router {
        routes
            .layer(CatchPanicLayer::custom(failure::panic_response))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                failure::report_failures,
            ))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(request_id_header()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id_header(), UuidRequestId))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
