//! Telemetry-instrumented record service library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod sampling;
pub mod store;
pub mod telemetry;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use telemetry::TraceProvider;
