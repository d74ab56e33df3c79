//! HTTP surface subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID)
//!     → handlers.rs (store reads; errors become AppError)
//!     → failure.rs (error span for 500s, generic body to client)
//!     → Send to client
//! ```

pub mod failure;
pub mod handlers;
pub mod request;
pub mod server;

pub use handlers::{AppError, AppState};
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
