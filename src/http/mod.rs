//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, proxy origin)
//!     → routing (target + mode)
//!     → upstream (forwarder or registry resolver)
//!     → response.rs (header policy, rewriting dispatch)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{proxy_origin, UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError};
