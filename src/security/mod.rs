//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → headers.rs (drop hop-by-hop, Host, Content-Length)
//!     → upstream request
//!
//! Upstream response:
//!     → headers.rs (drop hop-by-hop and framing policies, add CORS)
//!     → client
//! ```

pub mod headers;
