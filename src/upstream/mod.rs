//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Generic mode:
//!     forwarder.rs (spoofed headers, redirects followed hop by hop)
//!     → streamed response handed to the rewriter
//!
//! Registry mode:
//!     registry.rs
//!         /token → auth host, once
//!         else   → hop loop: backend.rs classifies each hop,
//!                  header policy applied, redirects followed manually
//! ```
//!
//! # Design Decisions
//! - One reqwest client per mode; both follow redirects manually
//! - No retries at this layer
//! - Clients are cheap to clone and shared by all requests

pub mod agent;
pub mod backend;
pub mod forwarder;
pub mod registry;

pub use agent::UserAgentPool;
pub use backend::BackendKind;
pub use forwarder::OriginForwarder;
pub use registry::RegistryResolver;
