//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query, Referer)
//!     → housekeeping paths (robots, favicon, dashboard, stats)
//!     → registry paths (/v2/..., */token*) → Registry mode
//!     → embedded target URL → Generic mode
//!     → otherwise: InvalidTarget
//! ```
//!
//! # Design Decisions
//! - Router built at startup, immutable at runtime
//! - Deterministic: same input always yields the same route

pub mod router;

pub use router::{parse_target, ProxyMode, RequestRouter, Route, STATS_PATH};
