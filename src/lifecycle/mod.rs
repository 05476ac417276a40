//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → every subscriber wakes → server stops accepting → drain → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup in main: config, logging, metrics, listener, server
//! - In-flight requests finish before the process exits

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
