//! Rewriting Forward Proxy Library

pub mod config;
pub mod error;
pub mod http;
pub mod routing;
pub mod rewrite;
pub mod upstream;
pub mod stats;
pub mod links;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
