//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the catch-all proxy handler
//! - Wire up middleware (request ID, tracing, timeout)
//! - Dispatch requests to the request router
//! - Forward to origins or the registry and relay the response
//! - Count hits and record metrics

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use url::Url;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::request::{proxy_origin, request_id, UuidRequestId};
use crate::http::response;
use crate::links;
use crate::observability::metrics;
use crate::rewrite::{DirectHostPolicy, VisitorRegistry};
use crate::routing::{ProxyMode, RequestRouter, Route};
use crate::stats::{Counter, Stats};
use crate::upstream::{OriginForwarder, RegistryResolver};

/// Failures while assembling the server from config.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid registry upstream: {0}")]
    Router(#[from] ProxyError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RequestRouter>,
    pub forwarder: OriginForwarder,
    pub registry: RegistryResolver,
    pub policy: Arc<DirectHostPolicy>,
    pub visitors: Arc<VisitorRegistry>,
    pub stats: Stats,
}

/// HTTP server for the rewriting proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Starts the stats collector, so it must run inside a Tokio runtime.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let config = Arc::new(config);

        let state = AppState {
            router: Arc::new(RequestRouter::new(&config.registry)?),
            forwarder: OriginForwarder::new(&config)?,
            registry: RegistryResolver::new(&config.registry, &config.timeouts)?,
            policy: Arc::new(DirectHostPolicy::new(config.rewrite.direct_hosts.iter().cloned())),
            visitors: Arc::new(VisitorRegistry::standard()),
            stats: Stats::from_config(&config.stats),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            request_id = %request_id(request.headers()),
                            method = %request.method(),
                            uri = %request.uri(),
                        )
                    }))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            registry = %self.config.registry.upstream_url,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Catch-all handler: route, count, forward, relay.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let origin = proxy_origin(&parts.headers, &parts.uri);

    let route = match state.router.route(&parts.uri, &parts.headers, &origin) {
        Ok(route) => route,
        Err(e) => {
            tracing::warn!(client = %client, path = %parts.uri.path(), error = %e, "Rejected request");
            metrics::record_request(ProxyMode::Generic.as_str(), e.status().as_u16(), start);
            return e.into_response();
        }
    };

    let (target, mode) = match route {
        Route::Robots => return response::robots(),
        Route::Favicon => return response::favicon(),
        Route::Stats => return stats_response(&state.stats),
        Route::Dashboard => {
            state.stats.increment(Counter::Total);
            return dashboard_response(&state.stats, &origin);
        }
        Route::Lookup { target } => (target, ProxyMode::Generic),
        Route::Proxy { target, mode } => {
            count_hit(&state.stats, &target, mode);
            (target, mode)
        }
    };

    tracing::debug!(
        client = %client,
        method = %parts.method,
        target = %target,
        mode = mode.as_str(),
        "Proxying request"
    );

    let result = match mode {
        ProxyMode::Generic => {
            match state
                .forwarder
                .forward(parts.method, &parts.headers, body, &target)
                .await
            {
                Ok(upstream) => {
                    response::generic_response(
                        upstream,
                        origin,
                        state.policy.clone(),
                        state.visitors.clone(),
                    )
                    .await
                }
                Err(e) => Err(e),
            }
        }
        ProxyMode::Registry => state
            .registry
            .handle(parts.method, &parts.headers, body, target)
            .await
            .map(response::registry_response),
    };

    match result {
        Ok(response) => {
            metrics::record_request(mode.as_str(), response.status().as_u16(), start);
            response
        }
        Err(e) => {
            if matches!(e, ProxyError::Upstream { .. }) {
                metrics::record_upstream_error(mode.as_str());
            }
            tracing::error!(mode = mode.as_str(), error = %e, "Proxy request failed");
            metrics::record_request(mode.as_str(), e.status().as_u16(), start);
            e.into_response()
        }
    }
}

fn count_hit(stats: &Stats, target: &Url, mode: ProxyMode) {
    stats.increment(Counter::Total);
    if mode == ProxyMode::Registry {
        stats.increment(Counter::Docker);
    }
    if target.host_str().is_some_and(|h| h.contains("github")) {
        stats.increment(Counter::Github);
    }
}

fn stats_response(stats: &Stats) -> Response {
    let mut response = Json(stats.snapshot()).into_response();
    crate::security::headers::allow_any_origin(response.headers_mut());
    response
}

/// Service summary shown at `/`: counters plus ready-to-use examples.
fn dashboard_response(stats: &Stats, origin: &str) -> Response {
    let examples = Url::parse(origin).ok().map(|proxy| {
        json!({
            "docker": links::docker_pull_command(&proxy, "nginx:latest"),
            "github": links::github_link(&proxy, "github.com/user/repo"),
            "web": links::web_link(&proxy, "example.com"),
        })
    });

    let mut response = Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "stats": stats.snapshot(),
        "examples": examples,
    }))
    .into_response();
    crate::security::headers::allow_any_origin(response.headers_mut());
    response
}
