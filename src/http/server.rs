//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the balancing handler
//! - Wire up middleware (tracing, limits, timeouts, request ID)
//! - Bind server to listener
//! - Assign each request a backend and report the decision

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::request::{request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::http::response::{epoch_millis, service_unavailable, BalancedResponse, SERVER_NAME};
use crate::load_balancer::{LoadBalancer, LoadBalancerError};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LoadBalancer>,
}

/// HTTP front end of the load balancer.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ServerConfig, engine: Arc<LoadBalancer>) -> Self {
        let router = Self::build_router(config, AppState { engine });
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(balance_handler))
            .route("/", any(balance_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.connection_timeout_secs,
            )))
            .layer(ConcurrencyLimitLayer::new(config.max_connections.max(1)))
            .layer(SetResponseHeaderLayer::overriding(
                header::SERVER,
                HeaderValue::from_static(SERVER_NAME),
            ))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = request_id(request).unwrap_or("unknown"),
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// Run the server until the shutdown broadcast fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Assigns the request a backend keyed on the peer IP.
async fn balance_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let request_id = request_id(&request).map(str::to_string);
    let client_ip = addr.ip().to_string();

    let response = match state.engine.select_tracked(&client_ip) {
        Ok(Some(guard)) => {
            let algorithm = guard.algorithm();
            tracing::info!(
                client_ip = %client_ip,
                backend = %guard.id(),
                algorithm = %algorithm,
                "Forwarding {method} {path}"
            );

            BalancedResponse {
                message: BalancedResponse::MESSAGE,
                method: method.clone(),
                path,
                backend: guard.id().to_string(),
                client_ip,
                algorithm: algorithm.to_string(),
                backend_weight: guard.weight(),
                backend_connections: guard.active_connections(),
                timestamp: epoch_millis(),
                request_id,
            }
            .into_response()
        }
        Ok(None) => {
            tracing::error!(client_ip = %client_ip, "No healthy backend servers available");
            service_unavailable()
        }
        Err(LoadBalancerError::NotConfigured) => {
            tracing::error!(client_ip = %client_ip, "Load balancer not configured");
            service_unavailable()
        }
        Err(e) => {
            tracing::error!(client_ip = %client_ip, error = %e, "Backend selection failed");
            service_unavailable()
        }
    };

    metrics::record_request(&method, response.status().as_u16(), start);
    response
}
