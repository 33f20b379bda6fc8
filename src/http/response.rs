//! Response construction.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

pub const SERVER_NAME: &str = concat!("lb-proxy/", env!("CARGO_PKG_VERSION"));
pub const NO_BACKENDS: &str = "Service Unavailable - No backend servers";

/// Body returned when a request was assigned a backend.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BalancedResponse {
    pub message: &'static str,
    pub method: String,
    pub path: String,
    pub backend: String,
    pub client_ip: String,
    pub algorithm: String,
    pub backend_weight: u32,
    pub backend_connections: usize,
    /// Milliseconds since the Unix epoch.
    pub timestamp: String,
    pub request_id: Option<String>,
}

impl BalancedResponse {
    pub const MESSAGE: &'static str = "Request processed successfully";
}

impl IntoResponse for BalancedResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// `503` with a JSON error body.
pub fn service_unavailable() -> Response {
    let body = serde_json::json!({ "error": NO_BACKENDS });
    (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
}

pub fn epoch_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_unavailable() {
        let response = service_unavailable();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_epoch_millis_is_numeric() {
        assert!(epoch_millis().parse::<u128>().unwrap() > 0);
    }
}
