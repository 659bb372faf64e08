use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub mod config;
pub mod http_client;

// Common error handling
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid form: {0}")]
    InvalidForm(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ServiceError::HttpClient(ref e) => {
                tracing::error!("HTTP client error: {:?}", e);
                (StatusCode::BAD_GATEWAY, "External service error")
            }
            ServiceError::Serialization(ref e) => {
                tracing::error!("Serialization error: {:?}", e);
                (StatusCode::BAD_REQUEST, "Invalid data format")
            }
            ServiceError::BadRequest(ref message) => {
                (StatusCode::BAD_REQUEST, message.as_str())
            }
            ServiceError::InvalidForm(ref message) => {
                (StatusCode::UNPROCESSABLE_ENTITY, message.as_str())
            }
            ServiceError::PayloadTooLarge(ref message) => {
                (StatusCode::PAYLOAD_TOO_LARGE, message.as_str())
            }
            ServiceError::UnsupportedMediaType(ref message) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, message.as_str())
            }
            ServiceError::Internal(ref e) => {
                tracing::error!("Internal error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": {
                "code": status.as_u16(),
                "message": error_message
            }
        }));

        (status, body).into_response()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

// Health check response
#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

impl HealthResponse {
    /// `version` is the serving crate's `CARGO_PKG_VERSION`.
    pub fn new(service_name: &str, version: &str) -> Self {
        Self {
            status: "healthy".to_string(),
            service: service_name.to_string(),
            version: version.to_string(),
        }
    }
}
