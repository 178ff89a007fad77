use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Failure taxonomy for the gateway.
///
/// Per-row and per-batch-element failures are isolated by the callers: a
/// `DuplicateTimestamp` or `Store` error aborts one row, never the owning
/// connection. Connection-level failures terminate only that connection.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("a row with this timestamp already exists for this device")]
    DuplicateTimestamp,

    #[error("no field device registered for id {0}")]
    NoSuchDevice(String),

    #[error("device {0} did not respond before the timeout")]
    CommandTimeout(String),

    #[error("a command is already in flight for device {0}")]
    CommandInFlight(String),

    #[error("store unavailable: {0}")]
    Store(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MalformedMessage(_) => StatusCode::BAD_REQUEST,
            GatewayError::DuplicateTimestamp => StatusCode::CONFLICT,
            GatewayError::NoSuchDevice(_) => StatusCode::NOT_FOUND,
            GatewayError::CommandTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::CommandInFlight(_) => StatusCode::CONFLICT,
            GatewayError::Store(_) | GatewayError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
