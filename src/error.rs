use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Invalid order token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Payment not found for merchant reference {0}")]
    PaymentNotFound(String),

    #[error("Payment rejected: {0}")]
    PaymentRejected(String),

    #[error("Payment gateway unreachable: {0}")]
    GatewayUnavailable(String),

    #[error("Payment gateway rejected the request: HTTP {status}")]
    GatewayRejected { status: u16, body: String },

    #[error("Payment gateway protocol error: {0}")]
    GatewayProtocol(String),

    #[error("QR encoding error: {0}")]
    Encoding(String),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::Email(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
        }

        let (status, error_message, details) = match self {
            AppError::ValidationError(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation error".to_string(),
                Some(err.to_string()),
            ),
            AppError::InvalidToken(err) => (
                StatusCode::UNAUTHORIZED,
                "Invalid order token".to_string(),
                Some(err.to_string()),
            ),
            AppError::PaymentNotFound(reference) => (
                StatusCode::NOT_FOUND,
                format!("Payment not found for merchant reference {}", reference),
                None,
            ),
            AppError::PaymentRejected(reason) => (StatusCode::FORBIDDEN, reason, None),
            AppError::GatewayUnavailable(msg) => (
                StatusCode::BAD_GATEWAY,
                "Payment gateway unreachable".to_string(),
                Some(msg),
            ),
            AppError::GatewayRejected { status, body } => (
                StatusCode::BAD_GATEWAY,
                format!("Payment gateway rejected the request: HTTP {}", status),
                Some(body),
            ),
            AppError::GatewayProtocol(msg) => (
                StatusCode::BAD_GATEWAY,
                "Payment gateway protocol error".to_string(),
                Some(msg),
            ),
            AppError::Encoding(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "QR encoding error".to_string(),
                Some(msg),
            ),
            AppError::Email(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Email error".to_string(),
                Some(msg),
            ),
            AppError::DatabaseError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
                Some(err.to_string()),
            ),
            AppError::ConfigError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error".to_string(),
                Some(err.to_string()),
            ),
            AppError::InternalError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                Some(err.to_string()),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error: error_message,
                details,
            }),
        )
            .into_response()
    }
}
