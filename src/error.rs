use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Authentication failed")]
    AuthError,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal server error")]
    Internal,
    #[error("Internal server error: {0}")]
    InternalMsg(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::AuthError => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Io(_) | Self::Internal | Self::InternalMsg(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message that is safe to hand to a client. Server-side failures collapse
    /// to a static string; their details only reach the logs.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::AuthError => "Unauthorized".to_string(),
            Self::Forbidden(msg) | Self::NotFound(msg) | Self::BadRequest(msg) | Self::Conflict(msg) => msg.clone(),
            Self::Database(_) | Self::Io(_) | Self::Internal | Self::InternalMsg(_) => INTERNAL_MESSAGE.to_string(),
        }
    }

    /// Emits the log line for this error at a level matching its class.
    pub fn log(&self) {
        match self {
            Self::Database(e) => tracing::error!(error = %e, "Database error"),
            Self::Io(e) => tracing::error!(error = %e, "I/O error"),
            Self::Internal => tracing::error!("Internal server error occurred"),
            Self::InternalMsg(msg) => tracing::error!(message = %msg, "Internal server error occurred"),
            Self::AuthError => tracing::debug!("Authentication failed"),
            Self::Forbidden(msg) => tracing::debug!(message = %msg, "Forbidden"),
            Self::NotFound(msg) => tracing::debug!(message = %msg, "Resource not found"),
            Self::BadRequest(msg) => tracing::debug!(message = %msg, "Bad request"),
            Self::Conflict(msg) => tracing::debug!(message = %msg, "Conflict"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();

        let body = Json(json!({
            "error": self.client_message()
        }));

        (self.status(), body).into_response()
    }
}
