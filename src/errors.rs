use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{fmt, io};
use thiserror::Error;

/// Failures of the intake core and of the upstream APIs it talks to.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid submission: {0}")]
    Validation(String),

    #[error("token request failed ({status}): {body}")]
    Auth { status: u16, body: String },

    #[error("folder operation failed ({status}): {body}")]
    Folder { status: u16, body: String },

    #[error("createUploadSession failed ({status}): {body}")]
    Session { status: u16, body: String },

    #[error("chunk upload failed ({status}): {body}")]
    ChunkTransport { status: u16, body: String },

    #[error("manifest upload failed ({status}): {body}")]
    Manifest { status: u16, body: String },

    #[error("payment provider error ({status}): {body}")]
    Payment { status: u16, body: String },

    #[error("upload of `{file}` failed: {source}")]
    FileFailed {
        file: String,
        #[source]
        source: Box<IntakeError>,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type IntakeResult<T> = Result<T, IntakeError>;

/// Body of an upstream response, or an empty string when it cannot be read.
pub(crate) async fn response_text(resp: reqwest::Response) -> String {
    let status = resp.status();
    match resp.text().await {
        Ok(body) => body,
        Err(err) => {
            tracing::debug!(%status, error = %err, "could not read response body");
            String::new()
        }
    }
}

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for 502 Bad Gateway
    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "ok": false,
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// Validation problems are echoed back to the caller; everything else gets a
/// generic message and the detail goes to the log.
impl From<IntakeError> for AppError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::Validation(msg) => AppError::bad_request(msg),
            IntakeError::Configuration(_) | IntakeError::Io(_) => {
                tracing::error!(error = %err, "intake request failed");
                AppError::internal("internal server error")
            }
            IntakeError::Payment { .. } => {
                tracing::error!(error = %err, "payment request failed");
                AppError::bad_gateway("failed to create payment intent")
            }
            IntakeError::FileFailed { ref file, .. } => {
                tracing::error!(error = %err, "submission aborted");
                AppError::bad_gateway(format!("upload of `{file}` failed; please try again"))
            }
            other => {
                tracing::error!(error = %other, "storage request failed");
                AppError::bad_gateway("upload to storage failed; please try again")
            }
        }
    }
}
