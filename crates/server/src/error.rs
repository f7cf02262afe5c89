use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use store::StoreError;
use tonic::{Code, Status};

pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// A backend failure. Only `context` reaches the client; `source` is logged.
    #[error("{context}")]
    Storage {
        context: &'static str,
        #[source]
        source: StoreError,
    },

    /// Unusable configuration, such as an empty API key.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A listener could not bind, or stopped accepting connections.
    #[error("{name} listener failed: {message}")]
    Listener {
        name: &'static str,
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ServerError {
    pub fn storage(context: &'static str, source: StoreError) -> Self {
        ServerError::Storage { context, source }
    }

    pub fn listener(name: &'static str, message: impl Into<String>, source: std::io::Error) -> Self {
        ServerError::Listener {
            name,
            message: message.into(),
            source,
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Storage { .. }
            | ServerError::Config(_)
            | ServerError::Listener { .. }
            | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    fn error_code(&self) -> &'static str {
        match self {
            ServerError::Authentication(_) => "AUTH_FAILED",
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::NotFound(_) => "NOT_FOUND",
            ServerError::Storage { .. } => "STORAGE_ERROR",
            ServerError::Config(_) => "CONFIG_ERROR",
            ServerError::Listener { .. } => "LISTENER_ERROR",
            ServerError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// gRPC status code for this error
    pub fn rpc_code(&self) -> Code {
        match self {
            ServerError::Authentication(_) => Code::Unauthenticated,
            ServerError::BadRequest(_) => Code::InvalidArgument,
            ServerError::NotFound(_) => Code::NotFound,
            ServerError::Storage { .. }
            | ServerError::Config(_)
            | ServerError::Listener { .. }
            | ServerError::Internal(_) => Code::Internal,
        }
    }

    fn log(&self) {
        if let ServerError::Storage { context, source } = self {
            tracing::error!(error = %source, "{context}");
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();

        // Unauthenticated callers get the status and nothing else.
        let mut response = if let ServerError::Authentication(_) = self {
            status.into_response()
        } else {
            let body = ErrorResponse {
                error: ErrorDetail {
                    code: self.error_code().to_string(),
                    message: self.to_string(),
                },
            };
            (status, Json(body)).into_response()
        };

        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }
}

impl From<ServerError> for Status {
    fn from(err: ServerError) -> Self {
        err.log();
        Status::new(err.rpc_code(), err.to_string())
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::BadRequest(format!("error unmarshalling recipe: {err}"))
    }
}
