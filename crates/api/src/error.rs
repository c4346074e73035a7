use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shelfroom_core::error::CoreError;
use shelfroom_db::{DocumentError, PresenceError};
use shelfroom_room::RoomError;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain and store errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `shelfroom_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A document store failure.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// A presence store failure.
    #[error(transparent)]
    Presence(#[from] PresenceError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),

    /// No route matches the request path.
    #[error("No route for {0}")]
    RouteNotFound(String),

    /// A backing store could not complete the operation.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<RoomError> for AppError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::Core(e) => AppError::Core(e),
            RoomError::Document(e) => AppError::Document(e),
            RoomError::Presence(e) => AppError::Presence(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            // --- Store errors ---
            AppError::Document(err) => classify_document_error(err),
            AppError::Presence(err) => classify_presence_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::RouteNotFound(path) => (
                StatusCode::NOT_FOUND,
                "ROUTE_NOT_FOUND",
                format!("No route for {path}"),
            ),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!(error = %msg, "Service unavailable");
                unavailable()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn unavailable() -> (StatusCode, &'static str, String) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        "SERVICE_UNAVAILABLE",
        "A backing store is unavailable".to_string(),
    )
}

/// Classify a document store error into an HTTP status, error code, and message.
///
/// - Missing documents map to 404.
/// - Malformed paths and bodies map to 400.
/// - Transport and database failures map to 503 / 500 with a sanitized message.
fn classify_document_error(err: &DocumentError) -> (StatusCode, &'static str, String) {
    match err {
        DocumentError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        DocumentError::InvalidPath(_) | DocumentError::NotAnObject(_) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
        }
        DocumentError::Transport(msg) => {
            tracing::error!(error = %msg, "Document store unavailable");
            unavailable()
        }
        DocumentError::Database(db_err) => {
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        DocumentError::Serialization(e) => {
            tracing::error!(error = %e, "Stored document could not be decoded");
            internal()
        }
    }
}

fn classify_presence_error(err: &PresenceError) -> (StatusCode, &'static str, String) {
    match err {
        PresenceError::UnknownConnection(conn) => (
            StatusCode::BAD_REQUEST,
            "UNKNOWN_CONNECTION",
            format!("Connection {conn} is not open"),
        ),
        PresenceError::PermissionDenied(msg) => {
            (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone())
        }
        PresenceError::Transport(msg) => {
            tracing::error!(error = %msg, "Presence store unavailable");
            unavailable()
        }
        PresenceError::Serialization(e) => {
            tracing::error!(error = %e, "Presence value could not be decoded");
            internal()
        }
    }
}
