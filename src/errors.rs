use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
///
/// A missing session (no upload yet) is deliberately absent from this enum:
/// pages report it as [`crate::pages::PageState::NoData`].
#[derive(Debug, Clone)]
pub enum AppError {
    /// The analyzer answered with something that cannot become a snapshot.
    MalformedPayload(String),
    /// Transport, timeout or HTTP failure talking to the analyzer.
    RemoteScoring(String),
    /// A simulation is already running for this session.
    SimulationInFlight,
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Returns the innermost error, skipping context wrappers.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::MalformedPayload(msg) => write!(f, "Malformed scoring payload: {}", msg),
            AppError::RemoteScoring(msg) => write!(f, "Remote scoring error: {}", msg),
            AppError::SimulationInFlight => write!(f, "A simulation is already in progress"),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and JSON body.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::MalformedPayload(msg) => {
                tracing::error!("Malformed scoring payload: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "El analizador devolvió una respuesta inválida".to_string(),
                )
            }
            AppError::RemoteScoring(msg) => {
                tracing::error!("Remote scoring error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "No se pudo contactar al servicio de scoring".to_string(),
                )
            }
            AppError::SimulationInFlight => (
                StatusCode::CONFLICT,
                "Ya hay una simulación en curso".to_string(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return (**source).clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }
}
