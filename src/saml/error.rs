use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::engine::EngineError;

#[derive(Debug, Error)]
pub enum FrontendError {
    /// Bad provider configuration or provider set. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport binding with no protocol mapping
    #[error("Unknown binding: {0}")]
    UnknownBinding(String),

    /// Payload references a requester the engine does not know
    #[error("UnknownPrincipal: {0}")]
    UnknownPrincipal(String),

    /// Payload asks for a binding the engine cannot serve
    #[error("UnsupportedBinding: {0}")]
    UnsupportedBinding(String),

    /// Request carried no SAMLRequest
    #[error("Missing SAML authentication request")]
    MissingPayload,

    /// Continuation token is undecodable or inconsistent
    #[error("Invalid continuation state: {0}")]
    InvalidContinuation(String),

    /// The engine could not pick a reply binding or destination
    #[error("Could not resolve response destination: {0}")]
    DestinationResolution(String),

    /// Any other protocol engine failure (signing, encoding)
    #[error("Protocol engine error: {0}")]
    Engine(String),
}

impl FrontendError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            FrontendError::Configuration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error")
            }
            FrontendError::UnknownBinding(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "unknown_binding")
            }
            FrontendError::UnknownPrincipal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "unknown_principal")
            }
            FrontendError::UnsupportedBinding(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "unsupported_binding")
            }
            FrontendError::MissingPayload => (StatusCode::UNAUTHORIZED, "missing_payload"),
            FrontendError::InvalidContinuation(_) => {
                (StatusCode::BAD_REQUEST, "invalid_continuation")
            }
            FrontendError::DestinationResolution(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "destination_resolution")
            }
            FrontendError::Engine(_) => (StatusCode::INTERNAL_SERVER_ERROR, "engine_error"),
        }
    }
}

impl From<EngineError> for FrontendError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnknownPrincipal(msg) => FrontendError::UnknownPrincipal(msg),
            EngineError::UnsupportedBinding(msg) => FrontendError::UnsupportedBinding(msg),
            EngineError::NoEndpoint(msg) => FrontendError::DestinationResolution(msg),
            EngineError::Configuration(msg) => FrontendError::Configuration(msg),
            other => FrontendError::Engine(other.to_string()),
        }
    }
}

impl IntoResponse for FrontendError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "SAML frontend request failed");
        }
        // Internal detail stays in the log for 5xx; clients get a generic message
        let message = if status.is_server_error() {
            "Service error".to_string()
        } else {
            self.to_string()
        };
        let body = serde_json::json!({
            "error": {
                "code": code,
                "message": message,
            }
        });
        (status, Json(body)).into_response()
    }
}
