//! HTTP mapping of resolution and load failures.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tax_core::{ErrorKind, LoadError, ResolutionError};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Request rejected before reaching the resolver.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Value of the `kind` field in the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => ErrorKind::InvalidInput.as_str(),
            Self::Resolution(e) => e.kind().as_str(),
            Self::Load(LoadError::Integrity(e)) => e.kind().as_str(),
            Self::Load(LoadError::Repository(_)) => "Repository",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Resolution(e) => match e.kind() {
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                kind if kind.is_not_found() => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Load(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let message = self.to_string();
        if status.is_server_error() {
            warn!(%status, kind, error = %message, "request failed");
        } else {
            debug!(%status, kind, error = %message, "request rejected");
        }
        (status, Json(json!({ "error": message, "kind": kind }))).into_response()
    }
}
