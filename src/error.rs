use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::auth::password::CodecError;
use crate::store::{StoreError, UniqueField};

/// Error kinds surfaced by the auth and user workflows.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing or soft-deleted entity, bad credentials, unverified account, bad reset token.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} already registered")]
    Conflict(UniqueField),

    #[error("credential codec error: {0}")]
    Codec(#[from] CodecError),

    /// Storage or signing failure. The cause is logged, never shown to the caller.
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn internal(e: impl Into<anyhow::Error>) -> Self {
        AppError::Internal(e.into())
    }

    /// True when the failing transaction can be re-run from the start.
    pub fn is_serialization_failure(&self) -> bool {
        match self {
            AppError::Internal(cause) => matches!(
                cause.downcast_ref::<StoreError>(),
                Some(StoreError::SerializationFailure)
            ),
            _ => false,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Codec(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation(field) => AppError::Conflict(field),
            other => AppError::Internal(other.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Internal(cause) => error!(error = %cause, "internal error"),
            AppError::Codec(cause) => error!(error = %cause, "codec error"),
            _ => {}
        }
        let body = Json(json!({
            "error": true,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
