//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use fog_domain::error::{AuthError, FogError, TaskingError, ValidationError};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`FogError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub enum ApiError {
    /// An application or storage failure.
    Domain(FogError),
    /// No route matches the verb and path.
    Unimplemented,
}

impl From<FogError> for ApiError {
    fn from(err: FogError) -> Self {
        Self::Domain(err)
    }
}

impl ApiError {
    /// Status code for the error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        let Self::Domain(err) = self else {
            return StatusCode::NOT_IMPLEMENTED;
        };
        match err {
            FogError::Validation(err) => match err {
                ValidationError::AlreadyCreated => StatusCode::INTERNAL_SERVER_ERROR,
                ValidationError::MissingRequiredField(_) | ValidationError::InvalidMac(_) => {
                    StatusCode::EXPECTATION_FAILED
                }
                ValidationError::InvalidTaskType | ValidationError::UnknownClass(_) => {
                    StatusCode::NOT_IMPLEMENTED
                }
                ValidationError::MalformedBody(_)
                | ValidationError::UnknownPlugin(_)
                | ValidationError::EmptyName => StatusCode::BAD_REQUEST,
            },
            FogError::NotFound(_) => StatusCode::NOT_FOUND,
            FogError::Auth(AuthError::InvalidApiToken) => StatusCode::FORBIDDEN,
            FogError::Auth(AuthError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            FogError::Tasking(TaskingError::Unsupported(_)) => StatusCode::NOT_IMPLEMENTED,
            FogError::Tasking(_) | FogError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Unimplemented => "Not implemented".to_string(),
            Self::Domain(FogError::Storage(err)) => {
                tracing::error!(error = %err, "storage error");
                "internal server error".to_string()
            }
            Self::Domain(err) => err.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
