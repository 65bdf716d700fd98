//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use taskflow_domain::error::TaskflowError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`TaskflowError`] and malformed requests to an HTTP response.
pub enum ApiError {
    Domain(TaskflowError),
    /// The request could not be decoded before reaching a service.
    BadRequest(String),
}

impl From<TaskflowError> for ApiError {
    fn from(err: TaskflowError) -> Self {
        Self::Domain(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Domain(TaskflowError::Validation(err)) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            Self::Domain(TaskflowError::InvalidSchedule(err)) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            Self::Domain(TaskflowError::NotFound(err)) => (StatusCode::NOT_FOUND, err.to_string()),
            Self::Domain(TaskflowError::Auth(err)) => (StatusCode::UNAUTHORIZED, err.to_string()),
            Self::Domain(TaskflowError::Storage(err)) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskflow_domain::error::{AuthError, NotFoundError, ValidationError};

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn should_map_each_error_family_to_its_status() {
        assert_eq!(
            status_of(TaskflowError::from(ValidationError::EmptyName)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(TaskflowError::from(AuthError::MissingSignature)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(TaskflowError::from(NotFoundError {
                entity: "Automation",
                id: "a1".to_string(),
            })),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(TaskflowError::Storage("disk full".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ApiError::BadRequest("nope".to_string())),
            StatusCode::BAD_REQUEST
        );
    }
}
