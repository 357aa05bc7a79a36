use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use huddle_core::conference::{ResolveError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("conference not found")]
    NotFound,

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound => ApiError::NotFound,
            ResolveError::Store(err) => ApiError::Storage(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            // One uniform not-found body: bad tokens and bad room ids are
            // deliberately indistinguishable to the caller.
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not Found").into_response(),
            ApiError::Storage(err) => {
                tracing::error!(error = %err, "request failed in storage");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
            ApiError::Json(err) => {
                tracing::error!(error = %err, "identity serialization failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ApiError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_storage_maps_to_500() {
        let response = ApiError::Storage(StoreError::RevisionConflict).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_resolve_not_found_conversion() {
        let err: ApiError = ResolveError::NotFound.into();
        assert!(matches!(err, ApiError::NotFound));
    }
}
