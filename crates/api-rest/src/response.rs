//! HTTP response envelope.
//!
//! Every response carries the same shape: `{status, message}` on failure,
//! `{status, message, data}` on success, with the failure status derived
//! from the core error taxonomy. Unexpected failures are logged at error
//! level and reported as a generic internal error so no backend detail
//! leaks to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use expediente_core::RecordError;
use serde::Serialize;
use utoipa::ToSchema;

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
}

/// An HTTP-renderable failure.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorised(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }
}

impl From<RecordError> for ApiError {
    fn from(err: RecordError) -> Self {
        let status =
            StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("request failed: {:?}", err);
            return Self::new(status, "Internal error");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: self.status.as_u16(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// A successful response: `{status, message, data}`.
///
/// `data` is `null` for mutations that return nothing.
#[derive(Debug)]
pub struct ApiSuccess<T> {
    status: StatusCode,
    message: String,
    data: T,
}

impl<T> ApiSuccess<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            data,
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            message: message.into(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "status": self.status.as_u16(),
            "message": self.message,
            "data": self.data,
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_keep_their_message() {
        let err = ApiError::from(RecordError::NameInUse);
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "template name already in use");
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err = ApiError::from(RecordError::Store(
            expediente_store::StoreError::Backend("connection refused".into()),
        ));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal error");
    }

    #[test]
    fn test_not_owner_maps_to_forbidden() {
        let err = ApiError::from(RecordError::NotOwner);
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_success_envelope_shape() {
        let response = ApiSuccess::ok("OK", serde_json::json!({ "x": 1 })).into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], 200);
        assert_eq!(body["message"], "OK");
        assert_eq!(body["data"]["x"], 1);
    }

    #[tokio::test]
    async fn test_unit_data_serialises_as_null() {
        let response = ApiSuccess::ok("Deleted", ()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["data"].is_null());
    }
}
