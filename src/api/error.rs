//! HTTP mapping for domain errors, with structured JSON bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::ClinicError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// Status and machine-readable code for a domain error.
///
/// Conflicts share 400 with validation failures; the code tells them apart.
pub fn status_and_code(err: &ClinicError) -> (StatusCode, &'static str) {
    match err {
        ClinicError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION"),
        ClinicError::Conflict(_) => (StatusCode::BAD_REQUEST, "CONFLICT"),
        ClinicError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        ClinicError::Authentication(_) => (StatusCode::UNAUTHORIZED, "AUTH_REQUIRED"),
        ClinicError::Authorization(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        ClinicError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
    }
}

impl IntoResponse for ClinicError {
    fn into_response(self) -> Response {
        let (status, code) = status_and_code(&self);
        let message = match &self {
            ClinicError::Storage(e) => {
                tracing::error!(error = %e, "API internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

/// Bearer token from an `Authorization` header, if present.
pub fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseError;
    use axum::body::to_bytes;
    use axum::http::{HeaderMap, HeaderValue};

    async fn json_of(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn validation_returns_400() {
        let response = ClinicError::validation("rating must be between 1 and 5").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION");
    }

    #[tokio::test]
    async fn conflict_returns_400_with_own_code() {
        let response = ClinicError::conflict("booking has already been reviewed").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_of(response).await["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn auth_errors_return_401_and_403() {
        let response = ClinicError::Authentication("login required".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = ClinicError::Authorization("patient may not Delete this clinic".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn not_found_returns_404() {
        let response = ClinicError::not_found("Booking", "abc").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_of(response).await["error"]["message"], "Booking not found: abc");
    }

    #[tokio::test]
    async fn storage_returns_500_without_details() {
        let response = ClinicError::Storage(DatabaseError::ConstraintViolation("secret".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // Internal errors hide details from client
        assert_eq!(json_of(response).await["error"]["message"], "An internal error occurred");
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert("Authorization", HeaderValue::from_static("Bearer tok-123"));
        assert_eq!(bearer_token(&headers), Some("tok-123"));
    }
}
