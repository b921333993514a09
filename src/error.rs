//! Request-scoped error taxonomy and its HTTP mapping.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use tracing::error;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error("Validation failed: {0}")]
  Validation(String),

  #[error("Entity not found: {entity} with id {id}")]
  NotFound { entity: &'static str, id: String },

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Unauthorized: {0}")]
  Unauthorized(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Storage error: {0}")]
  Store(#[from] StoreError),

  #[error("Internal error: {0}")]
  Internal(String),
}

impl AppError {
  pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
    AppError::NotFound { entity, id: id.into() }
  }

  fn status_and_kind(&self) -> (StatusCode, &'static str) {
    match self {
      AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
      AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
      AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
      AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
      AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
      AppError::Store(StoreError::NotFound { .. }) => (StatusCode::NOT_FOUND, "not_found"),
      AppError::Store(StoreError::Duplicate(_)) => (StatusCode::CONFLICT, "conflict"),
      AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let (status, kind) = self.status_and_kind();
    if status.is_server_error() {
      error!(target: "adventure_backend", error = %self, "Request failed");
    }
    (status, Json(json!({ "error": kind, "message": self.to_string() }))).into_response()
  }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn maps_variants_to_status_codes() {
    let cases = [
      (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
      (AppError::not_found("session", "s1"), StatusCode::NOT_FOUND),
      (AppError::Conflict("x".into()), StatusCode::CONFLICT),
      (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
      (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
      (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, status) in cases {
      assert_eq!(err.into_response().status(), status);
    }
  }
}
