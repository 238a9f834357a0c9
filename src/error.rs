//! Error types for the license console

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("Database error: {0}")]
  Database(#[from] sea_orm::DbErr),

  #[error("Transport error: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("Malformed payload: {0}")]
  Decode(#[from] json::Error),

  #[error("Remote store answered {status}: {body}")]
  Status { status: u16, body: String },

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Seller {0} not found")]
  SellerNotFound(String),

  #[error("Insufficient balance. Need {need:.2}")]
  InsufficientBalance { need: f64 },

  #[error("Not authenticated")]
  Unauthorized,

  #[error("{0}")]
  Forbidden(String),

  #[error("Internal error: {0}")]
  Internal(String),
}

impl Error {
  pub fn forbidden(reason: impl Into<String>) -> Self {
    Self::Forbidden(reason.into())
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::Database(_) | Error::Io(_) | Error::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
      Error::Transport(_) | Error::Decode(_) | Error::Status { .. } => {
        StatusCode::BAD_GATEWAY
      }
      Error::SellerNotFound(_) => StatusCode::NOT_FOUND,
      Error::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
      Error::Unauthorized => StatusCode::UNAUTHORIZED,
      Error::Forbidden(_) => StatusCode::FORBIDDEN,
    };

    if status.is_server_error() {
      tracing::error!("Request failed: {self}");
    }

    // internals stay in the log, clients get plain status text
    let message = match &self {
      Error::Database(_) => "Database error".to_string(),
      Error::Io(_) => "IO error".to_string(),
      Error::Internal(_) => "Internal error".to_string(),
      Error::Transport(_) | Error::Decode(_) | Error::Status { .. } => {
        "Remote store unavailable".to_string()
      }
      other => other.to_string(),
    };

    let body = json::json!({
      "success": false,
      "error": message
    });

    (status, axum::Json(body)).into_response()
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
