use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use vpnshop_db::StoreError;

use crate::services::platega::GatewayError;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order not found")]
    NotFound,

    #[error("order is not paid")]
    NotPaid,

    #[error("payment could not be created: {0}")]
    PaymentUnavailable(#[source] GatewayError),

    #[error("order store failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => OrderError::NotFound,
            other => OrderError::Store(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("malformed callback: {0}")]
    Malformed(String),

    #[error("callback credentials do not match")]
    Unauthorized,

    #[error("callback for unknown order {0}")]
    UnknownOrder(String),

    #[error("order store failure: {0}")]
    Store(#[from] StoreError),
}

/// Error surface of the HTTP layer.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CallbackError> for AppError {
    fn from(err: CallbackError) -> Self {
        match err {
            CallbackError::Malformed(msg) => AppError::BadRequest(msg),
            CallbackError::Unauthorized => AppError::Unauthorized,
            CallbackError::UnknownOrder(_) => AppError::NotFound,
            CallbackError::Store(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound | OrderError::NotPaid => AppError::NotFound,
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Internal(detail) => {
                tracing::error!("Request failed: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }
        };

        (status, Json(json!({ "status": "error", "message": message }))).into_response()
    }
}
