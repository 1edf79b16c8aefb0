use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use serde_json::{Value, json};
use tracing::warn;

use crate::AppState;
use crate::error::{AppError, CallbackError};

/// Webhook endpoint for gateway status notifications.
///
/// Unknown orders are acknowledged so the gateway stops redelivering them.
pub async fn payment_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    match state.callbacks.ingest(&headers, &body).await {
        Ok(_) => Ok(Json(json!({ "status": "ok" }))),
        Err(CallbackError::UnknownOrder(order_id)) => {
            warn!("Callback for unknown order {}, acknowledging", order_id);
            Ok(Json(json!({ "status": "ok" })))
        }
        Err(e) => {
            warn!("Rejected payment callback: {}", e);
            Err(e.into())
        }
    }
}
