use askama::Template;
use axum::{
    Router,
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use tower_http::{limit::RequestBodyLimitLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::AppState;
use crate::error::AppError;

pub mod callback;
pub mod deliverable;
pub mod pages;

/// Gateway webhooks are tiny; anything bigger is not ours.
const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/privacy", get(pages::privacy))
        .route("/terms", get(pages::terms))
        .route("/health", get(pages::health_check))
        .route("/success", get(pages::payment_success))
        .route("/fail", get(pages::payment_fail))
        .route("/payment-callback", post(callback::payment_callback))
        .route("/platega-callback", post(callback::payment_callback))
        .route("/vpn/{token}", get(deliverable::deliverable_page))
        .route("/deliverable/{token}", get(deliverable::deliverable_page))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(TraceLayer::new_for_http())
}

pub(crate) fn render<T: Template>(status: StatusCode, page: &T) -> Response {
    match page.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => AppError::Internal(format!("template error: {}", e)).into_response(),
    }
}
