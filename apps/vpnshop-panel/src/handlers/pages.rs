use askama::Template;
use askama_web::WebTemplate;
use axum::{Json, extract::State, response::Redirect};
use serde_json::{Value, json};

use crate::AppState;

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub price: i64,
    pub currency: String,
    pub duration_days: i64,
    pub bot_link: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "privacy.html")]
pub struct PrivacyTemplate {
    pub bot_link: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "terms.html")]
pub struct TermsTemplate {
    pub price: i64,
    pub currency: String,
    pub duration_days: i64,
    pub bot_link: String,
}

pub async fn index(State(state): State<AppState>) -> IndexTemplate {
    IndexTemplate {
        price: state.settings.price,
        currency: state.settings.currency.clone(),
        duration_days: state.settings.vpn_duration_days,
        bot_link: state.settings.bot_link(None),
    }
}

pub async fn privacy(State(state): State<AppState>) -> PrivacyTemplate {
    PrivacyTemplate {
        bot_link: state.settings.bot_link(None),
    }
}

pub async fn terms(State(state): State<AppState>) -> TermsTemplate {
    TermsTemplate {
        price: state.settings.price,
        currency: state.settings.currency.clone(),
        duration_days: state.settings.vpn_duration_days,
        bot_link: state.settings.bot_link(None),
    }
}

/// Gateway `return` URL.
pub async fn payment_success(State(state): State<AppState>) -> Redirect {
    Redirect::temporary(&state.settings.bot_link(Some("success")))
}

/// Gateway `failedUrl`.
pub async fn payment_fail(State(state): State<AppState>) -> Redirect {
    Redirect::temporary(&state.settings.bot_link(Some("fail")))
}

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "bot": state.bot_manager.is_running().await
    }))
}
