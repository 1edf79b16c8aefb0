use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use vpnshop_db::db::init_memory_db;
use vpnshop_db::models::order::{NewOrder, OrderStatus};
use vpnshop_panel::bot_manager::BotManager;
use vpnshop_panel::handlers::router;
use vpnshop_panel::services::platega::{
    CreateTransaction, CreatedTransaction, GatewayError, PaymentGateway, TransactionStatus,
};
use vpnshop_panel::settings::Settings;
use vpnshop_panel::AppState;

struct OfflineGateway;

#[async_trait]
impl PaymentGateway for OfflineGateway {
    async fn create_transaction(&self, _req: &CreateTransaction) -> Result<CreatedTransaction, GatewayError> {
        Err(GatewayError::Unavailable("offline".into()))
    }

    async fn transaction_status(&self, _transaction_id: &str) -> TransactionStatus {
        TransactionStatus::Unknown
    }

    fn name(&self) -> &str {
        "offline"
    }
}

fn settings() -> Settings {
    Settings {
        bot_username: "shopbot".into(),
        web_url: "https://vpn.example.org".into(),
        ..Settings::default()
    }
}

async fn app_with(settings: Settings) -> (Router, AppState) {
    let pool = init_memory_db().await.unwrap();
    let settings = Arc::new(settings);
    let state = AppState::new(
        pool,
        settings.clone(),
        Arc::new(OfflineGateway),
        Arc::new(BotManager::new(settings.vpn_duration_days)),
    );

    state
        .order_repo
        .create(&NewOrder {
            order_id: "vpn_42_1000".into(),
            owner_id: 42,
            amount: 100,
            currency: "RUB".into(),
            description: Some("VPN доступ для 42 на 30 дней".into()),
            fulfillment_token: "5f0c7d4e-1111-4a2b-9c3d-000000000042".into(),
        })
        .await
        .unwrap();

    (router(state.clone()), state)
}

async fn app() -> (Router, AppState) {
    app_with(settings()).await
}

fn callback(path: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(resp).await).unwrap()
}

const TOKEN: &str = "5f0c7d4e-1111-4a2b-9c3d-000000000042";

#[tokio::test]
async fn confirmed_payment_unlocks_access_page() {
    let (app, state) = app().await;
    let cb = r#"{"id":"tx-9","status":"CONFIRMED","payload":"vpn_42_1000"}"#;

    let resp = app.clone().oneshot(callback("/platega-callback", cb)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({ "status": "ok" }));

    let order = state.order_repo.get_by_order_id("vpn_42_1000").await.unwrap();
    assert_eq!(order.status, OrderStatus::Success);
    assert_eq!(order.external_transaction_id.as_deref(), Some("tx-9"));
    assert!(order.completed_at.is_some());

    // Redelivery changes nothing.
    let resp = app.clone().oneshot(callback("/platega-callback", cb)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(state.order_repo.get_by_order_id("vpn_42_1000").await.unwrap(), order);

    let resp = app.clone().oneshot(get(&format!("/vpn/{}", TOKEN))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_text(resp).await;
    assert!(html.contains(&format!("happvpn://config/{}", TOKEN)));
    assert!(html.contains("vpn_42_1000"));

    let resp = app.oneshot(get(&format!("/deliverable/{}", TOKEN))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn canceled_payment_keeps_page_locked() {
    let (app, state) = app().await;
    let cb = r#"{"id":"tx-9","status":"CANCELED","payload":"vpn_42_1000"}"#;

    let resp = app.clone().oneshot(callback("/payment-callback", cb)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let order = state.order_repo.get_by_order_id("vpn_42_1000").await.unwrap();
    assert_eq!(order.status, OrderStatus::Failed);

    let resp = app.oneshot(get(&format!("/vpn/{}", TOKEN))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn pending_order_page_requires_payment() {
    let (app, _) = app().await;
    let resp = app.oneshot(get(&format!("/vpn/{}", TOKEN))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn unknown_token_is_not_found() {
    let (app, _) = app().await;
    let resp = app.oneshot(get("/vpn/not-a-token")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(body_text(resp).await.contains("https://t.me/shopbot"));
}

#[tokio::test]
async fn unknown_order_callback_is_acknowledged() {
    let (app, state) = app().await;
    let cb = r#"{"id":"tx-1","status":"CONFIRMED","payload":"vpn_7_1"}"#;

    let resp = app.oneshot(callback("/platega-callback", cb)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({ "status": "ok" }));
    assert_eq!(state.order_repo.totals().await.unwrap().orders, 1);
}

#[tokio::test]
async fn malformed_callback_is_bad_request() {
    let (app, state) = app().await;

    for body in ["{not json", r#"{"status":"CONFIRMED"}"#, r#"{"payload":"vpn_42_1000"}"#] {
        let resp = app.clone().oneshot(callback("/platega-callback", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(body_json(resp).await["status"], "error");
    }

    let order = state.order_repo.get_by_order_id("vpn_42_1000").await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn callback_without_credentials_is_unauthorized_when_verification_is_on() {
    let mut settings = settings();
    settings.platega.merchant_id = "m-1".into();
    settings.platega.secret = "s-1".into();
    settings.platega.verify_callbacks = true;
    let (app, state) = app_with(settings).await;
    let cb = r#"{"id":"tx-9","status":"CONFIRMED","payload":"vpn_42_1000"}"#;

    let resp = app.clone().oneshot(callback("/platega-callback", cb)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        state.order_repo.get_by_order_id("vpn_42_1000").await.unwrap().status,
        OrderStatus::Pending
    );

    let req = Request::builder()
        .method("POST")
        .uri("/platega-callback")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-MerchantId", "m-1")
        .header("X-Secret", "s-1")
        .body(Body::from(cb))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn gateway_return_urls_redirect_to_bot() {
    let (app, _) = app().await;

    let resp = app.clone().oneshot(get("/success")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(resp.headers()[header::LOCATION], "https://t.me/shopbot?start=success");

    let resp = app.oneshot(get("/fail")).await.unwrap();
    assert_eq!(resp.headers()[header::LOCATION], "https://t.me/shopbot?start=fail");
}

#[tokio::test]
async fn static_pages_and_health() {
    let (app, _) = app().await;

    let resp = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
    assert!(body_text(resp).await.contains("100 RUB за 30 дней"));

    for path in ["/privacy", "/terms"] {
        let resp = app.clone().oneshot(get(path)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "{}", path);
    }

    let resp = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let health = body_json(resp).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["bot"], false);
}

#[tokio::test]
async fn failed_purchase_leaves_pending_order_behind() {
    let (_, state) = app().await;

    assert!(state.orders.initiate_purchase(77, 100, None).await.is_err());
    let orders = state.order_repo.list_for_owner(77, 10).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Pending);
}
