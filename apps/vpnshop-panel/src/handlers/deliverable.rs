use askama::Template;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::info;

use super::render;
use crate::AppState;
use crate::error::{AppError, OrderError};

#[derive(Template)]
#[template(path = "deliverable.html")]
pub struct DeliverableTemplate {
    pub owner_name: String,
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub paid_at: String,
    pub duration_days: i64,
    pub connect_link: String,
}

#[derive(Template)]
#[template(path = "unavailable.html")]
pub struct UnavailableTemplate {
    pub title: &'static str,
    pub reasons: Vec<&'static str>,
    pub bot_link: String,
}

/// Token-gated access page. Only paid orders get past this point.
pub async fn deliverable_page(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    let bot_link = state.settings.bot_link(None);

    match state.orders.fulfill(&token).await {
        Ok(deliverable) => {
            info!("Serving access page for order {}", deliverable.order.order_id);
            let order = &deliverable.order;
            let page = DeliverableTemplate {
                owner_name: deliverable.owner_name.clone().unwrap_or_else(|| "N/A".to_string()),
                order_id: order.order_id.clone(),
                amount: order.amount,
                currency: order.currency.clone(),
                paid_at: order
                    .completed_at
                    .unwrap_or(order.created_at)
                    .format("%d.%m.%Y %H:%M UTC")
                    .to_string(),
                duration_days: deliverable.duration_days,
                connect_link: deliverable.connect_link.clone(),
            };
            render(StatusCode::OK, &page)
        }
        Err(OrderError::NotFound) => render(
            StatusCode::NOT_FOUND,
            &UnavailableTemplate {
                title: "Конфигурация не найдена",
                reasons: vec!["Ссылка устарела или введена с ошибкой", "Срок действия истек"],
                bot_link,
            },
        ),
        Err(OrderError::NotPaid) => render(
            StatusCode::PAYMENT_REQUIRED,
            &UnavailableTemplate {
                title: "Заказ не оплачен",
                reasons: vec!["Платеж еще не подтвержден", "Платеж был отменен"],
                bot_link,
            },
        ),
        Err(e) => AppError::from(e).into_response(),
    }
}
