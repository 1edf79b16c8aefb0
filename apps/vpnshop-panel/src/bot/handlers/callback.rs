use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ChatId, ParseMode};
use tracing::{error, info, warn};

use crate::AppState;
use crate::bot::handlers::command::{send_admin_panel, send_help, send_status, start_purchase};
use crate::bot::{keyboards, messages};
use crate::error::OrderError;
use crate::services::order_service::OrderCheck;

const ADMIN_LIST_LIMIT: i64 = 10;

pub async fn callback_handler(bot: Bot, q: CallbackQuery, state: AppState) -> Result<(), teloxide::RequestError> {
    info!("Received callback: {:?}", q.data);
    let callback_id = q.id.clone();
    let tg_id = q.from.id.0 as i64;
    let chat_id = q
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or(ChatId(tg_id));
    let Some(data) = q.data.clone() else {
        bot.answer_callback_query(callback_id).await?;
        return Ok(());
    };

    match data.as_str() {
        keyboards::BUY_VPN => {
            bot.answer_callback_query(callback_id).await?;
            start_purchase(&bot, chat_id, tg_id, q.from.username.as_deref(), &state).await
        }
        keyboards::HELP => {
            bot.answer_callback_query(callback_id).await?;
            send_help(&bot, chat_id, &state).await
        }
        keyboards::STATUS => {
            bot.answer_callback_query(callback_id).await?;
            send_status(&bot, chat_id, tg_id, Some(q.from.first_name.as_str()), &state).await
        }
        keyboards::ADMIN_STATS => {
            bot.answer_callback_query(callback_id).await?;
            send_admin_panel(&bot, chat_id, tg_id, &state).await
        }
        keyboards::ADMIN_PAYMENTS | keyboards::ADMIN_USERS => {
            if !state.settings.is_admin(tg_id) {
                bot.answer_callback_query(callback_id)
                    .text(messages::ACCESS_DENIED)
                    .show_alert(true)
                    .await?;
                return Ok(());
            }
            bot.answer_callback_query(callback_id).await?;

            let text = if data == keyboards::ADMIN_PAYMENTS {
                state.order_repo.recent(ADMIN_LIST_LIMIT).await.map(|o| messages::admin_payments(&o))
            } else {
                state.users.recent(ADMIN_LIST_LIMIT).await.map(|u| messages::admin_users(&u))
            };
            let text = text.unwrap_or_else(|e| {
                error!("Failed to load admin list {}: {}", data, e);
                messages::INTERNAL_ERROR.to_string()
            });
            bot.send_message(chat_id, text).parse_mode(ParseMode::Html).await?;
            Ok(())
        }
        check if check.starts_with(keyboards::CHECK_PREFIX) => {
            let order_id = &check[keyboards::CHECK_PREFIX.len()..];
            check_order(&bot, &q, chat_id, order_id, &state).await
        }
        other => {
            warn!("Unknown callback data from {}: {}", tg_id, other);
            bot.answer_callback_query(callback_id).await?;
            Ok(())
        }
    }
}

async fn check_order(
    bot: &Bot,
    q: &CallbackQuery,
    chat_id: ChatId,
    order_id: &str,
    state: &AppState,
) -> Result<(), teloxide::RequestError> {
    let callback_id = q.id.clone();
    let tg_id = q.from.id.0 as i64;

    match state.orders.check_owned(order_id, tg_id).await {
        Ok(OrderCheck::Paid { token }) => {
            bot.answer_callback_query(callback_id).await?;
            let url = state.orders.deliverable_url(&token);
            let mut req = bot
                .send_message(chat_id, messages::payment_confirmed(state.settings.vpn_duration_days))
                .parse_mode(ParseMode::Html);
            if let Some(markup) = keyboards::deliverable_keyboard(&url) {
                req = req.reply_markup(markup);
            }
            req.await?;
        }
        Ok(OrderCheck::Pending) => {
            bot.answer_callback_query(callback_id)
                .text(messages::ORDER_PENDING)
                .show_alert(true)
                .await?;
        }
        Ok(OrderCheck::Failed) => {
            bot.answer_callback_query(callback_id)
                .text(messages::ORDER_FAILED)
                .show_alert(true)
                .await?;
        }
        Err(OrderError::NotFound) => {
            bot.answer_callback_query(callback_id)
                .text(messages::ORDER_NOT_FOUND)
                .show_alert(true)
                .await?;
        }
        Err(e) => {
            error!("Failed to check order {}: {}", order_id, e);
            bot.answer_callback_query(callback_id)
                .text(messages::INTERNAL_ERROR)
                .show_alert(true)
                .await?;
        }
    }
    Ok(())
}
