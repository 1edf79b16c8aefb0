use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};
use tracing::{error, info};

use crate::AppState;
use crate::bot::{keyboards, messages};
use crate::error::OrderError;

/// Orders listed under the buyer's status.
const RECENT_ORDERS_LIMIT: i64 = 5;

pub async fn message_handler(bot: Bot, msg: Message, state: AppState) -> Result<(), teloxide::RequestError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };

    let tg_id = from.id.0 as i64;
    let command = text.split_whitespace().next().unwrap_or("").to_ascii_lowercase();
    // Group chats deliver `/cmd@botname`.
    let command = command.split('@').next().unwrap_or("").to_string();

    match command.as_str() {
        "/start" => {
            let param = text.split_whitespace().nth(1).unwrap_or("");
            if let Err(e) = state
                .users
                .upsert(tg_id, from.username.as_deref(), Some(from.first_name.as_str()))
                .await
            {
                error!("Failed to upsert user {} on /start: {}", tg_id, e);
            }

            if let Some(reply) = messages::return_from_gateway(param) {
                bot.send_message(msg.chat.id, reply).parse_mode(ParseMode::Html).await?;
            }

            bot.send_message(msg.chat.id, messages::welcome(Some(from.first_name.as_str()), &state.settings))
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboards::main_menu())
                .await?;
            Ok(())
        }
        "/buy" => start_purchase(&bot, msg.chat.id, tg_id, from.username.as_deref(), &state).await,
        "/help" => send_help(&bot, msg.chat.id, &state).await,
        "/status" => send_status(&bot, msg.chat.id, tg_id, Some(from.first_name.as_str()), &state).await,
        "/admin" => send_admin_panel(&bot, msg.chat.id, tg_id, &state).await,
        _ => {
            bot.send_message(msg.chat.id, "Используйте /start, чтобы открыть меню.").await?;
            Ok(())
        }
    }
}

/// Creates an order and replies with the payment buttons.
pub async fn start_purchase(
    bot: &Bot,
    chat_id: ChatId,
    tg_id: i64,
    username: Option<&str>,
    state: &AppState,
) -> Result<(), teloxide::RequestError> {
    let loading = bot
        .send_message(chat_id, messages::CREATING_PAYMENT)
        .parse_mode(ParseMode::Html)
        .await?;

    let result = state.orders.initiate_purchase(tg_id, state.settings.price, username).await;
    let _ = bot.delete_message(chat_id, loading.id).await;

    match result {
        Ok(outcome) => {
            info!("Issued payment link for order {}", outcome.order.order_id);
            bot.send_message(chat_id, messages::invoice(&outcome.order))
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboards::payment_keyboard(&outcome.payment_url, &outcome.order.order_id))
                .await?;
        }
        Err(OrderError::PaymentUnavailable(_)) => {
            bot.send_message(chat_id, messages::PAYMENT_UNAVAILABLE)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Err(e) => {
            error!("Purchase for user {} failed: {}", tg_id, e);
            bot.send_message(chat_id, messages::INTERNAL_ERROR).await?;
        }
    }
    Ok(())
}

pub async fn send_help(bot: &Bot, chat_id: ChatId, state: &AppState) -> Result<(), teloxide::RequestError> {
    bot.send_message(chat_id, messages::help(&state.settings))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn send_status(
    bot: &Bot,
    chat_id: ChatId,
    tg_id: i64,
    first_name: Option<&str>,
    state: &AppState,
) -> Result<(), teloxide::RequestError> {
    let loaded = match state.order_repo.owner_summary(tg_id).await {
        Ok(summary) => state
            .order_repo
            .list_for_owner(tg_id, RECENT_ORDERS_LIMIT)
            .await
            .map(|recent| (summary, recent)),
        Err(e) => Err(e),
    };
    let (summary, recent) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Failed to load orders of {}: {}", tg_id, e);
            bot.send_message(chat_id, messages::INTERNAL_ERROR).await?;
            return Ok(());
        }
    };

    bot.send_message(chat_id, messages::owner_status(tg_id, first_name, &summary, &recent))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn send_admin_panel(
    bot: &Bot,
    chat_id: ChatId,
    tg_id: i64,
    state: &AppState,
) -> Result<(), teloxide::RequestError> {
    if !state.settings.is_admin(tg_id) {
        bot.send_message(chat_id, messages::ACCESS_DENIED).await?;
        return Ok(());
    }

    let (users, totals) = match (state.users.count().await, state.order_repo.totals().await) {
        (Ok(users), Ok(totals)) => (users, totals),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to load admin statistics: {}", e);
            bot.send_message(chat_id, messages::INTERNAL_ERROR).await?;
            return Ok(());
        }
    };

    bot.send_message(chat_id, messages::admin_panel(users, &totals, &state.settings.currency))
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::admin_menu())
        .await?;
    Ok(())
}
