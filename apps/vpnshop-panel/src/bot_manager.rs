use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use vpnshop_db::models::order::Order;

use crate::bot::{keyboards, messages};
use crate::services::PaymentNotifier;

/// Owns the Telegram client and the dispatcher task.
pub struct BotManager {
    shutdown_sender: broadcast::Sender<()>,
    current_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    current_bot: Arc<Mutex<Option<Bot>>>,
    bot_username: Arc<RwLock<Option<String>>>,
    duration_days: i64,
}

impl BotManager {
    pub fn new(duration_days: i64) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            shutdown_sender: tx,
            current_handle: Arc::new(Mutex::new(None)),
            current_bot: Arc::new(Mutex::new(None)),
            bot_username: Arc::new(RwLock::new(None)),
            duration_days,
        }
    }

    /// Validates the token and keeps the client for outgoing messages only.
    pub async fn connect(&self, token: &str) -> bool {
        let bot = Bot::new(token);

        match bot.get_me().await {
            Ok(me) => {
                let username = me.user.username.clone();
                match &username {
                    Some(name) => info!("Bot connected as @{}", name),
                    None => info!("Bot connected but username is not set"),
                }
                *self.bot_username.write().await = username;
            }
            Err(e) => {
                error!("Failed to validate bot token: {}", e);
                return false;
            }
        }

        *self.current_bot.lock().await = Some(bot);
        true
    }

    pub async fn start_bot(&self, token: &str, state: crate::AppState) -> bool {
        let mut handle_lock = self.current_handle.lock().await;

        if let Some(existing) = handle_lock.as_ref() {
            if existing.is_finished() {
                info!("Detected finished bot task. Cleaning stale handle.");
                *handle_lock = None;
            } else {
                warn!("Bot is already running, stop it first");
                return false;
            }
        }

        info!("Starting bot...");
        if !self.connect(token).await {
            return false;
        }
        let Ok(bot) = self.get_bot().await else {
            return false;
        };

        let shutdown_rx = self.shutdown_sender.subscribe();
        let handle = tokio::spawn(async move {
            info!("Bot task started with dispatcher mode");
            crate::bot::run_bot(bot, shutdown_rx, state).await;
            info!("Bot dispatcher task finished");
        });

        *handle_lock = Some(handle);
        true
    }

    pub async fn stop_bot(&self) -> bool {
        let mut handle_lock = self.current_handle.lock().await;

        if let Some(handle) = handle_lock.take() {
            info!("Sending shutdown signal to bot...");
            let _ = self.shutdown_sender.send(());
            let _ = handle.await;
            info!("Bot task stopped");

            *self.bot_username.write().await = None;
            *self.current_bot.lock().await = None;
            true
        } else {
            warn!("Bot is not running");
            false
        }
    }

    pub async fn is_running(&self) -> bool {
        let handle_lock = self.current_handle.lock().await;
        handle_lock.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub async fn get_bot(&self) -> Result<Bot, String> {
        let bot_lock = self.current_bot.lock().await;
        bot_lock.clone().ok_or_else(|| "Bot not running".to_string())
    }

    pub async fn get_username(&self) -> Option<String> {
        self.bot_username.read().await.clone()
    }

    pub async fn send_notification(
        &self,
        chat_id: i64,
        text: &str,
        button: Option<teloxide::types::InlineKeyboardMarkup>,
    ) -> Result<(), teloxide::RequestError> {
        let bot_lock = self.current_bot.lock().await;
        let Some(bot) = bot_lock.as_ref() else {
            warn!("Cannot send notification: bot is not running");
            return Ok(());
        };

        let mut req = bot.send_message(ChatId(chat_id), text).parse_mode(ParseMode::Html);
        if let Some(markup) = button {
            req = req.reply_markup(markup);
        }
        req.await?;
        Ok(())
    }
}

#[async_trait]
impl PaymentNotifier for BotManager {
    async fn payment_confirmed(&self, order: &Order, deliverable_url: &str) -> anyhow::Result<()> {
        self.send_notification(
            order.owner_id,
            &messages::payment_confirmed(self.duration_days),
            keyboards::deliverable_keyboard(deliverable_url),
        )
        .await?;
        info!("Sent access link for order {} to {}", order.order_id, order.owner_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_manager_reports_not_running() {
        let manager = BotManager::new(30);
        assert!(!manager.is_running().await);
        assert!(manager.get_bot().await.is_err());
        assert!(manager.get_username().await.is_none());
        assert!(!manager.stop_bot().await);
    }

    #[tokio::test]
    async fn notification_without_bot_is_dropped() {
        let manager = BotManager::new(30);
        manager.send_notification(42, "hello", None).await.unwrap();
    }
}
