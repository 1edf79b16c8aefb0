use std::sync::Arc;

use sqlx::SqlitePool;
use vpnshop_db::repositories::{OrderRepository, UserRepository};

pub mod bot;
pub mod bot_manager;
pub mod cli;
pub mod error;
pub mod handlers;
pub mod services;
pub mod settings;

use bot_manager::BotManager;
use services::{CallbackService, OrderService, PaymentGateway};
use settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub bot_manager: Arc<BotManager>,
    pub orders: Arc<OrderService>,
    pub callbacks: Arc<CallbackService>,
    pub order_repo: OrderRepository,
    pub users: UserRepository,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        settings: Arc<Settings>,
        gateway: Arc<dyn PaymentGateway>,
        bot_manager: Arc<BotManager>,
    ) -> Self {
        let order_repo = OrderRepository::new(pool.clone());
        let users = UserRepository::new(pool);

        let orders = Arc::new(OrderService::new(
            order_repo.clone(),
            users.clone(),
            gateway,
            settings.clone(),
        ));
        let callbacks = Arc::new(CallbackService::new(
            order_repo.clone(),
            bot_manager.clone(),
            settings.clone(),
        ));

        Self {
            settings,
            bot_manager,
            orders,
            callbacks,
            order_repo,
            users,
        }
    }
}
