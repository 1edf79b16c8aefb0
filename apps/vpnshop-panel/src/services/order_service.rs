use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;
use vpnshop_db::StoreError;
use vpnshop_db::models::order::{NewOrder, Order, OrderStatus, StatusUpdate};
use vpnshop_db::repositories::{OrderRepository, UserRepository};

use crate::error::OrderError;
use crate::services::platega::{CreateTransaction, PaymentGateway};
use crate::settings::Settings;

/// Fresh ids tried after the first one collides.
const ORDER_ID_RETRIES: usize = 3;

#[derive(Debug, Clone)]
pub struct PurchaseOutcome {
    pub order: Order,
    pub payment_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderCheck {
    Paid { token: String },
    Pending,
    Failed,
}

/// What a paid order unlocks.
#[derive(Debug, Clone)]
pub struct Deliverable {
    pub order: Order,
    pub owner_name: Option<String>,
    pub duration_days: i64,
    pub connect_link: String,
}

pub struct OrderService {
    repo: OrderRepository,
    users: UserRepository,
    gateway: Arc<dyn PaymentGateway>,
    settings: Arc<Settings>,
    last_stamp: AtomicI64,
}

impl OrderService {
    pub fn new(
        repo: OrderRepository,
        users: UserRepository,
        gateway: Arc<dyn PaymentGateway>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            repo,
            users,
            gateway,
            settings,
            last_stamp: AtomicI64::new(0),
        }
    }

    /// Wall-clock millis, bumped so no two calls return the same value.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.last_stamp.load(Ordering::Relaxed);
        loop {
            let next = if now > prev { now } else { prev + 1 };
            match self
                .last_stamp
                .compare_exchange_weak(prev, next, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    fn next_order_id(&self, owner_id: i64) -> String {
        format!("vpn_{}_{}", owner_id, self.next_stamp())
    }

    async fn create_pending(&self, owner_id: i64, amount: i64, description: &str) -> Result<Order, OrderError> {
        let mut last_err = None;

        for _ in 0..=ORDER_ID_RETRIES {
            let new_order = NewOrder {
                order_id: self.next_order_id(owner_id),
                owner_id,
                amount,
                currency: self.settings.currency.clone(),
                description: Some(description.to_string()),
                fulfillment_token: Uuid::new_v4().to_string(),
            };

            match self.repo.create(&new_order).await {
                Ok(order) => return Ok(order),
                Err(StoreError::DuplicateOrder(id)) => {
                    warn!("Order id {} already taken, generating a new one", id);
                    last_err = Some(StoreError::DuplicateOrder(id));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(OrderError::Store(
            last_err.unwrap_or_else(|| StoreError::DuplicateOrder(String::new())),
        ))
    }

    /// Creates a pending order and asks the gateway for a payment page.
    ///
    /// A gateway failure leaves the order pending and is reported as
    /// [`OrderError::PaymentUnavailable`]; the detail only goes to the log.
    pub async fn initiate_purchase(
        &self,
        owner_id: i64,
        amount: i64,
        owner_label: Option<&str>,
    ) -> Result<PurchaseOutcome, OrderError> {
        let label = owner_label
            .filter(|l| !l.is_empty())
            .map(|l| format!("@{}", l))
            .unwrap_or_else(|| owner_id.to_string());
        let description = format!(
            "VPN доступ для {} на {} дней",
            label, self.settings.vpn_duration_days
        );

        let order = self.create_pending(owner_id, amount, &description).await?;
        info!("Created order {} for user {} ({} {})", order.order_id, owner_id, amount, order.currency);

        let request = CreateTransaction {
            amount: order.amount,
            currency: order.currency.clone(),
            order_id: order.order_id.clone(),
            description,
            return_url: self.settings.success_url(),
            failed_url: self.settings.fail_url(),
        };

        let created = match self.gateway.create_transaction(&request).await {
            Ok(created) => created,
            Err(e) => {
                error!(
                    "Failed to create {} payment for order {}: {}",
                    self.gateway.name(),
                    order.order_id,
                    e
                );
                return Err(OrderError::PaymentUnavailable(e));
            }
        };

        let order = match created.transaction_id.as_deref() {
            Some(tx_id) => self
                .repo
                .update_status(&order.order_id, OrderStatus::Pending, Some(tx_id))
                .await?
                .into_order(),
            None => order,
        };

        Ok(PurchaseOutcome {
            order,
            payment_url: created.payment_url,
        })
    }

    /// Local view of an order; never contacts the gateway.
    pub async fn check_status(&self, order_id: &str) -> Result<OrderCheck, OrderError> {
        let order = self.repo.get_by_order_id(order_id).await?;
        Ok(Self::to_check(order))
    }

    /// Status check on behalf of a buyer. Orders owned by someone else are
    /// reported as missing and never polled.
    pub async fn check_owned(&self, order_id: &str, owner_id: i64) -> Result<OrderCheck, OrderError> {
        let order = self.repo.get_by_order_id(order_id).await?;
        if order.owner_id != owner_id {
            warn!("User {} asked about order {} owned by {}", owner_id, order_id, order.owner_id);
            return Err(OrderError::NotFound);
        }
        let order = self.settle_from_gateway(order).await?;
        Ok(Self::to_check(order))
    }

    /// Polls the gateway for a pending order and applies a settled result.
    pub async fn refresh_status(&self, order_id: &str) -> Result<Order, OrderError> {
        let order = self.repo.get_by_order_id(order_id).await?;
        self.settle_from_gateway(order).await
    }

    async fn settle_from_gateway(&self, order: Order) -> Result<Order, OrderError> {
        if order.status.is_terminal() {
            return Ok(order);
        }
        let Some(tx_id) = order.external_transaction_id.clone() else {
            return Ok(order);
        };

        let polled = self.gateway.transaction_status(&tx_id).await;
        let Some(new_status) = polled.resolved() else {
            return Ok(order);
        };

        match self.repo.update_status(&order.order_id, new_status, Some(&tx_id)).await? {
            StatusUpdate::Applied(updated) => {
                info!("Order {} settled as {} by status poll", updated.order_id, updated.status);
                Ok(updated)
            }
            other => Ok(other.into_order()),
        }
    }

    fn to_check(order: Order) -> OrderCheck {
        match order.status {
            OrderStatus::Success => OrderCheck::Paid {
                token: order.fulfillment_token,
            },
            OrderStatus::Pending => OrderCheck::Pending,
            OrderStatus::Failed => OrderCheck::Failed,
        }
    }

    pub async fn fulfill(&self, token: &str) -> Result<Deliverable, OrderError> {
        let order = self.repo.get_by_fulfillment_token(token).await?;
        if !order.is_paid() {
            return Err(OrderError::NotPaid);
        }

        let owner_name = match self.users.get_by_telegram_id(order.owner_id).await {
            Ok(user) => user.and_then(|u| u.display_name().map(str::to_string)),
            Err(e) => {
                warn!("Failed to load owner of order {}: {}", order.order_id, e);
                None
            }
        };

        Ok(Deliverable {
            connect_link: self.settings.connect_link(&order.fulfillment_token),
            duration_days: self.settings.vpn_duration_days,
            owner_name,
            order,
        })
    }

    pub fn deliverable_url(&self, token: &str) -> String {
        self.settings.deliverable_url(token)
    }
}
