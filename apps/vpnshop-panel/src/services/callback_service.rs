use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use tracing::{error, info, warn};
use vpnshop_db::StoreError;
use vpnshop_db::models::order::{Order, StatusUpdate};
use vpnshop_db::repositories::OrderRepository;
use vpnshop_shared::platega::{self, CallbackPayload};

use crate::error::CallbackError;
use crate::services::platega::TransactionStatus;
use crate::settings::Settings;

/// Tells a buyer their payment went through.
#[async_trait]
pub trait PaymentNotifier: Send + Sync {
    async fn payment_confirmed(&self, order: &Order, deliverable_url: &str) -> anyhow::Result<()>;
}

pub struct CallbackService {
    repo: OrderRepository,
    notifier: Arc<dyn PaymentNotifier>,
    settings: Arc<Settings>,
}

impl CallbackService {
    pub fn new(repo: OrderRepository, notifier: Arc<dyn PaymentNotifier>, settings: Arc<Settings>) -> Self {
        Self {
            repo,
            notifier,
            settings,
        }
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<(), CallbackError> {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);
        let expected = &self.settings.platega;

        let merchant_ok = header(platega::MERCHANT_HEADER) == Some(expected.merchant_id.as_str());
        let secret_ok = header(platega::SECRET_HEADER) == Some(expected.secret.as_str());
        if merchant_ok && secret_ok && expected.is_configured() {
            Ok(())
        } else {
            Err(CallbackError::Unauthorized)
        }
    }

    /// Applies one gateway webhook to the order it names.
    ///
    /// Redelivery of the same callback is answered with
    /// [`StatusUpdate::Unchanged`]; an attempt to move a settled order to a
    /// different status comes back as [`StatusUpdate::Rejected`].
    pub async fn ingest(&self, headers: &HeaderMap, body: &[u8]) -> Result<StatusUpdate, CallbackError> {
        let payload: CallbackPayload = serde_json::from_slice(body)
            .map_err(|e| CallbackError::Malformed(format!("invalid JSON: {}", e)))?;

        let order_id = payload
            .payload
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CallbackError::Malformed("missing order id".to_string()))?
            .to_string();
        let gateway_status = payload
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CallbackError::Malformed("missing status".to_string()))?;

        if self.settings.platega.verify_callbacks {
            self.authenticate(headers)?;
        }

        let new_status = TransactionStatus::from_gateway(gateway_status).settled_by_callback();
        let tx_id = payload.transaction_id();
        info!(
            "Callback for order {}: gateway status {}, transaction {:?}",
            order_id, gateway_status, tx_id
        );

        let update = match self.repo.update_status(&order_id, new_status, tx_id.as_deref()).await {
            Ok(update) => update,
            Err(StoreError::NotFound) => return Err(CallbackError::UnknownOrder(order_id)),
            Err(e) => return Err(e.into()),
        };

        match &update {
            StatusUpdate::Applied(order) => {
                info!("Order {} is now {}", order.order_id, order.status);
                if order.is_paid() {
                    let url = self.settings.deliverable_url(&order.fulfillment_token);
                    if let Err(e) = self.notifier.payment_confirmed(order, &url).await {
                        error!("Failed to notify user {} about order {}: {}", order.owner_id, order.order_id, e);
                    }
                }
            }
            StatusUpdate::Unchanged(order) => {
                info!("Duplicate callback for order {} ({})", order.order_id, order.status);
            }
            StatusUpdate::Rejected(order) => {
                warn!(
                    "Ignoring callback moving settled order {} from {} to {}",
                    order.order_id, order.status, new_status
                );
            }
        }

        Ok(update)
    }
}
