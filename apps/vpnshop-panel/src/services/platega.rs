use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use vpnshop_db::models::order::OrderStatus;
use vpnshop_shared::platega::{
    self, CreateTransactionRequest, CreateTransactionResponse, PaymentDetails, TransactionStatusResponse,
};

use crate::settings::PlategaSettings;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network failure or timeout; the caller may retry.
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),

    /// The gateway refused the request or answered with something unusable.
    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTransaction {
    pub amount: i64,
    pub currency: String,
    pub order_id: String,
    pub description: String,
    pub return_url: String,
    pub failed_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedTransaction {
    pub payment_url: String,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Canceled,
    Other(String),
    /// The poll itself failed.
    Unknown,
}

impl TransactionStatus {
    pub fn from_gateway(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            platega::STATUS_CONFIRMED => TransactionStatus::Confirmed,
            platega::STATUS_PENDING => TransactionStatus::Pending,
            platega::STATUS_CANCELED => TransactionStatus::Canceled,
            "" => TransactionStatus::Unknown,
            _ => TransactionStatus::Other(raw.trim().to_string()),
        }
    }

    /// Terminal order status this result settles to, if any.
    pub fn resolved(&self) -> Option<OrderStatus> {
        match self {
            TransactionStatus::Confirmed => Some(OrderStatus::Success),
            TransactionStatus::Canceled | TransactionStatus::Other(_) => Some(OrderStatus::Failed),
            TransactionStatus::Pending | TransactionStatus::Unknown => None,
        }
    }

    /// Status a webhook settles the order to. Only a confirmation pays.
    pub fn settled_by_callback(&self) -> OrderStatus {
        match self {
            TransactionStatus::Confirmed => OrderStatus::Success,
            _ => OrderStatus::Failed,
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a remote transaction and return the hosted payment page.
    async fn create_transaction(&self, req: &CreateTransaction) -> Result<CreatedTransaction, GatewayError>;

    /// Best-effort status poll; failures come back as `Unknown`.
    async fn transaction_status(&self, transaction_id: &str) -> TransactionStatus;

    fn name(&self) -> &str;
}

pub struct PlategaClient {
    client: Client,
    base_url: String,
    merchant_id: String,
    secret: String,
    payment_method: i32,
    create_timeout: Duration,
    status_timeout: Duration,
}

impl PlategaClient {
    pub fn new(settings: &PlategaSettings) -> Self {
        if !settings.is_configured() {
            warn!("Platega credentials are not fully configured, payments will fail");
        }

        Self {
            client: Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            merchant_id: settings.merchant_id.clone(),
            secret: settings.secret.clone(),
            payment_method: settings.payment_method,
            create_timeout: settings.create_timeout(),
            status_timeout: settings.status_timeout(),
        }
    }

    fn classify(err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Unavailable(format!("timed out: {}", err))
        } else {
            GatewayError::Unavailable(err.to_string())
        }
    }

    async fn poll(&self, transaction_id: &str) -> Result<TransactionStatus, GatewayError> {
        let url = format!(
            "{}{}/{}",
            self.base_url,
            platega::TRANSACTION_PATH,
            urlencoding::encode(transaction_id)
        );

        let resp = self
            .client
            .get(&url)
            .header(platega::MERCHANT_HEADER, &self.merchant_id)
            .header(platega::SECRET_HEADER, &self.secret)
            .timeout(self.status_timeout)
            .send()
            .await
            .map_err(Self::classify)?;

        let status = resp.status();
        let text = resp.text().await.map_err(Self::classify)?;
        if !status.is_success() {
            return Err(GatewayError::Rejected(format!("HTTP {}: {}", status, truncate(&text))));
        }

        let body: TransactionStatusResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Rejected(format!("unreadable status body: {}", e)))?;

        Ok(body
            .status
            .as_deref()
            .map(TransactionStatus::from_gateway)
            .unwrap_or(TransactionStatus::Unknown))
    }
}

#[async_trait]
impl PaymentGateway for PlategaClient {
    async fn create_transaction(&self, req: &CreateTransaction) -> Result<CreatedTransaction, GatewayError> {
        info!("Creating Platega transaction for order {}: {} {}", req.order_id, req.amount, req.currency);

        let body = CreateTransactionRequest {
            payment_method: self.payment_method,
            payment_details: PaymentDetails {
                amount: req.amount as f64,
                currency: req.currency.clone(),
            },
            description: req.description.clone(),
            return_url: req.return_url.clone(),
            failed_url: req.failed_url.clone(),
            payload: req.order_id.clone(),
        };

        let resp = self
            .client
            .post(format!("{}{}", self.base_url, platega::CREATE_TRANSACTION_PATH))
            .header(platega::MERCHANT_HEADER, &self.merchant_id)
            .header(platega::SECRET_HEADER, &self.secret)
            .json(&body)
            .timeout(self.create_timeout)
            .send()
            .await
            .map_err(Self::classify)?;

        let status = resp.status();
        let text = resp.text().await.map_err(Self::classify)?;
        info!("Platega answered {} for order {}", status, req.order_id);

        if !status.is_success() {
            error!("Platega rejected order {}: HTTP {} {}", req.order_id, status, truncate(&text));
            return Err(GatewayError::Rejected(format!("HTTP {}", status)));
        }

        let parsed: CreateTransactionResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Rejected(format!("unreadable response: {}", e)))?;

        match parsed.payment_url() {
            Some(url) => Ok(CreatedTransaction {
                payment_url: url.to_string(),
                transaction_id: parsed.gateway_transaction_id(),
            }),
            None => {
                error!("Platega returned no payment link for order {}: {}", req.order_id, truncate(&text));
                Err(GatewayError::Rejected("response has no payment URL".to_string()))
            }
        }
    }

    async fn transaction_status(&self, transaction_id: &str) -> TransactionStatus {
        match self.poll(transaction_id).await {
            Ok(status) => {
                info!("Platega transaction {} is {:?}", transaction_id, status);
                status
            }
            Err(e) => {
                warn!("Status poll for {} failed: {}", transaction_id, e);
                TransactionStatus::Unknown
            }
        }
    }

    fn name(&self) -> &str {
        "platega"
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(300) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
