use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Success,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Success => "success",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "success" => Ok(OrderStatus::Success),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

/// One purchase attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: String,
    pub owner_id: i64,
    pub amount: i64,
    pub currency: String,
    pub description: Option<String>,
    pub status: OrderStatus,
    pub fulfillment_token: String,
    pub external_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.status == OrderStatus::Success
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: String,
    pub owner_id: i64,
    pub amount: i64,
    pub currency: String,
    pub description: Option<String>,
    pub fulfillment_token: String,
}

/// Result of a conditional status write.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    /// The order was pending and now carries the new status.
    Applied(Order),
    /// Already in the requested state; nothing written.
    Unchanged(Order),
    /// Terminal and a different status was requested; nothing written.
    Rejected(Order),
}

impl StatusUpdate {
    pub fn order(&self) -> &Order {
        match self {
            StatusUpdate::Applied(o) | StatusUpdate::Unchanged(o) | StatusUpdate::Rejected(o) => o,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            StatusUpdate::Applied(o) | StatusUpdate::Unchanged(o) | StatusUpdate::Rejected(o) => o,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OwnerSummary {
    pub total: i64,
    pub successful: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub orders: i64,
    pub successful: i64,
    pub income: i64,
}

#[cfg(test)]
mod tests {
    use super::OrderStatus;

    #[test]
    fn status_round_trips_through_text() {
        for status in [OrderStatus::Pending, OrderStatus::Success, OrderStatus::Failed] {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("CONFIRMED".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Success.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
    }
}
