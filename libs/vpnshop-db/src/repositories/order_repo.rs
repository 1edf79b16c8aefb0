use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::error::StoreError;
use crate::models::order::{NewOrder, Order, OrderStatus, OrderTotals, OwnerSummary, StatusUpdate};

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_order(row: &SqliteRow) -> Result<Order, StoreError> {
        let status: String = row.try_get("status")?;
        let status = status.parse::<OrderStatus>().map_err(StoreError::Corrupt)?;

        Ok(Order {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            owner_id: row.try_get("owner_id")?,
            amount: row.try_get("amount")?,
            currency: row.try_get("currency")?,
            description: row.try_get("description")?,
            status,
            fulfillment_token: row.try_get("fulfillment_token")?,
            external_transaction_id: row.try_get("external_transaction_id")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            completed_at: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?,
        })
    }

    /// Inserts a new pending order.
    pub async fn create(&self, new: &NewOrder) -> Result<Order, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders (order_id, owner_id, amount, currency, description, status, fulfillment_token, created_at)
            VALUES (?, ?, ?, ?, ?, 'pending', ?, ?)
            RETURNING *
            "#,
        )
        .bind(&new.order_id)
        .bind(new.owner_id)
        .bind(new.amount)
        .bind(&new.currency)
        .bind(&new.description)
        .bind(&new.fulfillment_token)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;

        match row {
            Ok(row) => Self::row_to_order(&row),
            Err(e) if StoreError::is_unique_violation(&e) => {
                Err(StoreError::DuplicateOrder(new.order_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_by_order_id(&self, order_id: &str) -> Result<Order, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE order_id = ?")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_order).transpose()?.ok_or(StoreError::NotFound)
    }

    pub async fn get_by_fulfillment_token(&self, token: &str) -> Result<Order, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE fulfillment_token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_order).transpose()?.ok_or(StoreError::NotFound)
    }

    /// The only write path after creation. A single conditional statement
    /// keyed by `order_id`: only pending rows move, terminal rows never do.
    pub async fn update_status(
        &self,
        order_id: &str,
        new_status: OrderStatus,
        external_transaction_id: Option<&str>,
    ) -> Result<StatusUpdate, StoreError> {
        let completed_at = new_status.is_terminal().then(Utc::now);

        let row = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?,
                external_transaction_id = COALESCE(?, external_transaction_id),
                completed_at = COALESCE(?, completed_at)
            WHERE order_id = ? AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(new_status.as_str())
        .bind(external_transaction_id)
        .bind(completed_at)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(StatusUpdate::Applied(Self::row_to_order(&row)?));
        }

        let current = self.get_by_order_id(order_id).await?;
        if current.status == new_status {
            Ok(StatusUpdate::Unchanged(current))
        } else {
            Ok(StatusUpdate::Rejected(current))
        }
    }

    pub async fn list_for_owner(&self, owner_id: i64, limit: i64) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query("SELECT * FROM orders WHERE owner_id = ? ORDER BY id DESC LIMIT ?")
            .bind(owner_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_order).collect()
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query("SELECT * FROM orders ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_order).collect()
    }

    pub async fn owner_summary(&self, owner_id: i64) -> Result<OwnerSummary, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COALESCE(SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END), 0) AS successful
            FROM orders WHERE owner_id = ?
            "#,
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(OwnerSummary {
            total: row.try_get("total")?,
            successful: row.try_get("successful")?,
        })
    }

    pub async fn totals(&self) -> Result<OrderTotals, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS orders,
                   COALESCE(SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END), 0) AS successful,
                   COALESCE(SUM(CASE WHEN status = 'success' THEN amount ELSE 0 END), 0) AS income
            FROM orders
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(OrderTotals {
            orders: row.try_get("orders")?,
            successful: row.try_get("successful")?,
            income: row.try_get("income")?,
        })
    }
}
