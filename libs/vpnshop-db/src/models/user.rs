use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Name shown to the user, falling back to the handle.
    pub fn display_name(&self) -> Option<&str> {
        self.first_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.username.as_deref().filter(|n| !n.is_empty()))
    }
}
