use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order {0} already exists")]
    DuplicateOrder(String),

    #[error("record not found")]
    NotFound,

    #[error("malformed row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
    }
}
