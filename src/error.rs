use sea_orm::{DbErr, SqlErr};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while checking out or looking up an order.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{0}")]
    Validation(String),
    #[error("Order not found: {0}")]
    NotFound(String),
    #[error("Order {0} does not belong to the supplied email")]
    OwnershipMismatch(String),
    #[error("Order identifier already taken: {0}")]
    Conflict(String),
    #[error("Order database error: {0}")]
    Persistence(#[from] DbErr),
    #[error("Order database call exceeded {0:?}")]
    Timeout(Duration),
}

impl OrderError {
    pub fn validation(message: impl Into<String>) -> Self {
        OrderError::Validation(message.into())
    }

    /// Unique-constraint violations become `Conflict` so checkout can mint new
    /// identifiers; everything else stays a persistence failure.
    pub fn from_write(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => OrderError::Conflict(detail),
            _ => OrderError::Persistence(err),
        }
    }
}

pub type OrderResult<T> = Result<T, OrderError>;
