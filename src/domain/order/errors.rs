use uuid::Uuid;

use super::value_objects::OrderStatus;

// ============================================================================
// Order Lifecycle Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0} is currently unavailable")]
    ItemUnavailable(String),

    #[error("Restaurant is currently closed")]
    RestaurantClosed,

    #[error("Total amount mismatch: submitted {submitted}, computed {computed}")]
    TotalMismatch { submitted: f64, computed: f64 },

    #[error("No order found with id {0}")]
    NotFound(Uuid),

    #[error("{0}")]
    Forbidden(String),

    #[error("Cannot transition order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Concurrent update detected for order {0}, retry the request")]
    Conflict(Uuid),

    #[error("Storage failure: {0}")]
    Storage(String),
}
