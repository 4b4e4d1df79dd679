use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::order::OrderStatus;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

// ============================================================================
// Notification Dispatcher - Best-Effort Side Channel
// ============================================================================
//
// Fan-out of lifecycle events to the notification service (email/SMS).
// Strictly best-effort: the engine fires these without awaiting the outcome
// and a failure never reaches the caller.
//
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OrderNotification {
    OrderConfirmationRequested {
        order_id: Uuid,
        customer_id: Uuid,
        restaurant_id: Uuid,
    },
    OrderStatusChanged {
        order_id: Uuid,
        customer_id: Uuid,
        status: OrderStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        estimated_delivery_time: Option<DateTime<Utc>>,
    },
    OrderCancelled {
        order_id: Uuid,
        restaurant_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        delivery_person_id: Option<Uuid>,
    },
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: OrderNotification) -> anyhow::Result<()>;
}

// ============================================================================
// Channel Dispatcher
// ============================================================================
//
// Hands serialized events to a delivery channel behind a circuit breaker, so
// a flapping notification service is skipped instead of slowing transitions.
//
// ============================================================================

/// Where a serialized notification ends up. The default sink logs the
/// payload; a real deployment would post it to the notification service.
pub trait NotificationSink: Send + Sync {
    fn send(&self, payload: &str) -> anyhow::Result<()>;
}

pub struct LogSink;

impl NotificationSink for LogSink {
    fn send(&self, payload: &str) -> anyhow::Result<()> {
        tracing::info!(payload = %payload, "Notification dispatched");
        Ok(())
    }
}

pub struct ChannelDispatcher {
    sink: Box<dyn NotificationSink>,
    breaker: CircuitBreaker,
}

impl ChannelDispatcher {
    pub fn new(sink: Box<dyn NotificationSink>) -> Self {
        Self {
            sink,
            breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
        }
    }

    pub fn with_breaker(sink: Box<dyn NotificationSink>, config: CircuitBreakerConfig) -> Self {
        Self {
            sink,
            breaker: CircuitBreaker::new(config),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for ChannelDispatcher {
    async fn dispatch(&self, notification: OrderNotification) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&notification)?;

        let result = self.breaker.call(async { self.sink.send(&payload) }).await;

        match result {
            Ok(()) => Ok(()),
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::warn!("Notification skipped, circuit breaker open");
                Err(anyhow::anyhow!("notification circuit open"))
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::error!(error = %e, "Failed to dispatch notification");
                Err(e)
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
