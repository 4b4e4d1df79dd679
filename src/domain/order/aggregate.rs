use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;
use super::value_objects::{
    DeliveryAddress, OrderItem, OrderStatus, PaymentMethod, PaymentStatus,
};

// ============================================================================
// Order Aggregate
// ============================================================================

/// Flat delivery fee applied when the caller does not supply one.
pub const DEFAULT_DELIVERY_FEE: f64 = 150.0;

/// Allowed gap between the submitted and the computed total, in currency units.
pub const TOTAL_TOLERANCE: f64 = 1.0;

/// Fixed delivery estimate applied when an order is confirmed.
pub const ESTIMATED_DELIVERY_MINUTES: i64 = 45;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Optimistic-concurrency counter, bumped by the store on every write.
    pub version: i64,

    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,

    pub total_amount: f64,
    pub delivery_fee: f64,
    pub delivery_address: DeliveryAddress,

    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_person_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_delivery_time: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a new pending order from already-snapshotted items.
    ///
    /// The engine resolves menu snapshots and cross-checks the submitted
    /// total before calling this; the aggregate only enforces its own
    /// structural invariants.
    pub fn create(
        customer_id: Uuid,
        restaurant_id: Uuid,
        items: Vec<OrderItem>,
        delivery_address: DeliveryAddress,
        payment_method: PaymentMethod,
        delivery_fee: f64,
        total_amount: f64,
        special_instructions: Option<String>,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::Validation(
                "An order must contain at least one item".to_string(),
            ));
        }
        if let Some(item) = items.iter().find(|i| i.quantity == 0) {
            return Err(OrderError::Validation(format!(
                "Invalid quantity for {}",
                item.name
            )));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            version: 0,
            customer_id,
            restaurant_id,
            items,
            status: OrderStatus::Pending,
            total_amount,
            delivery_fee,
            delivery_address,
            payment_method,
            payment_status: PaymentStatus::Pending,
            payment_id: None,
            delivery_person_id: None,
            estimated_delivery_time: None,
            special_instructions,
            created_at: now,
            updated_at: now,
        })
    }

    /// Sum of snapshot line totals plus the delivery fee.
    pub fn computed_total(items: &[OrderItem], delivery_fee: f64) -> f64 {
        items.iter().map(OrderItem::line_total).sum::<f64>() + delivery_fee
    }

    /// Move to an already-validated next status.
    pub fn apply_status(&mut self, next: OrderStatus) {
        self.status = next;
        self.touch();
    }

    /// Stamp the fixed delivery estimate; used on confirmation.
    pub fn set_delivery_estimate(&mut self, now: DateTime<Utc>) {
        self.estimated_delivery_time = Some(now + Duration::minutes(ESTIMATED_DELIVERY_MINUTES));
        self.touch();
    }

    /// Record the assigned courier. Set at most once: a second assignment
    /// attempt is ignored rather than reassigned.
    pub fn assign_courier(&mut self, courier_id: Uuid) {
        if self.delivery_person_id.is_none() {
            self.delivery_person_id = Some(courier_id);
            self.touch();
        }
    }

    pub fn record_payment_id(&mut self, payment_id: Uuid) {
        if self.payment_id.is_none() {
            self.payment_id = Some(payment_id);
            self.touch();
        }
    }

    /// Mirror a payment-service status onto the order.
    pub fn set_payment_status(&mut self, status: PaymentStatus) {
        self.payment_status = status;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
