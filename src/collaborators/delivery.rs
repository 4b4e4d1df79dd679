use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::order::{DeliveryAddress, ESTIMATED_DELIVERY_MINUTES};

// ============================================================================
// Delivery Assignment - Collaborator Contract
// ============================================================================
//
// Picks the available courier with the fewest prior deliveries. The check
// and the availability flip happen under one write guard, so two concurrent
// confirmations can never grab the same courier (the original kept a shared
// flag that whichever request reached first would win).
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct Assignment {
    pub delivery_person_id: Uuid,
    pub estimated_delivery_time: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AssignmentError {
    #[error("No delivery personnel available at the moment")]
    NoCourierAvailable,

    #[error("Delivery assignment failed: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DeliveryAssignment: Send + Sync {
    async fn assign(
        &self,
        order_id: Uuid,
        restaurant_id: Uuid,
        delivery_address: &DeliveryAddress,
    ) -> Result<Assignment, AssignmentError>;

    /// Restore a courier to the pool once their delivery completes.
    async fn mark_delivered(&self, delivery_person_id: Uuid);
}

// ============================================================================
// Courier Pool
// ============================================================================

#[derive(Debug, Clone)]
pub struct Courier {
    pub id: Uuid,
    pub name: String,
    pub is_available: bool,
    pub delivery_count: u32,
}

impl Courier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            is_available: true,
            delivery_count: 0,
        }
    }
}

#[derive(Default)]
pub struct CourierPool {
    couriers: RwLock<HashMap<Uuid, Courier>>,
}

impl CourierPool {
    pub fn new(couriers: Vec<Courier>) -> Self {
        Self {
            couriers: RwLock::new(couriers.into_iter().map(|c| (c.id, c)).collect()),
        }
    }

    pub async fn courier(&self, id: Uuid) -> Option<Courier> {
        self.couriers.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl DeliveryAssignment for CourierPool {
    async fn assign(
        &self,
        order_id: Uuid,
        restaurant_id: Uuid,
        _delivery_address: &DeliveryAddress,
    ) -> Result<Assignment, AssignmentError> {
        let mut couriers = self.couriers.write().await;

        // Least-loaded selection and the availability flip share one guard.
        let candidate = couriers
            .values_mut()
            .filter(|c| c.is_available)
            .min_by_key(|c| c.delivery_count)
            .ok_or(AssignmentError::NoCourierAvailable)?;

        candidate.is_available = false;
        candidate.delivery_count += 1;

        tracing::info!(
            order_id = %order_id,
            restaurant_id = %restaurant_id,
            delivery_person_id = %candidate.id,
            delivery_count = candidate.delivery_count,
            "Courier assigned"
        );

        Ok(Assignment {
            delivery_person_id: candidate.id,
            estimated_delivery_time: Utc::now() + Duration::minutes(ESTIMATED_DELIVERY_MINUTES),
        })
    }

    async fn mark_delivered(&self, delivery_person_id: Uuid) {
        let mut couriers = self.couriers.write().await;
        if let Some(courier) = couriers.get_mut(&delivery_person_id) {
            courier.is_available = true;
            tracing::info!(
                delivery_person_id = %delivery_person_id,
                "Courier returned to pool"
            );
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
