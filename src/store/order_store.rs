use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::order::{Order, OrderError};

// ============================================================================
// Order Store - Persistence Contract
// ============================================================================
//
// The engine only depends on this trait. The version check is the
// serialization point for concurrent transitions: two requests that both
// loaded version N race to write, and exactly one wins; the loser gets a
// retryable Conflict instead of silently overwriting.
//
// ============================================================================

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a brand-new order.
    async fn insert(&self, order: Order) -> Result<Order, OrderError>;

    async fn get(&self, id: Uuid) -> Result<Option<Order>, OrderError>;

    /// Compare-on-write: commits only if the stored version still matches
    /// `order.version` (the version the caller loaded), then bumps it.
    /// Returns the persisted order carrying the new version.
    async fn update(&self, order: Order) -> Result<Order, OrderError>;

    /// Newest first, matching the read API ordering.
    async fn list_by_customer(&self, customer_id: Uuid) -> Result<Vec<Order>, OrderError>;

    async fn list_by_restaurant(&self, restaurant_id: Uuid) -> Result<Vec<Order>, OrderError>;
}

// ============================================================================
// In-Memory Implementation
// ============================================================================

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<Order, OrderError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(OrderError::Storage(format!(
                "order {} already exists",
                order.id
            )));
        }
        orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn update(&self, mut order: Order) -> Result<Order, OrderError> {
        let mut orders = self.orders.write().await;
        let current = orders
            .get(&order.id)
            .ok_or(OrderError::NotFound(order.id))?;

        if current.version != order.version {
            tracing::warn!(
                order_id = %order.id,
                expected_version = order.version,
                current_version = current.version,
                "Version conflict on order update"
            );
            return Err(OrderError::Conflict(order.id));
        }

        order.version += 1;
        orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn list_by_customer(&self, customer_id: Uuid) -> Result<Vec<Order>, OrderError> {
        let orders = self.orders.read().await;
        let mut found: Vec<Order> = orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn list_by_restaurant(&self, restaurant_id: Uuid) -> Result<Vec<Order>, OrderError> {
        let orders = self.orders.read().await;
        let mut found: Vec<Order> = orders
            .values()
            .filter(|o| o.restaurant_id == restaurant_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
