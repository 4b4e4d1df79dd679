use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

// ============================================================================
// Restaurant / Menu Lookup - Collaborator Contract
// ============================================================================
//
// Read-only to the core. The engine fetches one snapshot per creation and
// validates availability, open state and pricing against it.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItemSnapshot {
    pub id: Uuid,
    pub name: String,
    pub price: f64,
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestaurantSnapshot {
    pub id: Uuid,
    pub name: String,
    pub is_open: bool,
    pub menu: Vec<MenuItemSnapshot>,
}

impl RestaurantSnapshot {
    pub fn menu_item(&self, id: Uuid) -> Option<&MenuItemSnapshot> {
        self.menu.iter().find(|m| m.id == id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Restaurant {0} not found")]
    NotFound(Uuid),

    #[error("Restaurant lookup failed: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RestaurantDirectory: Send + Sync {
    async fn fetch(&self, restaurant_id: Uuid) -> Result<RestaurantSnapshot, LookupError>;
}

// ============================================================================
// In-Process Directory
// ============================================================================

#[derive(Default)]
pub struct InMemoryRestaurantDirectory {
    restaurants: RwLock<HashMap<Uuid, RestaurantSnapshot>>,
}

impl InMemoryRestaurantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, snapshot: RestaurantSnapshot) {
        self.restaurants.write().await.insert(snapshot.id, snapshot);
    }
}

#[async_trait]
impl RestaurantDirectory for InMemoryRestaurantDirectory {
    async fn fetch(&self, restaurant_id: Uuid) -> Result<RestaurantSnapshot, LookupError> {
        self.restaurants
            .read()
            .await
            .get(&restaurant_id)
            .cloned()
            .ok_or(LookupError::NotFound(restaurant_id))
    }
}
