use serde::Deserialize;
use uuid::Uuid;

use super::value_objects::{ActorRole, DeliveryAddress, OrderStatus, PaymentMethod};

// ============================================================================
// Order Commands - Represent caller intent
// ============================================================================

/// Item as submitted by the client. Name and price are NOT trusted from the
/// request; the engine snapshots them from the restaurant menu.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestedItem {
    pub menu_item_id: Uuid,
    pub quantity: u32,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrder {
    pub restaurant_id: Uuid,
    pub items: Vec<RequestedItem>,
    pub delivery_address: DeliveryAddress,
    pub payment_method: PaymentMethod,
    /// Client-computed total, cross-checked against the menu snapshot.
    pub total_amount: f64,
    #[serde(default)]
    pub delivery_fee: Option<f64>,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransitionOrder {
    pub order_id: Uuid,
    pub requested: OrderStatus,
    pub actor_id: Uuid,
    pub actor_role: ActorRole,
}
