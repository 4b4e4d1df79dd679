use super::errors::OrderError;
use super::value_objects::{ActorRole, OrderStatus};

// ============================================================================
// Status Transition Table
// ============================================================================
//
// Single place where every legal (current, role) -> next edge lives.
// Handlers never inspect roles themselves; they ask this table once.
//
//   pending          -> confirmed (restaurant), cancelled (customer/restaurant)
//   confirmed        -> preparing (restaurant), cancelled (customer/restaurant)
//   preparing        -> ready_for_pickup (restaurant)
//   ready_for_pickup -> out_for_delivery (delivery)
//   out_for_delivery -> delivered (delivery)
//   delivered / cancelled are terminal
//
// Admin may move a non-terminal order to any other status. There are no
// self-loops: re-requesting the current status is an invalid transition.
//
// ============================================================================

use OrderStatus::*;

/// Statuses a role may ever request, regardless of the current state.
/// A request outside this set is a Forbidden, not an InvalidTransition.
fn role_targets(role: ActorRole) -> &'static [OrderStatus] {
    match role {
        ActorRole::Customer => &[Cancelled],
        ActorRole::Restaurant => &[Confirmed, Preparing, ReadyForPickup, Cancelled],
        ActorRole::Delivery => &[OutForDelivery, Delivered],
        ActorRole::Admin => &[
            Pending,
            Confirmed,
            Preparing,
            ReadyForPickup,
            OutForDelivery,
            Delivered,
            Cancelled,
        ],
    }
}

/// Legal next statuses for a role from a given current status.
pub fn allowed_next(current: OrderStatus, role: ActorRole) -> &'static [OrderStatus] {
    if current.is_terminal() {
        return &[];
    }

    match role {
        ActorRole::Customer => match current {
            Pending | Confirmed => &[Cancelled],
            _ => &[],
        },
        ActorRole::Restaurant => match current {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Preparing, Cancelled],
            Preparing => &[ReadyForPickup],
            _ => &[],
        },
        ActorRole::Delivery => match current {
            ReadyForPickup => &[OutForDelivery],
            OutForDelivery => &[Delivered],
            _ => &[],
        },
        // Anything but a self-loop; terminal states were handled above.
        ActorRole::Admin => match current {
            Pending => &[Confirmed, Preparing, ReadyForPickup, OutForDelivery, Delivered, Cancelled],
            Confirmed => &[Pending, Preparing, ReadyForPickup, OutForDelivery, Delivered, Cancelled],
            Preparing => &[Pending, Confirmed, ReadyForPickup, OutForDelivery, Delivered, Cancelled],
            ReadyForPickup => &[Pending, Confirmed, Preparing, OutForDelivery, Delivered, Cancelled],
            OutForDelivery => &[Pending, Confirmed, Preparing, ReadyForPickup, Delivered, Cancelled],
            Delivered | Cancelled => &[],
        },
    }
}

/// Validate a requested transition for an actor role.
pub fn check_transition(
    current: OrderStatus,
    requested: OrderStatus,
    role: ActorRole,
) -> Result<(), OrderError> {
    if !role_targets(role).contains(&requested) {
        let msg = match role {
            ActorRole::Customer => "Customers can only cancel orders".to_string(),
            _ => format!("Invalid status update for {role}"),
        };
        return Err(OrderError::Forbidden(msg));
    }

    if allowed_next(current, role).contains(&requested) {
        Ok(())
    } else {
        Err(OrderError::InvalidTransition {
            from: current,
            to: requested,
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
