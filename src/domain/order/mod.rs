// ============================================================================
// Order Domain - The Lifecycle Core
// ============================================================================
//
// Everything order-specific lives here:
// - Value objects (OrderStatus, ActorRole, PaymentMethod, OrderItem, ...)
// - The status transition table keyed by (current, role)
// - Commands (CreateOrder, TransitionOrder)
// - Errors (OrderError enum)
// - The Order aggregate itself
//
// Orchestration against the collaborators is in `crate::engine`.
//
// ============================================================================

pub mod aggregate;
pub mod commands;
pub mod errors;
pub mod transitions;
pub mod value_objects;

pub use aggregate::*;
pub use commands::*;
pub use errors::*;
pub use value_objects::*;
