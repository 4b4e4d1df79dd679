// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Aggregates and their invariants, free of transport and storage concerns.
// The order aggregate is the only one this service owns; restaurants,
// couriers and payments belong to collaborating services and only their
// contracts appear here (see `crate::collaborators`).
//
// ============================================================================

pub mod order;
