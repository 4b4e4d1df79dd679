pub mod handlers;
pub mod identity;

pub use handlers::configure;
pub use identity::Caller;

// ============================================================================
// Handler Tests
// ============================================================================
