// ============================================================================
// Collaborator Contracts
// ============================================================================
//
// The services the order core talks to, abstracted to request/response
// shape and failure signaling. Each port ships with an in-process
// implementation; swapping in an RPC client only means implementing the
// trait.
//
// ============================================================================

pub mod delivery;
pub mod notification;
pub mod payment;
pub mod restaurant;

pub use delivery::{Assignment, AssignmentError, Courier, CourierPool, DeliveryAssignment};
pub use notification::{
    ChannelDispatcher, LogSink, NotificationDispatcher, NotificationSink, OrderNotification,
};
pub use payment::{
    InProcessPaymentService, PaymentError, PaymentProcessor, PaymentReceipt, PaymentState,
};
pub use restaurant::{
    InMemoryRestaurantDirectory, LookupError, MenuItemSnapshot, RestaurantDirectory,
    RestaurantSnapshot,
};
