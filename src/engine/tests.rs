use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::*;
use crate::collaborators::{
    Assignment, AssignmentError, ChannelDispatcher, Courier, CourierPool, DeliveryAssignment,
    InMemoryRestaurantDirectory, LogSink, MenuItemSnapshot, PaymentError, PaymentReceipt,
    PaymentState, RestaurantSnapshot,
};
use crate::domain::order::{DeliveryAddress, PaymentMethod, RequestedItem};
use crate::store::InMemoryOrderStore;

// ============================================================================
// Test Doubles
// ============================================================================

struct RecordingPayments {
    initiations: AtomicU32,
    refunds: AtomicU32,
    fail_initiate: bool,
}

impl RecordingPayments {
    fn new() -> Self {
        Self {
            initiations: AtomicU32::new(0),
            refunds: AtomicU32::new(0),
            fail_initiate: false,
        }
    }

    fn unreachable_gateway() -> Self {
        Self {
            fail_initiate: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl crate::collaborators::PaymentProcessor for RecordingPayments {
    async fn initiate(
        &self,
        _order_id: Uuid,
        _amount: f64,
        _method: PaymentMethod,
    ) -> Result<PaymentReceipt, PaymentError> {
        self.initiations.fetch_add(1, Ordering::SeqCst);
        if self.fail_initiate {
            return Err(PaymentError::Unavailable("connection refused".into()));
        }
        Ok(PaymentReceipt {
            payment_id: Uuid::new_v4(),
            status: PaymentState::Pending,
        })
    }

    async fn verify(
        &self,
        _payment_id: Uuid,
        _reference: &str,
    ) -> Result<PaymentState, PaymentError> {
        Ok(PaymentState::Completed)
    }

    async fn refund(&self, _payment_id: Uuid, _reason: &str) -> Result<PaymentState, PaymentError> {
        self.refunds.fetch_add(1, Ordering::SeqCst);
        Ok(PaymentState::Refunded)
    }
}

/// Delivery service that never answers an assignment request.
struct UnresponsiveDelivery;

#[async_trait]
impl DeliveryAssignment for UnresponsiveDelivery {
    async fn assign(
        &self,
        _order_id: Uuid,
        _restaurant_id: Uuid,
        _delivery_address: &crate::domain::order::DeliveryAddress,
    ) -> Result<Assignment, AssignmentError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(AssignmentError::Unavailable("gone".into()))
    }

    async fn mark_delivered(&self, _delivery_person_id: Uuid) {
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
}

/// Assigns instantly but hangs forever when releasing the courier.
struct StuckRelease {
    courier_id: Uuid,
}

#[async_trait]
impl DeliveryAssignment for StuckRelease {
    async fn assign(
        &self,
        _order_id: Uuid,
        _restaurant_id: Uuid,
        _delivery_address: &crate::domain::order::DeliveryAddress,
    ) -> Result<Assignment, AssignmentError> {
        Ok(Assignment {
            delivery_person_id: self.courier_id,
            estimated_delivery_time: Utc::now() + chrono::Duration::minutes(45),
        })
    }

    async fn mark_delivered(&self, _delivery_person_id: Uuid) {
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
}

/// Store that injects a set number of version conflicts on update before
/// delegating to the real in-memory store.
struct ConflictingStore {
    inner: InMemoryOrderStore,
    pending_conflicts: AtomicU32,
}

impl ConflictingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryOrderStore::new(),
            pending_conflicts: AtomicU32::new(0),
        }
    }

    fn inject_conflicts(&self, count: u32) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderStore for ConflictingStore {
    async fn insert(&self, order: Order) -> Result<Order, OrderError> {
        self.inner.insert(order).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
        self.inner.get(id).await
    }

    async fn update(&self, order: Order) -> Result<Order, OrderError> {
        if self.pending_conflicts.load(Ordering::SeqCst) > 0 {
            self.pending_conflicts.fetch_sub(1, Ordering::SeqCst);
            return Err(OrderError::Conflict(order.id));
        }
        self.inner.update(order).await
    }

    async fn list_by_customer(&self, customer_id: Uuid) -> Result<Vec<Order>, OrderError> {
        self.inner.list_by_customer(customer_id).await
    }

    async fn list_by_restaurant(&self, restaurant_id: Uuid) -> Result<Vec<Order>, OrderError> {
        self.inner.list_by_restaurant(restaurant_id).await
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    engine: OrderEngine,
    store: Arc<dyn OrderStore>,
    payments: Arc<RecordingPayments>,
    restaurant_id: Uuid,
    naan: Uuid,    // $10
    dhal: Uuid,    // $5
    special: Uuid, // unavailable
    customer_id: Uuid,
}

async fn harness() -> Harness {
    harness_with(
        Arc::new(RecordingPayments::new()),
        Arc::new(CourierPool::new(vec![Courier::new("Asha")])),
        true,
    )
    .await
}

async fn harness_with(
    payments: Arc<RecordingPayments>,
    delivery: Arc<dyn DeliveryAssignment>,
    is_open: bool,
) -> Harness {
    harness_on(
        Arc::new(InMemoryOrderStore::new()),
        payments,
        delivery,
        is_open,
    )
    .await
}

async fn harness_on(
    store: Arc<dyn OrderStore>,
    payments: Arc<RecordingPayments>,
    delivery: Arc<dyn DeliveryAssignment>,
    is_open: bool,
) -> Harness {
    let restaurants = Arc::new(InMemoryRestaurantDirectory::new());

    let restaurant_id = Uuid::new_v4();
    let naan = Uuid::new_v4();
    let dhal = Uuid::new_v4();
    let special = Uuid::new_v4();

    restaurants
        .upsert(RestaurantSnapshot {
            id: restaurant_id,
            name: "Spice Garden".into(),
            is_open,
            menu: vec![
                MenuItemSnapshot {
                    id: naan,
                    name: "Garlic Naan".into(),
                    price: 10.0,
                    is_available: true,
                },
                MenuItemSnapshot {
                    id: dhal,
                    name: "Dhal Curry".into(),
                    price: 5.0,
                    is_available: true,
                },
                MenuItemSnapshot {
                    id: special,
                    name: "Seasonal Special".into(),
                    price: 7.0,
                    is_available: false,
                },
            ],
        })
        .await;

    let engine = OrderEngine::new(
        store.clone(),
        restaurants,
        delivery,
        payments.clone(),
        Arc::new(ChannelDispatcher::new(Box::new(LogSink))),
        Duration::from_millis(500),
    );

    Harness {
        engine,
        store,
        payments,
        restaurant_id,
        naan,
        dhal,
        special,
        customer_id: Uuid::new_v4(),
    }
}

fn address() -> DeliveryAddress {
    DeliveryAddress {
        street: "12 Galle Rd".into(),
        city: "Colombo".into(),
        state: "Western".into(),
        zip_code: "00300".into(),
        coordinates: None,
    }
}

impl Harness {
    /// One naan ($10) and two dhal ($5 x 2) with a $3 fee: $23 all in.
    fn standard_cmd(&self, total_amount: f64, payment_method: PaymentMethod) -> CreateOrder {
        CreateOrder {
            restaurant_id: self.restaurant_id,
            items: vec![
                RequestedItem {
                    menu_item_id: self.naan,
                    quantity: 1,
                    special_instructions: None,
                },
                RequestedItem {
                    menu_item_id: self.dhal,
                    quantity: 2,
                    special_instructions: None,
                },
            ],
            delivery_address: address(),
            payment_method,
            total_amount,
            delivery_fee: Some(3.0),
            special_instructions: None,
        }
    }

    async fn created(&self, payment_method: PaymentMethod) -> Order {
        self.engine
            .create_order(self.customer_id, self.standard_cmd(23.0, payment_method))
            .await
            .unwrap()
            .order
    }

    async fn transition_as(
        &self,
        order_id: Uuid,
        requested: OrderStatus,
        actor_role: ActorRole,
    ) -> Result<Order, OrderError> {
        let actor_id = match actor_role {
            ActorRole::Customer => self.customer_id,
            ActorRole::Restaurant => self.restaurant_id,
            _ => Uuid::new_v4(),
        };
        self.engine
            .transition(TransitionOrder {
                order_id,
                requested,
                actor_id,
                actor_role,
            })
            .await
    }

    /// Walk an order along the happy path up to the given status.
    async fn drive_to(&self, order_id: Uuid, target: OrderStatus) -> Order {
        let path = [
            (OrderStatus::Confirmed, ActorRole::Restaurant),
            (OrderStatus::Preparing, ActorRole::Restaurant),
            (OrderStatus::ReadyForPickup, ActorRole::Restaurant),
            (OrderStatus::OutForDelivery, ActorRole::Delivery),
            (OrderStatus::Delivered, ActorRole::Delivery),
        ];
        let mut last = None;
        for (status, role) in path {
            let order = self.store.get(order_id).await.unwrap().unwrap();
            let actor_id = match role {
                ActorRole::Delivery => order.delivery_person_id.unwrap_or_else(Uuid::new_v4),
                _ => self.restaurant_id,
            };
            last = Some(
                self.engine
                    .transition(TransitionOrder {
                        order_id,
                        requested: status,
                        actor_id,
                        actor_role: role,
                    })
                    .await
                    .unwrap(),
            );
            if status == target {
                break;
            }
        }
        last.unwrap()
    }
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn test_create_order_scenario_totals() {
    let h = harness().await;

    // $10 + $5*2 + $3 fee = $23; submitting $20 is a mismatch.
    let err = h
        .engine
        .create_order(h.customer_id, h.standard_cmd(20.0, PaymentMethod::Cash))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::TotalMismatch {
            submitted,
            computed
        } if submitted == 20.0 && computed == 23.0
    ));

    // Nothing was persisted by the failed attempt.
    assert!(h
        .engine
        .list_for_customer(h.customer_id, h.customer_id, ActorRole::Customer)
        .await
        .unwrap()
        .is_empty());

    // $23 succeeds and lands in pending/pending.
    let created = h
        .engine
        .create_order(h.customer_id, h.standard_cmd(23.0, PaymentMethod::Cash))
        .await
        .unwrap();
    assert_eq!(created.order.status, OrderStatus::Pending);
    assert_eq!(created.order.payment_status, PaymentStatus::Pending);
    assert_eq!(created.order.total_amount, 23.0);
    assert!(created.payment_warning.is_none());
}

#[tokio::test]
async fn test_create_order_within_tolerance() {
    let h = harness().await;
    // Off by less than one currency unit: accepted, submitted value kept.
    let created = h
        .engine
        .create_order(h.customer_id, h.standard_cmd(23.5, PaymentMethod::Cash))
        .await
        .unwrap();
    assert_eq!(created.order.total_amount, 23.5);
}

#[tokio::test]
async fn test_create_order_empty_items() {
    let h = harness().await;
    let mut cmd = h.standard_cmd(23.0, PaymentMethod::Cash);
    cmd.items.clear();

    let err = h.engine.create_order(h.customer_id, cmd).await.unwrap_err();
    assert!(matches!(err, OrderError::Validation(_)));
    assert!(h
        .store
        .list_by_customer(h.customer_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_create_order_unavailable_item_named() {
    let h = harness().await;
    let mut cmd = h.standard_cmd(10.0, PaymentMethod::Cash);
    cmd.items.push(RequestedItem {
        menu_item_id: h.special,
        quantity: 1,
        special_instructions: None,
    });

    let err = h.engine.create_order(h.customer_id, cmd).await.unwrap_err();
    match err {
        OrderError::ItemUnavailable(name) => assert_eq!(name, "Seasonal Special"),
        other => panic!("expected ItemUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_order_closed_restaurant() {
    let h = harness_with(
        Arc::new(RecordingPayments::new()),
        Arc::new(CourierPool::new(vec![Courier::new("Asha")])),
        false,
    )
    .await;

    let err = h
        .engine
        .create_order(h.customer_id, h.standard_cmd(23.0, PaymentMethod::Cash))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::RestaurantClosed));
}

#[tokio::test]
async fn test_create_order_unknown_restaurant() {
    let h = harness().await;
    let mut cmd = h.standard_cmd(23.0, PaymentMethod::Cash);
    cmd.restaurant_id = Uuid::new_v4();

    let err = h.engine.create_order(h.customer_id, cmd).await.unwrap_err();
    assert!(matches!(err, OrderError::Validation(_)));
}

#[tokio::test]
async fn test_card_order_initiates_payment() {
    let h = harness().await;
    let order = h.created(PaymentMethod::Card).await;

    assert_eq!(h.payments.initiations.load(Ordering::SeqCst), 1);
    assert!(order.payment_id.is_some());
    // Initiation alone does not mark the order paid.
    assert_eq!(order.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_cash_order_skips_payment_initiation() {
    let h = harness().await;
    h.created(PaymentMethod::Cash).await;
    assert_eq!(h.payments.initiations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_payment_outage_is_degraded_success() {
    let h = harness_with(
        Arc::new(RecordingPayments::unreachable_gateway()),
        Arc::new(CourierPool::new(vec![Courier::new("Asha")])),
        true,
    )
    .await;

    let created = h
        .engine
        .create_order(h.customer_id, h.standard_cmd(23.0, PaymentMethod::Card))
        .await
        .unwrap();

    assert!(created.payment_warning.is_some());
    assert!(created.order.payment_id.is_none());
    assert_eq!(created.order.payment_status, PaymentStatus::Pending);
    // The order itself committed.
    assert!(h.store.get(created.order.id).await.unwrap().is_some());
}

// ============================================================================
// Transitions
// ============================================================================

#[tokio::test]
async fn test_confirm_sets_estimate_and_courier() {
    let h = harness().await;
    let order = h.created(PaymentMethod::Cash).await;

    let before = Utc::now();
    let confirmed = h
        .transition_as(order.id, OrderStatus::Confirmed, ActorRole::Restaurant)
        .await
        .unwrap();

    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert!(confirmed.delivery_person_id.is_some());

    let eta = confirmed.estimated_delivery_time.unwrap();
    let offset = eta - before;
    assert!(offset >= chrono::Duration::minutes(44));
    assert!(offset <= chrono::Duration::minutes(46));
}

#[tokio::test]
async fn test_confirm_commits_without_courier() {
    // Nobody in the pool: assignment fails, confirmation must not.
    let h = harness_with(
        Arc::new(RecordingPayments::new()),
        Arc::new(CourierPool::new(vec![])),
        true,
    )
    .await;
    let order = h.created(PaymentMethod::Cash).await;

    let confirmed = h
        .transition_as(order.id, OrderStatus::Confirmed, ActorRole::Restaurant)
        .await
        .unwrap();

    // Soft failure: confirmed anyway, courier field left unset.
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert!(confirmed.delivery_person_id.is_none());
    assert!(confirmed.estimated_delivery_time.is_some());
}

#[tokio::test]
async fn test_hanging_assignment_times_out_and_confirms() {
    // The assignment call never returns; the 500ms bound must cut it off
    // and the timeout then reads like any other soft assignment failure.
    let h = harness_with(
        Arc::new(RecordingPayments::new()),
        Arc::new(UnresponsiveDelivery),
        true,
    )
    .await;
    let order = h.created(PaymentMethod::Cash).await;

    let started = std::time::Instant::now();
    let confirmed = h
        .transition_as(order.id, OrderStatus::Confirmed, ActorRole::Restaurant)
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert!(confirmed.delivery_person_id.is_none());
    assert!(confirmed.estimated_delivery_time.is_some());
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let h = harness().await;
    let err = h
        .transition_as(Uuid::new_v4(), OrderStatus::Confirmed, ActorRole::Restaurant)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound(_)));
}

#[tokio::test]
async fn test_illegal_edge_leaves_order_unchanged() {
    let h = harness().await;
    let order = h.created(PaymentMethod::Cash).await;

    // pending -> preparing skips confirmation.
    let err = h
        .transition_as(order.id, OrderStatus::Preparing, ActorRole::Restaurant)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidTransition { .. }));

    let stored = h.store.get(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.version, order.version);
}

#[tokio::test]
async fn test_repeating_a_transition_is_rejected() {
    let h = harness().await;
    let order = h.created(PaymentMethod::Cash).await;
    h.drive_to(order.id, OrderStatus::Confirmed).await;

    // The table has no self-loops: a duplicate request is an error, not a
    // silent no-op.
    let err = h
        .transition_as(order.id, OrderStatus::Confirmed, ActorRole::Restaurant)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_customer_cannot_cancel_preparing_order() {
    let h = harness().await;
    let order = h.created(PaymentMethod::Cash).await;
    h.drive_to(order.id, OrderStatus::Preparing).await;

    let err = h
        .transition_as(order.id, OrderStatus::Cancelled, ActorRole::Customer)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidTransition { .. }));

    let stored = h.store.get(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Preparing);
}

#[tokio::test]
async fn test_customer_cannot_touch_someone_elses_order() {
    let h = harness().await;
    let order = h.created(PaymentMethod::Cash).await;

    let err = h
        .engine
        .transition(TransitionOrder {
            order_id: order.id,
            requested: OrderStatus::Cancelled,
            actor_id: Uuid::new_v4(),
            actor_role: ActorRole::Customer,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Forbidden(_)));
}

#[tokio::test]
async fn test_delivered_is_terminal() {
    let h = harness().await;
    let order = h.created(PaymentMethod::Cash).await;
    let delivered = h.drive_to(order.id, OrderStatus::Delivered).await;
    assert_eq!(delivered.status, OrderStatus::Delivered);

    for (requested, role) in [
        (OrderStatus::Pending, ActorRole::Admin),
        (OrderStatus::Confirmed, ActorRole::Restaurant),
        (OrderStatus::Cancelled, ActorRole::Customer),
    ] {
        let err = h.transition_as(order.id, requested, role).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }
}

#[tokio::test]
async fn test_delivery_returns_courier_to_pool() {
    let pool = Arc::new(CourierPool::new(vec![Courier::new("Asha")]));
    let h = harness_with(Arc::new(RecordingPayments::new()), pool.clone(), true).await;
    let order = h.created(PaymentMethod::Cash).await;
    let delivered = h.drive_to(order.id, OrderStatus::Delivered).await;

    let courier_id = delivered.delivery_person_id.unwrap();
    let courier = pool.courier(courier_id).await.unwrap();
    assert!(courier.is_available);
}

#[tokio::test]
async fn test_hanging_courier_release_does_not_stall_delivery() {
    let courier_id = Uuid::new_v4();
    let h = harness_with(
        Arc::new(RecordingPayments::new()),
        Arc::new(StuckRelease { courier_id }),
        true,
    )
    .await;
    let order = h.created(PaymentMethod::Cash).await;

    let started = std::time::Instant::now();
    let delivered = h.drive_to(order.id, OrderStatus::Delivered).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(delivered.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn test_conflicting_confirmation_returns_courier_to_pool() {
    let courier = Courier::new("Asha");
    let courier_id = courier.id;
    let pool = Arc::new(CourierPool::new(vec![courier]));
    let store = Arc::new(ConflictingStore::new());
    let h = harness_on(
        store.clone(),
        Arc::new(RecordingPayments::new()),
        pool.clone(),
        true,
    )
    .await;
    let order = h.created(PaymentMethod::Cash).await;

    // The versioned write loses the race after the courier was grabbed.
    store.inject_conflicts(1);
    let err = h
        .transition_as(order.id, OrderStatus::Confirmed, ActorRole::Restaurant)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Conflict(_)));

    // The losing request handed the courier back.
    assert!(pool.courier(courier_id).await.unwrap().is_available);

    // A retry finds both the order untouched and the courier free.
    let confirmed = h
        .transition_as(order.id, OrderStatus::Confirmed, ActorRole::Restaurant)
        .await
        .unwrap();
    assert_eq!(confirmed.delivery_person_id, Some(courier_id));
}

// ============================================================================
// Cancellation & Refunds
// ============================================================================

#[tokio::test]
async fn test_cancelling_a_paid_order_refunds_exactly_once() {
    let h = harness().await;
    let order = h.created(PaymentMethod::Card).await;

    // Payment service reports the charge went through.
    let paid = h
        .engine
        .record_payment_update(order.id, order.payment_id.unwrap(), PaymentStatus::Paid)
        .await
        .unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);

    let cancelled = h
        .engine
        .cancel(order.id, h.customer_id, ActorRole::Customer)
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
    assert_eq!(h.payments.refunds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancelling_an_unpaid_order_skips_refund() {
    let h = harness().await;
    let order = h.created(PaymentMethod::Card).await;

    let cancelled = h
        .engine
        .cancel(order.id, h.customer_id, ActorRole::Customer)
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(h.payments.refunds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancel_shorthand_rejects_restaurant_role() {
    let h = harness().await;
    let order = h.created(PaymentMethod::Cash).await;

    let err = h
        .engine
        .cancel(order.id, h.restaurant_id, ActorRole::Restaurant)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Forbidden(_)));
}

#[tokio::test]
async fn test_payment_failure_does_not_auto_cancel() {
    let h = harness().await;
    let order = h.created(PaymentMethod::Card).await;

    let updated = h
        .engine
        .record_payment_update(order.id, order.payment_id.unwrap(), PaymentStatus::Failed)
        .await
        .unwrap();

    assert_eq!(updated.payment_status, PaymentStatus::Failed);
    assert_eq!(updated.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_stale_paid_callback_cannot_undo_a_refund() {
    let h = harness().await;
    let order = h.created(PaymentMethod::Card).await;
    let payment_id = order.payment_id.unwrap();

    h.engine
        .record_payment_update(order.id, payment_id, PaymentStatus::Paid)
        .await
        .unwrap();
    h.engine
        .cancel(order.id, h.customer_id, ActorRole::Customer)
        .await
        .unwrap();

    // A delayed gateway callback replays `paid` after the refund.
    let replayed = h
        .engine
        .record_payment_update(order.id, payment_id, PaymentStatus::Paid)
        .await
        .unwrap();

    assert_eq!(replayed.payment_status, PaymentStatus::Refunded);
    let stored = h.store.get(order.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Refunded);
    assert_eq!(stored.status, OrderStatus::Cancelled);
}

// ============================================================================
// Reads & Visibility
// ============================================================================

#[tokio::test]
async fn test_order_visibility() {
    let h = harness().await;
    let order = h.created(PaymentMethod::Cash).await;

    // Owner, owning restaurant and admin can read.
    assert!(h
        .engine
        .get_order(order.id, h.customer_id, ActorRole::Customer)
        .await
        .is_ok());
    assert!(h
        .engine
        .get_order(order.id, h.restaurant_id, ActorRole::Restaurant)
        .await
        .is_ok());
    assert!(h
        .engine
        .get_order(order.id, Uuid::new_v4(), ActorRole::Admin)
        .await
        .is_ok());

    // A stranger cannot, whatever their role.
    assert!(matches!(
        h.engine
            .get_order(order.id, Uuid::new_v4(), ActorRole::Customer)
            .await,
        Err(OrderError::Forbidden(_))
    ));
    assert!(matches!(
        h.engine
            .get_order(order.id, Uuid::new_v4(), ActorRole::Delivery)
            .await,
        Err(OrderError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_assigned_courier_can_read() {
    let h = harness().await;
    let order = h.created(PaymentMethod::Cash).await;
    let confirmed = h.drive_to(order.id, OrderStatus::Confirmed).await;

    let courier_id = confirmed.delivery_person_id.unwrap();
    assert!(h
        .engine
        .get_order(order.id, courier_id, ActorRole::Delivery)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_list_visibility() {
    let h = harness().await;
    h.created(PaymentMethod::Cash).await;

    assert_eq!(
        h.engine
            .list_for_customer(h.customer_id, h.customer_id, ActorRole::Customer)
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(matches!(
        h.engine
            .list_for_customer(h.customer_id, Uuid::new_v4(), ActorRole::Customer)
            .await,
        Err(OrderError::Forbidden(_))
    ));
    assert!(matches!(
        h.engine
            .list_for_restaurant(h.restaurant_id, Uuid::new_v4(), ActorRole::Customer)
            .await,
        Err(OrderError::Forbidden(_))
    ));
    assert_eq!(
        h.engine
            .list_for_restaurant(h.restaurant_id, h.restaurant_id, ActorRole::Restaurant)
            .await
            .unwrap()
            .len(),
        1
    );
}
