use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::collaborators::{
    DeliveryAssignment, LookupError, NotificationDispatcher, OrderNotification, PaymentProcessor,
    RestaurantDirectory,
};
use crate::domain::order::{
    CreateOrder, Order, OrderError, OrderItem, OrderStatus, PaymentStatus, TransitionOrder,
    transitions, ActorRole, DEFAULT_DELIVERY_FEE, TOTAL_TOLERANCE,
};
use crate::store::OrderStore;

// ============================================================================
// Order Lifecycle Engine
// ============================================================================
//
// The one place where creation validation, the transition table, and the
// cross-service side effects meet. Failure policy:
//
// - soft: delivery assignment, refund, notification fan-out. Logged at the
//   call site, the primary operation commits regardless.
// - hard: payment initiation at creation. Never aborts the order, but is
//   surfaced to the caller as a degraded success carrying a warning.
//
// Every outbound call is bounded by `call_timeout`; a timeout is handled
// exactly like an error from the same call site.
//
// ============================================================================

pub struct OrderEngine {
    store: Arc<dyn OrderStore>,
    restaurants: Arc<dyn RestaurantDirectory>,
    delivery: Arc<dyn DeliveryAssignment>,
    payments: Arc<dyn PaymentProcessor>,
    notifier: Arc<dyn NotificationDispatcher>,
    call_timeout: Duration,
}

/// Creation outcome. `payment_warning` is set when payment initiation failed
/// at the transport level: the order stands, payment stays pending.
#[derive(Debug)]
pub struct CreatedOrder {
    pub order: Order,
    pub payment_warning: Option<String>,
}

impl OrderEngine {
    pub fn new(
        store: Arc<dyn OrderStore>,
        restaurants: Arc<dyn RestaurantDirectory>,
        delivery: Arc<dyn DeliveryAssignment>,
        payments: Arc<dyn PaymentProcessor>,
        notifier: Arc<dyn NotificationDispatcher>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            restaurants,
            delivery,
            payments,
            notifier,
            call_timeout,
        }
    }

    // ------------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------------

    pub async fn create_order(
        &self,
        customer_id: Uuid,
        cmd: CreateOrder,
    ) -> Result<CreatedOrder, OrderError> {
        if cmd.items.is_empty() {
            return Err(OrderError::Validation(
                "An order must contain at least one item".to_string(),
            ));
        }

        let restaurant = self
            .bounded(self.restaurants.fetch(cmd.restaurant_id))
            .await
            .map_err(|e| match e.downcast_ref::<LookupError>() {
                Some(LookupError::NotFound(id)) => {
                    OrderError::Validation(format!("Restaurant {id} not found"))
                }
                _ => OrderError::Validation(format!("Restaurant lookup failed: {e}")),
            })?;

        // Snapshot name and price from the menu; the client submits ids only.
        let mut items = Vec::with_capacity(cmd.items.len());
        for requested in &cmd.items {
            let menu_item = restaurant.menu_item(requested.menu_item_id).ok_or_else(|| {
                OrderError::Validation(format!("Menu item {} not found", requested.menu_item_id))
            })?;
            if !menu_item.is_available {
                return Err(OrderError::ItemUnavailable(menu_item.name.clone()));
            }
            items.push(OrderItem {
                menu_item_id: menu_item.id,
                name: menu_item.name.clone(),
                unit_price: menu_item.price,
                quantity: requested.quantity,
                special_instructions: requested.special_instructions.clone(),
            });
        }

        if !restaurant.is_open {
            return Err(OrderError::RestaurantClosed);
        }

        let delivery_fee = cmd.delivery_fee.unwrap_or(DEFAULT_DELIVERY_FEE);
        let computed = Order::computed_total(&items, delivery_fee);
        if (computed - cmd.total_amount).abs() > TOTAL_TOLERANCE {
            return Err(OrderError::TotalMismatch {
                submitted: cmd.total_amount,
                computed,
            });
        }

        let order = Order::create(
            customer_id,
            cmd.restaurant_id,
            items,
            cmd.delivery_address,
            cmd.payment_method,
            delivery_fee,
            cmd.total_amount,
            cmd.special_instructions,
        )?;
        let mut order = self.store.insert(order).await?;

        tracing::info!(
            order_id = %order.id,
            customer_id = %customer_id,
            restaurant_id = %order.restaurant_id,
            total_amount = order.total_amount,
            "Order created"
        );

        // Non-cash orders get a payment record up front. A transport fault
        // here is the one hard dependency failure: surfaced, never aborting.
        let mut payment_warning = None;
        if !order.payment_method.is_cash() {
            match self
                .bounded(self.payments.initiate(
                    order.id,
                    order.total_amount,
                    order.payment_method,
                ))
                .await
            {
                Ok(receipt) => {
                    // Even a gateway-declined initiation leaves a payment
                    // record behind; the order keeps payment_status pending
                    // until verification says otherwise.
                    order.record_payment_id(receipt.payment_id);
                    order = self.store.update(order).await?;
                }
                Err(e) => {
                    tracing::error!(order_id = %order.id, error = %e, "Payment initiation failed");
                    payment_warning = Some(
                        "Payment could not be initiated; the order was created with payment pending"
                            .to_string(),
                    );
                }
            }
        }

        self.notify(OrderNotification::OrderConfirmationRequested {
            order_id: order.id,
            customer_id: order.customer_id,
            restaurant_id: order.restaurant_id,
        });

        Ok(CreatedOrder {
            order,
            payment_warning,
        })
    }

    // ------------------------------------------------------------------------
    // Status Transitions
    // ------------------------------------------------------------------------

    pub async fn transition(&self, cmd: TransitionOrder) -> Result<Order, OrderError> {
        let mut order = self
            .store
            .get(cmd.order_id)
            .await?
            .ok_or(OrderError::NotFound(cmd.order_id))?;

        self.check_actor_binding(&order, &cmd)?;
        transitions::check_transition(order.status, cmd.requested, cmd.actor_role)?;

        // Courier grabbed during this request; released again if the
        // version check below rejects the write.
        let mut newly_assigned = None;

        match cmd.requested {
            OrderStatus::Confirmed => {
                order.set_delivery_estimate(Utc::now());
                // Best-effort: the confirmation commits whether or not a
                // courier could be found.
                match self
                    .bounded(self.delivery.assign(
                        order.id,
                        order.restaurant_id,
                        &order.delivery_address,
                    ))
                    .await
                {
                    Ok(assignment) => {
                        order.assign_courier(assignment.delivery_person_id);
                        newly_assigned = Some(assignment.delivery_person_id);
                    }
                    Err(e) => {
                        tracing::warn!(
                            order_id = %order.id,
                            error = %e,
                            "Delivery assignment failed, confirming without a courier"
                        );
                    }
                }
            }
            OrderStatus::Cancelled => {
                if order.payment_status == PaymentStatus::Paid {
                    match order.payment_id {
                        Some(payment_id) => {
                            match self
                                .bounded(self.payments.refund(payment_id, "order cancelled"))
                                .await
                            {
                                Ok(_) => order.set_payment_status(PaymentStatus::Refunded),
                                Err(e) => {
                                    tracing::error!(
                                        order_id = %order.id,
                                        payment_id = %payment_id,
                                        error = %e,
                                        "Refund failed, cancellation proceeds"
                                    );
                                }
                            }
                        }
                        None => {
                            tracing::error!(
                                order_id = %order.id,
                                "Order marked paid but has no payment id, skipping refund"
                            );
                        }
                    }
                }
            }
            OrderStatus::Delivered => {
                if let Some(courier_id) = order.delivery_person_id {
                    self.release_courier(order.id, courier_id).await;
                }
            }
            _ => {}
        }

        order.apply_status(cmd.requested);
        let order = match self.store.update(order).await {
            Ok(order) => order,
            Err(e) => {
                // The courier was flipped unavailable before the version
                // check; hand them back or they are stranded until a
                // delivery that will never happen.
                if let (OrderError::Conflict(_), Some(courier_id)) = (&e, newly_assigned) {
                    self.release_courier(cmd.order_id, courier_id).await;
                }
                return Err(e);
            }
        };

        tracing::info!(
            order_id = %order.id,
            status = %order.status,
            actor_role = %cmd.actor_role,
            "Order status updated"
        );

        let notification = if cmd.requested == OrderStatus::Cancelled {
            OrderNotification::OrderCancelled {
                order_id: order.id,
                restaurant_id: order.restaurant_id,
                delivery_person_id: order.delivery_person_id,
            }
        } else {
            OrderNotification::OrderStatusChanged {
                order_id: order.id,
                customer_id: order.customer_id,
                status: order.status,
                estimated_delivery_time: order.estimated_delivery_time,
            }
        };
        self.notify(notification);

        Ok(order)
    }

    /// `POST /orders/{id}/cancel` shorthand: the owning customer (or an
    /// admin) cancelling through the regular transition path.
    pub async fn cancel(
        &self,
        order_id: Uuid,
        actor_id: Uuid,
        actor_role: ActorRole,
    ) -> Result<Order, OrderError> {
        if !matches!(actor_role, ActorRole::Customer | ActorRole::Admin) {
            return Err(OrderError::Forbidden(
                "You do not have permission to cancel this order".to_string(),
            ));
        }
        self.transition(TransitionOrder {
            order_id,
            requested: OrderStatus::Cancelled,
            actor_id,
            actor_role,
        })
        .await
    }

    /// Payment-service callback mirroring the payment outcome onto the
    /// order. A failed payment does not auto-cancel; cancellation stays an
    /// explicit actor action.
    pub async fn record_payment_update(
        &self,
        order_id: Uuid,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> Result<Order, OrderError> {
        let mut order = self
            .store
            .get(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;

        // Refunded is final for the mirror; a stale gateway callback
        // replayed after cancellation must not resurrect `paid`.
        if order.payment_status == PaymentStatus::Refunded {
            tracing::warn!(
                order_id = %order.id,
                payment_id = %payment_id,
                requested = ?status,
                "Ignoring payment update on a refunded order"
            );
            return Ok(order);
        }

        order.record_payment_id(payment_id);
        order.set_payment_status(status);
        let order = self.store.update(order).await?;

        tracing::info!(
            order_id = %order.id,
            payment_id = %payment_id,
            payment_status = ?status,
            "Payment status mirrored onto order"
        );
        Ok(order)
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub async fn get_order(
        &self,
        order_id: Uuid,
        actor_id: Uuid,
        actor_role: ActorRole,
    ) -> Result<Order, OrderError> {
        let order = self
            .store
            .get(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;

        let visible = match actor_role {
            ActorRole::Admin => true,
            ActorRole::Customer => order.customer_id == actor_id,
            ActorRole::Restaurant => order.restaurant_id == actor_id,
            ActorRole::Delivery => order.delivery_person_id == Some(actor_id),
        };
        if !visible {
            return Err(OrderError::Forbidden(
                "You do not have permission to view this order".to_string(),
            ));
        }
        Ok(order)
    }

    pub async fn list_for_customer(
        &self,
        customer_id: Uuid,
        actor_id: Uuid,
        actor_role: ActorRole,
    ) -> Result<Vec<Order>, OrderError> {
        let allowed = actor_role == ActorRole::Admin
            || (actor_role == ActorRole::Customer && actor_id == customer_id);
        if !allowed {
            return Err(OrderError::Forbidden(
                "You do not have permission to view these orders".to_string(),
            ));
        }
        self.store.list_by_customer(customer_id).await
    }

    pub async fn list_for_restaurant(
        &self,
        restaurant_id: Uuid,
        actor_id: Uuid,
        actor_role: ActorRole,
    ) -> Result<Vec<Order>, OrderError> {
        let allowed = actor_role == ActorRole::Admin
            || (actor_role == ActorRole::Restaurant && actor_id == restaurant_id);
        if !allowed {
            return Err(OrderError::Forbidden(
                "You do not have permission to view these orders".to_string(),
            ));
        }
        self.store.list_by_restaurant(restaurant_id).await
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Actors act on their own orders: a customer only on orders they own,
    /// a courier only on orders assigned to them. Restaurants and admins
    /// are bounded by the transition table alone.
    fn check_actor_binding(&self, order: &Order, cmd: &TransitionOrder) -> Result<(), OrderError> {
        match cmd.actor_role {
            ActorRole::Customer if order.customer_id != cmd.actor_id => Err(OrderError::Forbidden(
                "You do not have permission to modify this order".to_string(),
            )),
            ActorRole::Delivery
                if order.delivery_person_id.is_some()
                    && order.delivery_person_id != Some(cmd.actor_id) =>
            {
                Err(OrderError::Forbidden(
                    "This delivery is assigned to another courier".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Return a courier to the pool, bounded like every other outbound
    /// call. Release is best-effort; a stalled delivery service must not
    /// hold up the transition.
    async fn release_courier(&self, order_id: Uuid, courier_id: Uuid) {
        if tokio::time::timeout(self.call_timeout, self.delivery.mark_delivered(courier_id))
            .await
            .is_err()
        {
            tracing::warn!(
                order_id = %order_id,
                delivery_person_id = %courier_id,
                "Courier release timed out"
            );
        }
    }

    /// Bound an outbound collaborator call; a timeout reads like an error.
    async fn bounded<F, T, E>(&self, fut: F) -> anyhow::Result<T>
    where
        F: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(anyhow::anyhow!(
                "call timed out after {:?}",
                self.call_timeout
            )),
        }
    }

    /// Fire-and-forget: failures are the dispatcher's problem, never ours.
    fn notify(&self, notification: OrderNotification) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.dispatch(notification).await {
                tracing::warn!(error = %e, "Notification dispatch failed");
            }
        });
    }
}

#[cfg(test)]
mod tests;
