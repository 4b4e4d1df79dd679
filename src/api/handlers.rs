use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::order::{
    ActorRole, CreateOrder, Order, OrderError, OrderStatus, PaymentStatus, TransitionOrder,
};
use crate::engine::OrderEngine;

use super::identity::Caller;

// ============================================================================
// HTTP Handlers
// ============================================================================
//
// Thin: decode, hand to the engine, encode. Response envelope matches the
// rest of the platform ({"status": "success", "data": {...}}).
//
// ============================================================================

impl ResponseError for OrderError {
    fn status_code(&self) -> StatusCode {
        match self {
            OrderError::Validation(_)
            | OrderError::ItemUnavailable(_)
            | OrderError::RestaurantClosed
            | OrderError::TotalMismatch { .. }
            | OrderError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            OrderError::Forbidden(_) => StatusCode::FORBIDDEN,
            OrderError::NotFound(_) => StatusCode::NOT_FOUND,
            OrderError::Conflict(_) => StatusCode::CONFLICT,
            OrderError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "status": "fail",
            "message": self.to_string(),
        }))
    }
}

fn order_body(order: &Order) -> serde_json::Value {
    json!({ "status": "success", "data": { "order": order } })
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: OrderStatus,
}

#[derive(Deserialize)]
pub struct PaymentBody {
    pub payment_id: Uuid,
    pub status: PaymentStatus,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub customer_id: Option<Uuid>,
    pub restaurant_id: Option<Uuid>,
}

pub async fn create_order(
    engine: web::Data<OrderEngine>,
    caller: Caller,
    body: web::Json<CreateOrder>,
) -> Result<HttpResponse, OrderError> {
    let created = engine.create_order(caller.id, body.into_inner()).await?;

    let mut payload = order_body(&created.order);
    if let Some(warning) = created.payment_warning {
        payload["warning"] = json!(warning);
    }
    Ok(HttpResponse::Created().json(payload))
}

pub async fn update_status(
    engine: web::Data<OrderEngine>,
    caller: Caller,
    path: web::Path<Uuid>,
    body: web::Json<StatusBody>,
) -> Result<HttpResponse, OrderError> {
    let order = engine
        .transition(TransitionOrder {
            order_id: path.into_inner(),
            requested: body.status,
            actor_id: caller.id,
            actor_role: caller.role,
        })
        .await?;
    Ok(HttpResponse::Ok().json(order_body(&order)))
}

pub async fn cancel_order(
    engine: web::Data<OrderEngine>,
    caller: Caller,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, OrderError> {
    let order = engine
        .cancel(path.into_inner(), caller.id, caller.role)
        .await?;
    Ok(HttpResponse::Ok().json(order_body(&order)))
}

/// Service-internal callback from the payment service.
pub async fn payment_update(
    engine: web::Data<OrderEngine>,
    caller: Caller,
    path: web::Path<Uuid>,
    body: web::Json<PaymentBody>,
) -> Result<HttpResponse, OrderError> {
    if caller.role != ActorRole::Admin {
        return Err(OrderError::Forbidden(
            "Payment updates are service-internal".to_string(),
        ));
    }
    let order = engine
        .record_payment_update(path.into_inner(), body.payment_id, body.status)
        .await?;
    Ok(HttpResponse::Ok().json(order_body(&order)))
}

pub async fn get_order(
    engine: web::Data<OrderEngine>,
    caller: Caller,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, OrderError> {
    let order = engine
        .get_order(path.into_inner(), caller.id, caller.role)
        .await?;
    Ok(HttpResponse::Ok().json(order_body(&order)))
}

pub async fn list_orders(
    engine: web::Data<OrderEngine>,
    caller: Caller,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, OrderError> {
    let orders = match (query.customer_id, query.restaurant_id) {
        (Some(customer_id), None) => {
            engine
                .list_for_customer(customer_id, caller.id, caller.role)
                .await?
        }
        (None, Some(restaurant_id)) => {
            engine
                .list_for_restaurant(restaurant_id, caller.id, caller.role)
                .await?
        }
        // A bare customer listing defaults to the caller's own orders.
        (None, None) if caller.role == ActorRole::Customer => {
            engine
                .list_for_customer(caller.id, caller.id, caller.role)
                .await?
        }
        _ => {
            return Err(OrderError::Validation(
                "Provide exactly one of customer_id or restaurant_id".to_string(),
            ))
        }
    };

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "results": orders.len(),
        "data": { "orders": orders },
    })))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "order-service",
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health)).service(
        web::scope("/orders")
            .route("", web::post().to(create_order))
            .route("", web::get().to(list_orders))
            .route("/{id}", web::get().to(get_order))
            .route("/{id}/status", web::patch().to(update_status))
            .route("/{id}/cancel", web::post().to(cancel_order))
            .route("/{id}/payment", web::post().to(payment_update)),
    );
}
