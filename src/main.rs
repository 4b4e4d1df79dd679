use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

mod api;
mod collaborators;
mod config;
mod domain;
mod engine;
mod store;
mod utils;

use collaborators::{
    ChannelDispatcher, Courier, CourierPool, InMemoryRestaurantDirectory,
    InProcessPaymentService, LogSink, MenuItemSnapshot, RestaurantSnapshot,
};
use config::Config;
use engine::OrderEngine;
use store::InMemoryOrderStore;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging with environment-based filtering.
    // Default to INFO, override with RUST_LOG (e.g. RUST_LOG=debug).
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_service=debug")),
        )
        .init();

    let config = Config::load();

    tracing::info!(port = config.port, "🚀 Starting order service");

    let restaurants = Arc::new(InMemoryRestaurantDirectory::new());
    if config.seed_demo {
        seed_demo_restaurant(&restaurants).await;
    }

    let couriers = (1..=config.courier_count)
        .map(|i| Courier::new(format!("courier-{i}")))
        .collect();

    let engine = web::Data::new(OrderEngine::new(
        Arc::new(InMemoryOrderStore::new()),
        restaurants,
        Arc::new(CourierPool::new(couriers)),
        Arc::new(InProcessPaymentService::new()),
        Arc::new(ChannelDispatcher::new(Box::new(LogSink))),
        config.call_timeout,
    ));

    HttpServer::new(move || {
        App::new()
            .app_data(engine.clone())
            .configure(api::configure)
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await?;

    Ok(())
}

/// A known restaurant so the service can take orders immediately.
async fn seed_demo_restaurant(restaurants: &InMemoryRestaurantDirectory) {
    let restaurant_id = Uuid::new_v4();
    let snapshot = RestaurantSnapshot {
        id: restaurant_id,
        name: "Spice Garden".into(),
        is_open: true,
        menu: vec![
            MenuItemSnapshot {
                id: Uuid::new_v4(),
                name: "Garlic Naan".into(),
                price: 10.0,
                is_available: true,
            },
            MenuItemSnapshot {
                id: Uuid::new_v4(),
                name: "Dhal Curry".into(),
                price: 5.0,
                is_available: true,
            },
            MenuItemSnapshot {
                id: Uuid::new_v4(),
                name: "Chicken Kottu".into(),
                price: 12.5,
                is_available: true,
            },
        ],
    };

    for item in &snapshot.menu {
        tracing::info!(
            restaurant_id = %restaurant_id,
            menu_item_id = %item.id,
            name = %item.name,
            "Seeded menu item"
        );
    }
    restaurants.upsert(snapshot).await;
}
