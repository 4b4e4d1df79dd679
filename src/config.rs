use std::time::Duration;
use std::{env, fmt::Display, str::FromStr};

use tracing::info;

// ============================================================================
// Configuration
// ============================================================================

pub struct Config {
    pub port: u16,
    /// Bound applied to every outbound collaborator call.
    pub call_timeout: Duration,
    /// Size of the in-process courier pool.
    pub courier_count: usize,
    /// Seed a demo restaurant so the service is usable out of the box.
    pub seed_demo: bool,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("ORDER_SERVICE_PORT", "3003"),
            call_timeout: Duration::from_millis(try_load("OUTBOUND_CALL_TIMEOUT_MS", "5000")),
            courier_count: try_load("COURIER_POOL_SIZE", "4"),
            seed_demo: try_load("SEED_DEMO_DATA", "true"),
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    match raw.parse() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Invalid {key} value ({e}), falling back to {default}");
            default
                .parse()
                .unwrap_or_else(|_| unreachable!("default for {key} must parse"))
        }
    }
}
