use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::order::PaymentMethod;

// ============================================================================
// Payment Service - Collaborator Contract
// ============================================================================
//
// initiate / verify / refund, as the order core consumes them. Cash never
// touches a gateway. Card goes through the card gateway, the wallet variants
// through the wallet gateway; both adapters are stubs that honor the
// contract only.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub payment_id: Uuid,
    pub status: PaymentState,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment {0} not found")]
    NotFound(Uuid),

    #[error("Payment service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a payment record and attempt the charge. A gateway-declined
    /// charge still yields a receipt (with a `failed` record); only a
    /// transport-level fault is an Err.
    async fn initiate(
        &self,
        order_id: Uuid,
        amount: f64,
        method: PaymentMethod,
    ) -> Result<PaymentReceipt, PaymentError>;

    /// Confirm a gateway callback against the stored reference.
    async fn verify(&self, payment_id: Uuid, reference: &str) -> Result<PaymentState, PaymentError>;

    async fn refund(&self, payment_id: Uuid, reason: &str) -> Result<PaymentState, PaymentError>;
}

// ============================================================================
// Gateway Adapters (stubbed behind the contract)
// ============================================================================

pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the gateway's reference for the charge.
    fn charge(&self, order_id: Uuid, amount: f64) -> Result<String, String>;

    fn refund(&self, reference: &str) -> Result<(), String>;
}

pub struct CardGateway;

impl PaymentGateway for CardGateway {
    fn name(&self) -> &'static str {
        "card"
    }

    fn charge(&self, order_id: Uuid, _amount: f64) -> Result<String, String> {
        Ok(format!("ch_{order_id}"))
    }

    fn refund(&self, _reference: &str) -> Result<(), String> {
        Ok(())
    }
}

pub struct WalletGateway;

impl PaymentGateway for WalletGateway {
    fn name(&self) -> &'static str {
        "wallet"
    }

    fn charge(&self, order_id: Uuid, _amount: f64) -> Result<String, String> {
        Ok(format!("wal_{order_id}"))
    }

    fn refund(&self, _reference: &str) -> Result<(), String> {
        Ok(())
    }
}

// ============================================================================
// In-Process Payment Service
// ============================================================================

#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: f64,
    pub method: PaymentMethod,
    pub state: PaymentState,
    pub gateway_reference: Option<String>,
}

pub struct InProcessPaymentService {
    card: Box<dyn PaymentGateway>,
    wallet: Box<dyn PaymentGateway>,
    records: RwLock<HashMap<Uuid, PaymentRecord>>,
}

impl InProcessPaymentService {
    pub fn new() -> Self {
        Self::with_gateways(Box::new(CardGateway), Box::new(WalletGateway))
    }

    pub fn with_gateways(card: Box<dyn PaymentGateway>, wallet: Box<dyn PaymentGateway>) -> Self {
        Self {
            card,
            wallet,
            records: RwLock::new(HashMap::new()),
        }
    }

    fn gateway_for(&self, method: PaymentMethod) -> &dyn PaymentGateway {
        match method {
            PaymentMethod::Card => self.card.as_ref(),
            PaymentMethod::Payhere | PaymentMethod::Frimi | PaymentMethod::DialogGenie => {
                self.wallet.as_ref()
            }
            // Cash is short-circuited before gateway dispatch.
            PaymentMethod::Cash => self.card.as_ref(),
        }
    }

    pub async fn record(&self, payment_id: Uuid) -> Option<PaymentRecord> {
        self.records.read().await.get(&payment_id).cloned()
    }
}

impl Default for InProcessPaymentService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProcessor for InProcessPaymentService {
    async fn initiate(
        &self,
        order_id: Uuid,
        amount: f64,
        method: PaymentMethod,
    ) -> Result<PaymentReceipt, PaymentError> {
        let payment_id = Uuid::new_v4();

        if method.is_cash() {
            // No external gateway for cash.
            let record = PaymentRecord {
                id: payment_id,
                order_id,
                amount,
                method,
                state: PaymentState::Completed,
                gateway_reference: None,
            };
            self.records.write().await.insert(payment_id, record);
            return Ok(PaymentReceipt {
                payment_id,
                status: PaymentState::Completed,
            });
        }

        let gateway = self.gateway_for(method);
        let (state, gateway_reference) = match gateway.charge(order_id, amount) {
            Ok(reference) => (PaymentState::Pending, Some(reference)),
            Err(reason) => {
                tracing::error!(
                    order_id = %order_id,
                    gateway = gateway.name(),
                    reason = %reason,
                    "Payment initiation declined by gateway"
                );
                (PaymentState::Failed, None)
            }
        };

        let record = PaymentRecord {
            id: payment_id,
            order_id,
            amount,
            method,
            state,
            gateway_reference,
        };
        self.records.write().await.insert(payment_id, record);

        tracing::info!(
            order_id = %order_id,
            payment_id = %payment_id,
            state = ?state,
            "Payment initiated"
        );

        Ok(PaymentReceipt {
            payment_id,
            status: state,
        })
    }

    async fn verify(&self, payment_id: Uuid, reference: &str) -> Result<PaymentState, PaymentError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&payment_id)
            .ok_or(PaymentError::NotFound(payment_id))?;

        record.state = if record.gateway_reference.as_deref() == Some(reference) {
            PaymentState::Completed
        } else {
            tracing::warn!(
                payment_id = %payment_id,
                "Verification reference did not match"
            );
            PaymentState::Failed
        };

        Ok(record.state)
    }

    async fn refund(&self, payment_id: Uuid, reason: &str) -> Result<PaymentState, PaymentError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&payment_id)
            .ok_or(PaymentError::NotFound(payment_id))?;

        if !record.method.is_cash() {
            if let Some(reference) = record.gateway_reference.clone() {
                self.gateway_for(record.method)
                    .refund(&reference)
                    .map_err(PaymentError::Unavailable)?;
            }
        }

        record.state = PaymentState::Refunded;
        tracing::info!(
            payment_id = %payment_id,
            order_id = %record.order_id,
            reason = %reason,
            "Payment refunded"
        );
        Ok(PaymentState::Refunded)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
