use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::{Currency, PriceSnapshot};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SettlementOutcome {
    Completed,
    Failed,
}

/// What the gateway is asked to settle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub payment_id: Uuid,
    pub booking_id: Uuid,
    pub transaction_id: String,
    pub amount: PriceSnapshot,
    pub currency: Currency,
    pub method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub outcome: SettlementOutcome,
    /// Raw gateway text, stored on the payment record.
    pub response: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Settles a payment attempt synchronously.
    ///
    /// `Err` means the gateway could not be reached or misbehaved; callers treat it
    /// the same as a `Failed` outcome.
    async fn settle(
        &self,
        request: &SettlementRequest,
    ) -> Result<SettlementReceipt, Box<dyn std::error::Error + Send + Sync>>;
}

/// Settles every attempt as completed on the spot.
///
/// This is the platform's current trust model: no external round-trip is made.
pub struct InstantSettlement;

#[async_trait]
impl PaymentGateway for InstantSettlement {
    async fn settle(
        &self,
        request: &SettlementRequest,
    ) -> Result<SettlementReceipt, Box<dyn std::error::Error + Send + Sync>> {
        tracing::debug!(transaction_id = %request.transaction_id, "Settling payment instantly");
        Ok(SettlementReceipt {
            outcome: SettlementOutcome::Completed,
            response: Some(format!("instant settlement of {}", request.transaction_id)),
        })
    }
}
