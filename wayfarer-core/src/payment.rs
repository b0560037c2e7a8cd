use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::CoreResult;

/// Status of a checkout session on the provider side (Stripe-style).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String, // Provider's ID (e.g., cs_123)
    pub booking_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub status: IntentStatus,
    pub reference: Option<String>,
    pub checkout_url: Option<String>,
    pub client_secret: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// External checkout provider. The booking flow only records the intent id and
/// reacts to status updates.
#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Create a checkout session with the provider
    async fn create_intent(
        &self,
        booking_id: Uuid,
        amount: i64,
        currency: &str,
        reference: &str,
    ) -> CoreResult<PaymentIntent>;

    /// Retrieve intent status
    async fn get_intent(&self, intent_id: &str) -> CoreResult<PaymentIntent>;
}
