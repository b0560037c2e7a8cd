use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;
use wayfarer_core::payment::{IntentStatus, PaymentAdapter, PaymentIntent};
use wayfarer_core::{CoreError, CoreResult};

use crate::booking::{Booking, PaymentStatus};

/// Maps a provider intent status onto the booking's payment status.
/// `None` means the payment is still in flight.
pub fn payment_status_for(status: IntentStatus) -> Option<PaymentStatus> {
    match status {
        IntentStatus::Succeeded => Some(PaymentStatus::Paid),
        IntentStatus::Failed | IntentStatus::Canceled => Some(PaymentStatus::Failed),
        IntentStatus::Refunded => Some(PaymentStatus::Refunded),
        IntentStatus::RequiresPaymentMethod | IntentStatus::RequiresAction | IntentStatus::Processing => None,
    }
}

pub struct CheckoutOrchestrator {
    adapter: Arc<dyn PaymentAdapter>,
}

impl CheckoutOrchestrator {
    pub fn new(adapter: Arc<dyn PaymentAdapter>) -> Self {
        Self { adapter }
    }

    /// Open a checkout session for the booking's full amount
    pub async fn start(&self, booking: &Booking) -> CoreResult<PaymentIntent> {
        self.adapter
            .create_intent(booking.id, booking.total_price, &booking.currency, &booking.booking_reference)
            .await
    }

    /// Look the intent up with the provider rather than trusting the webhook body
    pub async fn resolve(&self, intent_id: &str) -> CoreResult<PaymentIntent> {
        self.adapter.get_intent(intent_id).await
    }
}

/// Provider stand-in. Intents stay in memory and tests drive their status.
pub struct MockPaymentAdapter {
    checkout_base_url: String,
    intents: RwLock<HashMap<String, PaymentIntent>>,
    unavailable: AtomicBool,
}

impl MockPaymentAdapter {
    pub fn new(checkout_base_url: impl Into<String>) -> Self {
        Self {
            checkout_base_url: checkout_base_url.into(),
            intents: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate the provider settling (or failing) a session.
    pub async fn set_status(&self, intent_id: &str, status: IntentStatus) -> CoreResult<()> {
        let mut intents = self.intents.write().await;
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| CoreError::Payment(format!("Unknown payment intent {}", intent_id)))?;
        intent.status = status;
        Ok(())
    }

    /// Make every call fail, for exercising the checkout circuit breaker.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> CoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoreError::Payment("Simulated payment gateway failure".to_string()));
        }
        Ok(())
    }
}

impl Default for MockPaymentAdapter {
    fn default() -> Self {
        Self::new("https://checkout.example.test/session")
    }
}

#[async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    async fn create_intent(
        &self,
        booking_id: Uuid,
        amount: i64,
        currency: &str,
        reference: &str,
    ) -> CoreResult<PaymentIntent> {
        self.check_available()?;
        let id = format!("mock_cs_{}", Uuid::new_v4().simple());
        let intent = PaymentIntent {
            checkout_url: Some(format!("{}/{}", self.checkout_base_url.trim_end_matches('/'), id)),
            id: id.clone(),
            booking_id,
            amount,
            currency: currency.to_string(),
            status: IntentStatus::RequiresPaymentMethod,
            reference: Some(reference.to_string()),
            client_secret: Some(format!("{}_secret", id)),
            created_at: Utc::now(),
        };
        self.intents.write().await.insert(id, intent.clone());
        Ok(intent)
    }

    async fn get_intent(&self, intent_id: &str) -> CoreResult<PaymentIntent> {
        self.check_available()?;
        self.intents
            .read()
            .await
            .get(intent_id)
            .cloned()
            .ok_or_else(|| CoreError::Payment(format!("Unknown payment intent {}", intent_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::BookingType;
    use crate::test_support::booking;

    #[tokio::test]
    async fn test_start_and_resolve() {
        let adapter = Arc::new(MockPaymentAdapter::default());
        let orchestrator = CheckoutOrchestrator::new(adapter.clone());
        let b = booking(BookingType::Direct, 42_000);

        let intent = orchestrator.start(&b).await.unwrap();
        assert_eq!(intent.amount, 42_000);
        assert_eq!(intent.booking_id, b.id);
        assert_eq!(intent.reference.as_deref(), Some(b.booking_reference.as_str()));
        assert!(intent.checkout_url.unwrap().ends_with(&intent.id));

        adapter.set_status(&intent.id, IntentStatus::Succeeded).await.unwrap();
        let resolved = orchestrator.resolve(&intent.id).await.unwrap();
        assert_eq!(payment_status_for(resolved.status), Some(PaymentStatus::Paid));
    }

    #[tokio::test]
    async fn test_unknown_intent_is_payment_error() {
        let orchestrator = CheckoutOrchestrator::new(Arc::new(MockPaymentAdapter::default()));
        assert!(matches!(orchestrator.resolve("nope").await, Err(CoreError::Payment(_))));
    }

    #[tokio::test]
    async fn test_unavailable_gateway() {
        let adapter = Arc::new(MockPaymentAdapter::default());
        adapter.set_unavailable(true);
        let orchestrator = CheckoutOrchestrator::new(adapter);
        let err = orchestrator.start(&booking(BookingType::Direct, 1_000)).await.unwrap_err();
        assert!(matches!(err, CoreError::Payment(_)));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(payment_status_for(IntentStatus::Canceled), Some(PaymentStatus::Failed));
        assert_eq!(payment_status_for(IntentStatus::Refunded), Some(PaymentStatus::Refunded));
        assert_eq!(payment_status_for(IntentStatus::Processing), None);
    }
}
