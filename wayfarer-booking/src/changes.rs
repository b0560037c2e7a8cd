use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Created,
    Updated,
    AgentAssigned,
    StatusChanged,
    PaymentStatusChanged,
    Cancelled,
    CheckoutStarted,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Created => "CREATED",
            ChangeType::Updated => "UPDATED",
            ChangeType::AgentAssigned => "AGENT_ASSIGNED",
            ChangeType::StatusChanged => "STATUS_CHANGED",
            ChangeType::PaymentStatusChanged => "PAYMENT_STATUS_CHANGED",
            ChangeType::Cancelled => "CANCELLED",
            ChangeType::CheckoutStarted => "CHECKOUT_STARTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "CREATED" => ChangeType::Created,
            "UPDATED" => ChangeType::Updated,
            "AGENT_ASSIGNED" => ChangeType::AgentAssigned,
            "STATUS_CHANGED" => ChangeType::StatusChanged,
            "PAYMENT_STATUS_CHANGED" => ChangeType::PaymentStatusChanged,
            "CANCELLED" => ChangeType::Cancelled,
            "CHECKOUT_STARTED" => ChangeType::CheckoutStarted,
            _ => return None,
        })
    }
}

/// Who caused a change. `None` actor means the system (e.g. a payment webhook).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingChange {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub change_type: ChangeType,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub actor_id: Option<Uuid>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BookingChange {
    pub fn new(booking_id: Uuid, change_type: ChangeType, actor_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            change_type,
            old_value: None,
            new_value: None,
            actor_id,
            reason: None,
            created_at: Utc::now(),
        }
    }

    pub fn values(mut self, old: Option<Value>, new: Option<Value>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_type_round_trips_through_storage_string() {
        for t in [ChangeType::Created, ChangeType::Cancelled, ChangeType::PaymentStatusChanged] {
            assert_eq!(ChangeType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ChangeType::parse("REFUNDED"), None);
    }

    #[test]
    fn test_builder() {
        let booking_id = Uuid::new_v4();
        let change = BookingChange::new(booking_id, ChangeType::Cancelled, None)
            .values(Some(serde_json::json!({"status": "PENDING"})), Some(serde_json::json!({"status": "CANCELLED"})))
            .reason("Flight cancelled");
        assert_eq!(change.booking_id, booking_id);
        assert_eq!(change.reason.as_deref(), Some("Flight cancelled"));
        assert_eq!(change.new_value.unwrap()["status"], "CANCELLED");
    }
}
