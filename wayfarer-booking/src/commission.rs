use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wayfarer_core::{CoreError, CoreResult};

use crate::booking::{Booking, BookingType};

pub const DEFAULT_PERCENTAGE: f64 = 10.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionStatus {
    Pending,
    Paid,
    Cancelled,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "PENDING",
            CommissionStatus::Paid => "PAID",
            CommissionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommissionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(CommissionStatus::Pending),
            "PAID" => Ok(CommissionStatus::Paid),
            "CANCELLED" => Ok(CommissionStatus::Cancelled),
            other => Err(CoreError::validation(format!("Invalid commission status: {}", other))),
        }
    }
}

/// Fee owed to an agent for a confirmed agent-assisted booking. One per booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commission {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub booking_id: Uuid,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub percentage: f64,
    pub status: CommissionStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `total * percentage / 100`, rounded half away from zero.
pub fn compute_amount(total_price: i64, percentage: f64) -> i64 {
    (total_price as f64 * percentage / 100.0).round() as i64
}

impl Commission {
    /// Accrue on an agent booking that has an assigned agent.
    pub fn accrue(booking: &Booking, percentage: f64) -> CoreResult<Self> {
        if booking.booking_type != BookingType::Agent {
            return Err(CoreError::validation("Commissions only accrue on agent bookings"));
        }
        let agent_id = booking
            .agent_id
            .ok_or_else(|| CoreError::validation("Booking has no assigned agent"))?;
        if !(0.0..=100.0).contains(&percentage) {
            return Err(CoreError::validation("Commission percentage must be within 0-100"));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            agent_id,
            booking_id: booking.id,
            amount: compute_amount(booking.total_price, percentage),
            currency: booking.currency.clone(),
            percentage,
            status: CommissionStatus::Pending,
            paid_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// `paid_at` is stamped on the first transition to PAID only.
    pub fn set_status(&mut self, status: CommissionStatus) {
        let now = Utc::now();
        if status == CommissionStatus::Paid && self.paid_at.is_none() {
            self.paid_at = Some(now);
        }
        self.status = status;
        self.updated_at = now;
    }

    pub fn mark_paid(&mut self) {
        self.set_status(CommissionStatus::Paid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::booking;

    #[test]
    fn test_amount_rounding() {
        assert_eq!(compute_amount(123_456, 10.0), 12_346);
        assert_eq!(compute_amount(99_999, 12.5), 12_500);
        assert_eq!(compute_amount(0, 10.0), 0);
    }

    #[test]
    fn test_accrue_requires_assigned_agent_booking() {
        let mut b = booking(BookingType::Direct, 200_000);
        b.assign_agent(Uuid::new_v4());
        assert!(Commission::accrue(&b, DEFAULT_PERCENTAGE).is_err());

        let mut b = booking(BookingType::Agent, 200_000);
        assert!(Commission::accrue(&b, DEFAULT_PERCENTAGE).is_err());

        let agent = Uuid::new_v4();
        b.assign_agent(agent);
        let c = Commission::accrue(&b, DEFAULT_PERCENTAGE).unwrap();
        assert_eq!(c.agent_id, agent);
        assert_eq!(c.amount, 20_000);
        assert_eq!(c.status, CommissionStatus::Pending);
    }

    #[test]
    fn test_paid_at_set_once() {
        let mut b = booking(BookingType::Agent, 50_000);
        b.assign_agent(Uuid::new_v4());
        let mut c = Commission::accrue(&b, DEFAULT_PERCENTAGE).unwrap();

        c.mark_paid();
        let first = c.paid_at.unwrap();
        c.mark_paid();
        c.set_status(CommissionStatus::Paid);
        assert_eq!(c.paid_at, Some(first));
        assert_eq!(c.status, CommissionStatus::Paid);
    }
}
