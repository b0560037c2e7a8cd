use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wayfarer_core::{CoreError, CoreResult};
use wayfarer_shared::Masked;

use crate::reference;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 4] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    /// Transitions the booking workflow accepts. The entity itself does not
    /// enforce these; see `Booking::set_status`.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled) | (Confirmed, Completed)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "COMPLETED" => Ok(BookingStatus::Completed),
            other => Err(CoreError::validation(format!("Invalid booking status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(CoreError::validation(format!("Invalid payment status: {}", other))),
        }
    }
}

/// Who fulfils the booking: the traveler pays directly, or an agent takes it over.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingType {
    Direct,
    Agent,
}

impl BookingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingType::Direct => "DIRECT",
            BookingType::Agent => "AGENT",
        }
    }
}

impl fmt::Display for BookingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DIRECT" => Ok(BookingType::Direct),
            "AGENT" => Ok(BookingType::Agent),
            other => Err(CoreError::validation(format!("Invalid booking type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub email: Masked<String>,
    pub phone: Option<Masked<String>>,
}

impl ContactInfo {
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::validation("Contact name is required"));
        }
        let email = self.email.expose();
        let valid = email
            .split_once('@')
            .map_or(false, |(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid {
            return Err(CoreError::validation("Contact email is invalid"));
        }
        Ok(())
    }
}

/// A validated stay window. Check-out must fall after check-in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StayDates {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayDates {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> CoreResult<Self> {
        if check_out < check_in {
            return Err(CoreError::validation("Check-out date is before check-in date"));
        }
        if check_out == check_in {
            return Err(CoreError::validation("Stay must last at least one night"));
        }
        Ok(Self { check_in, check_out })
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

/// A reservation against a destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub destination_id: Uuid,
    pub agent_id: Option<Uuid>,
    pub booking_type: BookingType,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: u32,
    pub total_price: i64,
    pub currency: String,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub booking_reference: String,
    pub contact: ContactInfo,
    pub special_requests: Option<String>,
    pub cancellation_reason: Option<String>,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// New bookings start PENDING/PENDING with a fresh reference.
    pub fn new(
        user_id: Uuid,
        destination_id: Uuid,
        booking_type: BookingType,
        dates: StayDates,
        guests: i64,
        total_price: i64,
        currency: &str,
        contact: ContactInfo,
    ) -> CoreResult<Self> {
        let guests = guest_count(guests)?;
        contact.validate()?;

        let now = stamp();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            destination_id,
            agent_id: None,
            booking_type,
            check_in: dates.check_in,
            check_out: dates.check_out,
            guests,
            total_price,
            currency: currency.to_string(),
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            booking_reference: reference::generate(),
            contact,
            special_requests: None,
            cancellation_reason: None,
            payment_intent_id: None,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            cancelled_at: None,
        })
    }

    pub fn dates(&self) -> StayDates {
        StayDates { check_in: self.check_in, check_out: self.check_out }
    }

    /// Unguarded mutator. Stamps `confirmed_at`/`cancelled_at` only on the first
    /// entry into that status.
    pub fn set_status(&mut self, status: BookingStatus) {
        self.touch();
        let now = self.updated_at;
        match status {
            BookingStatus::Confirmed if self.confirmed_at.is_none() => self.confirmed_at = Some(now),
            BookingStatus::Cancelled if self.cancelled_at.is_none() => self.cancelled_at = Some(now),
            _ => {}
        }
        self.status = status;
    }

    pub fn set_payment_status(&mut self, status: PaymentStatus) {
        self.payment_status = status;
        self.touch();
    }

    pub fn cancel(&mut self, reason: &str) -> CoreResult<()> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::validation("A cancellation reason is required"));
        }
        self.cancellation_reason = Some(reason.to_string());
        self.set_status(BookingStatus::Cancelled);
        Ok(())
    }

    pub fn assign_agent(&mut self, agent_id: Uuid) {
        self.agent_id = Some(agent_id);
        self.touch();
    }

    /// Marks the booking as modified. `updated_at` strictly increases, so it
    /// doubles as the row version checked by `BookingRepository::update`.
    pub fn touch(&mut self) {
        self.updated_at = stamp().max(self.updated_at + chrono::Duration::microseconds(1));
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    pub fn is_assigned_to(&self, agent_id: Uuid) -> bool {
        self.agent_id == Some(agent_id)
    }
}

pub const MAX_GUESTS: u32 = 100;

/// Validates a requested party size.
pub fn guest_count(guests: i64) -> CoreResult<u32> {
    if guests < 1 {
        return Err(CoreError::validation("At least one guest is required"));
    }
    match u32::try_from(guests) {
        Ok(n) if n <= MAX_GUESTS => Ok(n),
        _ => Err(CoreError::validation(format!("At most {} guests per booking", MAX_GUESTS))),
    }
}

/// Microsecond precision, matching Postgres `timestamptz`.
fn stamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn contact() -> ContactInfo {
        ContactInfo {
            name: "Ada Traveler".into(),
            email: Masked::new("ada@example.com".into()),
            phone: None,
        }
    }

    fn dates() -> StayDates {
        let check_in = NaiveDate::from_ymd_opt(2031, 6, 1).unwrap();
        StayDates::new(check_in, check_in + Duration::days(4)).unwrap()
    }

    fn booking() -> Booking {
        Booking::new(Uuid::new_v4(), Uuid::new_v4(), BookingType::Direct, dates(), 2, 80_000, "EUR", contact()).unwrap()
    }

    #[test]
    fn test_new_booking_starts_pending() {
        let b = booking();
        assert_eq!(b.status, BookingStatus::Pending);
        assert_eq!(b.payment_status, PaymentStatus::Pending);
        assert!(reference::is_well_formed(&b.booking_reference));
        assert!(b.confirmed_at.is_none());
        assert_eq!(b.dates().nights(), 4);
    }

    #[test]
    fn test_check_out_before_check_in_rejected() {
        let check_in = NaiveDate::from_ymd_opt(2031, 6, 10).unwrap();
        let err = StayDates::new(check_in, check_in - Duration::days(1)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(StayDates::new(check_in, check_in).is_err());
    }

    #[test]
    fn test_guest_count_must_be_positive() {
        for guests in [0, -3] {
            let err = Booking::new(Uuid::new_v4(), Uuid::new_v4(), BookingType::Direct, dates(), guests, 0, "EUR", contact())
                .unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)));
        }
    }

    #[test]
    fn test_guest_count_has_upper_bound() {
        assert_eq!(guest_count(MAX_GUESTS as i64).unwrap(), MAX_GUESTS);
        for guests in [MAX_GUESTS as i64 + 1, i64::from(u32::MAX) + 1, i64::MAX] {
            assert!(matches!(guest_count(guests), Err(CoreError::Validation(_))));
        }
        let err = Booking::new(Uuid::new_v4(), Uuid::new_v4(), BookingType::Direct, dates(), 3_000_000_000, 0, "EUR", contact())
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_timestamps_have_microsecond_precision() {
        let mut b = booking();
        assert_eq!(b.updated_at.timestamp_subsec_nanos() % 1_000, 0);
        let before = b.updated_at;
        b.touch();
        b.touch();
        assert_eq!(b.updated_at.timestamp_subsec_nanos() % 1_000, 0);
        assert!(b.updated_at >= before + Duration::microseconds(2));
    }

    #[test]
    fn test_confirmed_at_set_once() {
        let mut b = booking();
        b.set_status(BookingStatus::Confirmed);
        let first = b.confirmed_at.unwrap();

        b.set_status(BookingStatus::Pending);
        b.set_status(BookingStatus::Confirmed);
        assert_eq!(b.confirmed_at, Some(first));
        assert!(b.updated_at >= first);
    }

    #[test]
    fn test_cancelled_at_set_once() {
        let mut b = booking();
        b.cancel("Change of plans").unwrap();
        let first = b.cancelled_at.unwrap();
        b.set_status(BookingStatus::Cancelled);
        assert_eq!(b.cancelled_at, Some(first));
        assert_eq!(b.cancellation_reason.as_deref(), Some("Change of plans"));
    }

    #[test]
    fn test_cancel_requires_reason() {
        let mut b = booking();
        assert!(b.cancel("   ").is_err());
        assert_eq!(b.status, BookingStatus::Pending);
        assert!(b.cancelled_at.is_none());
    }

    #[test]
    fn test_payment_status_is_independent() {
        let mut b = booking();
        b.cancel("Weather").unwrap();
        b.set_payment_status(PaymentStatus::Paid);
        assert_eq!(b.status, BookingStatus::Cancelled);
        assert_eq!(b.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_workflow_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(Completed.is_terminal());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!("confirmed".parse::<BookingStatus>().unwrap(), BookingStatus::Confirmed);
        assert!("ARCHIVED".parse::<BookingStatus>().is_err());
        assert_eq!(serde_json::to_string(&PaymentStatus::Refunded).unwrap(), "\"REFUNDED\"");
    }
}
