use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use wayfarer_core::CoreResult;
use wayfarer_shared::{Page, PageRequest};

use crate::booking::{Booking, BookingStatus, BookingType};
use crate::changes::BookingChange;
use crate::commission::{Commission, CommissionStatus};

/// Optional filters for booking listings
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub user_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
    pub booking_type: Option<BookingType>,
    /// Only bookings no agent has picked up yet.
    pub unassigned: bool,
    /// Sort by creation time ascending instead of newest first.
    pub oldest_first: bool,
}

impl BookingFilter {
    pub fn matches(&self, b: &Booking) -> bool {
        self.user_id.map_or(true, |u| b.user_id == u)
            && self.agent_id.map_or(true, |a| b.agent_id == Some(a))
            && self.status.map_or(true, |s| b.status == s)
            && self.booking_type.map_or(true, |t| b.booking_type == t)
            && (!self.unassigned || b.agent_id.is_none())
    }
}

/// Repository trait for booking data access
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Fails with `Conflict` on a booking reference collision.
    async fn insert(&self, booking: &Booking) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    async fn find_by_reference(&self, reference: &str) -> CoreResult<Option<Booking>>;

    async fn find_by_payment_intent(&self, intent_id: &str) -> CoreResult<Option<Booking>>;

    /// Writes `booking` only if the stored row still carries `seen` as its
    /// `updated_at`; otherwise fails with `Conflict`.
    async fn update(&self, booking: &Booking, seen: DateTime<Utc>) -> CoreResult<()>;

    /// Newest first unless the filter asks for `oldest_first`.
    async fn list(&self, filter: &BookingFilter, page: PageRequest) -> CoreResult<Page<Booking>>;

    async fn count_by_status(&self) -> CoreResult<Vec<(BookingStatus, u64)>>;

    /// Sum of `total_price` over bookings whose payment status is PAID.
    async fn paid_revenue(&self) -> CoreResult<i64>;
}

/// Repository trait for agent commissions
#[async_trait]
pub trait CommissionRepository: Send + Sync {
    /// Fails with `Conflict` if the booking already has a commission.
    async fn insert(&self, commission: &Commission) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Commission>>;

    async fn find_by_booking(&self, booking_id: Uuid) -> CoreResult<Option<Commission>>;

    async fn update(&self, commission: &Commission) -> CoreResult<()>;

    async fn list_for_agent(&self, agent_id: Uuid, status: Option<CommissionStatus>) -> CoreResult<Vec<Commission>>;
}

/// Append-only audit trail
#[async_trait]
pub trait BookingChangeRepository: Send + Sync {
    async fn append(&self, change: &BookingChange) -> CoreResult<()>;

    /// Oldest first.
    async fn list_for_booking(&self, booking_id: Uuid) -> CoreResult<Vec<BookingChange>>;
}
