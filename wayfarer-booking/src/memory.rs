use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;
use wayfarer_core::{CoreError, CoreResult};
use wayfarer_shared::{Page, PageRequest};

use crate::booking::{Booking, BookingStatus, PaymentStatus};
use crate::changes::BookingChange;
use crate::commission::{Commission, CommissionStatus};
use crate::repository::{BookingChangeRepository, BookingFilter, BookingRepository, CommissionRepository};

#[derive(Default)]
struct BookingTables {
    bookings: HashMap<Uuid, Booking>,
    commissions: HashMap<Uuid, Commission>,
    changes: Vec<BookingChange>,
}

/// In-memory booking store used by tests and storage-less local runs.
#[derive(Default)]
pub struct InMemoryBookingStore {
    tables: RwLock<BookingTables>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingStore {
    async fn insert(&self, booking: &Booking) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.bookings.values().any(|b| b.booking_reference == booking.booking_reference) {
            return Err(CoreError::conflict("Booking reference collision"));
        }
        tables.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> CoreResult<Option<Booking>> {
        Ok(self
            .tables
            .read()
            .await
            .bookings
            .values()
            .find(|b| b.booking_reference == reference)
            .cloned())
    }

    async fn find_by_payment_intent(&self, intent_id: &str) -> CoreResult<Option<Booking>> {
        Ok(self
            .tables
            .read()
            .await
            .bookings
            .values()
            .find(|b| b.payment_intent_id.as_deref() == Some(intent_id))
            .cloned())
    }

    async fn update(&self, booking: &Booking, seen: DateTime<Utc>) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.bookings.get_mut(&booking.id) {
            Some(existing) if existing.updated_at != seen => {
                Err(CoreError::conflict("Booking was modified concurrently, retry the request"))
            }
            Some(existing) => {
                *existing = booking.clone();
                Ok(())
            }
            None => Err(CoreError::not_found("Booking", booking.id)),
        }
    }

    async fn list(&self, filter: &BookingFilter, page: PageRequest) -> CoreResult<Page<Booking>> {
        let tables = self.tables.read().await;
        let mut bookings: Vec<Booking> = tables.bookings.values().filter(|b| filter.matches(b)).cloned().collect();
        if filter.oldest_first {
            bookings.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        } else {
            bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        Ok(page.apply(bookings))
    }

    async fn count_by_status(&self) -> CoreResult<Vec<(BookingStatus, u64)>> {
        let tables = self.tables.read().await;
        Ok(BookingStatus::ALL
            .iter()
            .map(|s| (*s, tables.bookings.values().filter(|b| b.status == *s).count() as u64))
            .collect())
    }

    async fn paid_revenue(&self) -> CoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .filter(|b| b.payment_status == PaymentStatus::Paid)
            .map(|b| b.total_price)
            .sum())
    }
}

#[async_trait]
impl CommissionRepository for InMemoryBookingStore {
    async fn insert(&self, commission: &Commission) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.commissions.values().any(|c| c.booking_id == commission.booking_id) {
            return Err(CoreError::conflict("Booking already has a commission"));
        }
        tables.commissions.insert(commission.id, commission.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Commission>> {
        Ok(self.tables.read().await.commissions.get(&id).cloned())
    }

    async fn find_by_booking(&self, booking_id: Uuid) -> CoreResult<Option<Commission>> {
        Ok(self
            .tables
            .read()
            .await
            .commissions
            .values()
            .find(|c| c.booking_id == booking_id)
            .cloned())
    }

    async fn update(&self, commission: &Commission) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.commissions.get_mut(&commission.id) {
            Some(existing) => {
                *existing = commission.clone();
                Ok(())
            }
            None => Err(CoreError::not_found("Commission", commission.id)),
        }
    }

    async fn list_for_agent(&self, agent_id: Uuid, status: Option<CommissionStatus>) -> CoreResult<Vec<Commission>> {
        let tables = self.tables.read().await;
        let mut commissions: Vec<Commission> = tables
            .commissions
            .values()
            .filter(|c| c.agent_id == agent_id && status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        commissions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(commissions)
    }
}

#[async_trait]
impl BookingChangeRepository for InMemoryBookingStore {
    async fn append(&self, change: &BookingChange) -> CoreResult<()> {
        self.tables.write().await.changes.push(change.clone());
        Ok(())
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> CoreResult<Vec<BookingChange>> {
        Ok(self
            .tables
            .read()
            .await
            .changes
            .iter()
            .filter(|c| c.booking_id == booking_id)
            .cloned()
            .collect())
    }
}
