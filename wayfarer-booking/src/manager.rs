use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use wayfarer_catalog::{Destination, DestinationRepository};
use wayfarer_core::payment::{PaymentAdapter, PaymentIntent};
use wayfarer_core::{Actor, CoreError, CoreResult};
use wayfarer_shared::{Page, PageRequest};

use crate::booking::{guest_count, Booking, BookingStatus, BookingType, ContactInfo, PaymentStatus, StayDates};
use crate::changes::{BookingChange, ChangeType};
use crate::checkout::{payment_status_for, CheckoutOrchestrator};
use crate::commission::{Commission, CommissionStatus};
use crate::repository::{BookingChangeRepository, BookingFilter, BookingRepository, CommissionRepository};
use crate::routing::{self, BookingRules, RoutingDecision};

/// Traveler input for a new booking
#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub destination_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i64,
    pub contact: ContactInfo,
    pub special_requests: Option<String>,
    #[serde(default)]
    pub request_agent: bool,
}

/// Edits allowed while a booking is still PENDING
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingUpdate {
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub guests: Option<i64>,
    pub special_requests: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedBooking {
    pub booking: Booking,
    pub routing: RoutingDecision,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AgentBookingSummary {
    pub assigned_bookings: u64,
    pub active_bookings: u64,
    pub completed_bookings: u64,
    pub pending_commission: i64,
    pub paid_commission: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingStats {
    pub by_status: BTreeMap<String, u64>,
    /// Sum over PAID bookings, minor units.
    pub total_revenue: i64,
}

/// Drives the booking lifecycle: routing, workflow transitions, checkout
/// and commission bookkeeping.
pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    commissions: Arc<dyn CommissionRepository>,
    changes: Arc<dyn BookingChangeRepository>,
    destinations: Arc<dyn DestinationRepository>,
    checkout: CheckoutOrchestrator,
    rules: BookingRules,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        commissions: Arc<dyn CommissionRepository>,
        changes: Arc<dyn BookingChangeRepository>,
        destinations: Arc<dyn DestinationRepository>,
        payments: Arc<dyn PaymentAdapter>,
        rules: BookingRules,
    ) -> Self {
        Self {
            bookings,
            commissions,
            changes,
            destinations,
            checkout: CheckoutOrchestrator::new(payments),
            rules,
        }
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }

    pub async fn create(&self, actor: &Actor, input: NewBooking) -> CoreResult<CreatedBooking> {
        let destination = self.bookable_destination(input.destination_id).await?;
        let dates = future_stay(input.check_in, input.check_out)?;
        let guests = guest_count(input.guests)?;
        let total_price = quote(&destination, &dates, i64::from(guests))?;
        let decision = routing::route(&self.rules, &destination, guests, total_price, input.request_agent);

        let mut booking = Booking::new(
            actor.user_id,
            destination.id,
            decision.booking_type,
            dates,
            input.guests,
            total_price,
            &destination.currency,
            input.contact,
        )?;
        booking.special_requests = input.special_requests.filter(|s| !s.trim().is_empty());

        self.bookings.insert(&booking).await?;
        self.record(
            BookingChange::new(booking.id, ChangeType::Created, Some(actor.user_id)).values(
                None,
                Some(json!({
                    "status": booking.status,
                    "booking_type": booking.booking_type,
                    "routing_reason": decision.reason,
                    "total_price": booking.total_price,
                })),
            ),
        )
        .await?;

        tracing::info!(
            booking_id = %booking.id,
            reference = %booking.booking_reference,
            booking_type = %booking.booking_type,
            reason = ?decision.reason,
            "Booking created"
        );
        Ok(CreatedBooking { booking, routing: decision })
    }

    pub async fn list_mine(
        &self,
        actor: &Actor,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> CoreResult<Page<Booking>> {
        let filter = BookingFilter { user_id: Some(actor.user_id), status, ..Default::default() };
        self.bookings.list(&filter, page).await
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> CoreResult<Booking> {
        let booking = self.load(id).await?;
        authorize_view(actor, &booking)?;
        Ok(booking)
    }

    pub async fn history(&self, actor: &Actor, id: Uuid) -> CoreResult<Vec<BookingChange>> {
        let booking = self.get(actor, id).await?;
        self.changes.list_for_booking(booking.id).await
    }

    /// Change dates, guests or requests. Re-quotes the price.
    pub async fn update(&self, actor: &Actor, id: Uuid, update: BookingUpdate) -> CoreResult<Booking> {
        let mut booking = self.load(id).await?;
        if !booking.is_owned_by(actor.user_id) && !actor.is_admin() {
            return Err(CoreError::forbidden("Only the traveler can edit this booking"));
        }
        if booking.status != BookingStatus::Pending {
            return Err(CoreError::validation(format!(
                "Booking can only be edited while PENDING (currently {})",
                booking.status
            )));
        }
        let seen = booking.updated_at;
        let before = json!({
            "check_in": booking.check_in,
            "check_out": booking.check_out,
            "guests": booking.guests,
            "total_price": booking.total_price,
        });

        let dates = future_stay(
            update.check_in.unwrap_or(booking.check_in),
            update.check_out.unwrap_or(booking.check_out),
        )?;
        let guests = guest_count(update.guests.unwrap_or(i64::from(booking.guests)))?;
        let destination = self.load_destination(booking.destination_id).await?;

        booking.total_price = quote(&destination, &dates, i64::from(guests))?;
        booking.guests = guests;
        booking.check_in = dates.check_in;
        booking.check_out = dates.check_out;
        if let Some(requests) = update.special_requests {
            booking.special_requests = Some(requests).filter(|s| !s.trim().is_empty());
        }
        booking.touch();

        self.bookings.update(&booking, seen).await?;
        self.record(BookingChange::new(booking.id, ChangeType::Updated, Some(actor.user_id)).values(
            Some(before),
            Some(json!({
                "check_in": booking.check_in,
                "check_out": booking.check_out,
                "guests": booking.guests,
                "total_price": booking.total_price,
            })),
        ))
        .await?;
        Ok(booking)
    }

    pub async fn cancel(&self, actor: &Actor, id: Uuid, reason: &str) -> CoreResult<Booking> {
        let mut booking = self.load(id).await?;
        if !booking.is_owned_by(actor.user_id) && !booking.is_assigned_to(actor.user_id) && !actor.is_admin() {
            return Err(CoreError::forbidden("Not allowed to cancel this booking"));
        }
        self.ensure_transition(&booking, BookingStatus::Cancelled)?;
        let (previous, seen) = (booking.status, booking.updated_at);
        booking.cancel(reason)?;

        self.bookings.update(&booking, seen).await?;
        self.cancel_pending_commission(booking.id).await?;
        self.record(
            BookingChange::new(booking.id, ChangeType::Cancelled, Some(actor.user_id))
                .values(Some(json!(previous)), Some(json!(booking.status)))
                .reason(booking.cancellation_reason.clone().unwrap_or_default()),
        )
        .await?;

        tracing::info!(booking_id = %booking.id, actor = %actor.user_id, "Booking cancelled");
        Ok(booking)
    }

    pub async fn complete(&self, actor: &Actor, id: Uuid) -> CoreResult<Booking> {
        let mut booking = self.load(id).await?;
        if !booking.is_owned_by(actor.user_id) && !booking.is_assigned_to(actor.user_id) && !actor.is_admin() {
            return Err(CoreError::forbidden("Not allowed to complete this booking"));
        }
        self.ensure_transition(&booking, BookingStatus::Completed)?;
        self.transition(&mut booking, BookingStatus::Completed, Some(actor.user_id), None).await?;
        Ok(booking)
    }

    /// Hand an AGENT booking to an agent. Agents claim for themselves; admins
    /// may name the agent.
    pub async fn assign_agent(&self, actor: &Actor, id: Uuid, agent_id: Option<Uuid>) -> CoreResult<Booking> {
        if !actor.is_agent() {
            return Err(CoreError::forbidden("Agent role required"));
        }
        let agent_id = agent_id.unwrap_or(actor.user_id);
        if agent_id != actor.user_id && !actor.is_admin() {
            return Err(CoreError::forbidden("Agents can only assign bookings to themselves"));
        }

        let mut booking = self.load(id).await?;
        if booking.booking_type != BookingType::Agent {
            return Err(CoreError::validation("Only agent bookings can be assigned"));
        }
        if booking.status != BookingStatus::Pending {
            return Err(CoreError::validation(format!("Cannot assign a {} booking", booking.status)));
        }
        match booking.agent_id {
            Some(current) if current == agent_id => return Ok(booking),
            Some(_) if !actor.is_admin() => {
                return Err(CoreError::conflict("Booking is already assigned to another agent"));
            }
            _ => {}
        }

        let (previous, seen) = (booking.agent_id, booking.updated_at);
        booking.assign_agent(agent_id);
        self.bookings.update(&booking, seen).await?;
        self.record(
            BookingChange::new(booking.id, ChangeType::AgentAssigned, Some(actor.user_id))
                .values(previous.map(|a| json!(a)), Some(json!(agent_id))),
        )
        .await?;

        tracing::info!(booking_id = %booking.id, agent_id = %agent_id, "Agent assigned");
        Ok(booking)
    }

    /// PENDING to CONFIRMED by the assigned agent or an admin. Accrues the
    /// agent's commission on AGENT bookings.
    pub async fn confirm(&self, actor: &Actor, id: Uuid) -> CoreResult<Booking> {
        let mut booking = self.load(id).await?;
        if !booking.is_assigned_to(actor.user_id) && !actor.is_admin() {
            return Err(CoreError::forbidden("Only the assigned agent can confirm this booking"));
        }
        self.ensure_transition(&booking, BookingStatus::Confirmed)?;
        if booking.booking_type == BookingType::Agent && booking.agent_id.is_none() {
            return Err(CoreError::validation("Agent bookings need an assigned agent before confirmation"));
        }
        self.transition(&mut booking, BookingStatus::Confirmed, Some(actor.user_id), None).await?;
        self.accrue_commission(&booking).await?;
        Ok(booking)
    }

    /// Open a provider checkout session for a DIRECT booking awaiting payment.
    pub async fn checkout_session(&self, actor: &Actor, id: Uuid) -> CoreResult<PaymentIntent> {
        let mut booking = self.load(id).await?;
        if !booking.is_owned_by(actor.user_id) {
            return Err(CoreError::forbidden("Only the traveler can pay for this booking"));
        }
        if booking.booking_type != BookingType::Direct {
            return Err(CoreError::validation("Agent bookings are settled through the agent"));
        }
        if booking.status != BookingStatus::Pending {
            return Err(CoreError::validation(format!("Cannot pay for a {} booking", booking.status)));
        }
        if booking.payment_status == PaymentStatus::Paid {
            return Err(CoreError::conflict("Booking is already paid"));
        }

        let seen = booking.updated_at;
        let intent = self.checkout.start(&booking).await?;
        let previous = booking.payment_intent_id.replace(intent.id.clone());
        booking.touch();
        self.bookings.update(&booking, seen).await?;
        self.record(
            BookingChange::new(booking.id, ChangeType::CheckoutStarted, Some(actor.user_id))
                .values(previous.map(|p| json!(p)), Some(json!(intent.id))),
        )
        .await?;

        tracing::info!(booking_id = %booking.id, intent_id = %intent.id, "Checkout session created");
        Ok(intent)
    }

    /// Webhook entry point. The intent is re-read from the provider; PAID
    /// confirms a DIRECT booking that is still PENDING. Replays are no-ops.
    pub async fn apply_payment_update(&self, intent_id: &str) -> CoreResult<Booking> {
        let intent = self.checkout.resolve(intent_id).await?;
        let mut booking = match self.bookings.find_by_payment_intent(&intent.id).await? {
            Some(b) => b,
            None => return Err(CoreError::not_found("Booking", format!("payment intent {}", intent.id))),
        };

        let Some(payment_status) = payment_status_for(intent.status) else {
            tracing::debug!(intent_id = %intent.id, status = ?intent.status, "Payment still in flight");
            return Ok(booking);
        };
        if booking.payment_status == payment_status {
            return Ok(booking);
        }

        let (previous, seen) = (booking.payment_status, booking.updated_at);
        booking.set_payment_status(payment_status);
        self.bookings.update(&booking, seen).await?;
        self.record(
            BookingChange::new(booking.id, ChangeType::PaymentStatusChanged, None)
                .values(Some(json!(previous)), Some(json!(payment_status))),
        )
        .await?;

        match payment_status {
            PaymentStatus::Paid
                if booking.booking_type == BookingType::Direct && booking.status == BookingStatus::Pending =>
            {
                self.transition(&mut booking, BookingStatus::Confirmed, None, None).await?;
            }
            PaymentStatus::Failed => {
                tracing::warn!(booking_id = %booking.id, intent_id = %intent.id, "Payment failed");
            }
            _ => {}
        }
        Ok(booking)
    }

    /// AGENT bookings no agent has claimed yet, oldest first.
    pub async fn list_pending_for_agents(&self, actor: &Actor, page: PageRequest) -> CoreResult<Page<Booking>> {
        if !actor.is_agent() {
            return Err(CoreError::forbidden("Agent role required"));
        }
        let filter = BookingFilter {
            status: Some(BookingStatus::Pending),
            booking_type: Some(BookingType::Agent),
            unassigned: true,
            oldest_first: true,
            ..Default::default()
        };
        self.bookings.list(&filter, page).await
    }

    pub async fn list_for_agent(
        &self,
        actor: &Actor,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> CoreResult<Page<Booking>> {
        if !actor.is_agent() {
            return Err(CoreError::forbidden("Agent role required"));
        }
        let filter = BookingFilter { agent_id: Some(actor.user_id), status, ..Default::default() };
        self.bookings.list(&filter, page).await
    }

    pub async fn list_all(&self, actor: &Actor, filter: BookingFilter, page: PageRequest) -> CoreResult<Page<Booking>> {
        require_admin(actor)?;
        self.bookings.list(&filter, page).await
    }

    /// Admin override. Skips the workflow transition table but keeps the
    /// timestamp, commission and audit bookkeeping.
    pub async fn force_status(
        &self,
        actor: &Actor,
        id: Uuid,
        status: BookingStatus,
        reason: Option<String>,
    ) -> CoreResult<Booking> {
        require_admin(actor)?;
        let mut booking = self.load(id).await?;
        if booking.status == status {
            return Ok(booking);
        }

        if status == BookingStatus::Cancelled {
            let (previous, seen) = (booking.status, booking.updated_at);
            let reason = reason.unwrap_or_else(|| "Cancelled by administrator".to_string());
            booking.cancel(&reason)?;
            self.bookings.update(&booking, seen).await?;
            self.cancel_pending_commission(booking.id).await?;
            self.record(
                BookingChange::new(booking.id, ChangeType::Cancelled, Some(actor.user_id))
                    .values(Some(json!(previous)), Some(json!(status)))
                    .reason(reason),
            )
            .await?;
        } else {
            self.transition(&mut booking, status, Some(actor.user_id), reason).await?;
            if status == BookingStatus::Confirmed {
                self.accrue_commission(&booking).await?;
            }
        }

        tracing::warn!(booking_id = %booking.id, status = %status, admin = %actor.user_id, "Booking status forced");
        Ok(booking)
    }

    pub async fn commissions_for_agent(
        &self,
        actor: &Actor,
        status: Option<CommissionStatus>,
    ) -> CoreResult<Vec<Commission>> {
        if !actor.is_agent() {
            return Err(CoreError::forbidden("Agent role required"));
        }
        self.commissions.list_for_agent(actor.user_id, status).await
    }

    pub async fn pay_commission(&self, actor: &Actor, commission_id: Uuid) -> CoreResult<Commission> {
        require_admin(actor)?;
        let mut commission = self
            .commissions
            .get(commission_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Commission", commission_id))?;
        match commission.status {
            CommissionStatus::Paid => return Ok(commission),
            CommissionStatus::Cancelled => {
                return Err(CoreError::validation("Cancelled commissions cannot be paid"));
            }
            CommissionStatus::Pending => {}
        }
        commission.mark_paid();
        self.commissions.update(&commission).await?;
        tracing::info!(commission_id = %commission.id, agent_id = %commission.agent_id, amount = commission.amount, "Commission paid");
        Ok(commission)
    }

    pub async fn agent_summary(&self, agent_id: Uuid) -> CoreResult<AgentBookingSummary> {
        let mut summary = AgentBookingSummary::default();
        let count = |status: Option<BookingStatus>| BookingFilter {
            agent_id: Some(agent_id),
            status,
            ..Default::default()
        };
        let probe = PageRequest::new(1, 1);
        summary.assigned_bookings = self.bookings.list(&count(None), probe).await?.total;
        summary.active_bookings = self.bookings.list(&count(Some(BookingStatus::Pending)), probe).await?.total
            + self.bookings.list(&count(Some(BookingStatus::Confirmed)), probe).await?.total;
        summary.completed_bookings = self.bookings.list(&count(Some(BookingStatus::Completed)), probe).await?.total;

        for c in self.commissions.list_for_agent(agent_id, None).await? {
            match c.status {
                CommissionStatus::Pending => summary.pending_commission += c.amount,
                CommissionStatus::Paid => summary.paid_commission += c.amount,
                CommissionStatus::Cancelled => {}
            }
        }
        Ok(summary)
    }

    /// True when `agent_id` is assigned to at least one of `client_id`'s bookings.
    pub async fn has_assignment(&self, agent_id: Uuid, client_id: Uuid) -> CoreResult<bool> {
        let filter = BookingFilter { agent_id: Some(agent_id), user_id: Some(client_id), ..Default::default() };
        Ok(self.bookings.list(&filter, PageRequest::new(1, 1)).await?.total > 0)
    }

    pub async fn stats(&self) -> CoreResult<BookingStats> {
        let by_status = self
            .bookings
            .count_by_status()
            .await?
            .into_iter()
            .map(|(status, n)| (status.as_str().to_string(), n))
            .collect();
        Ok(BookingStats { by_status, total_revenue: self.bookings.paid_revenue().await? })
    }

    async fn load(&self, id: Uuid) -> CoreResult<Booking> {
        self.bookings.get(id).await?.ok_or_else(|| CoreError::not_found("Booking", id))
    }

    async fn load_destination(&self, id: Uuid) -> CoreResult<Destination> {
        self.destinations.get(id).await?.ok_or_else(|| CoreError::not_found("Destination", id))
    }

    async fn bookable_destination(&self, id: Uuid) -> CoreResult<Destination> {
        let destination = self.load_destination(id).await?;
        if !destination.is_active {
            return Err(CoreError::validation("Destination is not open for booking"));
        }
        Ok(destination)
    }

    fn ensure_transition(&self, booking: &Booking, next: BookingStatus) -> CoreResult<()> {
        if !booking.status.can_transition_to(next) {
            return Err(CoreError::validation(format!(
                "Cannot move booking from {} to {}",
                booking.status, next
            )));
        }
        Ok(())
    }

    async fn transition(
        &self,
        booking: &mut Booking,
        next: BookingStatus,
        actor: Option<Uuid>,
        reason: Option<String>,
    ) -> CoreResult<()> {
        let (previous, seen) = (booking.status, booking.updated_at);
        booking.set_status(next);
        self.bookings.update(booking, seen).await?;
        let mut change = BookingChange::new(booking.id, ChangeType::StatusChanged, actor)
            .values(Some(json!(previous)), Some(json!(next)));
        if let Some(reason) = reason {
            change = change.reason(reason);
        }
        self.record(change).await?;
        tracing::info!(booking_id = %booking.id, from = %previous, to = %next, "Booking status changed");
        Ok(())
    }

    async fn accrue_commission(&self, booking: &Booking) -> CoreResult<Option<Commission>> {
        if booking.booking_type != BookingType::Agent || booking.agent_id.is_none() {
            return Ok(None);
        }
        if self.commissions.find_by_booking(booking.id).await?.is_some() {
            return Ok(None);
        }
        let commission = Commission::accrue(booking, self.rules.commission_percentage)?;
        self.commissions.insert(&commission).await?;
        tracing::info!(
            booking_id = %booking.id,
            agent_id = %commission.agent_id,
            amount = commission.amount,
            "Commission accrued"
        );
        Ok(Some(commission))
    }

    async fn cancel_pending_commission(&self, booking_id: Uuid) -> CoreResult<()> {
        if let Some(mut commission) = self.commissions.find_by_booking(booking_id).await? {
            if commission.status == CommissionStatus::Pending {
                commission.set_status(CommissionStatus::Cancelled);
                self.commissions.update(&commission).await?;
            }
        }
        Ok(())
    }

    async fn record(&self, change: BookingChange) -> CoreResult<()> {
        self.changes.append(&change).await
    }
}

fn require_admin(actor: &Actor) -> CoreResult<()> {
    if !actor.is_admin() {
        return Err(CoreError::forbidden("Admin role required"));
    }
    Ok(())
}

/// Owner, assigned agent and admins see a booking. Agents also see
/// unclaimed AGENT bookings so they can pick them up.
fn authorize_view(actor: &Actor, booking: &Booking) -> CoreResult<()> {
    let open_for_agents = actor.is_agent()
        && booking.booking_type == BookingType::Agent
        && booking.agent_id.is_none()
        && booking.status == BookingStatus::Pending;
    if booking.is_owned_by(actor.user_id) || booking.is_assigned_to(actor.user_id) || actor.is_admin() || open_for_agents {
        return Ok(());
    }
    Err(CoreError::forbidden("Not allowed to view this booking"))
}

fn future_stay(check_in: NaiveDate, check_out: NaiveDate) -> CoreResult<StayDates> {
    let dates = StayDates::new(check_in, check_out)?;
    if dates.check_in < Utc::now().date_naive() {
        return Err(CoreError::validation("Check-in date is in the past"));
    }
    Ok(dates)
}

/// Destination minimum nightly price × nights × guests.
fn quote(destination: &Destination, dates: &StayDates, guests: i64) -> CoreResult<i64> {
    destination
        .price_range
        .min
        .checked_mul(dates.nights())
        .and_then(|p| p.checked_mul(guests))
        .ok_or_else(|| CoreError::validation("Booking total is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use wayfarer_catalog::InMemoryCatalogStore;
    use wayfarer_core::payment::IntentStatus;
    use wayfarer_core::Role;
    use wayfarer_shared::Masked;

    use crate::checkout::MockPaymentAdapter;
    use crate::memory::InMemoryBookingStore;
    use crate::test_support::destination;

    struct Harness {
        service: BookingService,
        catalog: Arc<InMemoryCatalogStore>,
        store: Arc<InMemoryBookingStore>,
        payments: Arc<MockPaymentAdapter>,
    }

    fn harness() -> Harness {
        let catalog = Arc::new(InMemoryCatalogStore::new());
        let store = Arc::new(InMemoryBookingStore::new());
        let payments = Arc::new(MockPaymentAdapter::default());
        let service = BookingService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            catalog.clone(),
            payments.clone(),
            BookingRules::default(),
        );
        Harness { service, catalog, store, payments }
    }

    async fn add_destination(h: &Harness, category: &str, tags: &[&str]) -> Destination {
        let d = destination("Lisbon", category, tags);
        DestinationRepository::insert(h.catalog.as_ref(), &d).await.unwrap();
        d
    }

    fn traveler() -> Actor {
        Actor::new(Uuid::new_v4(), [])
    }

    fn agent() -> Actor {
        Actor::new(Uuid::new_v4(), [Role::Agent])
    }

    fn admin() -> Actor {
        Actor::new(Uuid::new_v4(), [Role::Admin])
    }

    fn request(destination_id: Uuid, guests: i64, request_agent: bool) -> NewBooking {
        let check_in = Utc::now().date_naive() + Duration::days(30);
        NewBooking {
            destination_id,
            check_in,
            check_out: check_in + Duration::days(3),
            guests,
            contact: ContactInfo {
                name: "Ada Traveler".into(),
                email: Masked::new("ada@example.com".into()),
                phone: None,
            },
            special_requests: None,
            request_agent,
        }
    }

    #[tokio::test]
    async fn test_create_direct_booking_quotes_price() {
        let h = harness();
        let d = add_destination(&h, "CITY", &[]).await;
        let user = traveler();

        let created = h.service.create(&user, request(d.id, 2, false)).await.unwrap();
        let b = created.booking;
        assert_eq!(b.booking_type, BookingType::Direct);
        assert_eq!(b.status, BookingStatus::Pending);
        assert_eq!(b.payment_status, PaymentStatus::Pending);
        assert_eq!(b.total_price, 8_000 * 3 * 2);
        assert_eq!(b.currency, "EUR");

        let history = h.service.history(&user, b.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].change_type, ChangeType::Created);
    }

    #[tokio::test]
    async fn test_create_routes_to_agent() {
        let h = harness();
        let d = add_destination(&h, "CITY", &[]).await;
        let created = h.service.create(&traveler(), request(d.id, 1, true)).await.unwrap();
        assert_eq!(created.booking.booking_type, BookingType::Agent);

        let group = h.service.create(&traveler(), request(d.id, 8, false)).await.unwrap();
        assert_eq!(group.booking.booking_type, BookingType::Agent);
        assert_eq!(group.routing.reason, routing::RoutingReason::GroupSize);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let h = harness();
        let d = add_destination(&h, "CITY", &[]).await;
        let user = traveler();

        let err = h.service.create(&user, request(d.id, 0, false)).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let mut inverted = request(d.id, 2, false);
        inverted.check_out = inverted.check_in - Duration::days(1);
        assert!(matches!(h.service.create(&user, inverted).await, Err(CoreError::Validation(_))));

        let mut past = request(d.id, 2, false);
        past.check_in = Utc::now().date_naive() - Duration::days(5);
        past.check_out = past.check_in + Duration::days(2);
        assert!(matches!(h.service.create(&user, past).await, Err(CoreError::Validation(_))));

        let missing = h.service.create(&user, request(Uuid::new_v4(), 2, false)).await.unwrap_err();
        assert!(matches!(missing, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_inactive_destination_rejected() {
        let h = harness();
        let mut d = add_destination(&h, "CITY", &[]).await;
        d.is_active = false;
        DestinationRepository::update(h.catalog.as_ref(), &d).await.unwrap();

        let err = h.service.create(&traveler(), request(d.id, 2, false)).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_visibility() {
        let h = harness();
        let d = add_destination(&h, "CITY", &[]).await;
        let owner = traveler();
        let b = h.service.create(&owner, request(d.id, 2, false)).await.unwrap().booking;

        assert!(h.service.get(&owner, b.id).await.is_ok());
        assert!(h.service.get(&admin(), b.id).await.is_ok());
        assert!(matches!(h.service.get(&traveler(), b.id).await, Err(CoreError::Authorization(_))));
        // Direct bookings are not in the agent pool.
        assert!(h.service.get(&agent(), b.id).await.is_err());
    }

    #[tokio::test]
    async fn test_update_requotes_while_pending() {
        let h = harness();
        let d = add_destination(&h, "CITY", &[]).await;
        let owner = traveler();
        let b = h.service.create(&owner, request(d.id, 2, false)).await.unwrap().booking;

        let updated = h
            .service
            .update(&owner, b.id, BookingUpdate { guests: Some(3), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.guests, 3);
        assert_eq!(updated.total_price, 8_000 * 3 * 3);

        h.service.cancel(&owner, b.id, "Plans changed").await.unwrap();
        let err = h
            .service
            .update(&owner, b.id, BookingUpdate { guests: Some(1), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_cancel_requires_reason_and_is_audited() {
        let h = harness();
        let d = add_destination(&h, "CITY", &[]).await;
        let owner = traveler();
        let b = h.service.create(&owner, request(d.id, 2, false)).await.unwrap().booking;

        assert!(matches!(h.service.cancel(&owner, b.id, " ").await, Err(CoreError::Validation(_))));
        let cancelled = h.service.cancel(&owner, b.id, "Flight cancelled").await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());

        let history = h.service.history(&owner, b.id).await.unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.change_type, ChangeType::Cancelled);
        assert_eq!(last.reason.as_deref(), Some("Flight cancelled"));

        // Terminal.
        assert!(h.service.cancel(&owner, b.id, "again").await.is_err());
        assert!(h.service.complete(&owner, b.id).await.is_err());
    }

    #[tokio::test]
    async fn test_agent_flow_accrues_commission_once() {
        let h = harness();
        let d = add_destination(&h, "EXPEDITION", &[]).await;
        let owner = traveler();
        let agent = agent();
        let b = h.service.create(&owner, request(d.id, 2, false)).await.unwrap().booking;
        assert_eq!(b.booking_type, BookingType::Agent);

        let pool = h.service.list_pending_for_agents(&agent, PageRequest::default()).await.unwrap();
        assert_eq!(pool.total, 1);
        assert!(h.service.list_pending_for_agents(&owner, PageRequest::default()).await.is_err());

        // Unassigned agent bookings cannot be confirmed.
        assert!(h.service.confirm(&admin(), b.id).await.is_err());

        h.service.assign_agent(&agent, b.id, None).await.unwrap();
        let other = self::agent();
        assert!(matches!(h.service.assign_agent(&other, b.id, None).await, Err(CoreError::Conflict(_))));
        assert!(matches!(h.service.confirm(&other, b.id).await, Err(CoreError::Authorization(_))));

        let confirmed = h.service.confirm(&agent, b.id).await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        let first_confirmed = confirmed.confirmed_at.unwrap();

        // A forced round-trip does not mint a second commission or restamp confirmed_at.
        let root = admin();
        h.service.force_status(&root, b.id, BookingStatus::Pending, None).await.unwrap();
        let again = h.service.force_status(&root, b.id, BookingStatus::Confirmed, None).await.unwrap();
        assert_eq!(again.confirmed_at, Some(first_confirmed));

        let commissions = h.service.commissions_for_agent(&agent, None).await.unwrap();
        assert_eq!(commissions.len(), 1);
        assert_eq!(commissions[0].amount, b.total_price / 10);

        let summary = h.service.agent_summary(agent.user_id).await.unwrap();
        assert_eq!(summary.assigned_bookings, 1);
        assert_eq!(summary.pending_commission, b.total_price / 10);
        assert!(h.service.has_assignment(agent.user_id, owner.user_id).await.unwrap());
        assert!(!h.service.has_assignment(other.user_id, owner.user_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_cancels_pending_commission() {
        let h = harness();
        let d = add_destination(&h, "EXPEDITION", &[]).await;
        let owner = traveler();
        let agent = agent();
        let b = h.service.create(&owner, request(d.id, 2, false)).await.unwrap().booking;
        h.service.assign_agent(&agent, b.id, None).await.unwrap();
        h.service.confirm(&agent, b.id).await.unwrap();

        h.service.cancel(&owner, b.id, "Illness").await.unwrap();
        let commission = CommissionRepository::find_by_booking(h.store.as_ref(), b.id).await.unwrap().unwrap();
        assert_eq!(commission.status, CommissionStatus::Cancelled);
        assert!(h.service.pay_commission(&admin(), commission.id).await.is_err());
    }

    #[tokio::test]
    async fn test_pay_commission() {
        let h = harness();
        let d = add_destination(&h, "CITY", &["agent-assisted"]).await;
        let agent = agent();
        let b = h.service.create(&traveler(), request(d.id, 1, false)).await.unwrap().booking;
        h.service.assign_agent(&agent, b.id, None).await.unwrap();
        h.service.confirm(&agent, b.id).await.unwrap();

        let commission = h.service.commissions_for_agent(&agent, None).await.unwrap().remove(0);
        assert!(matches!(h.service.pay_commission(&agent, commission.id).await, Err(CoreError::Authorization(_))));
        let paid = h.service.pay_commission(&admin(), commission.id).await.unwrap();
        assert_eq!(paid.status, CommissionStatus::Paid);
        assert!(paid.paid_at.is_some());

        let summary = h.service.agent_summary(agent.user_id).await.unwrap();
        assert_eq!(summary.pending_commission, 0);
        assert_eq!(summary.paid_commission, paid.amount);
    }

    #[tokio::test]
    async fn test_checkout_and_webhook_confirm_direct_booking() {
        let h = harness();
        let d = add_destination(&h, "CITY", &[]).await;
        let owner = traveler();
        let b = h.service.create(&owner, request(d.id, 2, false)).await.unwrap().booking;

        assert!(h.service.checkout_session(&traveler(), b.id).await.is_err());
        let intent = h.service.checkout_session(&owner, b.id).await.unwrap();
        assert_eq!(intent.amount, b.total_price);

        // Still processing: nothing changes.
        let unchanged = h.service.apply_payment_update(&intent.id).await.unwrap();
        assert_eq!(unchanged.payment_status, PaymentStatus::Pending);

        h.payments.set_status(&intent.id, IntentStatus::Succeeded).await.unwrap();
        let paid = h.service.apply_payment_update(&intent.id).await.unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.status, BookingStatus::Confirmed);

        // Replayed webhook is a no-op.
        let replay = h.service.apply_payment_update(&intent.id).await.unwrap();
        assert_eq!(replay.confirmed_at, paid.confirmed_at);

        let stats = h.service.stats().await.unwrap();
        assert_eq!(stats.total_revenue, b.total_price);
        assert_eq!(stats.by_status.get("CONFIRMED"), Some(&1));

        assert!(matches!(h.service.checkout_session(&owner, b.id).await, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_failed_payment_keeps_booking_pending() {
        let h = harness();
        let d = add_destination(&h, "CITY", &[]).await;
        let owner = traveler();
        let b = h.service.create(&owner, request(d.id, 2, false)).await.unwrap().booking;
        let intent = h.service.checkout_session(&owner, b.id).await.unwrap();

        h.payments.set_status(&intent.id, IntentStatus::Failed).await.unwrap();
        let failed = h.service.apply_payment_update(&intent.id).await.unwrap();
        assert_eq!(failed.payment_status, PaymentStatus::Failed);
        assert_eq!(failed.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_checkout_rejected_for_agent_bookings() {
        let h = harness();
        let d = add_destination(&h, "CITY", &[]).await;
        let owner = traveler();
        let b = h.service.create(&owner, request(d.id, 2, true)).await.unwrap().booking;
        assert!(matches!(h.service.checkout_session(&owner, b.id).await, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_admin_listing() {
        let h = harness();
        let d = add_destination(&h, "CITY", &[]).await;
        let owner = traveler();
        let first = h.service.create(&owner, request(d.id, 2, false)).await.unwrap().booking;
        h.service.create(&owner, request(d.id, 1, false)).await.unwrap();
        h.service.cancel(&owner, first.id, "Duplicate").await.unwrap();

        let root = admin();
        assert!(h.service.list_all(&owner, BookingFilter::default(), PageRequest::default()).await.is_err());
        let all = h.service.list_all(&root, BookingFilter::default(), PageRequest::default()).await.unwrap();
        assert_eq!(all.total, 2);
        let filter = BookingFilter { status: Some(BookingStatus::Cancelled), ..Default::default() };
        let cancelled = h.service.list_all(&root, filter, PageRequest::default()).await.unwrap();
        assert_eq!(cancelled.items[0].id, first.id);

        let mine = h.service.list_mine(&owner, None, PageRequest::default()).await.unwrap();
        assert_eq!(mine.total, 2);
    }

    #[tokio::test]
    async fn test_pending_queue_pages_oldest_first() {
        let h = harness();
        let d = add_destination(&h, "CITY", &[]).await;
        let base = Utc::now() - Duration::hours(3);
        let mut ids = Vec::new();
        for minutes in 0..3 {
            let mut b = h.service.create(&traveler(), request(d.id, 2, true)).await.unwrap().booking;
            let seen = b.updated_at;
            b.created_at = base + Duration::minutes(minutes);
            BookingRepository::update(h.store.as_ref(), &b, seen).await.unwrap();
            ids.push(b.id);
        }

        let agent = agent();
        let first = h.service.list_pending_for_agents(&agent, PageRequest::new(1, 2)).await.unwrap();
        assert_eq!(first.total, 3);
        assert_eq!(first.items.iter().map(|b| b.id).collect::<Vec<_>>(), ids[..2].to_vec());
        let second = h.service.list_pending_for_agents(&agent, PageRequest::new(2, 2)).await.unwrap();
        assert_eq!(second.items.iter().map(|b| b.id).collect::<Vec<_>>(), vec![ids[2]]);
    }

    #[tokio::test]
    async fn test_write_from_stale_read_is_rejected() {
        let h = harness();
        let d = add_destination(&h, "CITY", &[]).await;
        let b = h.service.create(&traveler(), request(d.id, 2, true)).await.unwrap().booking;
        let (winner, loser) = (agent(), agent());

        // Both agents read the unclaimed booking; the winner saves first.
        let mut late = h.service.get(&admin(), b.id).await.unwrap();
        let seen = late.updated_at;
        h.service.assign_agent(&winner, b.id, None).await.unwrap();

        late.assign_agent(loser.user_id);
        let err = BookingRepository::update(h.store.as_ref(), &late, seen).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));

        let stored = h.service.get(&admin(), b.id).await.unwrap();
        assert_eq!(stored.agent_id, Some(winner.user_id));
        assert_eq!(h.service.history(&admin(), b.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_guest_cap_applies_to_create_and_update() {
        let h = harness();
        let d = add_destination(&h, "CITY", &[]).await;
        let owner = traveler();
        let too_many = i64::from(crate::booking::MAX_GUESTS) + 1;
        let err = h.service.create(&owner, request(d.id, too_many, false)).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let b = h.service.create(&owner, request(d.id, 2, false)).await.unwrap().booking;
        let update = BookingUpdate { guests: Some(i64::from(u32::MAX) + 7), ..Default::default() };
        assert!(matches!(h.service.update(&owner, b.id, update).await, Err(CoreError::Validation(_))));
    }
}
