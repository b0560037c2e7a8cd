use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use wayfarer_booking::{
    Booking, BookingChange, BookingChangeRepository, BookingFilter, BookingRepository, BookingStatus, ChangeType,
    Commission, CommissionRepository, CommissionStatus, ContactInfo,
};
use wayfarer_core::{CoreError, CoreResult};
use wayfarer_shared::{Masked, Page, PageRequest};

use crate::database::{map_err, parse_column, storage, window};

/// Postgres-backed bookings, commissions and the booking audit trail.
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: Uuid,
    destination_id: Uuid,
    agent_id: Option<Uuid>,
    booking_type: String,
    check_in: NaiveDate,
    check_out: NaiveDate,
    guests: i32,
    total_price: i64,
    currency: String,
    status: String,
    payment_status: String,
    booking_reference: String,
    contact_name: String,
    contact_email: String,
    contact_phone: Option<String>,
    special_requests: Option<String>,
    cancellation_reason: Option<String>,
    payment_intent_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            destination_id: row.destination_id,
            agent_id: row.agent_id,
            booking_type: parse_column(&row.booking_type)?,
            check_in: row.check_in,
            check_out: row.check_out,
            guests: row.guests.max(0) as u32,
            total_price: row.total_price,
            currency: row.currency,
            status: parse_column(&row.status)?,
            payment_status: parse_column(&row.payment_status)?,
            booking_reference: row.booking_reference,
            contact: ContactInfo {
                name: row.contact_name,
                email: Masked::new(row.contact_email),
                phone: row.contact_phone.map(Masked::new),
            },
            special_requests: row.special_requests,
            cancellation_reason: row.cancellation_reason,
            payment_intent_id: row.payment_intent_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            confirmed_at: row.confirmed_at,
            cancelled_at: row.cancelled_at,
        })
    }
}

const BOOKING_COLUMNS: &str = "id, user_id, destination_id, agent_id, booking_type, check_in, check_out, guests, \
     total_price, currency, status, payment_status, booking_reference, contact_name, contact_email, contact_phone, \
     special_requests, cancellation_reason, payment_intent_id, created_at, updated_at, confirmed_at, cancelled_at";

fn filtered(select: &str, filter: &BookingFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {} FROM bookings WHERE TRUE", select));
    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(agent_id) = filter.agent_id {
        qb.push(" AND agent_id = ").push_bind(agent_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(booking_type) = filter.booking_type {
        qb.push(" AND booking_type = ").push_bind(booking_type.as_str());
    }
    if filter.unassigned {
        qb.push(" AND agent_id IS NULL");
    }
    qb
}

fn guests_column(b: &Booking) -> CoreResult<i32> {
    i32::try_from(b.guests).map_err(|_| CoreError::validation("Guest count is too large"))
}

impl PgBookingStore {
    async fn fetch_one_where(&self, clause: &str, value: &str) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("SELECT {} FROM bookings WHERE {} = $1", BOOKING_COLUMNS, clause))
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(Booking::try_from).transpose()
    }
}

#[async_trait]
impl BookingRepository for PgBookingStore {
    async fn insert(&self, b: &Booking) -> CoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO bookings ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21, $22, $23)",
            BOOKING_COLUMNS
        ))
        .bind(b.id)
        .bind(b.user_id)
        .bind(b.destination_id)
        .bind(b.agent_id)
        .bind(b.booking_type.as_str())
        .bind(b.check_in)
        .bind(b.check_out)
        .bind(guests_column(b)?)
        .bind(b.total_price)
        .bind(&b.currency)
        .bind(b.status.as_str())
        .bind(b.payment_status.as_str())
        .bind(&b.booking_reference)
        .bind(&b.contact.name)
        .bind(b.contact.email.expose())
        .bind(b.contact.phone.as_ref().map(|p| p.expose().as_str()))
        .bind(&b.special_requests)
        .bind(&b.cancellation_reason)
        .bind(&b.payment_intent_id)
        .bind(b.created_at)
        .bind(b.updated_at)
        .bind(b.confirmed_at)
        .bind(b.cancelled_at)
        .execute(&self.pool)
        .await
        .map_err(map_err("Booking reference collision"))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(Booking::try_from).transpose()
    }

    async fn find_by_reference(&self, reference: &str) -> CoreResult<Option<Booking>> {
        self.fetch_one_where("booking_reference", reference).await
    }

    async fn find_by_payment_intent(&self, intent_id: &str) -> CoreResult<Option<Booking>> {
        self.fetch_one_where("payment_intent_id", intent_id).await
    }

    async fn update(&self, b: &Booking, seen: DateTime<Utc>) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET agent_id = $2, check_in = $3, check_out = $4, guests = $5, total_price = $6, status = $7,
                payment_status = $8, special_requests = $9, cancellation_reason = $10, payment_intent_id = $11,
                updated_at = $12, confirmed_at = $13, cancelled_at = $14
            WHERE id = $1 AND updated_at = $15
            "#,
        )
        .bind(b.id)
        .bind(b.agent_id)
        .bind(b.check_in)
        .bind(b.check_out)
        .bind(guests_column(b)?)
        .bind(b.total_price)
        .bind(b.status.as_str())
        .bind(b.payment_status.as_str())
        .bind(&b.special_requests)
        .bind(&b.cancellation_reason)
        .bind(&b.payment_intent_id)
        .bind(b.updated_at)
        .bind(b.confirmed_at)
        .bind(b.cancelled_at)
        .bind(seen)
        .execute(&self.pool)
        .await
        .map_err(map_err("Payment intent already linked to another booking"))?;
        if result.rows_affected() == 0 {
            return match BookingRepository::get(self, b.id).await? {
                Some(_) => Err(CoreError::conflict("Booking was modified concurrently, retry the request")),
                None => Err(CoreError::not_found("Booking", b.id)),
            };
        }
        Ok(())
    }

    async fn list(&self, filter: &BookingFilter, page: PageRequest) -> CoreResult<Page<Booking>> {
        let (limit, offset) = window(page);
        let mut select = filtered(BOOKING_COLUMNS, filter);
        select
            .push(if filter.oldest_first { " ORDER BY created_at ASC" } else { " ORDER BY created_at DESC" })
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = select.build_query_as::<BookingRow>().fetch_all(&self.pool).await.map_err(storage)?;

        let mut count = filtered("COUNT(*)", filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await.map_err(storage)?;

        let bookings = rows.into_iter().map(Booking::try_from).collect::<CoreResult<Vec<_>>>()?;
        Ok(Page::new(bookings, total as u64, page))
    }

    async fn count_by_status(&self) -> CoreResult<Vec<(BookingStatus, u64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as("SELECT status, COUNT(*) FROM bookings GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(BookingStatus::ALL
            .iter()
            .map(|s| {
                let n = rows.iter().find(|(name, _)| name == s.as_str()).map_or(0, |(_, n)| *n);
                (*s, n as u64)
            })
            .collect())
    }

    async fn paid_revenue(&self) -> CoreResult<i64> {
        let total: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(total_price), 0)::bigint FROM bookings WHERE payment_status = 'PAID'")
                .fetch_one(&self.pool)
                .await
                .map_err(storage)?;
        Ok(total)
    }
}

#[derive(sqlx::FromRow)]
struct CommissionRow {
    id: Uuid,
    agent_id: Uuid,
    booking_id: Uuid,
    amount: i64,
    currency: String,
    percentage: f64,
    status: String,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CommissionRow> for Commission {
    type Error = CoreError;

    fn try_from(row: CommissionRow) -> Result<Self, Self::Error> {
        Ok(Commission {
            id: row.id,
            agent_id: row.agent_id,
            booking_id: row.booking_id,
            amount: row.amount,
            currency: row.currency,
            percentage: row.percentage,
            status: parse_column(&row.status)?,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const COMMISSION_COLUMNS: &str =
    "id, agent_id, booking_id, amount, currency, percentage, status, paid_at, created_at, updated_at";

#[async_trait]
impl CommissionRepository for PgBookingStore {
    async fn insert(&self, c: &Commission) -> CoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO commissions ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            COMMISSION_COLUMNS
        ))
        .bind(c.id)
        .bind(c.agent_id)
        .bind(c.booking_id)
        .bind(c.amount)
        .bind(&c.currency)
        .bind(c.percentage)
        .bind(c.status.as_str())
        .bind(c.paid_at)
        .bind(c.created_at)
        .bind(c.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err("Booking already has a commission"))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Commission>> {
        let row = sqlx::query_as::<_, CommissionRow>(&format!(
            "SELECT {} FROM commissions WHERE id = $1",
            COMMISSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        row.map(Commission::try_from).transpose()
    }

    async fn find_by_booking(&self, booking_id: Uuid) -> CoreResult<Option<Commission>> {
        let row = sqlx::query_as::<_, CommissionRow>(&format!(
            "SELECT {} FROM commissions WHERE booking_id = $1",
            COMMISSION_COLUMNS
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        row.map(Commission::try_from).transpose()
    }

    async fn update(&self, c: &Commission) -> CoreResult<()> {
        let result = sqlx::query("UPDATE commissions SET status = $2, paid_at = $3, updated_at = $4 WHERE id = $1")
            .bind(c.id)
            .bind(c.status.as_str())
            .bind(c.paid_at)
            .bind(c.updated_at)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Commission", c.id));
        }
        Ok(())
    }

    async fn list_for_agent(&self, agent_id: Uuid, status: Option<CommissionStatus>) -> CoreResult<Vec<Commission>> {
        let rows = sqlx::query_as::<_, CommissionRow>(&format!(
            "SELECT {} FROM commissions WHERE agent_id = $1 AND ($2::text IS NULL OR status = $2) ORDER BY created_at DESC",
            COMMISSION_COLUMNS
        ))
        .bind(agent_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.into_iter().map(Commission::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ChangeRow {
    id: Uuid,
    booking_id: Uuid,
    change_type: String,
    old_value: Option<Value>,
    new_value: Option<Value>,
    actor_id: Option<Uuid>,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl BookingChangeRepository for PgBookingStore {
    async fn append(&self, change: &BookingChange) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO booking_changes (id, booking_id, change_type, old_value, new_value, actor_id, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(change.id)
        .bind(change.booking_id)
        .bind(change.change_type.as_str())
        .bind(&change.old_value)
        .bind(&change.new_value)
        .bind(change.actor_id)
        .bind(&change.reason)
        .bind(change.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> CoreResult<Vec<BookingChange>> {
        let rows = sqlx::query_as::<_, ChangeRow>(
            r#"
            SELECT id, booking_id, change_type, old_value, new_value, actor_id, reason, created_at
            FROM booking_changes WHERE booking_id = $1 ORDER BY created_at
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter()
            .map(|row| {
                let change_type = ChangeType::parse(&row.change_type)
                    .ok_or_else(|| CoreError::Storage(format!("Unknown change type {:?}", row.change_type)))?;
                Ok(BookingChange {
                    id: row.id,
                    booking_id: row.booking_id,
                    change_type,
                    old_value: row.old_value,
                    new_value: row.new_value,
                    actor_id: row.actor_id,
                    reason: row.reason,
                    created_at: row.created_at,
                })
            })
            .collect()
    }
}
