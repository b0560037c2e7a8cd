use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use wayfarer_agent::{
    AgentApplication, AgentApplicationRepository, AgentMessage, AgentMessageRepository, ApplicationStatus,
};
use wayfarer_core::{CoreError, CoreResult};
use wayfarer_shared::{Masked, Page, PageRequest};

use crate::database::{map_err, parse_column, storage, window};

/// Postgres-backed agent applications and agent/client messages.
pub struct PgAgentStore {
    pool: PgPool,
}

impl PgAgentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ApplicationRow {
    id: Uuid,
    user_id: Option<Uuid>,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    company_name: Option<String>,
    license_number: Option<String>,
    years_experience: i32,
    specializations: Vec<String>,
    motivation: String,
    status: String,
    admin_notes: Option<String>,
    reviewed_by: Option<Uuid>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ApplicationRow> for AgentApplication {
    type Error = CoreError;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        Ok(AgentApplication {
            id: row.id,
            user_id: row.user_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: Masked::new(row.email),
            phone: row.phone.map(Masked::new),
            company_name: row.company_name,
            license_number: row.license_number,
            years_experience: row.years_experience,
            specializations: row.specializations,
            motivation: row.motivation,
            status: parse_column(&row.status)?,
            admin_notes: row.admin_notes,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const APPLICATION_COLUMNS: &str = "id, user_id, first_name, last_name, email, phone, company_name, license_number, \
     years_experience, specializations, motivation, status, admin_notes, reviewed_by, reviewed_at, created_at, updated_at";

#[async_trait]
impl AgentApplicationRepository for PgAgentStore {
    async fn insert(&self, a: &AgentApplication) -> CoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO agent_applications ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
            APPLICATION_COLUMNS
        ))
        .bind(a.id)
        .bind(a.user_id)
        .bind(&a.first_name)
        .bind(&a.last_name)
        .bind(a.email.expose())
        .bind(a.phone.as_ref().map(|p| p.expose().as_str()))
        .bind(&a.company_name)
        .bind(&a.license_number)
        .bind(a.years_experience)
        .bind(&a.specializations)
        .bind(&a.motivation)
        .bind(a.status.as_str())
        .bind(&a.admin_notes)
        .bind(a.reviewed_by)
        .bind(a.reviewed_at)
        .bind(a.created_at)
        .bind(a.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err("A pending application already exists for this email"))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<AgentApplication>> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {} FROM agent_applications WHERE id = $1",
            APPLICATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        row.map(AgentApplication::try_from).transpose()
    }

    async fn update(&self, a: &AgentApplication) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE agent_applications
            SET status = $2, admin_notes = $3, reviewed_by = $4, reviewed_at = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(a.id)
        .bind(a.status.as_str())
        .bind(&a.admin_notes)
        .bind(a.reviewed_by)
        .bind(a.reviewed_at)
        .bind(a.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("AgentApplication", a.id));
        }
        Ok(())
    }

    async fn list(&self, status: Option<ApplicationStatus>, page: PageRequest) -> CoreResult<Page<AgentApplication>> {
        let (limit, offset) = window(page);
        let status = status.map(|s| s.as_str());
        let rows = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {} FROM agent_applications WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at LIMIT $2 OFFSET $3",
            APPLICATION_COLUMNS
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM agent_applications WHERE ($1::text IS NULL OR status = $1)")
                .bind(status)
                .fetch_one(&self.pool)
                .await
                .map_err(storage)?;

        let items = rows.into_iter().map(AgentApplication::try_from).collect::<CoreResult<Vec<_>>>()?;
        Ok(Page::new(items, total as u64, page))
    }

    async fn count_by_status(&self, status: ApplicationStatus) -> CoreResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM agent_applications WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        Ok(total as u64)
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    agent_id: Uuid,
    client_id: Uuid,
    booking_id: Option<Uuid>,
    subject: String,
    body: String,
    is_read: bool,
    direction: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for AgentMessage {
    type Error = CoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(AgentMessage {
            id: row.id,
            agent_id: row.agent_id,
            client_id: row.client_id,
            booking_id: row.booking_id,
            subject: row.subject,
            body: row.body,
            is_read: row.is_read,
            direction: parse_column(&row.direction)?,
            created_at: row.created_at,
        })
    }
}

const MESSAGE_COLUMNS: &str = "id, agent_id, client_id, booking_id, subject, body, is_read, direction, created_at";

impl PgAgentStore {
    async fn page_of_messages(&self, column: &str, party: Uuid, page: PageRequest) -> CoreResult<Page<AgentMessage>> {
        let (limit, offset) = window(page);
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {} FROM agent_messages WHERE {} = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            MESSAGE_COLUMNS, column
        ))
        .bind(party)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM agent_messages WHERE {} = $1", column))
            .bind(party)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

        let items = rows.into_iter().map(AgentMessage::try_from).collect::<CoreResult<Vec<_>>>()?;
        Ok(Page::new(items, total as u64, page))
    }
}

#[async_trait]
impl AgentMessageRepository for PgAgentStore {
    async fn insert(&self, m: &AgentMessage) -> CoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO agent_messages ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            MESSAGE_COLUMNS
        ))
        .bind(m.id)
        .bind(m.agent_id)
        .bind(m.client_id)
        .bind(m.booking_id)
        .bind(&m.subject)
        .bind(&m.body)
        .bind(m.is_read)
        .bind(m.direction.as_str())
        .bind(m.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<AgentMessage>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {} FROM agent_messages WHERE id = $1",
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        row.map(AgentMessage::try_from).transpose()
    }

    async fn set_read(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("UPDATE agent_messages SET is_read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("AgentMessage", id));
        }
        Ok(())
    }

    async fn conversation(&self, agent_id: Uuid, client_id: Uuid) -> CoreResult<Vec<AgentMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {} FROM agent_messages WHERE agent_id = $1 AND client_id = $2 ORDER BY created_at",
            MESSAGE_COLUMNS
        ))
        .bind(agent_id)
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.into_iter().map(AgentMessage::try_from).collect()
    }

    async fn list_for_agent(&self, agent_id: Uuid, page: PageRequest) -> CoreResult<Page<AgentMessage>> {
        self.page_of_messages("agent_id", agent_id, page).await
    }

    async fn list_for_client(&self, client_id: Uuid, page: PageRequest) -> CoreResult<Page<AgentMessage>> {
        self.page_of_messages("client_id", client_id, page).await
    }

    async fn unread_count(&self, user_id: Uuid) -> CoreResult<u64> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM agent_messages
            WHERE NOT is_read
              AND ((direction = 'TO_CLIENT' AND client_id = $1) OR (direction = 'FROM_CLIENT' AND agent_id = $1))
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;
        Ok(total as u64)
    }
}
