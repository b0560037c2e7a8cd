use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;
use wayfarer_booking::{BookingFilter, BookingRepository};
use wayfarer_core::{Actor, CoreError, CoreResult, Role, UserService};
use wayfarer_shared::{Page, PageRequest};

use crate::application::{AgentApplication, AgentApplicationForm, ApplicationStatus};
use crate::messaging::{AgentMessage, Direction};
use crate::repository::{AgentApplicationRepository, AgentMessageRepository};

/// Application and approval pipeline for new agents
pub struct AgentApplicationService {
    applications: Arc<dyn AgentApplicationRepository>,
    users: Arc<UserService>,
}

impl AgentApplicationService {
    pub fn new(applications: Arc<dyn AgentApplicationRepository>, users: Arc<UserService>) -> Self {
        Self { applications, users }
    }

    pub async fn submit(&self, form: AgentApplicationForm, applicant: Option<Uuid>) -> CoreResult<AgentApplication> {
        let application = AgentApplication::submit(form, applicant)?;
        self.applications.insert(&application).await?;
        tracing::info!(application_id = %application.id, "Agent application submitted");
        Ok(application)
    }

    pub async fn list(
        &self,
        actor: &Actor,
        status: Option<ApplicationStatus>,
        page: PageRequest,
    ) -> CoreResult<Page<AgentApplication>> {
        require_admin(actor)?;
        self.applications.list(status, page).await
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> CoreResult<AgentApplication> {
        require_admin(actor)?;
        self.load(id).await
    }

    /// Approving an application linked to an account grants it the AGENT role.
    pub async fn approve(&self, actor: &Actor, id: Uuid, notes: Option<String>) -> CoreResult<AgentApplication> {
        require_admin(actor)?;
        let mut application = self.pending(id).await?;
        application.approve(actor.user_id, notes);
        self.applications.update(&application).await?;

        if let Some(user_id) = application.user_id {
            self.users.grant_role(user_id, Role::Agent).await?;
        }
        tracing::info!(application_id = %application.id, admin = %actor.user_id, "Agent application approved");
        Ok(application)
    }

    pub async fn reject(&self, actor: &Actor, id: Uuid, reason: Option<String>) -> CoreResult<AgentApplication> {
        require_admin(actor)?;
        let mut application = self.pending(id).await?;
        application.reject(actor.user_id, reason);
        self.applications.update(&application).await?;
        tracing::info!(application_id = %application.id, admin = %actor.user_id, "Agent application rejected");
        Ok(application)
    }

    pub async fn pending_count(&self) -> CoreResult<u64> {
        self.applications.count_by_status(ApplicationStatus::Pending).await
    }

    async fn load(&self, id: Uuid) -> CoreResult<AgentApplication> {
        self.applications
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("AgentApplication", id))
    }

    async fn pending(&self, id: Uuid) -> CoreResult<AgentApplication> {
        let application = self.load(id).await?;
        if !application.is_pending() {
            return Err(CoreError::validation(format!(
                "Application was already {}",
                application.status
            )));
        }
        Ok(application)
    }
}

/// Outgoing message. `counterpart_id` is the client when an agent writes and
/// the agent when a client replies.
#[derive(Debug, Clone, Deserialize)]
pub struct OutgoingMessage {
    pub counterpart_id: Uuid,
    pub booking_id: Option<Uuid>,
    #[serde(default)]
    pub subject: String,
    pub body: String,
}

/// Agent/client messaging, restricted to pairs linked by a booking assignment
pub struct MessagingService {
    messages: Arc<dyn AgentMessageRepository>,
    bookings: Arc<dyn BookingRepository>,
}

impl MessagingService {
    pub fn new(messages: Arc<dyn AgentMessageRepository>, bookings: Arc<dyn BookingRepository>) -> Self {
        Self { messages, bookings }
    }

    pub async fn send_to_client(&self, actor: &Actor, message: OutgoingMessage) -> CoreResult<AgentMessage> {
        if !actor.is_agent() {
            return Err(CoreError::forbidden("Agent role required"));
        }
        self.send(actor.user_id, message.counterpart_id, message, Direction::ToClient).await
    }

    pub async fn reply_to_agent(&self, actor: &Actor, message: OutgoingMessage) -> CoreResult<AgentMessage> {
        self.send(message.counterpart_id, actor.user_id, message, Direction::FromClient).await
    }

    pub async fn mark_read(&self, actor: &Actor, id: Uuid) -> CoreResult<AgentMessage> {
        let mut message = self
            .messages
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("AgentMessage", id))?;
        if message.mark_read(actor.user_id)? {
            self.messages.set_read(message.id).await?;
        }
        Ok(message)
    }

    pub async fn agent_messages(&self, actor: &Actor, page: PageRequest) -> CoreResult<Page<AgentMessage>> {
        if !actor.is_agent() {
            return Err(CoreError::forbidden("Agent role required"));
        }
        self.messages.list_for_agent(actor.user_id, page).await
    }

    pub async fn client_inbox(&self, actor: &Actor, page: PageRequest) -> CoreResult<Page<AgentMessage>> {
        self.messages.list_for_client(actor.user_id, page).await
    }

    pub async fn conversation(&self, agent_id: Uuid, client_id: Uuid) -> CoreResult<Vec<AgentMessage>> {
        self.messages.conversation(agent_id, client_id).await
    }

    pub async fn unread_count(&self, user_id: Uuid) -> CoreResult<u64> {
        self.messages.unread_count(user_id).await
    }

    async fn send(
        &self,
        agent_id: Uuid,
        client_id: Uuid,
        message: OutgoingMessage,
        direction: Direction,
    ) -> CoreResult<AgentMessage> {
        self.ensure_linked(agent_id, client_id, message.booking_id).await?;
        let msg = AgentMessage::new(agent_id, client_id, message.booking_id, &message.subject, &message.body, direction)?;
        self.messages.insert(&msg).await?;
        tracing::debug!(message_id = %msg.id, direction = %direction, "Message sent");
        Ok(msg)
    }

    async fn ensure_linked(&self, agent_id: Uuid, client_id: Uuid, booking_id: Option<Uuid>) -> CoreResult<()> {
        let linked = match booking_id {
            Some(id) => {
                let booking = self
                    .bookings
                    .get(id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("Booking", id))?;
                booking.is_owned_by(client_id) && booking.is_assigned_to(agent_id)
            }
            None => {
                let filter = BookingFilter { agent_id: Some(agent_id), user_id: Some(client_id), ..Default::default() };
                self.bookings.list(&filter, PageRequest::new(1, 1)).await?.total > 0
            }
        };
        if !linked {
            return Err(CoreError::forbidden("No booking links this agent and client"));
        }
        Ok(())
    }
}

fn require_admin(actor: &Actor) -> CoreResult<()> {
    if !actor.is_admin() {
        return Err(CoreError::forbidden("Admin role required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tests::form;
    use crate::memory::InMemoryAgentStore;
    use chrono::{Duration, NaiveDate};
    use wayfarer_booking::{Booking, BookingType, ContactInfo, InMemoryBookingStore, StayDates};
    use wayfarer_core::memory::InMemoryUserRepository;
    use wayfarer_shared::Masked;

    fn admin() -> Actor {
        Actor::new(Uuid::new_v4(), [Role::Admin])
    }

    fn applications() -> (AgentApplicationService, Arc<UserService>) {
        let users = Arc::new(UserService::new(Arc::new(InMemoryUserRepository::new())));
        let service = AgentApplicationService::new(Arc::new(InMemoryAgentStore::new()), users.clone());
        (service, users)
    }

    #[tokio::test]
    async fn test_duplicate_pending_application_conflicts() {
        let (service, _) = applications();
        service.submit(form("marco@example.com"), None).await.unwrap();
        let err = service.submit(form("MARCO@example.com"), None).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_approve_grants_agent_role() {
        let (service, users) = applications();
        let user = users.register("marco@example.com", "Marco").await.unwrap();
        let app = service.submit(form("marco@example.com"), Some(user.id)).await.unwrap();

        let root = admin();
        let approved = service.approve(&root, app.id, Some("Welcome".into())).await.unwrap();
        assert_eq!(approved.status, ApplicationStatus::Approved);
        assert_eq!(approved.reviewed_by, Some(root.user_id));
        assert!(approved.reviewed_at.is_some());

        let user = users.get(user.id).await.unwrap();
        assert!(user.has_role(Role::Agent));
        assert!(user.token_version > 0);

        // Already reviewed.
        let err = service.reject(&root, app.id, None).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(service.pending_count().await.unwrap(), 0);

        // A new application is allowed once the previous one is closed.
        assert!(service.submit(form("marco@example.com"), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_review_requires_admin() {
        let (service, _) = applications();
        let app = service.submit(form("marco@example.com"), None).await.unwrap();
        let agent = Actor::new(Uuid::new_v4(), [Role::Agent]);
        assert!(matches!(service.approve(&agent, app.id, None).await, Err(CoreError::Authorization(_))));
        assert!(service.list(&agent, None, PageRequest::default()).await.is_err());

        let rejected = service.reject(&admin(), app.id, Some("Incomplete".into())).await.unwrap();
        assert_eq!(rejected.admin_notes.as_deref(), Some("Incomplete"));
    }

    struct Messaging {
        service: MessagingService,
        agent: Actor,
        client: Actor,
        booking: Booking,
    }

    async fn messaging() -> Messaging {
        let bookings = Arc::new(InMemoryBookingStore::new());
        let agent = Actor::new(Uuid::new_v4(), [Role::Agent]);
        let client = Actor::new(Uuid::new_v4(), []);

        let check_in = NaiveDate::from_ymd_opt(2031, 9, 1).unwrap();
        let dates = StayDates::new(check_in, check_in + Duration::days(5)).unwrap();
        let contact = ContactInfo { name: "Client".into(), email: Masked::new("c@example.com".into()), phone: None };
        let mut booking =
            Booking::new(client.user_id, Uuid::new_v4(), BookingType::Agent, dates, 4, 400_000, "EUR", contact).unwrap();
        booking.assign_agent(agent.user_id);
        BookingRepository::insert(bookings.as_ref(), &booking).await.unwrap();

        let service = MessagingService::new(Arc::new(InMemoryAgentStore::new()), bookings);
        Messaging { service, agent, client, booking }
    }

    fn outgoing(to: Uuid, booking_id: Option<Uuid>, body: &str) -> OutgoingMessage {
        OutgoingMessage { counterpart_id: to, booking_id, subject: "Trip".into(), body: body.into() }
    }

    #[tokio::test]
    async fn test_conversation_between_linked_parties() {
        let m = messaging().await;
        let sent = m
            .service
            .send_to_client(&m.agent, outgoing(m.client.user_id, Some(m.booking.id), "Your itinerary"))
            .await
            .unwrap();
        assert_eq!(sent.direction, Direction::ToClient);
        m.service.reply_to_agent(&m.client, outgoing(m.agent.user_id, None, "Looks great")).await.unwrap();

        let thread = m.service.conversation(m.agent.user_id, m.client.user_id).await.unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].body, "Your itinerary");

        assert_eq!(m.service.unread_count(m.client.user_id).await.unwrap(), 1);
        assert_eq!(m.service.unread_count(m.agent.user_id).await.unwrap(), 1);

        assert!(m.service.mark_read(&m.agent, sent.id).await.is_err());
        let read = m.service.mark_read(&m.client, sent.id).await.unwrap();
        assert!(read.is_read);
        assert_eq!(m.service.unread_count(m.client.user_id).await.unwrap(), 0);

        let inbox = m.service.client_inbox(&m.client, PageRequest::default()).await.unwrap();
        assert_eq!(inbox.items[0].body, "Looks great");
    }

    #[tokio::test]
    async fn test_unlinked_parties_cannot_message() {
        let m = messaging().await;
        let stranger_agent = Actor::new(Uuid::new_v4(), [Role::Agent]);
        let err = m
            .service
            .send_to_client(&stranger_agent, outgoing(m.client.user_id, None, "Hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));

        let stranger = Actor::new(Uuid::new_v4(), []);
        let err = m
            .service
            .reply_to_agent(&stranger, outgoing(m.agent.user_id, Some(m.booking.id), "Hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));

        // Plain users cannot use the agent side.
        assert!(m.service.send_to_client(&m.client, outgoing(m.agent.user_id, None, "x")).await.is_err());
    }
}
