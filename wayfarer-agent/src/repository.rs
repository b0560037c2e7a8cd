use async_trait::async_trait;
use uuid::Uuid;
use wayfarer_core::CoreResult;
use wayfarer_shared::{Page, PageRequest};

use crate::application::{AgentApplication, ApplicationStatus};
use crate::messaging::AgentMessage;

/// Repository trait for agent applications
#[async_trait]
pub trait AgentApplicationRepository: Send + Sync {
    /// Fails with `Conflict` when a PENDING application already exists for the email.
    async fn insert(&self, application: &AgentApplication) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<AgentApplication>>;

    async fn update(&self, application: &AgentApplication) -> CoreResult<()>;

    /// Oldest first.
    async fn list(&self, status: Option<ApplicationStatus>, page: PageRequest) -> CoreResult<Page<AgentApplication>>;

    async fn count_by_status(&self, status: ApplicationStatus) -> CoreResult<u64>;
}

/// Repository trait for the agent/client message log
#[async_trait]
pub trait AgentMessageRepository: Send + Sync {
    async fn insert(&self, message: &AgentMessage) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<AgentMessage>>;

    async fn set_read(&self, id: Uuid) -> CoreResult<()>;

    /// Both directions between one agent and one client, oldest first.
    async fn conversation(&self, agent_id: Uuid, client_id: Uuid) -> CoreResult<Vec<AgentMessage>>;

    /// Everything involving the agent, newest first.
    async fn list_for_agent(&self, agent_id: Uuid, page: PageRequest) -> CoreResult<Page<AgentMessage>>;

    /// Everything involving the client, newest first.
    async fn list_for_client(&self, client_id: Uuid, page: PageRequest) -> CoreResult<Page<AgentMessage>>;

    /// Unread messages addressed to `user_id`.
    async fn unread_count(&self, user_id: Uuid) -> CoreResult<u64>;
}
