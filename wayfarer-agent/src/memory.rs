use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;
use wayfarer_core::{CoreError, CoreResult};
use wayfarer_shared::{Page, PageRequest};

use crate::application::{AgentApplication, ApplicationStatus};
use crate::messaging::AgentMessage;
use crate::repository::{AgentApplicationRepository, AgentMessageRepository};

#[derive(Default)]
struct AgentTables {
    applications: HashMap<Uuid, AgentApplication>,
    messages: Vec<AgentMessage>,
}

#[derive(Default)]
pub struct InMemoryAgentStore {
    tables: RwLock<AgentTables>,
}

impl InMemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentApplicationRepository for InMemoryAgentStore {
    async fn insert(&self, application: &AgentApplication) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        let duplicate = tables
            .applications
            .values()
            .any(|a| a.is_pending() && a.email.expose() == application.email.expose());
        if duplicate {
            return Err(CoreError::conflict("A pending application already exists for this email"));
        }
        tables.applications.insert(application.id, application.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<AgentApplication>> {
        Ok(self.tables.read().await.applications.get(&id).cloned())
    }

    async fn update(&self, application: &AgentApplication) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.applications.get_mut(&application.id) {
            Some(existing) => {
                *existing = application.clone();
                Ok(())
            }
            None => Err(CoreError::not_found("AgentApplication", application.id)),
        }
    }

    async fn list(&self, status: Option<ApplicationStatus>, page: PageRequest) -> CoreResult<Page<AgentApplication>> {
        let tables = self.tables.read().await;
        let mut items: Vec<AgentApplication> = tables
            .applications
            .values()
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(page.apply(items))
    }

    async fn count_by_status(&self, status: ApplicationStatus) -> CoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables.applications.values().filter(|a| a.status == status).count() as u64)
    }
}

#[async_trait]
impl AgentMessageRepository for InMemoryAgentStore {
    async fn insert(&self, message: &AgentMessage) -> CoreResult<()> {
        self.tables.write().await.messages.push(message.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<AgentMessage>> {
        Ok(self.tables.read().await.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn set_read(&self, id: Uuid) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.messages.iter_mut().find(|m| m.id == id) {
            Some(m) => {
                m.is_read = true;
                Ok(())
            }
            None => Err(CoreError::not_found("AgentMessage", id)),
        }
    }

    async fn conversation(&self, agent_id: Uuid, client_id: Uuid) -> CoreResult<Vec<AgentMessage>> {
        let tables = self.tables.read().await;
        let mut items: Vec<AgentMessage> = tables
            .messages
            .iter()
            .filter(|m| m.agent_id == agent_id && m.client_id == client_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    async fn list_for_agent(&self, agent_id: Uuid, page: PageRequest) -> CoreResult<Page<AgentMessage>> {
        let tables = self.tables.read().await;
        let mut items: Vec<AgentMessage> = tables.messages.iter().rev().filter(|m| m.agent_id == agent_id).cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page.apply(items))
    }

    async fn list_for_client(&self, client_id: Uuid, page: PageRequest) -> CoreResult<Page<AgentMessage>> {
        let tables = self.tables.read().await;
        let mut items: Vec<AgentMessage> =
            tables.messages.iter().rev().filter(|m| m.client_id == client_id).cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page.apply(items))
    }

    async fn unread_count(&self, user_id: Uuid) -> CoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables.messages.iter().filter(|m| !m.is_read && m.recipient() == user_id).count() as u64)
    }
}
