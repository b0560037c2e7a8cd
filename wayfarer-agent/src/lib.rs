pub mod application;
pub mod memory;
pub mod messaging;
pub mod repository;
pub mod service;

pub use application::{AgentApplication, AgentApplicationForm, ApplicationStatus};
pub use memory::InMemoryAgentStore;
pub use messaging::{AgentMessage, Direction};
pub use repository::{AgentApplicationRepository, AgentMessageRepository};
pub use service::{AgentApplicationService, MessagingService, OutgoingMessage};
