use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wayfarer_core::{CoreError, CoreResult};

const MAX_SUBJECT_LEN: usize = 200;
const MAX_BODY_LEN: usize = 10_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    ToClient,
    FromClient,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ToClient => "TO_CLIENT",
            Direction::FromClient => "FROM_CLIENT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TO_CLIENT" => Ok(Direction::ToClient),
            "FROM_CLIENT" => Ok(Direction::FromClient),
            other => Err(CoreError::validation(format!("Invalid message direction: {}", other))),
        }
    }
}

/// One entry in the agent/client message log. Only `is_read` ever changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub client_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub subject: String,
    pub body: String,
    pub is_read: bool,
    pub direction: Direction,
    pub created_at: DateTime<Utc>,
}

impl AgentMessage {
    pub fn new(
        agent_id: Uuid,
        client_id: Uuid,
        booking_id: Option<Uuid>,
        subject: &str,
        body: &str,
        direction: Direction,
    ) -> CoreResult<Self> {
        let subject = subject.trim();
        let body = body.trim();
        if body.is_empty() {
            return Err(CoreError::validation("Message body is required"));
        }
        if subject.chars().count() > MAX_SUBJECT_LEN || body.chars().count() > MAX_BODY_LEN {
            return Err(CoreError::validation("Message is too long"));
        }
        if agent_id == client_id {
            return Err(CoreError::validation("Agent and client must differ"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            agent_id,
            client_id,
            booking_id,
            subject: subject.to_string(),
            body: body.to_string(),
            is_read: false,
            direction,
            created_at: Utc::now(),
        })
    }

    pub fn sender(&self) -> Uuid {
        match self.direction {
            Direction::ToClient => self.agent_id,
            Direction::FromClient => self.client_id,
        }
    }

    pub fn recipient(&self) -> Uuid {
        match self.direction {
            Direction::ToClient => self.client_id,
            Direction::FromClient => self.agent_id,
        }
    }

    /// Returns whether the flag flipped.
    pub fn mark_read(&mut self, reader: Uuid) -> CoreResult<bool> {
        if reader != self.recipient() {
            return Err(CoreError::forbidden("Only the recipient can mark a message as read"));
        }
        let changed = !self.is_read;
        self.is_read = true;
        Ok(changed)
    }
}
