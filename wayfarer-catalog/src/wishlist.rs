use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A saved destination. At most one per (user, destination).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub destination_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl WishlistItem {
    pub fn new(user_id: Uuid, destination_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            destination_id,
            created_at: Utc::now(),
        }
    }
}
