use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;
use wayfarer_shared::{Page, PageRequest};

use crate::identity::{User, UserPreferences, UserProfile, UserStatus};
use crate::repository::UserRepository;
use crate::{CoreError, CoreResult};

#[derive(Default)]
struct UserTables {
    users: HashMap<Uuid, User>,
    profiles: HashMap<Uuid, UserProfile>,
    preferences: HashMap<Uuid, UserPreferences>,
}

/// In-memory account store used by tests and storage-less local runs.
#[derive(Default)]
pub struct InMemoryUserRepository {
    tables: RwLock<UserTables>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: &User) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        let email = user.email.expose().to_lowercase();
        if tables.users.values().any(|u| u.email.expose().to_lowercase() == email) {
            return Err(CoreError::conflict("Email already registered"));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        let email = email.trim().to_lowercase();
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.expose().to_lowercase() == email)
            .cloned())
    }

    async fn update(&self, user: &User) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(CoreError::not_found("User", user.id)),
        }
    }

    async fn list(&self, status: Option<UserStatus>, page: PageRequest) -> CoreResult<Page<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| status.map_or(true, |s| u.status == s))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page.apply(users))
    }

    async fn count_by_status(&self) -> CoreResult<Vec<(UserStatus, u64)>> {
        let tables = self.tables.read().await;
        Ok(UserStatus::ALL
            .iter()
            .map(|s| (*s, tables.users.values().filter(|u| u.status == *s).count() as u64))
            .collect())
    }

    async fn save_profile(&self, profile: &UserProfile) -> CoreResult<()> {
        self.tables.write().await.profiles.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> CoreResult<Option<UserProfile>> {
        Ok(self.tables.read().await.profiles.get(&user_id).cloned())
    }

    async fn save_preferences(&self, preferences: &UserPreferences) -> CoreResult<()> {
        self.tables
            .write()
            .await
            .preferences
            .insert(preferences.user_id, preferences.clone());
        Ok(())
    }

    async fn get_preferences(&self, user_id: Uuid) -> CoreResult<Option<UserPreferences>> {
        Ok(self.tables.read().await.preferences.get(&user_id).cloned())
    }

    async fn delete_sub_records(&self, user_id: Uuid) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.profiles.remove(&user_id);
        tables.preferences.remove(&user_id);
        Ok(())
    }
}
