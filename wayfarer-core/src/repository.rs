use async_trait::async_trait;
use uuid::Uuid;
use wayfarer_shared::{Page, PageRequest};

use crate::identity::{User, UserPreferences, UserProfile, UserStatus};
use crate::CoreResult;

/// Repository trait for account data access
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    async fn insert(&self, user: &User) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> CoreResult<Option<User>>;

    async fn update(&self, user: &User) -> CoreResult<()>;

    async fn list(&self, status: Option<UserStatus>, page: PageRequest) -> CoreResult<Page<User>>;

    async fn count_by_status(&self) -> CoreResult<Vec<(UserStatus, u64)>>;

    async fn save_profile(&self, profile: &UserProfile) -> CoreResult<()>;

    async fn get_profile(&self, user_id: Uuid) -> CoreResult<Option<UserProfile>>;

    async fn save_preferences(&self, preferences: &UserPreferences) -> CoreResult<()>;

    async fn get_preferences(&self, user_id: Uuid) -> CoreResult<Option<UserPreferences>>;

    /// Application-level cascade for the 1:1 sub-records.
    async fn delete_sub_records(&self, user_id: Uuid) -> CoreResult<()>;
}
