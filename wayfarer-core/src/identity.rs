use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wayfarer_shared::{Masked, Page, PageRequest};

use crate::repository::UserRepository;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Agent,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Agent => "AGENT",
            Role::Admin => "ADMIN",
            Role::SuperAdmin => "SUPER_ADMIN",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept the legacy ROLE_ prefix as well.
        match s.trim().trim_start_matches("ROLE_").to_ascii_uppercase().as_str() {
            "USER" => Ok(Role::User),
            "AGENT" => Ok(Role::Agent),
            "ADMIN" => Ok(Role::Admin),
            "SUPER_ADMIN" => Ok(Role::SuperAdmin),
            other => Err(CoreError::validation(format!("Unknown role: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Pending,
    Active,
    Suspended,
    Deleted,
}

impl UserStatus {
    pub const ALL: [UserStatus; 4] = [
        UserStatus::Pending,
        UserStatus::Active,
        UserStatus::Suspended,
        UserStatus::Deleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "PENDING",
            UserStatus::Active => "ACTIVE",
            UserStatus::Suspended => "SUSPENDED",
            UserStatus::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(UserStatus::Pending),
            "ACTIVE" => Ok(UserStatus::Active),
            "SUSPENDED" => Ok(UserStatus::Suspended),
            "DELETED" => Ok(UserStatus::Deleted),
            other => Err(CoreError::validation(format!("Unknown user status: {}", other))),
        }
    }
}

/// A platform account. The base `USER` role is implicit and can never be removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: Masked<String>,
    pub display_name: String,
    roles: BTreeSet<Role>,
    pub status: UserStatus,
    /// Bumped whenever previously issued tokens must stop working.
    pub token_version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: Masked::new(email.into().trim().to_lowercase()),
            display_name: display_name.into(),
            roles: BTreeSet::from([Role::User]),
            status: UserStatus::Pending,
            token_version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a user from storage; the base role is re-added if the row lost it.
    pub fn from_parts(
        id: Uuid,
        email: String,
        display_name: String,
        roles: impl IntoIterator<Item = Role>,
        status: UserStatus,
        token_version: i32,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let mut roles: BTreeSet<Role> = roles.into_iter().collect();
        roles.insert(Role::User);
        Self {
            id,
            email: Masked::new(email),
            display_name,
            roles,
            status,
            token_version,
            created_at,
            updated_at,
        }
    }

    pub fn roles(&self) -> &BTreeSet<Role> {
        &self.roles
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(Role::is_admin)
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Returns true if the role was newly granted.
    pub fn grant_role(&mut self, role: Role) -> bool {
        let added = self.roles.insert(role);
        if added {
            self.invalidate_tokens();
        }
        added
    }

    pub fn revoke_role(&mut self, role: Role) -> CoreResult<bool> {
        if role == Role::User {
            return Err(CoreError::validation("The base USER role cannot be revoked"));
        }
        let removed = self.roles.remove(&role);
        if removed {
            self.invalidate_tokens();
        }
        Ok(removed)
    }

    pub fn set_status(&mut self, status: UserStatus) {
        if self.status != status {
            self.status = status;
            self.invalidate_tokens();
        }
    }

    pub fn invalidate_tokens(&mut self) {
        self.token_version += 1;
        self.updated_at = Utc::now();
    }
}

/// 1:1 sub-record keyed by `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub phone: Option<Masked<String>>,
    pub country: Option<String>,
    pub bio: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: Uuid,
    pub currency: String,
    pub newsletter: bool,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn empty(user_id: Uuid) -> Self {
        Self { user_id, phone: None, country: None, bio: None, updated_at: Utc::now() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub phone: Option<String>,
    pub country: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferencesUpdate {
    pub currency: Option<String>,
    pub newsletter: Option<bool>,
}

impl UserPreferences {
    pub fn defaults_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            currency: "EUR".to_string(),
            newsletter: false,
            updated_at: Utc::now(),
        }
    }
}

/// Account administration: status moderation, role transitions, token
/// invalidation and cascade cleanup of sub-records.
pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    pub async fn register(&self, email: &str, display_name: &str) -> CoreResult<User> {
        if !email.contains('@') {
            return Err(CoreError::validation("Invalid email address"));
        }
        let user = User::new(email, display_name);
        self.users.insert(&user).await?;
        self.users.save_preferences(&UserPreferences::defaults_for(user.id)).await?;
        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    pub async fn get(&self, user_id: Uuid) -> CoreResult<User> {
        self.users
            .get(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("User", user_id))
    }

    pub async fn find_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        self.users.find_by_email(&email.trim().to_lowercase()).await
    }

    /// Makes sure an ACTIVE account holding ADMIN exists for `email`,
    /// creating it if needed. Safe to call on every startup.
    pub async fn ensure_admin(&self, email: &str, display_name: &str) -> CoreResult<User> {
        let user = match self.find_by_email(email).await? {
            Some(user) => user,
            None => self.register(email, display_name).await?,
        };
        if user.status == UserStatus::Deleted {
            return Err(CoreError::validation("The bootstrap admin account has been deleted"));
        }
        let user = if user.is_active() { user } else { self.change_status(user.id, UserStatus::Active).await? };
        if user.has_role(Role::Admin) {
            return Ok(user);
        }
        let user = self.grant_role(user.id, Role::Admin).await?;
        tracing::warn!(user_id = %user.id, "Bootstrap admin granted");
        Ok(user)
    }

    pub async fn list(&self, status: Option<UserStatus>, page: PageRequest) -> CoreResult<Page<User>> {
        self.users.list(status, page).await
    }

    pub async fn change_status(&self, user_id: Uuid, status: UserStatus) -> CoreResult<User> {
        if status == UserStatus::Deleted {
            return self.soft_delete(user_id).await;
        }
        let mut user = self.get(user_id).await?;
        if user.status == UserStatus::Deleted {
            return Err(CoreError::validation("Deleted accounts cannot be reactivated"));
        }
        user.set_status(status);
        self.users.update(&user).await?;
        tracing::info!(user_id = %user.id, status = %status, "User status changed");
        Ok(user)
    }

    pub async fn grant_role(&self, user_id: Uuid, role: Role) -> CoreResult<User> {
        let mut user = self.get(user_id).await?;
        if user.grant_role(role) {
            self.users.update(&user).await?;
            tracing::info!(user_id = %user.id, role = %role, "Role granted");
        }
        Ok(user)
    }

    pub async fn revoke_role(&self, user_id: Uuid, role: Role) -> CoreResult<User> {
        let mut user = self.get(user_id).await?;
        if user.revoke_role(role)? {
            self.users.update(&user).await?;
            tracing::info!(user_id = %user.id, role = %role, "Role revoked");
        }
        Ok(user)
    }

    /// Logout: every token issued so far stops validating.
    pub async fn invalidate_tokens(&self, user_id: Uuid) -> CoreResult<User> {
        let mut user = self.get(user_id).await?;
        user.invalidate_tokens();
        self.users.update(&user).await?;
        Ok(user)
    }

    /// Soft delete: status DELETED, tokens revoked, profile and preferences removed.
    pub async fn soft_delete(&self, user_id: Uuid) -> CoreResult<User> {
        let mut user = self.get(user_id).await?;
        user.set_status(UserStatus::Deleted);
        self.users.update(&user).await?;
        self.users.delete_sub_records(user_id).await?;
        tracing::info!(user_id = %user.id, "User soft-deleted");
        Ok(user)
    }

    pub async fn counts_by_status(&self) -> CoreResult<Vec<(UserStatus, u64)>> {
        self.users.count_by_status().await
    }

    pub async fn profile(&self, user_id: Uuid) -> CoreResult<UserProfile> {
        self.get(user_id).await?;
        Ok(self.users.get_profile(user_id).await?.unwrap_or_else(|| UserProfile::empty(user_id)))
    }

    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> CoreResult<UserProfile> {
        let mut profile = self.profile(user_id).await?;
        if let Some(phone) = update.phone {
            profile.phone = Some(phone.trim().to_string()).filter(|p| !p.is_empty()).map(Masked::new);
        }
        if let Some(country) = update.country {
            profile.country = Some(country.trim().to_uppercase()).filter(|c| !c.is_empty());
        }
        if let Some(bio) = update.bio {
            profile.bio = Some(bio).filter(|b| !b.trim().is_empty());
        }
        profile.updated_at = Utc::now();
        self.users.save_profile(&profile).await?;
        Ok(profile)
    }

    pub async fn preferences(&self, user_id: Uuid) -> CoreResult<UserPreferences> {
        self.get(user_id).await?;
        Ok(self
            .users
            .get_preferences(user_id)
            .await?
            .unwrap_or_else(|| UserPreferences::defaults_for(user_id)))
    }

    pub async fn update_preferences(&self, user_id: Uuid, update: PreferencesUpdate) -> CoreResult<UserPreferences> {
        let mut preferences = self.preferences(user_id).await?;
        if let Some(currency) = update.currency {
            let currency = currency.trim().to_uppercase();
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(CoreError::validation("Currency must be a 3-letter ISO code"));
            }
            preferences.currency = currency;
        }
        if let Some(newsletter) = update.newsletter {
            preferences.newsletter = newsletter;
        }
        preferences.updated_at = Utc::now();
        self.users.save_preferences(&preferences).await?;
        Ok(preferences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryUserRepository;

    #[test]
    fn test_base_role_is_implicit_and_permanent() {
        let mut user = User::new("a@example.com", "A");
        assert!(user.has_role(Role::User));
        assert!(user.revoke_role(Role::User).is_err());

        let rebuilt = User::from_parts(
            user.id,
            "a@example.com".into(),
            "A".into(),
            vec![Role::Agent],
            UserStatus::Active,
            3,
            user.created_at,
            user.updated_at,
        );
        assert!(rebuilt.has_role(Role::User));
        assert!(rebuilt.has_role(Role::Agent));
    }

    #[test]
    fn test_role_changes_bump_token_version() {
        let mut user = User::new("a@example.com", "A");
        assert!(user.grant_role(Role::Agent));
        assert_eq!(user.token_version, 1);
        assert!(!user.grant_role(Role::Agent));
        assert_eq!(user.token_version, 1);
        assert!(user.revoke_role(Role::Agent).unwrap());
        assert_eq!(user.token_version, 2);
    }

    #[test]
    fn test_role_parsing_accepts_legacy_prefix() {
        assert_eq!("ROLE_AGENT".parse::<Role>().unwrap(), Role::Agent);
        assert_eq!("super_admin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert!("PILOT".parse::<Role>().is_err());
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let service = UserService::new(Arc::new(InMemoryUserRepository::new()));
        let admin = service.ensure_admin(" Root@Example.com ", "Root").await.unwrap();
        assert!(admin.is_active());
        assert!(admin.has_role(Role::Admin));

        let again = service.ensure_admin("root@example.com", "Root").await.unwrap();
        assert_eq!(again.id, admin.id);
        assert_eq!(again.token_version, admin.token_version);

        let existing = service.register("ops@example.com", "Ops").await.unwrap();
        let promoted = service.ensure_admin("ops@example.com", "Ops").await.unwrap();
        assert_eq!(promoted.id, existing.id);
        assert!(promoted.is_active() && promoted.has_role(Role::Admin));

        service.soft_delete(existing.id).await.unwrap();
        assert!(matches!(service.ensure_admin("ops@example.com", "Ops").await, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_soft_delete_cascades_sub_records() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let service = UserService::new(repo.clone());

        let user = service.register("b@example.com", "B").await.unwrap();
        repo.save_profile(&UserProfile {
            user_id: user.id,
            phone: Some(Masked::new("+33 1 23 45 67 89".into())),
            country: Some("FR".into()),
            bio: None,
            updated_at: Utc::now(),
        })
        .await
        .unwrap();

        let deleted = service.soft_delete(user.id).await.unwrap();
        assert_eq!(deleted.status, UserStatus::Deleted);
        assert!(deleted.token_version > user.token_version);
        assert!(repo.get_profile(user.id).await.unwrap().is_none());
        assert!(repo.get_preferences(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_profile_and_preferences_updates() {
        let service = UserService::new(Arc::new(InMemoryUserRepository::new()));
        let user = service.register("c@example.com", "C").await.unwrap();

        let profile = service
            .update_profile(user.id, ProfileUpdate { country: Some(" pt ".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(profile.country.as_deref(), Some("PT"));
        assert!(profile.phone.is_none());

        let prefs = service.preferences(user.id).await.unwrap();
        assert_eq!(prefs.currency, "EUR");
        let err = service
            .update_preferences(user.id, PreferencesUpdate { currency: Some("euro".into()), newsletter: None })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        let prefs = service
            .update_preferences(user.id, PreferencesUpdate { currency: Some("usd".into()), newsletter: Some(true) })
            .await
            .unwrap();
        assert_eq!(prefs.currency, "USD");
        assert!(prefs.newsletter);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let service = UserService::new(Arc::new(InMemoryUserRepository::new()));
        service.register("dup@example.com", "One").await.unwrap();
        let err = service.register("DUP@example.com", "Two").await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }
}
