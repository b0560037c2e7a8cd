use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use wayfarer_core::{CoreResult, Role, User, UserPreferences, UserProfile, UserRepository, UserStatus};
use wayfarer_shared::{Masked, Page, PageRequest};

use crate::database::{map_err, parse_column, storage, window};

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    display_name: String,
    roles: Vec<String>,
    status: String,
    token_version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = wayfarer_core::CoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let roles = row.roles.iter().map(|r| parse_column::<Role>(r)).collect::<CoreResult<Vec<_>>>()?;
        Ok(User::from_parts(
            row.id,
            row.email,
            row.display_name,
            roles,
            parse_column(&row.status)?,
            row.token_version,
            row.created_at,
            row.updated_at,
        ))
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: Uuid,
    phone: Option<String>,
    country: Option<String>,
    bio: Option<String>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct PreferencesRow {
    user_id: Uuid,
    currency: String,
    newsletter: bool,
    updated_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "id, email, display_name, roles, status, token_version, created_at, updated_at";

fn role_names(user: &User) -> Vec<String> {
    user.roles().iter().map(|r| r.as_str().to_string()).collect()
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: &User) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, roles, status, token_version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id)
        .bind(user.email.expose())
        .bind(&user.display_name)
        .bind(role_names(user))
        .bind(user.status.as_str())
        .bind(user.token_version)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err("Email already registered"))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(User::try_from).transpose()
    }

    async fn update(&self, user: &User) -> CoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET display_name = $2, roles = $3, status = $4, token_version = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.display_name)
        .bind(role_names(user))
        .bind(user.status.as_str())
        .bind(user.token_version)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn list(&self, status: Option<UserStatus>, page: PageRequest) -> CoreResult<Page<User>> {
        let (limit, offset) = window(page);
        let status = status.map(|s| s.as_str());
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            USER_COLUMNS
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE ($1::text IS NULL OR status = $1)")
            .bind(status)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

        let users = rows.into_iter().map(User::try_from).collect::<CoreResult<Vec<_>>>()?;
        Ok(Page::new(users, total as u64, page))
    }

    async fn count_by_status(&self) -> CoreResult<Vec<(UserStatus, u64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as("SELECT status, COUNT(*) FROM users GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(UserStatus::ALL
            .iter()
            .map(|s| {
                let n = rows.iter().find(|(name, _)| name == s.as_str()).map_or(0, |(_, n)| *n);
                (*s, n as u64)
            })
            .collect())
    }

    async fn save_profile(&self, profile: &UserProfile) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (user_id, phone, country, bio, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE
            SET phone = EXCLUDED.phone, country = EXCLUDED.country, bio = EXCLUDED.bio, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(profile.user_id)
        .bind(profile.phone.as_ref().map(|p| p.expose().as_str()))
        .bind(&profile.country)
        .bind(&profile.bio)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> CoreResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT user_id, phone, country, bio, updated_at FROM user_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(|r| UserProfile {
            user_id: r.user_id,
            phone: r.phone.map(Masked::new),
            country: r.country,
            bio: r.bio,
            updated_at: r.updated_at,
        }))
    }

    async fn save_preferences(&self, preferences: &UserPreferences) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (user_id, currency, newsletter, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET currency = EXCLUDED.currency, newsletter = EXCLUDED.newsletter, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(preferences.user_id)
        .bind(&preferences.currency)
        .bind(preferences.newsletter)
        .bind(preferences.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn get_preferences(&self, user_id: Uuid) -> CoreResult<Option<UserPreferences>> {
        let row = sqlx::query_as::<_, PreferencesRow>(
            "SELECT user_id, currency, newsletter, updated_at FROM user_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(|r| UserPreferences {
            user_id: r.user_id,
            currency: r.currency,
            newsletter: r.newsletter,
            updated_at: r.updated_at,
        }))
    }

    async fn delete_sub_records(&self, user_id: Uuid) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        sqlx::query("DELETE FROM user_profiles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        sqlx::query("DELETE FROM user_preferences WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        tx.commit().await.map_err(storage)?;
        Ok(())
    }
}
