use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wayfarer_core::{Actor, CoreError, User};

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub roles: Vec<String>,
    /// Must match the account's token_version at request time.
    pub ver: i32,
    pub exp: usize,
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))
}

// ============================================================================
// Session extractors
// ============================================================================

/// The authenticated caller, re-read from the user store on every request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub actor: Actor,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }
}

pub async fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, AppError> {
    let claims = decode_token(token, &state.auth.secret)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Authentication("Invalid token subject".to_string()))?;

    let user = match state.users.get(user_id).await {
        Ok(user) => user,
        Err(CoreError::NotFound { .. }) => return Err(AppError::Authentication("Unknown account".to_string())),
        Err(e) => return Err(e.into()),
    };
    if user.token_version != claims.ver {
        return Err(AppError::Authentication("Token has been revoked".to_string()));
    }
    if !user.is_active() {
        return Err(AppError::Authentication(format!("Account is {}", user.status)));
    }

    let actor = Actor::from(&user);
    Ok(AuthUser { user, actor })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .typed_get::<Authorization<Bearer>>()
            .ok_or_else(|| AppError::Authentication("Missing bearer token".to_string()))?;
        authenticate(state, bearer.token()).await
    }
}

/// No Authorization header means anonymous; a bad token is still rejected.
impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(None);
        }
        <AuthUser as FromRequestParts<AppState>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}

/// Requires the AGENT role (admins pass as well).
#[derive(Debug, Clone)]
pub struct AgentUser(pub AuthUser);

impl FromRequestParts<AppState> for AgentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = <AuthUser as FromRequestParts<AppState>>::from_request_parts(parts, state).await?;
        if !auth.actor.is_agent() {
            return Err(AppError::Authorization("Agent role required".to_string()));
        }
        Ok(AgentUser(auth))
    }
}

#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = <AuthUser as FromRequestParts<AppState>>::from_request_parts(parts, state).await?;
        if !auth.actor.is_admin() {
            tracing::warn!(user_id = %auth.id(), "Admin route refused");
            return Err(AppError::Authorization("Admin role required".to_string()));
        }
        Ok(AdminUser(auth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, exp: usize) -> String {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "traveler@example.com".to_string(),
            roles: vec!["USER".to_string()],
            ver: 0,
            exp,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_decode_checks_signature() {
        let exp = (chrono::Utc::now().timestamp() + 600) as usize;
        assert!(decode_token(&token("secret", exp), "secret").is_ok());
        let err = decode_token(&token("secret", exp), "other").unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let exp = (chrono::Utc::now().timestamp() - 3600) as usize;
        assert!(decode_token(&token("secret", exp), "secret").is_err());
    }
}
