pub mod actor;
pub mod identity;
pub mod memory;
pub mod payment;
pub mod repository;

pub use actor::Actor;
pub use identity::{
    PreferencesUpdate, ProfileUpdate, Role, User, UserPreferences, UserProfile, UserService, UserStatus,
};
pub use repository::UserRepository;

/// Error taxonomy shared by every domain crate. The API layer maps each
/// variant onto an HTTP status code.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Not authorized: {0}")]
    Authorization(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Payment provider error: {0}")]
    Payment(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
