pub mod auth;
pub mod rate_limit;
pub mod resiliency;

pub use auth::{AdminUser, AgentUser, AuthUser, Claims};
