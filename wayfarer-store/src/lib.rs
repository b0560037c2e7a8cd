pub mod agent_repo;
pub mod app_config;
pub mod booking_repo;
pub mod catalog_repo;
pub mod database;
pub mod redis_repo;
pub mod user_repo;

pub use agent_repo::PgAgentStore;
pub use app_config::Config;
pub use booking_repo::PgBookingStore;
pub use catalog_repo::PgCatalogStore;
pub use database::DbClient;
pub use redis_repo::RedisClient;
pub use user_repo::PgUserRepository;
