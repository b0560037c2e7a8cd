use std::sync::Arc;
use std::time::Duration;

use wayfarer_agent::{
    AgentApplicationRepository, AgentApplicationService, AgentMessageRepository, InMemoryAgentStore, MessagingService,
};
use wayfarer_booking::{
    BookingChangeRepository, BookingRepository, BookingService, CommissionRepository, InMemoryBookingStore,
};
use wayfarer_catalog::{
    CatalogService, CollectionRepository, DestinationRepository, InMemoryCatalogStore, ReviewRepository,
    ReviewService, WishlistRepository, WishlistService,
};
use wayfarer_core::memory::InMemoryUserRepository;
use wayfarer_core::payment::PaymentAdapter;
use wayfarer_core::{UserRepository, UserService};
use wayfarer_store::{Config, DbClient, PgAgentStore, PgBookingStore, PgCatalogStore, PgUserRepository, RedisClient};

use crate::middleware::resiliency::CircuitBreaker;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
    pub email_sessions: bool,
}

#[derive(Clone)]
pub struct RateLimit {
    pub redis: Option<Arc<RedisClient>>,
    pub per_minute: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub catalog: Arc<CatalogService>,
    pub reviews: Arc<ReviewService>,
    pub wishlist: Arc<WishlistService>,
    pub bookings: Arc<BookingService>,
    pub applications: Arc<AgentApplicationService>,
    pub messaging: Arc<MessagingService>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimit,
    pub payment_cb: Arc<CircuitBreaker>,
}

impl AppState {
    /// Everything held in process memory; used for local runs and tests.
    pub fn in_memory(config: &Config, payments: Arc<dyn PaymentAdapter>) -> Self {
        Self::wire(
            config,
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryCatalogStore::new()),
            Arc::new(InMemoryBookingStore::new()),
            Arc::new(InMemoryAgentStore::new()),
            payments,
        )
    }

    pub fn postgres(config: &Config, db: &DbClient, payments: Arc<dyn PaymentAdapter>) -> Self {
        Self::wire(
            config,
            Arc::new(PgUserRepository::new(db.pool.clone())),
            Arc::new(PgCatalogStore::new(db.pool.clone())),
            Arc::new(PgBookingStore::new(db.pool.clone())),
            Arc::new(PgAgentStore::new(db.pool.clone())),
            payments,
        )
    }

    pub fn with_redis(mut self, redis: Arc<RedisClient>) -> Self {
        self.rate_limit.redis = Some(redis);
        self
    }

    fn wire<C, B, A>(
        config: &Config,
        user_repo: Arc<dyn UserRepository>,
        catalog_store: Arc<C>,
        booking_store: Arc<B>,
        agent_store: Arc<A>,
        payments: Arc<dyn PaymentAdapter>,
    ) -> Self
    where
        C: DestinationRepository + CollectionRepository + ReviewRepository + WishlistRepository + 'static,
        B: BookingRepository + CommissionRepository + BookingChangeRepository + 'static,
        A: AgentApplicationRepository + AgentMessageRepository + 'static,
    {
        let destinations: Arc<dyn DestinationRepository> = catalog_store.clone();
        let booking_repo: Arc<dyn BookingRepository> = booking_store.clone();
        let users = Arc::new(UserService::new(user_repo));

        let bookings = BookingService::new(
            booking_repo.clone(),
            booking_store.clone(),
            booking_store,
            destinations.clone(),
            payments,
            config.booking_rules.clone(),
        );

        Self {
            catalog: Arc::new(CatalogService::new(destinations.clone(), catalog_store.clone())),
            reviews: Arc::new(ReviewService::new(catalog_store.clone(), destinations.clone())),
            wishlist: Arc::new(WishlistService::new(catalog_store, destinations)),
            bookings: Arc::new(bookings),
            applications: Arc::new(AgentApplicationService::new(agent_store.clone(), users.clone())),
            messaging: Arc::new(MessagingService::new(agent_store, booking_repo)),
            users,
            auth: AuthConfig {
                secret: config.auth.jwt_secret.clone(),
                expiration: config.auth.jwt_expiration_seconds,
                email_sessions: config.auth.email_sessions,
            },
            rate_limit: RateLimit { redis: None, per_minute: config.redis.rate_limit_per_minute },
            payment_cb: Arc::new(CircuitBreaker::new(
                "payments",
                config.payment.failure_threshold,
                Duration::from_secs(config.payment.cooldown_seconds),
            )),
        }
    }
}
