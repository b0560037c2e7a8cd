use serde::Deserialize;
use std::env;
use wayfarer_booking::BookingRules;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub booking_rules: BookingRules,
    #[serde(default)]
    pub payment: PaymentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Empty selects the in-memory store.
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

impl DatabaseConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_rate_limit() -> i64 { 120 }

impl Default for RedisConfig {
    fn default() -> Self {
        Self { url: String::new(), rate_limit_per_minute: default_rate_limit() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    /// Seeded as an ACTIVE admin at startup when set.
    #[serde(default)]
    pub bootstrap_admin_email: String,
    /// Enables `POST /v1/auth/session`, which signs a token for any active
    /// account by email alone. Only for deployments behind an identity proxy
    /// or local development.
    #[serde(default)]
    pub email_sessions: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    pub checkout_base_url: String,
    /// Consecutive provider failures before checkout is short-circuited.
    pub failure_threshold: u32,
    pub cooldown_seconds: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            checkout_base_url: "https://checkout.example.test/session".to_string(),
            failure_threshold: 5,
            cooldown_seconds: 30,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. WAYFARER__DATABASE__URL=postgres://...
            .add_source(config::Environment::with_prefix("WAYFARER").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_file_parses() {
        let config = parse(include_str!("../../config/default.toml"));
        assert!(!config.database.is_configured());
        assert_eq!(config.booking_rules.agent_guest_threshold, 8);
        assert_eq!(config.booking_rules.agent_categories, vec!["EXPEDITION".to_string()]);
        assert_eq!(config.payment.failure_threshold, 5);
    }

    #[test]
    fn test_optional_sections_default() {
        let config = parse(
            r#"
            [server]
            port = 8080
            [database]
            url = "postgres://localhost/wayfarer"
            [auth]
            jwt_secret = "s"
            jwt_expiration_seconds = 60
            "#,
        );
        assert!(config.database.is_configured());
        assert_eq!(config.database.max_connections, 5);
        assert!(config.redis.url.is_empty());
        assert!(config.auth.bootstrap_admin_email.is_empty());
        assert!(!config.auth.email_sessions);
        assert_eq!(config.booking_rules.agent_price_threshold, 1_000_000);
        assert_eq!(config.booking_rules.commission_percentage, 10.0);
    }
}
