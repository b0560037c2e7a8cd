use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;
use wayfarer_core::CoreError;

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Unique violations become `Conflict` with the given message; everything else is `Storage`.
pub(crate) fn map_err(conflict: &'static str) -> impl Fn(sqlx::Error) -> CoreError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => CoreError::conflict(conflict),
        _ => storage(e),
    }
}

pub(crate) fn storage(e: sqlx::Error) -> CoreError {
    tracing::error!(error = %e, "Database error");
    CoreError::Storage(e.to_string())
}

/// Parse a status column through the domain enum's `FromStr`.
pub(crate) fn parse_column<T>(value: &str) -> Result<T, CoreError>
where
    T: std::str::FromStr<Err = CoreError>,
{
    value
        .parse()
        .map_err(|e: CoreError| CoreError::Storage(format!("Corrupt column value {:?}: {}", value, e)))
}

/// `LIMIT`/`OFFSET` pair for a page request.
pub(crate) fn window(page: wayfarer_shared::PageRequest) -> (i64, i64) {
    (page.limit() as i64, i64::try_from(page.offset()).unwrap_or(i64::MAX))
}
