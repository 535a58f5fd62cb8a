use coach_core::{CoreError, SeatNumber};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{error, info, warn};

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
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

// Postgres SQLSTATE codes.
const UNIQUE_VIOLATION: &str = "23505";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

fn has_code(err: &sqlx::Error, codes: &[&str]) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| codes.iter().any(|c| code == *c)),
        _ => false,
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_code(err, &[UNIQUE_VIOLATION])
}

/// The transaction was aborted by Postgres after losing a row-lock race.
pub(crate) fn is_lock_contention(err: &sqlx::Error) -> bool {
    has_code(err, &[DEADLOCK_DETECTED, SERIALIZATION_FAILURE])
}

/// Like [`storage_error`], but a lost row-lock race becomes a conflict on
/// `seats`.
pub(crate) fn contention_or_storage(err: sqlx::Error, seats: &[SeatNumber]) -> CoreError {
    if is_lock_contention(&err) {
        warn!(?seats, "Row-lock race lost: {}", err);
        return CoreError::Conflict { seats: seats.to_vec() };
    }
    storage_error(err)
}

/// Maps a driver failure to the transient storage error surfaced to callers.
pub(crate) fn storage_error(err: sqlx::Error) -> CoreError {
    error!("Database error: {}", err);
    CoreError::StorageError(err.to_string())
}
