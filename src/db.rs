use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::config::AppConfig;
use crate::error::EngineResult;

pub type DbPool = SqlitePool;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection options shared by every pool: WAL so readers never block the
/// single writer, and a busy timeout so writers queue instead of failing.
pub fn connect_options(database_url: &str) -> EngineResult<SqliteConnectOptions> {
  let options = SqliteConnectOptions::from_str(database_url)?
    .create_if_missing(true)
    .journal_mode(SqliteJournalMode::Wal)
    .busy_timeout(BUSY_TIMEOUT)
    .foreign_keys(true);
  Ok(options)
}

/// Initialize the database connection pool and run migrations
pub async fn initialize_db(config: &AppConfig) -> EngineResult<DbPool> {
  tracing::info!("Initializing database at: {}", config.database_url);

  let pool = SqlitePoolOptions::new()
    .max_connections(config.max_connections)
    .connect_with(connect_options(&config.database_url)?)
    .await?;

  run_migrations(&pool).await?;

  tracing::info!("Database initialized successfully");

  Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> EngineResult<()> {
  sqlx::migrate!("./migrations").run(pool).await?;
  Ok(())
}
