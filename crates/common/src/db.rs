use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// Create a connection pool for the warehouse database.
///
/// `max_connections` controls the maximum number of connections in the pool.
/// Pass `WarehouseConfig::db_max_connections` for the user-configured value (default 5).
/// In-memory databases (`sqlite::memory:`) are private to one connection, so
/// callers sharing one must pass `1`.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect_with(options)
        .await?;

    tracing::info!(max_connections, "Connected to warehouse database");
    Ok(pool)
}
