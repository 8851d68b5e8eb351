use tracing_subscriber::EnvFilter;

use etl_common::config::WarehouseConfig;
use etl_common::db;
use etl_warehouse::initializer::WarehouseInitializer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "etl_warehouse=info,etl_common=info".into()),
        )
        .json()
        .init();

    tracing::info!("Creating data warehouse tables and views");

    let config = WarehouseConfig::from_env()?;
    config.validate()?;

    // Connection failures are reported like any other schema failure.
    let created = match db::create_pool(&config.database_url, config.db_max_connections).await {
        Ok(pool) => {
            WarehouseInitializer::new(pool, config.schema_mode)
                .initialize()
                .await
        }
        Err(e) => {
            tracing::error!(error = %e, "Table or view creation failed");
            false
        }
    };

    tracing::info!(success = created, "Warehouse initialization finished");
    Ok(())
}
