//! Warehouse schema initializer.
//!
//! Recreate mode runs two batches, each in its own committed transaction:
//! the tables batch (drop, create, index) and the views batch (create each
//! view that does not exist yet). There is no rollback across batches: if the
//! views batch fails, the freshly created tables stay.
//!
//! Migrate mode applies the versioned migrations under `migrations/` instead
//! and never drops anything.

use sqlx::{SqliteConnection, SqlitePool};

use etl_common::error::AppError;
use etl_common::types::SchemaMode;

use crate::schema::{INDEXES, TABLES, TABLES_SQL, VIEWS};

/// What a successful initialization did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub mode: SchemaMode,
    pub tables_recreated: Vec<&'static str>,
    pub views_created: Vec<&'static str>,
    pub views_skipped: Vec<&'static str>,
}

pub struct WarehouseInitializer {
    pool: SqlitePool,
    mode: SchemaMode,
}

impl WarehouseInitializer {
    pub fn new(pool: SqlitePool, mode: SchemaMode) -> Self {
        Self { pool, mode }
    }

    /// Apply the schema, reporting success as a flag. Errors are logged here
    /// and go no further.
    pub async fn initialize(&self) -> bool {
        match self.try_initialize().await {
            Ok(report) => {
                tracing::info!(
                    mode = %report.mode,
                    tables = ?report.tables_recreated,
                    views_created = ?report.views_created,
                    views_skipped = ?report.views_skipped,
                    "Data warehouse tables and views created successfully"
                );
                true
            }
            Err(e) => {
                tracing::error!(mode = %self.mode, error = %e, "Table or view creation failed");
                false
            }
        }
    }

    /// Apply the schema and return what was done.
    pub async fn try_initialize(&self) -> Result<SchemaReport, AppError> {
        match self.mode {
            SchemaMode::Recreate => {
                self.recreate_tables().await?;
                let (views_created, views_skipped) = self.create_missing_views().await?;

                Ok(SchemaReport {
                    mode: SchemaMode::Recreate,
                    tables_recreated: TABLES.to_vec(),
                    views_created,
                    views_skipped,
                })
            }
            SchemaMode::Migrate => {
                sqlx::migrate!("../../migrations").run(&self.pool).await?;
                tracing::info!("Warehouse migrations applied");

                Ok(SchemaReport {
                    mode: SchemaMode::Migrate,
                    ..SchemaReport::default()
                })
            }
        }
    }

    /// Drop and recreate both tables and their indexes. Existing rows are lost.
    async fn recreate_tables(&self) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::raw_sql(TABLES_SQL).execute(&mut *tx).await?;
        tx.commit().await?;

        tracing::warn!(
            tables = ?TABLES,
            indexes = ?INDEXES,
            "Warehouse tables dropped and recreated"
        );
        Ok(())
    }

    /// Create every view that is not already present. Existing views are left as they are.
    async fn create_missing_views(
        &self,
    ) -> Result<(Vec<&'static str>, Vec<&'static str>), AppError> {
        let mut created = Vec::new();
        let mut skipped = Vec::new();

        let mut tx = self.pool.begin().await?;
        for view in VIEWS {
            if view_exists(&mut tx, view.name).await? {
                tracing::debug!(view = view.name, "View already exists, skipping");
                skipped.push(view.name);
                continue;
            }

            sqlx::query(view.sql).execute(&mut *tx).await?;
            tracing::info!(view = view.name, "View created");
            created.push(view.name);
        }
        tx.commit().await?;

        Ok((created, skipped))
    }
}

async fn view_exists(conn: &mut SqliteConnection, name: &str) -> Result<bool, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'view' AND name = ?")
            .bind(name)
            .fetch_one(conn)
            .await?;

    Ok(count > 0)
}
