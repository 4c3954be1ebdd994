use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use scorebox_core::{ServiceCheckResult, ServiceDef, Team};

use crate::error::StoreError;

/// The relational operations the scheduler consumes.
///
/// Behind a trait so the tick loop can be tested against an in-memory fake;
/// see [`PgScoreStore`] for the production implementation.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Load the blue-team roster.
    async fn load_teams(&self) -> Result<Vec<Team>, StoreError>;

    /// Load all enabled monitored-service definitions.
    async fn load_services(&self) -> Result<Vec<ServiceDef>, StoreError>;

    /// Persist one tick's results. All-or-nothing: either every record in
    /// the batch lands or none do.
    async fn insert_results(&self, batch: &[ServiceCheckResult]) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: ScoreStore + ?Sized> ScoreStore for Arc<T> {
    async fn load_teams(&self) -> Result<Vec<Team>, StoreError> {
        (**self).load_teams().await
    }

    async fn load_services(&self) -> Result<Vec<ServiceDef>, StoreError> {
        (**self).load_services().await
    }

    async fn insert_results(&self, batch: &[ServiceCheckResult]) -> Result<(), StoreError> {
        (**self).insert_results(batch).await
    }
}

/// Postgres-backed [`ScoreStore`].
pub struct PgScoreStore {
    pool: PgPool,
}

impl PgScoreStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScoreStore for PgScoreStore {
    async fn load_teams(&self) -> Result<Vec<Team>, StoreError> {
        let rows: Vec<(i32, String, String)> =
            sqlx::query_as("SELECT id, name, addr FROM teams ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, addr)| Team { id, name, addr })
            .collect())
    }

    async fn load_services(&self) -> Result<Vec<ServiceDef>, StoreError> {
        let rows: Vec<(i32, String, String, String, DateTime<Utc>, bool)> = sqlx::query_as(
            "SELECT id, name, script, args, starts_at, enabled
             FROM services
             WHERE enabled
             ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, script, args, starts_at, enabled)| ServiceDef {
                id,
                name,
                script,
                args,
                starts_at,
                enabled,
            })
            .collect())
    }

    async fn insert_results(&self, batch: &[ServiceCheckResult]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for result in batch {
            sqlx::query(
                "INSERT INTO service_checks (team_id, service_id, checked_at, outcome, exit_code)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(result.team_id)
            .bind(result.service_id)
            .bind(result.timestamp)
            .bind(result.outcome.as_str())
            .bind(result.exit_code)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(count = batch.len(), "persisted result batch");
        Ok(())
    }
}
