use sqlx::PgPool;
use tracing::info;

use crate::error::StoreError;

/// Create a PostgreSQL connection pool and run migrations.
///
/// Unlike optional feature stores, the scheduler cannot run without its
/// roster source, so any failure here is surfaced to the caller and is fatal
/// at startup.
pub async fn init_pg_pool(url: &str) -> Result<PgPool, StoreError> {
    let pool = PgPool::connect(url).await?;
    info!("connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("database migrations applied");

    Ok(pool)
}
