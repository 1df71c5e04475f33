use std::time::Duration;

use sqlx::postgres::PgPool;
use tracing::warn;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

/// `SELECT 1` with a short deadline; false on error or timeout.
pub async fn health_check(pool: &PgPool) -> bool {
    let probe = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool);
    match tokio::time::timeout(HEALTH_TIMEOUT, probe).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            warn!(error = %e, "Database health check failed");
            false
        }
        Err(_) => {
            warn!("Database health check timed out");
            false
        }
    }
}
