//! Job persistence.
//!
//! The orchestrator writes exactly one row per successful job, after the
//! final markup is known. Failed jobs never reach this module.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ConversionJob, ConversionJobRow};
use crate::types::{AppError, AppResult};

const JOB_COLUMNS: &str = "id, owner_id, original_filename, source_asset_ref, status, \
     page_count, result_markup, transform_metadata, created_at";

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: &ConversionJob) -> AppResult<()>;

    /// Fetch a job only if it belongs to `owner_id`.
    async fn get_job(&self, owner_id: Uuid, job_id: Uuid) -> AppResult<Option<ConversionJob>>;

    /// Newest first.
    async fn list_jobs(&self, owner_id: Uuid, limit: i64) -> AppResult<Vec<ConversionJob>>;

    async fn user_exists(&self, user_id: Uuid) -> AppResult<bool>;
}

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_job(row: ConversionJobRow) -> AppResult<ConversionJob> {
    ConversionJob::try_from(row).map_err(AppError::Internal)
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert_job(&self, job: &ConversionJob) -> AppResult<()> {
        let metadata = job
            .transform_metadata
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| AppError::Internal(format!("Failed to encode transform metadata: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO conversion_jobs
                (id, owner_id, original_filename, source_asset_ref, status,
                 page_count, result_markup, transform_metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(job.id)
        .bind(job.owner_id)
        .bind(&job.original_filename)
        .bind(&job.source_asset_ref)
        .bind(job.status.as_str())
        .bind(job.page_count)
        .bind(&job.result_markup)
        .bind(metadata)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_job(&self, owner_id: Uuid, job_id: Uuid) -> AppResult<Option<ConversionJob>> {
        let row = sqlx::query_as::<_, ConversionJobRow>(&format!(
            "SELECT {} FROM conversion_jobs WHERE id = $1 AND owner_id = $2",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_job).transpose()
    }

    async fn list_jobs(&self, owner_id: Uuid, limit: i64) -> AppResult<Vec<ConversionJob>> {
        let rows = sqlx::query_as::<_, ConversionJobRow>(&format!(
            "SELECT {} FROM conversion_jobs WHERE owner_id = $1 ORDER BY created_at DESC LIMIT $2",
            JOB_COLUMNS
        ))
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_job).collect()
    }

    async fn user_exists(&self, user_id: Uuid) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;

    #[test]
    fn test_row_conversion_parses_status_and_metadata() {
        let row = ConversionJobRow {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            original_filename: "doc.pdf".to_string(),
            source_asset_ref: Some("https://b.s3.us-east-1.amazonaws.com/k".to_string()),
            status: "completed".to_string(),
            page_count: 3,
            result_markup: Some("<?xml version=\"1.0\"?><Doc/>".to_string()),
            transform_metadata: Some(serde_json::json!({
                "provider": "openai",
                "model": "gpt-4o-mini",
                "temperature": 0.1,
                "passes": []
            })),
            created_at: chrono::Utc::now(),
        };

        let job = into_job(row).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.transform_metadata.unwrap().provider, "openai");
    }

    #[test]
    fn test_row_conversion_rejects_unknown_status() {
        let row = ConversionJobRow {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            original_filename: "doc.pdf".to_string(),
            source_asset_ref: None,
            status: "archived".to_string(),
            page_count: 0,
            result_markup: None,
            transform_metadata: None,
            created_at: chrono::Utc::now(),
        };
        assert!(matches!(into_job(row), Err(AppError::Internal(_))));
    }
}
