use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use tracing::info;

use crate::config::Config;
use crate::db::{JobStore, PgJobStore};
use crate::llm::{build_adapter, LLMProviderConfig};
use crate::pipeline::{Orchestrator, OrchestratorSettings, PdfTextExtractor, TransformClient, TransformSettings};
use crate::progress::{spawn_redis_bridge, ProgressHub, ProgressPublisher, RedisProgressPublisher};
use crate::storage::build_object_store;
use crate::types::TokenUsage;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub jobs: Arc<dyn JobStore>,
    pub orchestrator: Arc<Orchestrator>,
    /// Local subscriber registry; WebSocket clients attach here.
    pub progress: ProgressHub,
}

impl AppState {
    /// Construct every shared client once; pipeline runs borrow them.
    pub async fn build(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        let store = build_object_store(&config.storage)?;
        let adapter = build_adapter(LLMProviderConfig::from_config(&config.llm)?)?;
        let jobs: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone()));
        let progress = ProgressHub::new();

        let publisher: Arc<dyn ProgressPublisher> = if config.redis.enabled {
            let client = redis::Client::open(config.redis.url.as_str())?;
            let publisher = RedisProgressPublisher::connect(client.clone(), progress.clone()).await?;
            spawn_redis_bridge(client, progress.clone());
            info!("Progress fan-out via Redis enabled");
            Arc::new(publisher)
        } else {
            Arc::new(progress.clone())
        };

        let orchestrator = Orchestrator::new(
            store.clone(),
            Arc::new(PdfTextExtractor::new(store)),
            TransformClient::new(adapter, TransformSettings::from(&config.llm)),
            jobs.clone(),
            publisher,
            OrchestratorSettings {
                key_prefix: config.storage.key_prefix.clone(),
                refine: config.llm.refine,
                max_upload_bytes: config.server.max_upload_bytes,
            },
        );

        info!(
            provider = %config.llm.provider,
            model = %config.llm.model,
            storage = %config.storage.provider,
            refine = config.llm.refine,
            "Application state ready"
        );

        Ok(Self {
            pool,
            config,
            jobs,
            orchestrator: Arc::new(orchestrator),
            progress,
        })
    }
}

/// Named step of the conversion pipeline, used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Input,
    Upload,
    Extraction,
    Transform,
    Refine,
    Persistence,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Input => write!(f, "input"),
            Stage::Upload => write!(f, "upload"),
            Stage::Extraction => write!(f, "extraction"),
            Stage::Transform => write!(f, "transform"),
            Stage::Refine => write!(f, "refine"),
            Stage::Persistence => write!(f, "persistence"),
        }
    }
}

/// Progress announced while the final record is being written, between the
/// last transform state and `Persisted`.
pub const SAVING_PERCENTAGE: u8 = 85;

/// Orchestrator state. Advances strictly forward:
/// `Received → Uploaded → Extracted → Transformed → Refined → Persisted → Completed`,
/// with `Failed` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Received,
    Uploaded,
    Extracted,
    Transformed,
    Refined,
    Persisted,
    Completed,
    Failed,
}

impl JobStatus {
    fn rank(self) -> u8 {
        match self {
            JobStatus::Received => 0,
            JobStatus::Uploaded => 1,
            JobStatus::Extracted => 2,
            JobStatus::Transformed => 3,
            JobStatus::Refined => 4,
            JobStatus::Persisted => 5,
            JobStatus::Completed => 6,
            JobStatus::Failed => 7,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Forward moves only; skipping a state (e.g. no refine pass) is allowed.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == JobStatus::Failed || next.rank() > self.rank()
    }

    /// Progress percentage announced when a job enters this state.
    pub fn percentage(self) -> u8 {
        match self {
            JobStatus::Received => 10,
            JobStatus::Uploaded => 20,
            JobStatus::Extracted => 40,
            JobStatus::Transformed => 60,
            JobStatus::Refined => 75,
            JobStatus::Persisted => 90,
            JobStatus::Completed => 100,
            JobStatus::Failed => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Received => "received",
            JobStatus::Uploaded => "uploaded",
            JobStatus::Extracted => "extracted",
            JobStatus::Transformed => "transformed",
            JobStatus::Refined => "refined",
            JobStatus::Persisted => "persisted",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(JobStatus::Received),
            "uploaded" => Ok(JobStatus::Uploaded),
            "extracted" => Ok(JobStatus::Extracted),
            "transformed" => Ok(JobStatus::Transformed),
            "refined" => Ok(JobStatus::Refined),
            "persisted" => Ok(JobStatus::Persisted),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// Outcome of one call to the transform service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformPass {
    pub purpose: String, // "initial" or "refine"
    pub model: String,
    pub stop_reason: String,
    pub usage: TokenUsage,
    /// Advisory tag-balance result for the sanitized output; `None` means balanced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformMetadata {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub passes: Vec<TransformPass>,
}

/// One submitted document, owned by the orchestrator until it is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionJob {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub original_filename: String,
    pub source_asset_ref: Option<String>,
    pub status: JobStatus,
    pub page_count: i32,
    pub result_markup: Option<String>,
    pub transform_metadata: Option<TransformMetadata>,
    pub created_at: DateTime<Utc>,
}

impl ConversionJob {
    pub fn new(owner_id: Uuid, original_filename: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            original_filename: original_filename.into(),
            source_asset_ref: None,
            status: JobStatus::Received,
            page_count: 0,
            result_markup: None,
            transform_metadata: None,
            created_at: Utc::now(),
        }
    }

    /// Move to `next`, refusing regressions and moves out of terminal states.
    pub fn advance(&mut self, next: JobStatus) -> bool {
        if !self.status.can_advance_to(next) {
            tracing::warn!(
                job_id = %self.id,
                from = %self.status,
                to = %next,
                "Rejected job status transition"
            );
            return false;
        }
        self.status = next;
        true
    }
}

/// Row shape of `conversion_jobs`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConversionJobRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub original_filename: String,
    pub source_asset_ref: Option<String>,
    pub status: String,
    pub page_count: i32,
    pub result_markup: Option<String>,
    pub transform_metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ConversionJobRow> for ConversionJob {
    type Error = String;

    fn try_from(row: ConversionJobRow) -> Result<Self, Self::Error> {
        let transform_metadata = row
            .transform_metadata
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| format!("invalid transform_metadata: {}", e))?;

        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            original_filename: row.original_filename,
            source_asset_ref: row.source_asset_ref,
            status: row.status.parse()?,
            page_count: row.page_count,
            result_markup: row.result_markup,
            transform_metadata,
            created_at: row.created_at,
        })
    }
}

/// Consumer-facing progress event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressEventKind {
    StageUpdate,
    JobCompleted,
    JobFailed,
}

/// Ephemeral stage notification; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub event: ProgressEventKind,
    pub job_id: Uuid,
    pub owner_id: Uuid,
    pub stage: String,
    pub percentage: u8,
    pub message: String,
}

impl ProgressEvent {
    pub fn stage_update(job: &ConversionJob, message: impl Into<String>) -> Self {
        Self {
            event: ProgressEventKind::StageUpdate,
            job_id: job.id,
            owner_id: job.owner_id,
            stage: job.status.to_string(),
            percentage: job.status.percentage(),
            message: message.into(),
        }
    }

    pub fn completed(job: &ConversionJob, message: impl Into<String>) -> Self {
        Self {
            event: ProgressEventKind::JobCompleted,
            job_id: job.id,
            owner_id: job.owner_id,
            stage: JobStatus::Completed.to_string(),
            percentage: 100,
            message: message.into(),
        }
    }

    /// Announced just before the result is written; the job stays in its
    /// current state until the write succeeds.
    pub fn saving(job: &ConversionJob, message: impl Into<String>) -> Self {
        Self {
            event: ProgressEventKind::StageUpdate,
            job_id: job.id,
            owner_id: job.owner_id,
            stage: "saving".to_string(),
            percentage: SAVING_PERCENTAGE,
            message: message.into(),
        }
    }

    /// Terminal failure marker: percentage 0 with the error message.
    pub fn failed(job: &ConversionJob, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            event: ProgressEventKind::JobFailed,
            job_id: job.id,
            owner_id: job.owner_id,
            stage: stage.to_string(),
            percentage: 0,
            message: message.into(),
        }
    }

    #[cfg(test)]
    pub fn is_terminal(&self) -> bool {
        !matches!(self.event, ProgressEventKind::StageUpdate)
    }
}

// API Request/Response types

#[derive(Debug, Deserialize, Validate)]
pub struct ListConversionsQuery {
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionSummary {
    pub id: Uuid,
    pub original_filename: String,
    pub source_asset_ref: Option<String>,
    pub status: JobStatus,
    pub page_count: i32,
    pub created_at: DateTime<Utc>,
}

impl From<&ConversionJob> for ConversionSummary {
    fn from(job: &ConversionJob) -> Self {
        Self {
            id: job.id,
            original_filename: job.original_filename.clone(),
            source_asset_ref: job.source_asset_ref.clone(),
            status: job.status,
            page_count: job.page_count,
            created_at: job.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversionResponse {
    pub success: bool,
    pub conversion: ConversionJob,
}

#[derive(Debug, Serialize)]
pub struct ConversionListResponse {
    pub success: bool,
    pub conversions: Vec<ConversionSummary>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
    pub redis: Option<String>,
}
