//! The per-job state machine.
//!
//! One [`Orchestrator::run`] call drives one job through upload, extraction,
//! the transform passes and persistence, strictly in order. Each stage is its
//! own method returning either its output or a [`ConversionError`]; `run`
//! tags the first failure with its [`Stage`], announces it once and stops.
//! Nothing is retried and nothing is persisted for a failed job.

use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::extractor::{ExtractedText, TextExtractor};
use super::prompts::Purpose;
use super::sanitizer;
use super::transform::TransformClient;
use crate::db::JobStore;
use crate::models::{ConversionJob, JobStatus, ProgressEvent, Stage, TransformMetadata, TransformPass};
use crate::progress::{ChannelKey, ProgressPublisher};
use crate::storage::{self, AssetRef, ObjectStore};
use crate::types::{ConversionError, PipelineError};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// One uploaded document awaiting conversion.
#[derive(Debug, Clone)]
pub struct Submission {
    pub owner_id: Uuid,
    pub filename: String,
    /// Media type declared by the client, if any.
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub key_prefix: String,
    pub refine: bool,
    pub max_upload_bytes: usize,
}

pub struct Orchestrator {
    store: Arc<dyn ObjectStore>,
    extractor: Arc<dyn TextExtractor>,
    transform: TransformClient,
    jobs: Arc<dyn JobStore>,
    publisher: Arc<dyn ProgressPublisher>,
    settings: OrchestratorSettings,
}

/// Sanitized markup from one pass, with what the service reported about it.
struct PassResult {
    markup: String,
    record: TransformPass,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        extractor: Arc<dyn TextExtractor>,
        transform: TransformClient,
        jobs: Arc<dyn JobStore>,
        publisher: Arc<dyn ProgressPublisher>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            extractor,
            transform,
            jobs,
            publisher,
            settings,
        }
    }

    /// Convert one document. On success the returned job is the persisted record.
    pub async fn run(&self, submission: Submission) -> Result<ConversionJob, PipelineError> {
        let filename = storage::sanitize_filename(&submission.filename);
        let mut job = ConversionJob::new(submission.owner_id, filename);
        info!(job_id = %job.id, owner_id = %job.owner_id, bytes = submission.data.len(), "Conversion started");

        match self.drive(&mut job, submission).await {
            Ok(record) => {
                info!(job_id = %record.id, pages = record.page_count, "Conversion completed");
                self.emit(ProgressEvent::completed(&record, "Conversion complete")).await;
                Ok(record)
            }
            Err(failure) => {
                job.advance(JobStatus::Failed);
                error!(job_id = %job.id, stage = %failure.stage, error = %failure.error, "Conversion failed");
                self.emit(ProgressEvent::failed(&job, failure.stage, failure.error.to_string()))
                    .await;
                Err(failure)
            }
        }
    }

    /// Run on a task of its own so the job reaches a terminal event even when
    /// the caller stops waiting.
    pub fn spawn(self: &Arc<Self>, submission: Submission) -> JoinHandle<Result<ConversionJob, PipelineError>> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move { orchestrator.run(submission).await })
    }

    /// Fail a submission that never made it into a [`Submission`], e.g. an
    /// unreadable multipart body. Announced like any other input failure.
    pub async fn reject(&self, owner_id: Uuid, filename: &str, error: ConversionError) -> PipelineError {
        let mut job = ConversionJob::new(owner_id, storage::sanitize_filename(filename));
        job.advance(JobStatus::Failed);
        warn!(job_id = %job.id, owner_id = %owner_id, error = %error, "Upload rejected");
        self.emit(ProgressEvent::failed(&job, Stage::Input, error.to_string())).await;
        PipelineError::new(Stage::Input, error)
    }

    async fn drive(&self, job: &mut ConversionJob, submission: Submission) -> Result<ConversionJob, PipelineError> {
        validate_submission(&submission, self.settings.max_upload_bytes)
            .map_err(|e| PipelineError::new(Stage::Input, e))?;
        self.emit(ProgressEvent::stage_update(job, "Document received")).await;

        let asset = self
            .upload(job, submission.data)
            .await
            .map_err(|e| PipelineError::new(Stage::Upload, e))?;
        job.source_asset_ref = Some(asset.url.clone());
        self.transition(job, JobStatus::Uploaded, "Document uploaded").await;

        let text = self
            .extract(&asset)
            .await
            .map_err(|e| PipelineError::new(Stage::Extraction, e))?;
        job.page_count = i32::try_from(text.page_count())
            .map_err(|_| PipelineError::new(Stage::Extraction, ConversionError::Extraction("page count out of range".into())))?;
        self.transition(job, JobStatus::Extracted, format!("Extracted text from {} page(s)", job.page_count))
            .await;

        let mut passes = Vec::with_capacity(2);

        let initial = self
            .pass(&text.joined(), Purpose::Initial)
            .await
            .map_err(|e| PipelineError::new(Stage::Transform, e))?;
        let mut markup = initial.markup;
        passes.push(initial.record);
        self.transition(job, JobStatus::Transformed, "Initial transform complete").await;

        if self.settings.refine {
            let refined = self
                .pass(&markup, Purpose::Refine)
                .await
                .map_err(|e| PipelineError::new(Stage::Refine, e))?;
            markup = refined.markup;
            passes.push(refined.record);
            self.transition(job, JobStatus::Refined, "Markup refined").await;
        }

        self.emit(ProgressEvent::saving(job, "Saving conversion")).await;
        let record = self
            .persist(job, markup, passes)
            .await
            .map_err(|e| PipelineError::new(Stage::Persistence, e))?;

        self.transition(job, JobStatus::Persisted, "Conversion saved").await;
        job.advance(JobStatus::Completed);
        Ok(record)
    }

    async fn upload(&self, job: &ConversionJob, data: Bytes) -> Result<AssetRef, ConversionError> {
        let key = storage::object_key(&self.settings.key_prefix, &job.original_filename);
        let asset = self
            .store
            .put(&key, data, mime::APPLICATION_PDF.as_ref())
            .await
            .map_err(|e| ConversionError::Persistence(format!("Failed to store document: {}", e)))?;
        debug!(job_id = %job.id, key = %asset.key, "Stored source document");
        Ok(asset)
    }

    async fn extract(&self, asset: &AssetRef) -> Result<ExtractedText, ConversionError> {
        let text = self.extractor.extract(asset).await?;
        let empty = text.pages.iter().filter(|p| p.trim().is_empty()).count();
        if empty > 0 {
            warn!(key = %asset.key, empty_pages = empty, "Some pages have no extractable text");
        }
        Ok(text)
    }

    /// One transform call, then sanitize and advisory validation.
    async fn pass(&self, input: &str, purpose: Purpose) -> Result<PassResult, ConversionError> {
        let output = self.transform.transform(input, purpose).await?;
        let markup = sanitizer::sanitize(&output.content);

        let validation_error = match sanitizer::validate(&markup) {
            Ok(()) => None,
            Err(e) => {
                warn!(%purpose, error = %e, "Markup failed structural validation; continuing");
                Some(e.to_string())
            }
        };

        Ok(PassResult {
            markup,
            record: TransformPass {
                purpose: purpose.to_string(),
                model: output.model,
                stop_reason: output.stop_reason,
                usage: output.usage,
                validation_error,
            },
        })
    }

    /// Write the finished record once, already in its terminal state. The
    /// caller's job is left untouched until the write succeeds.
    async fn persist(
        &self,
        job: &ConversionJob,
        markup: String,
        passes: Vec<TransformPass>,
    ) -> Result<ConversionJob, ConversionError> {
        let settings = self.transform.settings();
        let mut record = job.clone();
        record.result_markup = Some(markup);
        record.transform_metadata = Some(TransformMetadata {
            provider: settings.provider.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            passes,
        });
        record.advance(JobStatus::Completed);

        self.jobs
            .insert_job(&record)
            .await
            .map_err(|e| ConversionError::Persistence(e.to_string()))?;
        Ok(record)
    }

    async fn transition(&self, job: &mut ConversionJob, next: JobStatus, message: impl Into<String>) {
        if job.advance(next) {
            self.emit(ProgressEvent::stage_update(job, message)).await;
        }
    }

    async fn emit(&self, event: ProgressEvent) {
        debug!(job_id = %event.job_id, stage = %event.stage, percentage = event.percentage, "Progress");
        self.publisher.publish(ChannelKey::owner(event.owner_id), event).await;
    }
}

/// Reject anything that is not a non-empty, size-bounded PDF.
pub fn validate_submission(submission: &Submission, max_bytes: usize) -> Result<(), ConversionError> {
    if submission.data.is_empty() {
        return Err(ConversionError::Input("No PDF file uploaded".to_string()));
    }
    if submission.data.len() > max_bytes {
        return Err(ConversionError::InputTooLarge(format!(
            "Uploaded file is {} bytes; the limit is {}",
            submission.data.len(),
            max_bytes
        )));
    }

    let declared_pdf = match submission.content_type.as_deref() {
        Some(ct) if !ct.trim().is_empty() => ct.to_ascii_lowercase().contains("pdf"),
        _ => mime_guess::from_path(&submission.filename)
            .first()
            .is_some_and(|m| m == mime::APPLICATION_PDF),
    };
    if !declared_pdf {
        return Err(ConversionError::Input("Only PDF files are allowed".to_string()));
    }

    if !submission.data.starts_with(PDF_MAGIC) {
        return Err(ConversionError::Input("File content is not a PDF".to_string()));
    }

    Ok(())
}
