use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::AuthUser;
use crate::models::{
    AppState, ConversionListResponse, ConversionResponse, ConversionSummary, ListConversionsQuery,
};
use crate::pipeline::Submission;
use crate::types::{AppError, AppResult, ConversionError};

/// Multipart field carrying the document.
const UPLOAD_FIELD: &str = "pdfFile";
const DEFAULT_LIST_LIMIT: i64 = 20;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/conversions", post(create_conversion).get(list_conversions))
        .route("/api/conversions/{id}", get(get_conversion))
        .with_state(state)
}

/// Runs the pipeline on its own task and waits for it; progress streams over
/// the caller's WebSocket meanwhile. A client that disconnects early still
/// gets its job finished and announced.
async fn create_conversion(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ConversionResponse>)> {
    let mut submission = Submission {
        owner_id: user.id,
        filename: String::new(),
        content_type: None,
        data: Bytes::new(),
    };

    if let Err(e) = read_upload(&mut multipart, &mut submission).await {
        let failure = state
            .orchestrator
            .reject(user.id, &submission.filename, upload_error(&e))
            .await;
        return Err(failure.into());
    }

    info!(owner_id = %user.id, filename = %submission.filename, bytes = submission.data.len(), "Conversion requested");

    let job = state
        .orchestrator
        .spawn(submission)
        .await
        .map_err(|e| AppError::Internal(format!("Conversion task failed: {}", e)))??;

    Ok((
        StatusCode::CREATED,
        Json(ConversionResponse { success: true, conversion: job }),
    ))
}

/// Fill `submission` from the first `pdfFile` field; other fields are skipped.
async fn read_upload(multipart: &mut Multipart, submission: &mut Submission) -> Result<(), MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        submission.filename = field.file_name().unwrap_or("document.pdf").to_string();
        submission.content_type = field.content_type().map(str::to_string);
        submission.data = field.bytes().await?;
        break;
    }
    Ok(())
}

fn upload_error(error: &MultipartError) -> ConversionError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ConversionError::InputTooLarge(error.body_text())
    } else {
        ConversionError::Input(format!("Malformed upload: {}", error.body_text()))
    }
}

async fn list_conversions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListConversionsQuery>,
) -> AppResult<Json<ConversionListResponse>> {
    query
        .validate()
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

    let jobs = state
        .jobs
        .list_jobs(user.id, query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;

    Ok(Json(ConversionListResponse {
        success: true,
        conversions: jobs.iter().map(ConversionSummary::from).collect(),
    }))
}

async fn get_conversion(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ConversionResponse>> {
    let job = state
        .jobs
        .get_job(user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Conversion {} not found", id)))?;

    Ok(Json(ConversionResponse { success: true, conversion: job }))
}
