//! HTTP handlers for the consent API

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;

use crate::error::ApiError;
use crate::extract::SubmissionForm;
use crate::models::{attachment_disposition, ConsentRecord, ConsentStatusResponse};
use crate::state::AppState;

/// Health check endpoint
pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Receive a consent document (PDF or text) and send it for signature
pub async fn send_consent(
    State(state): State<Arc<AppState>>,
    SubmissionForm(raw): SubmissionForm,
) -> Result<Json<ConsentStatusResponse>, ApiError> {
    if !state.service.is_configured() {
        return Err(ApiError::NotConfigured);
    }

    let submission = raw.into_submission()?;
    let record = state.service.send(submission).await?;

    Ok(Json(status_response(&state, &record)))
}

/// Local status, refreshed from the provider until the envelope completes
pub async fn consent_status(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<Json<ConsentStatusResponse>, ApiError> {
    let outcome = state.service.poll(&document_id).await?;
    tracing::debug!(
        "Status of {} is {} ({:?})",
        document_id,
        outcome.record.status,
        outcome.source
    );
    let response = status_response(&state, &outcome.record)
        .with_poll_error(outcome.error.map(|e| e.to_string()));
    Ok(Json(response))
}

/// Serve the signed PDF as an attachment
pub async fn download_consent(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let signed = state.service.signed_document(&document_id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_LENGTH, signed.file.len.to_string()),
            (
                header::CONTENT_DISPOSITION,
                attachment_disposition(&signed.filename),
            ),
        ],
        Body::from_stream(ReaderStream::new(signed.file.file)),
    ))
}

fn status_response(state: &AppState, record: &ConsentRecord) -> ConsentStatusResponse {
    let download_url = record
        .download_available
        .then(|| state.download_url(&record.document_id));
    ConsentStatusResponse::from_record(record, download_url)
}
