//! Request body extraction for consent submissions
//!
//! The send endpoint takes the same fields as a multipart form (with an
//! optional `file` part), a URL-encoded form, or a JSON object.

use axum::{
    extract::{FromRequest, Multipart, Request},
    http::{header::CONTENT_TYPE, StatusCode},
    Form, Json,
};

use crate::error::ApiError;
use crate::models::{RawSubmission, UploadedFile};

/// Unvalidated submission parsed from any supported body type
pub struct SubmissionForm(pub RawSubmission);

#[axum::async_trait]
impl<S> FromRequest<S> for SubmissionForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| rejected(e.status(), e.body_text()))?;
            return read_multipart(multipart).await.map(SubmissionForm);
        }

        if content_type.starts_with("application/json") {
            let Json(raw) = Json::<RawSubmission>::from_request(req, state)
                .await
                .map_err(|e| rejected(e.status(), e.body_text()))?;
            return Ok(SubmissionForm(raw));
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(raw) = Form::<RawSubmission>::from_request(req, state)
                .await
                .map_err(|e| rejected(e.status(), e.body_text()))?;
            return Ok(SubmissionForm(raw));
        }

        let shown = if content_type.is_empty() {
            "none"
        } else {
            content_type.as_str()
        };
        Err(ApiError::UnsupportedMediaType(format!(
            "Expected multipart/form-data or application/json, got {}",
            shown
        )))
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<RawSubmission, ApiError> {
    let mut raw = RawSubmission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| rejected(e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| rejected(e.status(), e.body_text()))?;
            // An empty file input submits a part with no name and no content
            if filename.is_empty() && bytes.is_empty() {
                continue;
            }
            raw.file = Some(UploadedFile {
                filename,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let slot = match name.as_str() {
            "email" => &mut raw.email,
            "consentId" => &mut raw.consent_id,
            "content" => &mut raw.content,
            "signerName" => &mut raw.signer_name,
            other => {
                tracing::debug!("Ignoring multipart field {:?}", other);
                continue;
            }
        };
        let value = field
            .text()
            .await
            .map_err(|e| rejected(e.status(), e.body_text()))?;
        *slot = Some(value);
    }

    Ok(raw)
}

/// Keep the body-limit status from axum's rejections; anything else is a
/// malformed request
fn rejected(status: StatusCode, text: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(text)
    } else {
        ApiError::InvalidRequest(text)
    }
}
