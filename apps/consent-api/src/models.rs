//! Data models for the consent API

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use esign_client::ProviderError;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Local consent status. The only transition is `Sent -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentStatus {
    Sent,
    Completed,
}

impl std::fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsentStatus::Sent => write!(f, "sent"),
            ConsentStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Tracking entry correlating a caller's consent id with a provider envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRecord {
    pub document_id: String,
    pub consent_id: String,
    pub email: String,
    pub signer_name: String,
    pub envelope_id: String,
    pub status: ConsentStatus,
    pub signed_at: Option<DateTime<Utc>>,
    pub download_available: bool,
    pub original_file_path: PathBuf,
    pub signed_file_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl ConsentRecord {
    pub fn is_completed(&self) -> bool {
        self.status == ConsentStatus::Completed
    }

    /// Flip to completed. Returns false if the record already was.
    pub fn mark_completed(&mut self, signed_at: DateTime<Utc>) -> bool {
        if self.is_completed() {
            return false;
        }
        self.status = ConsentStatus::Completed;
        self.download_available = true;
        self.signed_at = Some(signed_at);
        true
    }

    /// Attachment filename for the signed PDF
    ///
    /// The consent id is kept as given except for quotes, path separators and
    /// control characters, which become `_`.
    pub fn download_filename(&self) -> String {
        let safe: String = self
            .consent_id
            .chars()
            .map(|c| {
                if matches!(c, '"' | '/' | '\\') || c.is_control() {
                    '_'
                } else {
                    c
                }
            })
            .collect();
        format!("consent_{}.pdf", safe)
    }
}

/// `Content-Disposition` value for an attachment
///
/// Non-ASCII names get an ASCII `filename` fallback plus an RFC 5987
/// `filename*` carrying the UTF-8 name.
pub fn attachment_disposition(filename: &str) -> String {
    if filename.is_ascii() {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let fallback: String = filename
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    let mut encoded = String::with_capacity(filename.len() * 3);
    for byte in filename.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

/// Status payload returned by the send and status endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentStatusResponse {
    pub status: ConsentStatus,
    pub document_id: String,
    pub consent_id: String,
    pub envelope_id: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
    pub download_available: bool,
    pub download_url: Option<String>,
    /// Why the provider could not be consulted on this poll
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_error: Option<String>,
}

impl ConsentStatusResponse {
    pub fn from_record(record: &ConsentRecord, download_url: Option<String>) -> Self {
        Self {
            status: record.status,
            document_id: record.document_id.clone(),
            consent_id: record.consent_id.clone(),
            envelope_id: Some(record.envelope_id.clone()),
            signed_at: record.signed_at,
            download_available: record.download_available,
            download_url,
            poll_error: None,
        }
    }

    pub fn with_poll_error(mut self, error: Option<String>) -> Self {
        self.poll_error = error;
        self
    }
}

/// Where the document to sign comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// A PDF uploaded by the caller
    UploadedDocument { filename: String, bytes: Vec<u8> },
    /// Plain text rendered into a PDF by this service
    GeneratedFromText { content: String },
}

/// A validated send request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentSubmission {
    pub email: String,
    pub consent_id: String,
    pub signer_name: Option<String>,
    pub source: DocumentSource,
}

/// Uploaded file part, before validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Send request as received, from a multipart form, URL-encoded form or
/// JSON body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSubmission {
    pub email: Option<String>,
    pub consent_id: Option<String>,
    pub content: Option<String>,
    pub signer_name: Option<String>,
    #[serde(skip)]
    pub file: Option<UploadedFile>,
}

/// Filename used when text is rendered, or an upload has no usable name
pub const DEFAULT_FILENAME: &str = "consent.pdf";

impl RawSubmission {
    /// Check required fields and pick exactly one document source
    pub fn into_submission(self) -> Result<ConsentSubmission, ApiError> {
        let email = non_blank(self.email);
        let consent_id = non_blank(self.consent_id);
        let (Some(email), Some(consent_id)) = (email, consent_id) else {
            return Err(ApiError::InvalidRequest(
                "Required fields: email, consentId".into(),
            ));
        };
        if !email.contains('@') {
            return Err(ApiError::InvalidRequest(format!(
                "Invalid email address: {}",
                email
            )));
        }

        let content = self.content.filter(|c| !c.trim().is_empty());
        let source = match (self.file, content) {
            (None, None) => {
                return Err(ApiError::InvalidRequest(
                    "Send a PDF in 'file' or text in 'content'".into(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(ApiError::InvalidRequest(
                    "Send either a PDF in 'file' or text in 'content', not both".into(),
                ))
            }
            (Some(file), None) => validate_upload(file)?,
            (None, Some(content)) => DocumentSource::GeneratedFromText { content },
        };

        Ok(ConsentSubmission {
            email,
            consent_id,
            signer_name: non_blank(self.signer_name),
            source,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_upload(file: UploadedFile) -> Result<DocumentSource, ApiError> {
    if !file.filename.to_lowercase().ends_with(".pdf") {
        return Err(ApiError::InvalidRequest(
            "Only PDF files are accepted in 'file'".into(),
        ));
    }
    if file.bytes.is_empty() {
        return Err(ApiError::InvalidRequest("Uploaded file is empty".into()));
    }
    if !consent_pdf::looks_like_pdf(&file.bytes) {
        return Err(ApiError::InvalidRequest(
            "Uploaded file is not a PDF document".into(),
        ));
    }

    Ok(DocumentSource::UploadedDocument {
        filename: sanitize_filename(&file.filename),
        bytes: file.bytes,
    })
}

/// Keep only the final path component of a client-supplied filename
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        base.to_string()
    }
}

/// How a poll obtained the state it returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollSource {
    /// The provider answered
    Provider,
    /// Already completed locally; the provider was not asked
    LocalFinal,
    /// The provider could not be queried; last known local state
    StaleLocal,
}

/// Result of polling a consent record
#[derive(Debug)]
pub struct PollOutcome {
    pub record: ConsentRecord,
    pub source: PollSource,
    pub error: Option<ProviderError>,
}

impl PollOutcome {
    pub fn fresh(record: ConsentRecord) -> Self {
        Self {
            record,
            source: PollSource::Provider,
            error: None,
        }
    }

    pub fn local_final(record: ConsentRecord) -> Self {
        Self {
            record,
            source: PollSource::LocalFinal,
            error: None,
        }
    }

    pub fn stale(record: ConsentRecord, error: ProviderError) -> Self {
        Self {
            record,
            source: PollSource::StaleLocal,
            error: Some(error),
        }
    }
}
