//! Startup configuration
//!
//! Every setting can be given as a flag or an environment variable (a `.env`
//! file is loaded first). Read once at startup; there is no reload.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use consent_pdf::TextLayout;
use esign_client::{EsignConfig, ProviderContract, DEFAULT_BASE_URL};
use tracing::info;

use crate::service::EnvelopeSettings;

#[derive(Parser, Debug, Clone)]
#[command(name = "consent-api")]
#[command(about = "Consent backend: sends consent PDFs for e-signature via Intellisign")]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Directory holding original and signed PDFs
    #[arg(long, env = "UPLOAD_ROOT", default_value = "/app/uploads")]
    pub upload_root: PathBuf,

    /// Absolute base URL used to build download links (relative links otherwise)
    #[arg(long, env = "PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Request body limit for uploads
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 25 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    #[arg(long, env = "INTELLISIGN_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub intellisign_base_url: String,

    #[arg(long, env = "INTELLISIGN_CLIENT_ID", default_value = "", hide_env_values = true)]
    pub intellisign_client_id: String,

    #[arg(long, env = "INTELLISIGN_CLIENT_SECRET", default_value = "", hide_env_values = true)]
    pub intellisign_client_secret: String,

    #[arg(long, env = "INTELLISIGN_SCOPE", default_value = "*")]
    pub intellisign_scope: String,

    /// Per-request timeout for provider calls, in seconds
    #[arg(long, env = "INTELLISIGN_TIMEOUT_SECS", default_value_t = 30)]
    pub intellisign_timeout_secs: u64,

    /// Envelope status values that mean "fully signed"
    #[arg(
        long,
        env = "INTELLISIGN_COMPLETED_STATUSES",
        value_delimiter = ',',
        default_value = "completed,signed,finished"
    )]
    pub completed_statuses: Vec<String>,

    /// Response fields that may hold the envelope id, in order
    #[arg(
        long,
        env = "INTELLISIGN_ENVELOPE_ID_FIELDS",
        value_delimiter = ',',
        default_value = "id,envelope_id"
    )]
    pub envelope_id_fields: Vec<String>,

    /// Response field holding the envelope status
    #[arg(long, env = "INTELLISIGN_STATUS_FIELD", default_value = "status")]
    pub status_field: String,

    /// Response field holding the envelope's document list
    #[arg(long, env = "INTELLISIGN_DOCUMENTS_FIELD", default_value = "documents")]
    pub documents_field: String,

    /// Field holding a document id, in upload responses and document lists
    #[arg(long, env = "INTELLISIGN_DOCUMENT_ID_FIELD", default_value = "id")]
    pub document_id_field: String,

    /// JSON pointer to a document's download link
    #[arg(long, env = "INTELLISIGN_DOWNLOAD_LINK_POINTER", default_value = "/links/download")]
    pub download_link_pointer: String,

    /// Signer name used when the submission does not carry one
    #[arg(long, env = "SIGNER_NAME_DEFAULT", default_value = "User")]
    pub signer_name_default: String,

    #[arg(long, env = "SIGNER_EMAIL_DEFAULT", default_value = "test@example.com")]
    pub signer_email_default: String,

    /// Provider signature level requested for each signer
    #[arg(long, env = "SIGNATURE_TYPE", default_value = "simple")]
    pub signature_type: String,

    /// Envelope title/subject prefix; the consent id is appended
    #[arg(long, env = "ENVELOPE_SUBJECT_PREFIX", default_value = "Consentimento")]
    pub envelope_subject_prefix: String,

    #[arg(
        long,
        env = "ENVELOPE_MESSAGE",
        default_value = "Por favor, assine o termo de consentimento enviado pelo sistema."
    )]
    pub envelope_message: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    pub fn provider_contract(&self) -> ProviderContract {
        ProviderContract::default()
            .with_completed_statuses(&self.completed_statuses)
            .with_envelope_id_fields(&self.envelope_id_fields)
            .with_status_field(self.status_field.trim())
            .with_documents_field(self.documents_field.trim())
            .with_document_id_field(self.document_id_field.trim())
            .with_download_link_pointer(self.download_link_pointer.trim())
    }

    pub fn esign_config(&self) -> EsignConfig {
        EsignConfig::new(
            &self.intellisign_base_url,
            &self.intellisign_client_id,
            &self.intellisign_client_secret,
        )
        .with_scope(&self.intellisign_scope)
        .with_timeout(Duration::from_secs(self.intellisign_timeout_secs))
        .with_contract(self.provider_contract())
    }

    pub fn envelope_settings(&self) -> EnvelopeSettings {
        EnvelopeSettings {
            subject_prefix: self.envelope_subject_prefix.clone(),
            message: self.envelope_message.clone(),
            signer_name_default: self.signer_name_default.clone(),
            signature_type: self.signature_type.clone(),
            layout: TextLayout::default(),
        }
    }

    /// Log the effective configuration, without secrets
    pub fn log_summary(&self) {
        info!("Upload root: {}", self.upload_root.display());
        info!("Provider: {}", self.intellisign_base_url);
        info!(
            "Provider credentials configured: {}",
            !self.intellisign_client_id.is_empty() && !self.intellisign_client_secret.is_empty()
        );
        info!("Completion statuses: {:?}", self.completed_statuses);
        info!(
            "Default signer: {} <{}>",
            self.signer_name_default, self.signer_email_default
        );
        if let Some(url) = &self.public_base_url {
            info!("Public base URL: {}", url);
        }
    }
}
