//! Consent orchestration
//!
//! `send` stores the document locally and drives the provider through
//! token, envelope, upload, recipient and send. `poll` refreshes a record
//! from the provider and pulls the signed PDF once the envelope completes.

use std::sync::Arc;

use chrono::Utc;
use consent_pdf::TextLayout;
use esign_client::{NewEnvelope, ProviderError, Recipient, SigningProvider};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{ConsentRecord, ConsentStatus, ConsentSubmission, DocumentSource, PollOutcome};
use crate::repository::ConsentRepository;
use crate::storage::{DocumentStorage, SignedFile, StoredDocument};

/// Envelope wording and signer defaults
#[derive(Debug, Clone)]
pub struct EnvelopeSettings {
    pub subject_prefix: String,
    pub message: String,
    pub signer_name_default: String,
    pub signature_type: String,
    pub layout: TextLayout,
}

impl EnvelopeSettings {
    /// Envelope title and subject for a consent
    pub fn subject(&self, consent_id: &str) -> String {
        format!("{} - {}", self.subject_prefix, consent_id)
    }
}

impl Default for EnvelopeSettings {
    fn default() -> Self {
        Self {
            subject_prefix: "Consentimento".to_string(),
            message: "Por favor, assine o termo de consentimento enviado pelo sistema.".to_string(),
            signer_name_default: "User".to_string(),
            signature_type: "simple".to_string(),
            layout: TextLayout::default(),
        }
    }
}

/// A signed PDF ready to be streamed to the caller
#[derive(Debug)]
pub struct SignedDocument {
    pub filename: String,
    pub file: SignedFile,
}

pub struct ConsentService {
    provider: Option<Arc<dyn SigningProvider>>,
    repository: Arc<dyn ConsentRepository>,
    storage: DocumentStorage,
    settings: EnvelopeSettings,
}

impl ConsentService {
    /// `provider` is `None` when no credentials are configured. Sends are
    /// then refused and polls report local state only.
    pub fn new(
        provider: Option<Arc<dyn SigningProvider>>,
        repository: Arc<dyn ConsentRepository>,
        storage: DocumentStorage,
        settings: EnvelopeSettings,
    ) -> Self {
        Self {
            provider,
            repository,
            storage,
            settings,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Store the document and hand it to the provider for signature
    pub async fn send(&self, submission: ConsentSubmission) -> Result<ConsentRecord, ApiError> {
        let provider = self.provider.as_ref().ok_or(ApiError::NotConfigured)?;

        let document_id = Uuid::new_v4().to_string();
        info!(
            "Preparing document for consent {} (document {})",
            submission.consent_id, document_id
        );

        let stored = self.store_source(&document_id, submission.source).await?;
        let signer_name = submission
            .signer_name
            .unwrap_or_else(|| self.settings.signer_name_default.clone());

        let envelope_id = self
            .dispatch(
                provider.as_ref(),
                &submission.consent_id,
                &signer_name,
                &submission.email,
                &stored,
            )
            .await?;

        let record = ConsentRecord {
            signed_file_path: self.storage.signed_path(&document_id),
            document_id,
            consent_id: submission.consent_id,
            email: submission.email,
            signer_name,
            envelope_id,
            status: ConsentStatus::Sent,
            signed_at: None,
            download_available: false,
            original_file_path: stored.path,
            created_at: Utc::now(),
        };
        self.repository.put(record.clone()).await?;

        info!(
            "Envelope {} sent for consent {} (document {})",
            record.envelope_id, record.consent_id, record.document_id
        );
        Ok(record)
    }

    async fn store_source(
        &self,
        document_id: &str,
        source: DocumentSource,
    ) -> Result<StoredDocument, ApiError> {
        let stored = match source {
            DocumentSource::UploadedDocument { filename, bytes } => {
                self.storage
                    .save_original(document_id, &filename, bytes)
                    .await?
            }
            DocumentSource::GeneratedFromText { content } => {
                self.storage
                    .write_generated(document_id, &content, &self.settings.layout)
                    .await?
            }
        };
        debug!(
            "Stored original for {} at {} ({} bytes)",
            document_id,
            stored.path.display(),
            stored.bytes.len()
        );
        Ok(stored)
    }

    /// Provider sequence for a new envelope. Returns the envelope id.
    async fn dispatch(
        &self,
        provider: &dyn SigningProvider,
        consent_id: &str,
        signer_name: &str,
        email: &str,
        stored: &StoredDocument,
    ) -> Result<String, ApiError> {
        let token = provider.access_token().await.map_err(send_failed)?;
        debug!("Obtained provider token");

        let subject = self.settings.subject(consent_id);
        let envelope = NewEnvelope {
            title: subject.clone(),
            subject,
            message: self.settings.message.clone(),
        };
        let envelope_id = provider
            .create_envelope(&token, &envelope)
            .await
            .map_err(send_failed)?;
        debug!("Created envelope {}", envelope_id);

        let recipient = Recipient::signer(signer_name, email)
            .with_signature_type(&self.settings.signature_type);

        let remaining = async {
            let document = provider
                .upload_document(&token, &envelope_id, &stored.filename, stored.bytes.clone())
                .await?;
            debug!("Uploaded {} to envelope {} as {:?}", stored.filename, envelope_id, document);

            provider
                .add_recipient(&token, &envelope_id, &recipient)
                .await?;
            debug!("Added signer {} to envelope {}", email, envelope_id);

            provider.send_envelope(&token, &envelope_id).await
        };

        if let Err(e) = remaining.await {
            warn!(
                "Envelope {} left unsent on the provider after failure",
                envelope_id
            );
            return Err(send_failed(e));
        }
        Ok(envelope_id)
    }

    /// Refresh a record from the provider
    ///
    /// Provider failures never fail the poll: the last local state comes
    /// back as `StaleLocal` with the error attached.
    pub async fn poll(&self, document_id: &str) -> Result<PollOutcome, ApiError> {
        let record = self.find(document_id).await?;
        if record.is_completed() {
            return Ok(PollOutcome::local_final(record));
        }

        let Some(provider) = self.provider.as_ref() else {
            return Ok(PollOutcome::stale(
                record,
                ProviderError::Config("provider credentials are not configured".into()),
            ));
        };

        match self.refresh(provider.as_ref(), record.clone()).await {
            Ok(record) => Ok(PollOutcome::fresh(record)),
            Err(ApiError::Provider(e)) => {
                warn!(
                    "Could not query envelope {} for document {}: {}",
                    record.envelope_id, document_id, e
                );
                Ok(PollOutcome::stale(record, e))
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh(
        &self,
        provider: &dyn SigningProvider,
        mut record: ConsentRecord,
    ) -> Result<ConsentRecord, ApiError> {
        let token = provider.access_token().await?;
        let status = provider
            .envelope_status(&token, &record.envelope_id)
            .await?;
        debug!(
            "Envelope {} reports status {:?}",
            record.envelope_id, status.status
        );

        if !status.is_completed(provider.contract()) {
            return Ok(record);
        }

        let bytes = provider
            .download_completed_document(&token, &record.envelope_id, &record.signed_file_path)
            .await?;

        if record.mark_completed(Utc::now()) {
            self.repository.update(record.clone()).await?;
            info!(
                "Consent {} completed: envelope {} signed, {} bytes saved",
                record.consent_id, record.envelope_id, bytes
            );
        }
        Ok(record)
    }

    /// The signed PDF of a completed consent
    pub async fn signed_document(&self, document_id: &str) -> Result<SignedDocument, ApiError> {
        let record = self.find(document_id).await?;
        if !record.is_completed() {
            return Err(ApiError::NotSigned);
        }

        let file = self
            .storage
            .open_signed(document_id)
            .await?
            .ok_or(ApiError::SignedFileMissing)?;

        Ok(SignedDocument {
            filename: record.download_filename(),
            file,
        })
    }

    async fn find(&self, document_id: &str) -> Result<ConsentRecord, ApiError> {
        self.repository
            .get(document_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(document_id.to_string()))
    }
}

fn send_failed(e: ProviderError) -> ApiError {
    error!("Sending envelope to provider failed: {}", e);
    ApiError::Provider(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PollSource;
    use crate::repository::InMemoryConsentRepository;
    use esign_client::{MockProvider, Operation};
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    struct Fixture {
        _dir: TempDir,
        mock: Arc<MockProvider>,
        repository: Arc<InMemoryConsentRepository>,
        service: ConsentService,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockProvider::new());
        let repository = Arc::new(InMemoryConsentRepository::new());
        let service = ConsentService::new(
            Some(mock.clone() as Arc<dyn SigningProvider>),
            repository.clone(),
            DocumentStorage::new(dir.path()),
            EnvelopeSettings::default(),
        );
        Fixture {
            _dir: dir,
            mock,
            repository,
            service,
        }
    }

    fn text_submission() -> ConsentSubmission {
        ConsentSubmission {
            email: "ana@example.com".into(),
            consent_id: "c-42".into(),
            signer_name: None,
            source: DocumentSource::GeneratedFromText {
                content: "Autorizo o tratamento dos meus dados.".into(),
            },
        }
    }

    #[tokio::test]
    async fn test_send_runs_provider_sequence() {
        let f = fixture();
        let record = f.service.send(text_submission()).await.unwrap();

        assert_eq!(record.status, ConsentStatus::Sent);
        assert_eq!(record.envelope_id, "env-1");
        assert_eq!(record.signer_name, "User");
        assert!(!record.download_available);
        assert!(record.original_file_path.exists());
        assert_eq!(
            f.mock.calls(),
            vec![
                Operation::AccessToken,
                Operation::CreateEnvelope,
                Operation::UploadDocument,
                Operation::AddRecipient,
                Operation::SendEnvelope,
            ]
        );

        let recipients = f.mock.recipients("env-1");
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].email, "ana@example.com");
        assert_eq!(recipients[0].signature_type, "simple");
        assert_eq!(f.repository.len().await, 1);
    }

    #[tokio::test]
    async fn test_send_uses_submitted_signer_name() {
        let f = fixture();
        let submission = ConsentSubmission {
            signer_name: Some("Ana Souza".into()),
            ..text_submission()
        };
        let record = f.service.send(submission).await.unwrap();
        assert_eq!(record.signer_name, "Ana Souza");
        assert_eq!(f.mock.recipients("env-1")[0].name, "Ana Souza");
    }

    #[tokio::test]
    async fn test_send_failure_stores_nothing() {
        for op in [
            Operation::AccessToken,
            Operation::CreateEnvelope,
            Operation::UploadDocument,
            Operation::AddRecipient,
            Operation::SendEnvelope,
        ] {
            let f = fixture();
            f.mock.fail_on(op, 500);

            let err = f.service.send(text_submission()).await.unwrap_err();
            assert!(
                matches!(&err, ApiError::Provider(e) if e.operation() == Some(op)),
                "unexpected error for {}: {:?}",
                op,
                err
            );
            assert_eq!(f.repository.len().await, 0);
        }
    }

    #[tokio::test]
    async fn test_send_without_provider() {
        let dir = TempDir::new().unwrap();
        let service = ConsentService::new(
            None,
            Arc::new(InMemoryConsentRepository::new()),
            DocumentStorage::new(dir.path()),
            EnvelopeSettings::default(),
        );
        assert!(!service.is_configured());
        let err = service.send(text_submission()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotConfigured));
    }

    #[tokio::test]
    async fn test_poll_until_completed() {
        let f = fixture();
        let record = f.service.send(text_submission()).await.unwrap();

        let outcome = f.service.poll(&record.document_id).await.unwrap();
        assert_eq!(outcome.source, PollSource::Provider);
        assert_eq!(outcome.record.status, ConsentStatus::Sent);

        f.mock.set_envelope_status("Completed");
        let outcome = f.service.poll(&record.document_id).await.unwrap();
        assert_eq!(outcome.source, PollSource::Provider);
        assert!(outcome.record.is_completed());
        assert!(outcome.record.signed_at.is_some());
        assert!(record.signed_file_path.exists());

        let outcome = f.service.poll(&record.document_id).await.unwrap();
        assert_eq!(outcome.source, PollSource::LocalFinal);
        assert_eq!(f.mock.call_count(Operation::DownloadDocument), 1);
        assert_eq!(f.mock.call_count(Operation::EnvelopeStatus), 2);
    }

    #[tokio::test]
    async fn test_poll_failure_is_stale() {
        let f = fixture();
        let record = f.service.send(text_submission()).await.unwrap();
        f.mock.fail_on(Operation::EnvelopeStatus, 503);

        let outcome = f.service.poll(&record.document_id).await.unwrap();
        assert_eq!(outcome.source, PollSource::StaleLocal);
        assert_eq!(outcome.record.status, ConsentStatus::Sent);
        assert_eq!(outcome.error.and_then(|e| e.status()), Some(503));
    }

    #[tokio::test]
    async fn test_failed_download_leaves_record_sent() {
        let f = fixture();
        let record = f.service.send(text_submission()).await.unwrap();
        f.mock.set_envelope_status("signed");
        f.mock.fail_on(Operation::DownloadDocument, 404);

        let outcome = f.service.poll(&record.document_id).await.unwrap();
        assert_eq!(outcome.source, PollSource::StaleLocal);
        let stored = f.repository.get(&record.document_id).await.unwrap().unwrap();
        assert!(!stored.is_completed());

        f.mock.recover();
        let outcome = f.service.poll(&record.document_id).await.unwrap();
        assert!(outcome.record.is_completed());
    }

    #[tokio::test]
    async fn test_poll_unknown_document() {
        let f = fixture();
        let err = f.service.poll("missing").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_signed_document() {
        let f = fixture();
        let record = f.service.send(text_submission()).await.unwrap();

        let err = f
            .service
            .signed_document(&record.document_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotSigned));

        f.mock.set_envelope_status("finished");
        f.service.poll(&record.document_id).await.unwrap();

        let mut signed = f.service.signed_document(&record.document_id).await.unwrap();
        assert_eq!(signed.filename, "consent_c-42.pdf");
        assert_eq!(signed.file.len, f.mock.signed_document().len() as u64);
        let mut bytes = Vec::new();
        signed.file.file.read_to_end(&mut bytes).await.unwrap();
        assert_eq!(bytes, f.mock.signed_document());
        drop(signed);

        std::fs::remove_file(&record.signed_file_path).unwrap();
        let err = f
            .service
            .signed_document(&record.document_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::SignedFileMissing));
    }

    #[test]
    fn test_subject() {
        let settings = EnvelopeSettings::default();
        assert_eq!(settings.subject("c-1"), "Consentimento - c-1");
    }
}
