//! In-memory provider for tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::ProviderContract;
use crate::error::{Operation, ProviderError};
use crate::traits::SigningProvider;
use crate::types::{AccessToken, EnvelopeDocument, EnvelopeStatus, NewEnvelope, Recipient};

/// Scriptable [`SigningProvider`].
///
/// Envelopes get sequential ids (`env-1`, `env-2`, ...). A single operation
/// can be made to fail with a status error, and the envelope status reported
/// by `envelope_status` can be changed at any time.
pub struct MockProvider {
    contract: ProviderContract,
    next_envelope: AtomicU32,
    fail_on: Mutex<Option<(Operation, u16)>>,
    envelope_status: Mutex<String>,
    signed_document: Vec<u8>,
    calls: Mutex<Vec<Operation>>,
    recipients: Mutex<HashMap<String, Vec<Recipient>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            contract: ProviderContract::default(),
            next_envelope: AtomicU32::new(1),
            fail_on: Mutex::new(None),
            envelope_status: Mutex::new("sent".to_string()),
            signed_document: b"%PDF-1.7 signed by mock provider".to_vec(),
            calls: Mutex::new(Vec::new()),
            recipients: Mutex::new(HashMap::new()),
        }
    }

    /// Bytes returned by `download_completed_document`.
    pub fn with_signed_document(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.signed_document = bytes.into();
        self
    }

    pub fn with_contract(mut self, contract: ProviderContract) -> Self {
        self.contract = contract;
        self
    }

    /// Make `operation` fail with the given HTTP status.
    pub fn fail_on(&self, operation: Operation, status: u16) {
        *lock(&self.fail_on) = Some((operation, status));
    }

    /// Stop failing.
    pub fn recover(&self) {
        *lock(&self.fail_on) = None;
    }

    /// Status string reported for every envelope.
    pub fn set_envelope_status(&self, status: impl Into<String>) {
        *lock(&self.envelope_status) = status.into();
    }

    pub fn signed_document(&self) -> &[u8] {
        &self.signed_document
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Operation> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        lock(&self.calls).iter().filter(|op| **op == operation).count()
    }

    /// Recipients added to an envelope.
    pub fn recipients(&self, envelope_id: &str) -> Vec<Recipient> {
        lock(&self.recipients)
            .get(envelope_id)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, operation: Operation) -> Result<(), ProviderError> {
        lock(&self.calls).push(operation);
        match *lock(&self.fail_on) {
            Some((failing, status)) if failing == operation => Err(ProviderError::Status {
                operation,
                status,
                body: format!("mock failure in {}", operation),
            }),
            _ => Ok(()),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl SigningProvider for MockProvider {
    async fn access_token(&self) -> Result<AccessToken, ProviderError> {
        self.record(Operation::AccessToken)?;
        Ok(AccessToken::new("mock-token"))
    }

    async fn create_envelope(
        &self,
        _token: &AccessToken,
        _envelope: &NewEnvelope,
    ) -> Result<String, ProviderError> {
        self.record(Operation::CreateEnvelope)?;
        let n = self.next_envelope.fetch_add(1, Ordering::SeqCst);
        Ok(format!("env-{}", n))
    }

    async fn upload_document(
        &self,
        _token: &AccessToken,
        envelope_id: &str,
        _filename: &str,
        _pdf: Vec<u8>,
    ) -> Result<String, ProviderError> {
        self.record(Operation::UploadDocument)?;
        Ok(format!("{}-doc", envelope_id))
    }

    async fn add_recipient(
        &self,
        _token: &AccessToken,
        envelope_id: &str,
        recipient: &Recipient,
    ) -> Result<(), ProviderError> {
        self.record(Operation::AddRecipient)?;
        lock(&self.recipients)
            .entry(envelope_id.to_string())
            .or_default()
            .push(recipient.clone());
        Ok(())
    }

    async fn send_envelope(
        &self,
        _token: &AccessToken,
        _envelope_id: &str,
    ) -> Result<(), ProviderError> {
        self.record(Operation::SendEnvelope)
    }

    async fn envelope_status(
        &self,
        _token: &AccessToken,
        envelope_id: &str,
    ) -> Result<EnvelopeStatus, ProviderError> {
        self.record(Operation::EnvelopeStatus)?;
        let status = lock(&self.envelope_status).clone();
        Ok(EnvelopeStatus {
            status: status.to_lowercase(),
            documents: vec![EnvelopeDocument {
                id: Some(format!("{}-doc", envelope_id)),
                download_link: None,
            }],
        })
    }

    async fn download_completed_document(
        &self,
        _token: &AccessToken,
        _envelope_id: &str,
        destination: &Path,
    ) -> Result<u64, ProviderError> {
        let op = Operation::DownloadDocument;
        self.record(op)?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ProviderError::io(op))?;
        }
        tokio::fs::write(destination, &self.signed_document)
            .await
            .map_err(ProviderError::io(op))?;
        Ok(self.signed_document.len() as u64)
    }

    fn contract(&self) -> &ProviderContract {
        &self.contract
    }
}
