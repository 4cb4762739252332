//! The `SigningProvider` trait - the seam between orchestration and the
//! e-signature provider.

use std::path::Path;

use async_trait::async_trait;

use crate::config::ProviderContract;
use crate::error::ProviderError;
use crate::types::{AccessToken, EnvelopeStatus, NewEnvelope, Recipient};

/// Envelope operations of an e-signature provider.
///
/// Calls are independent: callers obtain a token first and pass it to each
/// subsequent call. Implementations do not retry.
#[async_trait]
pub trait SigningProvider: Send + Sync {
    /// Obtain a bearer token (OAuth2 client credentials).
    async fn access_token(&self) -> Result<AccessToken, ProviderError>;

    /// Create an empty envelope and return its id.
    async fn create_envelope(
        &self,
        token: &AccessToken,
        envelope: &NewEnvelope,
    ) -> Result<String, ProviderError>;

    /// Attach a PDF to the envelope. Returns the document id, which may be
    /// empty if the provider does not report one.
    async fn upload_document(
        &self,
        token: &AccessToken,
        envelope_id: &str,
        filename: &str,
        pdf: Vec<u8>,
    ) -> Result<String, ProviderError>;

    /// Add a signer.
    async fn add_recipient(
        &self,
        token: &AccessToken,
        envelope_id: &str,
        recipient: &Recipient,
    ) -> Result<(), ProviderError>;

    /// Dispatch the envelope to its recipients.
    async fn send_envelope(&self, token: &AccessToken, envelope_id: &str)
        -> Result<(), ProviderError>;

    /// Current envelope state.
    async fn envelope_status(
        &self,
        token: &AccessToken,
        envelope_id: &str,
    ) -> Result<EnvelopeStatus, ProviderError>;

    /// Download the envelope's final document to `destination`.
    ///
    /// Returns the number of bytes written.
    async fn download_completed_document(
        &self,
        token: &AccessToken,
        envelope_id: &str,
        destination: &Path,
    ) -> Result<u64, ProviderError>;

    /// Field names and status values this provider uses.
    fn contract(&self) -> &ProviderContract;
}
