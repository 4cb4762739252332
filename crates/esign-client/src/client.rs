//! reqwest implementation of [`SigningProvider`]

use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;
use reqwest::{header, multipart, Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::{EsignConfig, ProviderContract};
use crate::error::{Operation, ProviderError};
use crate::traits::SigningProvider;
use crate::types::{
    string_field, AccessToken, EnvelopeStatus, NewEnvelope, Recipient, RecipientPayload,
    TokenRequest,
};

/// HTTP client for the Intellisign envelope API.
pub struct EsignClient {
    client: Client,
    config: EsignConfig,
}

impl EsignClient {
    pub fn new(config: EsignConfig) -> Result<Self, ProviderError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn envelope_url(&self, envelope_id: &str, suffix: &str) -> String {
        self.url(&format!("/v1/envelopes/{}{}", envelope_id, suffix))
    }

    async fn execute(
        &self,
        operation: Operation,
        request: RequestBuilder,
        accepted: &[StatusCode],
    ) -> Result<Response, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(ProviderError::transport(operation))?;

        let status = response.status();
        if accepted.contains(&status) {
            debug!("{} -> {}", operation, status);
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Status {
            operation,
            status: status.as_u16(),
            body,
        })
    }

    async fn execute_json(
        &self,
        operation: Operation,
        request: RequestBuilder,
        accepted: &[StatusCode],
    ) -> Result<Value, ProviderError> {
        self.execute(operation, request, accepted)
            .await?
            .json::<Value>()
            .await
            .map_err(ProviderError::transport(operation))
    }
}

const OK: &[StatusCode] = &[StatusCode::OK];
const CREATED: &[StatusCode] = &[StatusCode::OK, StatusCode::CREATED];
const SENT: &[StatusCode] = &[
    StatusCode::OK,
    StatusCode::CREATED,
    StatusCode::ACCEPTED,
    StatusCode::NO_CONTENT,
];

#[async_trait]
impl SigningProvider for EsignClient {
    async fn access_token(&self) -> Result<AccessToken, ProviderError> {
        let op = Operation::AccessToken;
        let body = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
            scope: &self.config.scope,
        };

        let json = self
            .execute_json(op, self.client.post(self.url("/oauth/token")).json(&body), OK)
            .await?;

        json.get("access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(AccessToken::new)
            .ok_or_else(|| ProviderError::contract(op, "no access_token in token response"))
    }

    async fn create_envelope(
        &self,
        token: &AccessToken,
        envelope: &NewEnvelope,
    ) -> Result<String, ProviderError> {
        let op = Operation::CreateEnvelope;
        let request = self
            .client
            .post(self.url("/v1/envelopes"))
            .bearer_auth(token.secret())
            .json(envelope);

        let json = self.execute_json(op, request, CREATED).await?;

        self.config
            .contract
            .envelope_id_fields
            .iter()
            .find_map(|field| string_field(&json, field))
            .ok_or_else(|| ProviderError::contract(op, "envelope response has no id"))
    }

    async fn upload_document(
        &self,
        token: &AccessToken,
        envelope_id: &str,
        filename: &str,
        pdf: Vec<u8>,
    ) -> Result<String, ProviderError> {
        let op = Operation::UploadDocument;
        let part = multipart::Part::bytes(pdf)
            .file_name(filename.to_string())
            .mime_str("application/pdf")
            .map_err(ProviderError::transport(op))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("name", filename.to_string())
            .text("stage", "original");

        let request = self
            .client
            .post(self.envelope_url(envelope_id, "/documents"))
            .bearer_auth(token.secret())
            .multipart(form);

        let json = self.execute_json(op, request, CREATED).await?;
        Ok(string_field(&json, &self.config.contract.document_id_field).unwrap_or_default())
    }

    async fn add_recipient(
        &self,
        token: &AccessToken,
        envelope_id: &str,
        recipient: &Recipient,
    ) -> Result<(), ProviderError> {
        let request = self
            .client
            .post(self.envelope_url(envelope_id, "/recipients"))
            .bearer_auth(token.secret())
            .json(&RecipientPayload::from(recipient));

        self.execute(Operation::AddRecipient, request, CREATED)
            .await
            .map(drop)
    }

    async fn send_envelope(
        &self,
        token: &AccessToken,
        envelope_id: &str,
    ) -> Result<(), ProviderError> {
        let request = self
            .client
            .post(self.envelope_url(envelope_id, "/send"))
            .bearer_auth(token.secret());

        self.execute(Operation::SendEnvelope, request, SENT)
            .await
            .map(drop)
    }

    async fn envelope_status(
        &self,
        token: &AccessToken,
        envelope_id: &str,
    ) -> Result<EnvelopeStatus, ProviderError> {
        let request = self
            .client
            .get(self.envelope_url(envelope_id, ""))
            .bearer_auth(token.secret());

        let json = self
            .execute_json(Operation::EnvelopeStatus, request, OK)
            .await?;
        Ok(EnvelopeStatus::from_json(&json, &self.config.contract))
    }

    async fn download_completed_document(
        &self,
        token: &AccessToken,
        envelope_id: &str,
        destination: &Path,
    ) -> Result<u64, ProviderError> {
        let op = Operation::DownloadDocument;
        let details = self.envelope_status(token, envelope_id).await?;

        let document = details
            .documents
            .first()
            .ok_or_else(|| ProviderError::contract(op, "envelope has no documents"))?;

        let link = match (&document.download_link, &document.id) {
            (Some(link), _) => link.clone(),
            (None, Some(doc_id)) => {
                self.envelope_url(envelope_id, &format!("/documents/{}/download", doc_id))
            }
            (None, None) => {
                return Err(ProviderError::contract(
                    op,
                    "document has neither a download link nor an id",
                ))
            }
        };

        debug!("Downloading envelope {} from {}", envelope_id, link);
        let request = self.client.get(&link).bearer_auth(token.secret());
        let mut response = self.execute(op, request, OK).await?;

        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(ProviderError::io(op))?;

        // Each download streams into its own sibling temp file, which is
        // removed on drop unless persisted over the destination
        let (file, partial) = tempfile::Builder::new()
            .prefix(&partial_prefix(destination))
            .suffix(".part")
            .tempfile_in(parent)
            .map_err(ProviderError::io(op))?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(ProviderError::transport(op))?
        {
            file.write_all(&chunk).await.map_err(ProviderError::io(op))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(ProviderError::io(op))?;
        drop(file);

        partial
            .persist(destination)
            .map_err(|e| ProviderError::io(op)(e.error))?;

        Ok(written)
    }

    fn contract(&self) -> &ProviderContract {
        &self.config.contract
    }
}

fn partial_prefix(destination: &Path) -> OsString {
    let mut prefix = OsString::from(".");
    if let Some(name) = destination.file_name() {
        prefix.push(name);
    }
    prefix.push(".");
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> EsignClient {
        EsignClient::new(EsignConfig::new(server.uri(), "client-id", "client-secret")).unwrap()
    }

    fn token() -> AccessToken {
        AccessToken::new("tok-123")
    }

    #[tokio::test]
    async fn test_access_token_uses_client_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_json(json!({
                "grant_type": "client_credentials",
                "client_id": "client-id",
                "client_secret": "client-secret",
                "scope": "*"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok-123",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = client_for(&server).access_token().await.unwrap();
        assert_eq!(token.secret(), "tok-123");
    }

    #[tokio::test]
    async fn test_access_token_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let err = client_for(&server).access_token().await.unwrap_err();
        match err {
            ProviderError::Status {
                operation,
                status,
                body,
            } => {
                assert_eq!(operation, Operation::AccessToken);
                assert_eq!(status, 401);
                assert_eq!(body, "invalid_client");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_envelope_reads_fallback_id_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/envelopes"))
            .and(header("authorization", "Bearer tok-123"))
            .and(body_json(json!({
                "title": "Consent",
                "subject": "Consent",
                "message": "Please sign"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"envelope_id": "env-9"})))
            .mount(&server)
            .await;

        let envelope = NewEnvelope {
            title: "Consent".into(),
            subject: "Consent".into(),
            message: "Please sign".into(),
        };
        let id = client_for(&server)
            .create_envelope(&token(), &envelope)
            .await
            .unwrap();
        assert_eq!(id, "env-9");
    }

    #[tokio::test]
    async fn test_create_envelope_without_id_is_contract_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/envelopes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let envelope = NewEnvelope {
            title: "t".into(),
            subject: "s".into(),
            message: "m".into(),
        };
        let err = client_for(&server)
            .create_envelope(&token(), &envelope)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Contract { .. }));
    }

    #[tokio::test]
    async fn test_upload_document_sends_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/envelopes/env-1/documents"))
            .and(body_string_contains("name=\"file\"; filename=\"consent.pdf\""))
            .and(body_string_contains("original"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "doc-1"})))
            .mount(&server)
            .await;

        let doc_id = client_for(&server)
            .upload_document(&token(), "env-1", "consent.pdf", b"%PDF-1.7 test".to_vec())
            .await
            .unwrap();
        assert_eq!(doc_id, "doc-1");
    }

    #[tokio::test]
    async fn test_upload_document_tolerates_missing_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/envelopes/env-1/documents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let doc_id = client_for(&server)
            .upload_document(&token(), "env-1", "consent.pdf", b"%PDF-".to_vec())
            .await
            .unwrap();
        assert_eq!(doc_id, "");
    }

    #[tokio::test]
    async fn test_add_recipient_posts_signer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/envelopes/env-1/recipients"))
            .and(body_json(json!({
                "type": "signer",
                "signature_type": "simple",
                "addressees": [{"via": "email", "value": "ana@example.com", "name": "Ana"}]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "r-1"})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .add_recipient(&token(), "env-1", &Recipient::signer("Ana", "ana@example.com"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_envelope_accepts_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/envelopes/env-1/send"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .send_envelope(&token(), "env-1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_envelope_rejects_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/envelopes/env-1/send"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such envelope"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_envelope(&token(), "env-1")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.operation(), Some(Operation::SendEnvelope));
    }

    #[tokio::test]
    async fn test_envelope_status_is_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/envelopes/env-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "env-1",
                "status": "SENT",
                "documents": [{"id": "doc-1"}]
            })))
            .mount(&server)
            .await;

        let status = client_for(&server)
            .envelope_status(&token(), "env-1")
            .await
            .unwrap();
        assert_eq!(status.status, "sent");
        assert_eq!(status.documents.len(), 1);
    }

    #[tokio::test]
    async fn test_download_uses_constructed_url_without_link() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/envelopes/env-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "completed",
                "documents": [{"id": "doc-7"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/envelopes/env-1/documents/doc-7/download"))
            .and(header("authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-signed".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("signed").join("signed.pdf");

        let written = client_for(&server)
            .download_completed_document(&token(), "env-1", &destination)
            .await
            .unwrap();

        assert_eq!(written, 11);
        assert_eq!(std::fs::read(&destination).unwrap(), b"%PDF-signed");
        assert_eq!(leftover_files(destination.parent().unwrap()), vec!["signed.pdf"]);
    }

    #[tokio::test]
    async fn test_download_prefers_document_link() {
        let server = MockServer::start().await;
        let link = format!("{}/files/abc", server.uri());
        Mock::given(method("GET"))
            .and(path("/v1/envelopes/env-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "completed",
                "documents": [{"id": "doc-7", "links": {"download": link}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"linked".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("signed.pdf");
        client_for(&server)
            .download_completed_document(&token(), "env-1", &destination)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"linked");
    }

    #[tokio::test]
    async fn test_download_without_documents_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/envelopes/env-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "completed"})),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = client_for(&server)
            .download_completed_document(&token(), "env-1", &dir.path().join("x.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Contract {
                operation: Operation::DownloadDocument,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_download_failure_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/envelopes/env-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "completed",
                "documents": [{"id": "doc-7"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/envelopes/env-1/documents/doc-7/download"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("signed.pdf");
        let err = client_for(&server)
            .download_completed_document(&token(), "env-1", &destination)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(!destination.exists());
        assert!(leftover_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_downloads_all_succeed() {
        let server = MockServer::start().await;
        let body: Vec<u8> = b"%PDF-1.7\n"
            .iter()
            .copied()
            .chain(std::iter::repeat(b'x').take(2 * 1024 * 1024))
            .collect();
        Mock::given(method("GET"))
            .and(path("/v1/envelopes/env-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "completed",
                "documents": [{"id": "doc-7"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/envelopes/env-1/documents/doc-7/download"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(body.clone())
                    .set_delay(Duration::from_millis(50)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("signed").join("signed.pdf");
        let token = token();

        for _ in 0..5 {
            let (a, b, c, d) = tokio::join!(
                client.download_completed_document(&token, "env-1", &destination),
                client.download_completed_document(&token, "env-1", &destination),
                client.download_completed_document(&token, "env-1", &destination),
                client.download_completed_document(&token, "env-1", &destination),
            );
            for result in [a, b, c, d] {
                assert_eq!(result.unwrap(), body.len() as u64);
            }
            assert!(std::fs::read(&destination).unwrap() == body);
        }
        assert_eq!(leftover_files(destination.parent().unwrap()), vec!["signed.pdf"]);
    }

    #[test]
    fn test_partial_prefix() {
        assert_eq!(
            partial_prefix(Path::new("/tmp/a/signed.pdf")),
            OsString::from(".signed.pdf.")
        );
    }

    fn leftover_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
