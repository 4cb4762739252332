//! Client configuration and the provider response contract

use std::time::Duration;

/// Default provider API root
pub const DEFAULT_BASE_URL: &str = "https://api.intellisign.com";

/// Connection settings for [`crate::EsignClient`]
#[derive(Debug, Clone)]
pub struct EsignConfig {
    /// API root, without trailing slash
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// OAuth2 scope requested with the token
    pub scope: String,
    /// Overall per-request timeout
    pub timeout: Duration,
    pub contract: ProviderContract,
}

impl EsignConfig {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: "*".to_string(),
            timeout: Duration::from_secs(30),
            contract: ProviderContract::default(),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_contract(mut self, contract: ProviderContract) -> Self {
        self.contract = contract;
        self
    }

    /// Both client id and secret are set
    pub fn has_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// Field names and status values the provider uses in its JSON responses.
///
/// None of these are documented by the provider, so they are configuration
/// rather than constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderContract {
    /// Candidate fields holding the envelope id, tried in order
    pub envelope_id_fields: Vec<String>,
    /// Field holding a document id (upload response and envelope documents)
    pub document_id_field: String,
    /// Field holding the envelope status
    pub status_field: String,
    /// Field holding the envelope's document list
    pub documents_field: String,
    /// JSON pointer, relative to a document, of its download link
    pub download_link_pointer: String,
    /// Lowercase status values that mean the envelope is fully signed
    pub completed_statuses: Vec<String>,
}

impl Default for ProviderContract {
    fn default() -> Self {
        Self {
            envelope_id_fields: vec!["id".to_string(), "envelope_id".to_string()],
            document_id_field: "id".to_string(),
            status_field: "status".to_string(),
            documents_field: "documents".to_string(),
            download_link_pointer: "/links/download".to_string(),
            completed_statuses: vec![
                "completed".to_string(),
                "signed".to_string(),
                "finished".to_string(),
            ],
        }
    }
}

impl ProviderContract {
    /// Case-insensitive match against the completion statuses
    pub fn is_completed(&self, status: &str) -> bool {
        let status = status.trim().to_lowercase();
        !status.is_empty() && self.completed_statuses.iter().any(|s| *s == status)
    }

    /// Replace the completion statuses, normalising case and dropping blanks
    pub fn with_completed_statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.completed_statuses = normalize_list(statuses, true);
        self
    }

    pub fn with_envelope_id_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.envelope_id_fields = normalize_list(fields, false);
        self
    }

    pub fn with_status_field(mut self, field: impl Into<String>) -> Self {
        self.status_field = field.into();
        self
    }

    pub fn with_document_id_field(mut self, field: impl Into<String>) -> Self {
        self.document_id_field = field.into();
        self
    }

    pub fn with_documents_field(mut self, field: impl Into<String>) -> Self {
        self.documents_field = field.into();
        self
    }

    /// JSON pointer such as `/links/download`, resolved against each document
    pub fn with_download_link_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.download_link_pointer = pointer.into();
        self
    }
}

fn normalize_list<I, S>(items: I, lowercase: bool) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| {
            let s = s.as_ref().trim();
            if lowercase {
                s.to_lowercase()
            } else {
                s.to_string()
            }
        })
        .filter(|s| !s.is_empty())
        .collect()
}
