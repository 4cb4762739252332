//! Request and response types for the envelope API

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::config::ProviderContract;

/// OAuth2 bearer token. Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Envelope to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewEnvelope {
    pub title: String,
    pub subject: String,
    pub message: String,
}

/// A signer to add to an envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub email: String,
    /// Provider signature level, e.g. "simple"
    pub signature_type: String,
    pub routing_order: Option<u32>,
}

impl Recipient {
    pub fn signer(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            signature_type: "simple".to_string(),
            routing_order: None,
        }
    }

    pub fn with_signature_type(mut self, signature_type: impl Into<String>) -> Self {
        self.signature_type = signature_type.into();
        self
    }

    pub fn with_routing_order(mut self, order: u32) -> Self {
        self.routing_order = Some(order);
        self
    }
}

/// Recipients request body
#[derive(Debug, Serialize)]
pub(crate) struct RecipientPayload<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub signature_type: &'a str,
    pub addressees: Vec<Addressee<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_order: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Addressee<'a> {
    pub via: &'a str,
    pub value: &'a str,
    pub name: &'a str,
}

impl<'a> From<&'a Recipient> for RecipientPayload<'a> {
    fn from(recipient: &'a Recipient) -> Self {
        Self {
            kind: "signer",
            signature_type: &recipient.signature_type,
            addressees: vec![Addressee {
                via: "email",
                value: &recipient.email,
                name: &recipient.name,
            }],
            routing_order: recipient.routing_order,
        }
    }
}

/// Token request body
#[derive(Debug, Serialize)]
pub(crate) struct TokenRequest<'a> {
    pub grant_type: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub scope: &'a str,
}

/// A document attached to an envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeDocument {
    pub id: Option<String>,
    pub download_link: Option<String>,
}

/// Envelope state as reported by the provider
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeStatus {
    /// Lowercased status value, empty when the provider sent none
    pub status: String,
    pub documents: Vec<EnvelopeDocument>,
}

impl EnvelopeStatus {
    /// Interpret an envelope response using the configured field names
    pub fn from_json(raw: &Value, contract: &ProviderContract) -> Self {
        let status = raw
            .get(&contract.status_field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        let documents = raw
            .get(&contract.documents_field)
            .and_then(Value::as_array)
            .map(|docs| {
                docs.iter()
                    .map(|doc| EnvelopeDocument {
                        id: string_field(doc, &contract.document_id_field),
                        download_link: doc
                            .pointer(&contract.download_link_pointer)
                            .and_then(Value::as_str)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { status, documents }
    }

    pub fn is_completed(&self, contract: &ProviderContract) -> bool {
        contract.is_completed(&self.status)
    }
}

/// Read a non-empty id field. Numeric ids are accepted and stringified.
pub(crate) fn string_field(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
