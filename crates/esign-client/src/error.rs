//! Provider error type
//!
//! Every non-success HTTP status from the provider becomes
//! [`ProviderError::Status`], carrying the status code and raw body. No
//! attempt is made to interpret provider error payloads.

use std::fmt;

use thiserror::Error;

/// The provider call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AccessToken,
    CreateEnvelope,
    UploadDocument,
    AddRecipient,
    SendEnvelope,
    EnvelopeStatus,
    DownloadDocument,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::AccessToken => write!(f, "obtain access token"),
            Operation::CreateEnvelope => write!(f, "create envelope"),
            Operation::UploadDocument => write!(f, "upload document"),
            Operation::AddRecipient => write!(f, "add recipient"),
            Operation::SendEnvelope => write!(f, "send envelope"),
            Operation::EnvelopeStatus => write!(f, "fetch envelope status"),
            Operation::DownloadDocument => write!(f, "download document"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Failed to {operation} ({status}): {body}")]
    Status {
        operation: Operation,
        status: u16,
        body: String,
    },

    #[error("Failed to {operation}: unexpected response: {message}")]
    Contract { operation: Operation, message: String },

    #[error("Failed to {operation}: {source}")]
    Transport {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to {operation}: could not write file: {source}")]
    Io {
        operation: Operation,
        #[source]
        source: std::io::Error,
    },

    #[error("Client configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub(crate) fn transport(operation: Operation) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| ProviderError::Transport { operation, source }
    }

    pub(crate) fn io(operation: Operation) -> impl FnOnce(std::io::Error) -> Self {
        move |source| ProviderError::Io { operation, source }
    }

    pub(crate) fn contract(operation: Operation, message: impl Into<String>) -> Self {
        ProviderError::Contract {
            operation,
            message: message.into(),
        }
    }

    /// Which call failed, if the error came from a call
    pub fn operation(&self) -> Option<Operation> {
        match self {
            ProviderError::Status { operation, .. }
            | ProviderError::Contract { operation, .. }
            | ProviderError::Transport { operation, .. }
            | ProviderError::Io { operation, .. } => Some(*operation),
            ProviderError::Config(_) => None,
        }
    }

    /// HTTP status returned by the provider, for status errors
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
