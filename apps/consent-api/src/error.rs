//! Error types for the consent API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use esign_client::ProviderError;
use serde_json::json;
use thiserror::Error;

use crate::repository::StoreError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unsupported content type: {0}")]
    UnsupportedMediaType(String),

    #[error("Document is not signed yet")]
    NotSigned,

    #[error("Signed file is not available yet")]
    SignedFileMissing,

    #[error("E-signature provider is not configured")]
    NotConfigured,

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Repository error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(id) => {
                (StatusCode::NOT_FOUND, format!("Document not found: {}", id))
            }
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            ApiError::UnsupportedMediaType(msg) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg.clone())
            }
            ApiError::NotSigned => (
                StatusCode::BAD_REQUEST,
                "Document is not signed yet".to_string(),
            ),
            ApiError::SignedFileMissing => (
                StatusCode::NOT_FOUND,
                "Signed file is not available yet".to_string(),
            ),
            ApiError::NotConfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "E-signature provider is not configured".to_string(),
            ),
            ApiError::Provider(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            ApiError::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage error".to_string(),
                )
            }
            ApiError::Store(e) => {
                tracing::error!("Repository error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Repository error".to_string(),
                )
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
