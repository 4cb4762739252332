//! Intellisign e-signature API client
//!
//! Thin typed wrapper over the provider's REST API:
//! - OAuth2 client-credentials token (`/oauth/token`)
//! - Envelope creation, document upload, recipients, send (`/v1/envelopes/...`)
//! - Envelope status and signed document download
//!
//! Orchestration code depends on the [`SigningProvider`] trait;
//! [`EsignClient`] is the HTTP implementation. With the `mock` feature,
//! [`MockProvider`] is available for tests.

pub mod client;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod traits;
pub mod types;

pub use client::EsignClient;
pub use config::{EsignConfig, ProviderContract, DEFAULT_BASE_URL};
pub use error::{Operation, ProviderError};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockProvider;
pub use traits::SigningProvider;
pub use types::{AccessToken, EnvelopeDocument, EnvelopeStatus, NewEnvelope, Recipient};
