//! Application state for the consent API

use std::sync::Arc;

use anyhow::Result;
use esign_client::{EsignClient, SigningProvider};

use crate::config::Config;
use crate::repository::InMemoryConsentRepository;
use crate::service::ConsentService;
use crate::storage::DocumentStorage;

pub struct AppState {
    pub service: ConsentService,
    /// Absolute base for download links; relative links when unset
    pub public_base_url: Option<String>,
}

impl AppState {
    pub fn new(service: ConsentService, public_base_url: Option<String>) -> Self {
        let public_base_url = public_base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        Self {
            service,
            public_base_url,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let esign = config.esign_config();
        let provider: Option<Arc<dyn SigningProvider>> = if esign.has_credentials() {
            Some(Arc::new(EsignClient::new(esign)?))
        } else {
            tracing::warn!("Intellisign credentials missing: sending consents is disabled");
            None
        };

        let storage = DocumentStorage::new(&config.upload_root);
        tracing::info!("Storing documents under {}", storage.root().display());

        let service = ConsentService::new(
            provider,
            Arc::new(InMemoryConsentRepository::new()),
            storage,
            config.envelope_settings(),
        );

        Ok(Self::new(service, config.public_base_url.clone()))
    }

    pub fn download_url(&self, document_id: &str) -> String {
        let path = format!("/api/consents/{}/download", document_id);
        match &self.public_base_url {
            Some(base) => format!("{}{}", base, path),
            None => path,
        }
    }
}
