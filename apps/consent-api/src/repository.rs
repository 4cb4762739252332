//! Consent record storage

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::ConsentRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No consent record for document {0}")]
    NotFound(String),
}

/// Keyed store of consent records
///
/// Keys are server-generated document ids. A record is only written once the
/// provider has accepted the envelope.
#[async_trait]
pub trait ConsentRepository: Send + Sync {
    async fn get(&self, document_id: &str) -> Result<Option<ConsentRecord>, StoreError>;

    /// Insert or replace a record
    async fn put(&self, record: ConsentRecord) -> Result<(), StoreError>;

    /// Replace an existing record. Fails if the id is unknown.
    async fn update(&self, record: ConsentRecord) -> Result<(), StoreError>;
}

/// Process-local repository. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryConsentRepository {
    records: RwLock<HashMap<String, ConsentRecord>>,
}

impl InMemoryConsentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl ConsentRepository for InMemoryConsentRepository {
    async fn get(&self, document_id: &str) -> Result<Option<ConsentRecord>, StoreError> {
        Ok(self.records.read().await.get(document_id).cloned())
    }

    async fn put(&self, record: ConsentRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.document_id.clone(), record);
        Ok(())
    }

    async fn update(&self, record: ConsentRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.document_id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(StoreError::NotFound(record.document_id)),
        }
    }
}
