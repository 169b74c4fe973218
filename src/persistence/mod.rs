// Association persistence collaborators

mod file;

pub use file::{read_document, write_document, FileStore};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// External key-value store holding the association table as JSON.
#[async_trait]
pub trait AssociationPersistence: Send + Sync {
    /// Stored document, or `None` if nothing was saved yet
    async fn get_associations(&self) -> Result<Option<String>>;

    async fn save_associations(&self, json: &str) -> Result<()>;
}

/// Process-local store; contents are lost with the process.
#[derive(Default)]
pub struct MemoryStore {
    document: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a document
    pub fn with_document(json: &str) -> Self {
        Self {
            document: Mutex::new(Some(json.to_string())),
        }
    }

    pub async fn document(&self) -> Option<String> {
        self.document.lock().await.clone()
    }
}

#[async_trait]
impl AssociationPersistence for MemoryStore {
    async fn get_associations(&self) -> Result<Option<String>> {
        Ok(self.document.lock().await.clone())
    }

    async fn save_associations(&self, json: &str) -> Result<()> {
        *self.document.lock().await = Some(json.to_string());
        Ok(())
    }
}
