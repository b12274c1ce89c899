use crate::domain::errors::DomainResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Uploaded prescription image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionFile {
    /// Client-supplied file name
    pub file_name: String,

    pub content_type: Option<String>,

    pub contents: Vec<u8>,
}

impl PrescriptionFile {
    /// Empty uploads are skipped
    pub fn is_valid(&self) -> bool {
        !self.contents.is_empty()
    }
}

/// Prescription upload collaborator port
#[async_trait]
pub trait PrescriptionStoragePort: Send + Sync {
    /// Persist a file for an order and return its stored path
    async fn store(&self, order_id: i64, file: &PrescriptionFile) -> DomainResult<String>;

    /// Remove a previously stored file
    async fn discard(&self, file_path: &str) -> DomainResult<()>;
}
