use crate::domain::errors::DomainResult;
use crate::ports::{PrescriptionFile, PrescriptionStoragePort};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Stores prescription files under `<root>/<order_id>/`
#[derive(Debug, Clone)]
pub struct LocalPrescriptionStorage {
    root: PathBuf,
}

impl LocalPrescriptionStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Lowercased alphanumeric extension of the client file name, if any
    fn extension(file_name: &str) -> Option<String> {
        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase())
    }
}

#[async_trait]
impl PrescriptionStoragePort for LocalPrescriptionStorage {
    async fn store(&self, order_id: i64, file: &PrescriptionFile) -> DomainResult<String> {
        let dir = self.root.join(order_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;

        // Client names are never used as paths
        let mut name = format!("prescription_{}", uuid::Uuid::new_v4().simple());
        if let Some(ext) = Self::extension(&file.file_name) {
            name.push('.');
            name.push_str(&ext);
        }

        let path = dir.join(name);
        tokio::fs::write(&path, &file.contents).await?;
        debug!(
            order_id,
            path = %path.display(),
            bytes = file.contents.len(),
            "Prescription stored"
        );

        Ok(path.to_string_lossy().into_owned())
    }

    async fn discard(&self, file_path: &str) -> DomainResult<()> {
        match tokio::fs::remove_file(file_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(file_path, "Prescription file already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
