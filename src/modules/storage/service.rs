use std::path::Path;
use uuid::Uuid;

use crate::api::error;
use crate::modules::storage::model::{StorageConfig, StoredObject, UploadedFile};

/// Bucket namespace for message attachments. One directory per message id,
/// generated file names inside it.
const ATTACHMENT_NAMESPACE: &str = "message-attachments";

#[derive(Clone)]
pub struct AttachmentStorage {
    config: StorageConfig,
}

impl AttachmentStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(StorageConfig::from_env())
    }

    /// Checks size and MIME type and resolves the effective MIME type
    /// (declared, guessed from the name, or octet-stream). Callers validate
    /// every file before storing any of them.
    pub fn validate(&self, file: &UploadedFile) -> Result<String, error::SystemError> {
        if file.bytes.is_empty() {
            return Err(error::SystemError::bad_request(format!(
                "File '{}' is empty",
                file.file_name
            )));
        }

        if file.bytes.len() > self.config.max_file_size {
            return Err(error::SystemError::bad_request(format!(
                "File size exceeds maximum allowed size of {} bytes",
                self.config.max_file_size
            )));
        }

        let mime_type = match &file.mime_type {
            Some(m) => m.clone(),
            None => mime_guess::from_path(&file.file_name).first_or_octet_stream().to_string(),
        };

        if !self.config.allowed_mime_types.contains(&mime_type) {
            return Err(error::SystemError::bad_request(format!(
                "File type '{}' is not allowed",
                mime_type
            )));
        }

        Ok(mime_type)
    }

    fn generate_filename(&self, original_filename: &str) -> String {
        let extension =
            Path::new(original_filename).extension().and_then(|ext| ext.to_str()).unwrap_or("");
        let uuid = Uuid::now_v7();
        if extension.is_empty() {
            uuid.to_string()
        } else {
            format!("{}.{}", uuid, extension)
        }
    }

    /// Writes one file under `message-attachments/{message_id}/` and returns
    /// the canonical storage path together with the derived public URL.
    pub async fn store(
        &self,
        message_id: &Uuid,
        file: &UploadedFile,
    ) -> Result<StoredObject, error::SystemError> {
        let mime_type = self.validate(file)?;

        let generated_name = self.generate_filename(&file.file_name);
        let dir = format!("{}/{}/{}", self.config.root_dir, ATTACHMENT_NAMESPACE, message_id);

        tokio::fs::create_dir_all(&dir).await?;

        let storage_path = format!("{}/{}", dir, generated_name);
        tokio::fs::write(&storage_path, &file.bytes).await?;

        let url = format!(
            "{}/{}/{}/{}",
            self.config.base_url, ATTACHMENT_NAMESPACE, message_id, generated_name
        );

        Ok(StoredObject {
            file_name: file.file_name.clone(),
            generated_name,
            mime_type,
            byte_size: file.bytes.len() as i64,
            storage_path,
            url,
        })
    }

    /// Best-effort compensating cleanup when the database insert rolls back.
    pub async fn remove(&self, storage_path: &str) {
        if tokio::fs::remove_file(storage_path).await.is_err() {
            log::warn!("Could not remove stored attachment at {}", storage_path);
        }
    }
}
