use crate::ENV;

/// Attachment storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root_dir: String,
    pub base_url: String,
    pub max_file_size: usize,
    pub allowed_mime_types: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: "./uploads".to_string(),
            base_url: "/uploads".to_string(),
            max_file_size: 10 * 1024 * 1024, // 10MB
            allowed_mime_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/gif".to_string(),
                "image/webp".to_string(),
                "application/pdf".to_string(),
                "text/plain".to_string(),
            ],
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self {
            root_dir: ENV.attachment_dir.clone(),
            base_url: ENV.attachment_base_url.clone(),
            max_file_size: ENV.max_attachment_bytes,
            ..Default::default()
        }
    }
}

/// File as it arrives from the multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Result of writing one object into the attachment bucket.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub file_name: String,
    pub generated_name: String,
    pub mime_type: String,
    pub byte_size: i64,
    pub storage_path: String,
    pub url: String,
}
