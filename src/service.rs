use crate::config::Config;
use crate::uploads::{
    extract_file, FileStorage, FileStore, FileSummary, StoreError, StoredFile, UploadStore,
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("request is not multipart/form-data with a boundary parameter")]
    MissingBoundary,
    #[error("no file part found in multipart body")]
    NoFilePart,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What an upload produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub has_extraction: bool,
}

impl From<FileSummary> for UploadReceipt {
    fn from(summary: FileSummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            size: summary.size,
            has_extraction: summary.has_extraction,
        }
    }
}

/// Composition root: multipart extraction, then the store.
#[derive(Clone)]
pub struct UploadService {
    store: Arc<dyn FileStore>,
}

impl UploadService {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self { store }
    }

    /// Build the service over a local-disk store described by `config`.
    pub fn from_config(config: &Config) -> Self {
        let storage = FileStorage::new(&config.storage.dir);
        let store = UploadStore::new(storage, config.extraction.markup_extensions.clone());
        Self::new(Arc::new(store))
    }

    /// Upload from a raw `multipart/form-data` body and its `Content-Type` header.
    pub async fn upload_multipart(
        &self,
        body: &[u8],
        content_type: &str,
    ) -> Result<UploadReceipt, UploadError> {
        let boundary = boundary_from_content_type(content_type).ok_or(UploadError::MissingBoundary)?;
        let file = extract_file(body, &boundary).ok_or(UploadError::NoFilePart)?;
        debug!(filename = %file.filename, field = ?file.field_name, "multipart file part extracted");
        self.upload(&file.content, Some(&file.filename)).await
    }

    /// Upload raw bytes under an optional name.
    pub async fn upload(
        &self,
        content: &[u8],
        name: Option<&str>,
    ) -> Result<UploadReceipt, UploadError> {
        Ok(self.store.ingest(content, name).await?.into())
    }

    pub async fn read(&self, id: &str) -> Result<Option<StoredFile>, UploadError> {
        Ok(self.store.read(id).await?)
    }

    pub fn list(&self) -> Vec<FileSummary> {
        self.store.list()
    }

    pub async fn delete(&self, id: &str) -> Result<bool, UploadError> {
        Ok(self.store.delete(id).await?)
    }
}

/// Pull the `boundary` parameter out of a `multipart/*` Content-Type value.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    let mut params = content_type.split(';');
    let mime = params.next()?.trim();
    if !mime.to_ascii_lowercase().starts_with("multipart/") {
        return None;
    }
    params.find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        (!value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_is_parsed_from_content_type() {
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=----WebKitFormBoundary7MA4"),
            Some("----WebKitFormBoundary7MA4".to_string())
        );
        assert_eq!(
            boundary_from_content_type("Multipart/Form-Data; charset=utf-8; BOUNDARY=\"a b\""),
            Some("a b".to_string())
        );
    }

    #[test]
    fn non_multipart_or_empty_boundary_is_rejected() {
        assert_eq!(boundary_from_content_type("text/html; boundary=x"), None);
        assert_eq!(boundary_from_content_type("multipart/form-data"), None);
        assert_eq!(boundary_from_content_type("multipart/form-data; boundary="), None);
    }
}
