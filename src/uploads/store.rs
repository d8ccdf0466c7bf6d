use super::extract::{is_markup_name, ExtractionEngine};
use super::index::UploadIndex;
use super::schema::{Extraction, ExtractionError, FileSummary, StoredFile, UploadedFile};
use super::storage::FileStorage;
use async_trait::async_trait;
use chrono::Utc;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to persist upload to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read stored upload {id}: {source}")]
    Read {
        id: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove stored upload {}: {source}", path.display())]
    Removal {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The four upload operations. A missing id is a value (`None`/`false`);
/// only environment failures are errors.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Persist `content` and return the summary recorded for it.
    /// `original_name` defaults to `upload_<id>.html` when absent or empty.
    async fn ingest(
        &self,
        content: &[u8],
        original_name: Option<&str>,
    ) -> Result<FileSummary, StoreError>;

    /// Persist `content` and return its new id.
    async fn store(&self, content: &[u8], original_name: Option<&str>) -> Result<String, StoreError> {
        Ok(self.ingest(content, original_name).await?.id)
    }

    async fn read(&self, id: &str) -> Result<Option<StoredFile>, StoreError>;

    fn list(&self) -> Vec<FileSummary>;

    /// Remove bytes, metadata and extraction for `id`. `false` when unknown.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

/// Local-disk upload store with an in-memory index.
#[derive(Debug)]
pub struct UploadStore {
    storage: FileStorage,
    index: UploadIndex,
    engine: ExtractionEngine,
    markup_extensions: Vec<String>,
}

impl UploadStore {
    pub fn new(storage: FileStorage, markup_extensions: Vec<String>) -> Self {
        Self::with_engine(storage, markup_extensions, ExtractionEngine::default())
    }

    pub fn with_engine(
        storage: FileStorage,
        markup_extensions: Vec<String>,
        engine: ExtractionEngine,
    ) -> Self {
        Self {
            storage,
            index: UploadIndex::new(),
            engine,
            markup_extensions,
        }
    }

    /// Parsing is CPU-bound, so it runs on the blocking pool.
    async fn extract_blocking(&self, content: &[u8]) -> Extraction {
        let engine = self.engine.clone();
        let content = content.to_vec();
        tokio::task::spawn_blocking(move || engine.extract(&content))
            .await
            .unwrap_or_else(|err| {
                Extraction::Failed(ExtractionError {
                    message: format!("extraction task failed: {err}"),
                })
            })
    }
}

#[async_trait]
impl FileStore for UploadStore {
    async fn ingest(
        &self,
        content: &[u8],
        original_name: Option<&str>,
    ) -> Result<FileSummary, StoreError> {
        let id = self.index.reserve_id();
        let name = match original_name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("upload_{id}.html"),
        };
        let path = self.storage.path_for(&id, &name);

        self.storage
            .write(&path, content)
            .await
            .map_err(|source| StoreError::Persistence {
                path: path.clone(),
                source,
            })?;

        let extraction = if is_markup_name(&name, &self.markup_extensions) {
            Some(self.extract_blocking(content).await)
        } else {
            None
        };
        if let Some(Extraction::Failed(err)) = &extraction {
            warn!(id = %id, name = %name, error = %err.message, "extraction failed");
        }

        let file = UploadedFile {
            id: id.clone(),
            storage_path: path,
            original_name: name,
            uploaded_at: Utc::now(),
            size_bytes: content.len() as u64,
        };
        info!(
            id = %id,
            name = %file.original_name,
            size = file.size_bytes,
            extracted = extraction.is_some(),
            "upload stored"
        );
        Ok(self.index.insert(file, extraction))
    }

    async fn read(&self, id: &str) -> Result<Option<StoredFile>, StoreError> {
        let Some((metadata, extraction)) = self.index.get(id) else {
            return Ok(None);
        };
        let content = match self.storage.read(&metadata.storage_path).await {
            Ok(content) => content,
            // Deleted concurrently between the index lookup and the read.
            Err(err) if err.kind() == io::ErrorKind::NotFound && self.index.get(id).is_none() => {
                return Ok(None)
            }
            Err(source) => {
                return Err(StoreError::Read {
                    id: id.to_string(),
                    source,
                })
            }
        };
        Ok(Some(StoredFile {
            content,
            metadata,
            extraction,
        }))
    }

    fn list(&self) -> Vec<FileSummary> {
        self.index.list()
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let Some((file, extraction)) = self.index.remove(id) else {
            return Ok(false);
        };
        if let Err(source) = self.storage.delete(&file.storage_path).await {
            let path = file.storage_path.clone();
            self.index.insert(file, extraction);
            return Err(StoreError::Removal { path, source });
        }
        info!(id = %id, "upload deleted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploads::extract::{DocumentParser, ParseError};
    use crate::uploads::tree::MarkupTree;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store_in(tmp: &TempDir) -> UploadStore {
        let root = tmp.path().join("uploads");
        UploadStore::new(
            FileStorage::new(root.to_str().unwrap()),
            vec!["html".into(), "htm".into()],
        )
    }

    #[tokio::test]
    async fn content_round_trips_byte_for_byte() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let content = b"\x00\x01binary\xffbytes\r\n".to_vec();

        let id = store.store(&content, Some("blob.bin")).await.unwrap();
        let stored = store.read(&id).await.unwrap().expect("stored file");

        assert_eq!(stored.content, content);
        assert_eq!(stored.metadata.size_bytes, content.len() as u64);
        assert_eq!(stored.metadata.original_name, "blob.bin");
        assert!(stored.metadata.storage_path.starts_with(tmp.path()));
        assert!(stored.extraction.is_none());
    }

    #[tokio::test]
    async fn markup_uploads_are_extracted() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        let id = store
            .store(b"<title>Doc</title><h1>Hi</h1>", Some("Page.HTML"))
            .await
            .unwrap();
        let stored = store.read(&id).await.unwrap().unwrap();
        let result = stored.extraction.as_ref().and_then(Extraction::result).expect("extraction");
        assert_eq!(result.title.as_deref(), Some("Doc"));
        assert!(store.list()[0].has_extraction);
    }

    #[tokio::test]
    async fn non_markup_uploads_have_no_extraction_entry() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        let id = store.store(b"<h1>not parsed</h1>", Some("notes.txt")).await.unwrap();
        assert!(!store.list()[0].has_extraction);
        assert!(store.read(&id).await.unwrap().unwrap().extraction.is_none());
    }

    #[tokio::test]
    async fn missing_name_defaults_to_html_upload() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        let id = store.store(b"<p>x</p>", None).await.unwrap();
        let blank = store.store(b"<p>y</p>", Some("  ")).await.unwrap();
        let summaries = store.list();
        assert_eq!(summaries[0].name, format!("upload_{id}.html"));
        assert_eq!(summaries[1].name, format!("upload_{blank}.html"));
        assert!(summaries[0].has_extraction);
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_removes_bytes() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        let id = store.store(b"<p>x</p>", Some("a.html")).await.unwrap();
        let path = store.read(&id).await.unwrap().unwrap().metadata.storage_path;
        assert!(path.exists());

        assert!(store.delete(&id).await.unwrap());
        assert!(!path.exists());
        assert!(store.read(&id).await.unwrap().is_none());
        assert!(!store.delete(&id).await.unwrap());
        assert!(store.list().is_empty());
    }

    #[tokio::test]
    async fn same_name_uploads_get_distinct_locations() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        let first = store.store(b"one", Some("same.txt")).await.unwrap();
        let second = store.store(b"two", Some("same.txt")).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(store.read(&first).await.unwrap().unwrap().content, b"one");
        assert_eq!(store.read(&second).await.unwrap().unwrap().content, b"two");
    }

    #[tokio::test]
    async fn persistence_failure_leaves_no_metadata() {
        let tmp = TempDir::new().unwrap();
        // The storage root is a regular file, so creating it as a directory fails.
        let root = tmp.path().join("occupied");
        std::fs::write(&root, b"not a directory").unwrap();
        let store = UploadStore::new(FileStorage::new(root.to_str().unwrap()), vec!["html".into()]);

        let err = store.store(b"<p>x</p>", Some("a.html")).await.unwrap_err();
        assert!(matches!(err, StoreError::Persistence { .. }));
        assert!(store.list().is_empty());
    }

    #[tokio::test]
    async fn extraction_failure_keeps_the_file_readable() {
        struct Broken;
        impl DocumentParser for Broken {
            fn parse(&self, _content: &[u8]) -> Result<MarkupTree, ParseError> {
                Err(ParseError::Other("unbalanced document".into()))
            }
        }

        let tmp = TempDir::new().unwrap();
        let store = UploadStore::with_engine(
            FileStorage::new(tmp.path().to_str().unwrap()),
            vec!["html".into()],
            ExtractionEngine::new(Arc::new(Broken)),
        );

        let id = store.store(b"<div><<<", Some("bad.html")).await.unwrap();
        let stored = store.read(&id).await.unwrap().unwrap();
        assert_eq!(stored.content, b"<div><<<");
        let err = stored.extraction.as_ref().and_then(Extraction::error).expect("error entry");
        assert_eq!(err.message, "unbalanced document");
        assert!(store.list()[0].has_extraction);
    }

    #[tokio::test]
    async fn failed_removal_keeps_the_entry_and_its_extraction() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let page = b"<title>Kept</title>";

        let id = store.store(page, Some("kept.html")).await.unwrap();
        let path = store.index.get(&id).expect("entry").0.storage_path;
        // A non-empty directory in place of the file makes removal fail.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("pinned"), b"x").unwrap();

        let err = store.delete(&id).await.unwrap_err();
        assert!(matches!(err, StoreError::Removal { path: ref p, .. } if *p == path));

        let summaries = store.list();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, id);
        assert!(summaries[0].has_extraction);

        std::fs::remove_dir_all(&path).unwrap();
        std::fs::write(&path, page).unwrap();
        let stored = store.read(&id).await.unwrap().expect("still readable");
        assert_eq!(stored.content, page);
        let result = stored.extraction.as_ref().and_then(Extraction::result).expect("extraction");
        assert_eq!(result.title.as_deref(), Some("Kept"));
        assert!(store.delete(&id).await.unwrap());
    }

    #[tokio::test]
    async fn parser_panic_is_recorded_as_failed_extraction() {
        struct Panicking;
        impl DocumentParser for Panicking {
            fn parse(&self, _content: &[u8]) -> Result<MarkupTree, ParseError> {
                panic!("parser bug")
            }
        }

        let tmp = TempDir::new().unwrap();
        let store = UploadStore::with_engine(
            FileStorage::new(tmp.path().to_str().unwrap()),
            vec!["html".into()],
            ExtractionEngine::new(Arc::new(Panicking)),
        );

        let id = store.store(b"<p>x</p>", Some("a.html")).await.unwrap();
        let stored = store.read(&id).await.unwrap().unwrap();
        let err = stored.extraction.as_ref().and_then(Extraction::error).expect("error entry");
        assert!(err.message.starts_with("extraction task failed"));
    }

    #[tokio::test]
    async fn ingest_returns_the_recorded_summary() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        let page = store.ingest(b"<p>x</p>", Some("a.html")).await.unwrap();
        let text = store.ingest(b"plain", Some("b.txt")).await.unwrap();
        assert!(page.has_extraction);
        assert!(!text.has_extraction);
        assert_eq!(text.size, 5);
        assert_eq!(store.list(), [page, text]);
    }

    #[tokio::test]
    async fn ten_thousand_ids_are_distinct() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(store.index.reserve_id()));
        }
    }
}
