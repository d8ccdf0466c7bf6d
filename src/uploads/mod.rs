//! Uploads: markup document storage and extraction
//!
//! Handles multipart file extraction, on-disk storage, the in-memory
//! upload index, and structured extraction of markup documents.

pub mod describe;
pub mod extract;
pub mod id;
pub mod index;
pub mod multipart;
pub mod schema;
pub mod storage;
pub mod store;
pub mod tree;

pub use extract::{DocumentParser, ExtractionEngine, HtmlParser};
pub use multipart::{extract_file, MultipartFile};
pub use schema::{Extraction, ExtractionError, ExtractionResult, FileSummary, StoredFile, UploadedFile};
pub use storage::FileStorage;
pub use store::{FileStore, StoreError, UploadStore};
