//! pageshelf: upload markup documents, keep them on disk, and extract a
//! structured summary of their content.

pub mod config;
pub mod gateway;
pub mod service;
pub mod uploads;

pub use config::Config;
pub use service::{boundary_from_content_type, UploadError, UploadReceipt, UploadService};
