use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::FileType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttachment {
    pub id: i64,
    pub patient: i64,
    pub file_type: FileType,
    pub title: String,
    pub description: String,
    pub file_name: String,
    /// On-disk name inside the upload directory; never sent to clients.
    #[serde(skip)]
    pub stored_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Option<i64>,
    pub uploaded_at: NaiveDateTime,
}

/// Metadata gathered from a multipart upload before the row is written.
#[derive(Debug, Clone)]
pub struct NewFileAttachment {
    pub patient: i64,
    pub file_type: FileType,
    pub title: String,
    pub description: String,
    pub file_name: String,
    pub stored_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Option<i64>,
}
