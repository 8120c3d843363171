use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::DocumentType;

/// An uploaded clinical document (X-ray, scan, report).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub patient: i64,
    pub document_type: DocumentType,
    pub title: String,
    pub description: String,
    pub file_name: String,
    #[serde(skip)]
    pub stored_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Option<i64>,
    pub uploaded_by_name: Option<String>,
    pub uploaded_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub patient: i64,
    pub document_type: DocumentType,
    pub title: String,
    pub description: String,
    pub file_name: String,
    pub stored_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Option<i64>,
}
