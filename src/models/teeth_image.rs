use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A photo of the patient's teeth. Exactly one image per patient carries
/// `is_latest`, the most recent upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeethImage {
    pub id: i64,
    pub patient: i64,
    pub patient_name: String,
    pub notes: String,
    pub file_name: String,
    #[serde(skip)]
    pub stored_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Option<i64>,
    pub uploaded_by_name: Option<String>,
    pub is_latest: bool,
    pub uploaded_at: NaiveDateTime,
    /// API path serving the image bytes.
    pub image_url: String,
}

#[derive(Debug, Clone)]
pub struct NewTeethImage {
    pub patient: i64,
    pub notes: String,
    pub file_name: String,
    pub stored_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Option<i64>,
}
