//! Photo evidence attached to an incidence.

use crate::model::incidence::IncidenceId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable photo identity, generated when the binary is stored.
pub type PhotoId = Uuid;

/// Persisted photo record.
///
/// Only produced by a photo manager for an incidence that already has an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,
    /// Owning incidence; never reassigned.
    pub incidence_id: IncidenceId,
    /// Sanitized original file name.
    pub file_name: String,
    pub content_type: Option<String>,
    /// Opaque handle the photo manager can resolve back to the binary.
    pub storage_key: String,
    pub size_bytes: u64,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Raw uploaded file as received from the request layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: Option<&str>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.map(str::to_string),
            bytes: bytes.into(),
        }
    }
}
