//! Request and response shapes exchanged with the request layer.
//!
//! # Invariants
//! - `IncidenceSummary::from` never expands photos; callers that are allowed
//!   to see photo details fill `photos` explicitly.

use crate::model::directory::{EmployeeId, OrganizationId};
use crate::model::incidence::{
    Geolocation, Incidence, IncidenceId, IncidencePriority, IncidenceStatus,
};
use crate::model::photo::{Photo, PhotoId, PhotoUpload};
use serde::{Deserialize, Serialize};

/// Create/update input for one incidence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidenceRequest {
    /// Pre-assigned id on create; target id on update.
    pub id: Option<IncidenceId>,
    pub title: String,
    pub description: String,
    pub start_date: Option<i64>,
    /// Kept by create as well as update.
    pub end_date: Option<i64>,
    pub status: IncidenceStatus,
    pub priority: IncidencePriority,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub organization_id: Option<OrganizationId>,
    pub employee_id: Option<EmployeeId>,
    /// Ignored by update.
    pub photo_files: Vec<PhotoUpload>,
}

impl IncidenceRequest {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn location(&self) -> Option<Geolocation> {
        Geolocation::from_parts(self.longitude, self.latitude)
    }

    /// Builds an unsaved incidence; links and photos are left to the service.
    pub(crate) fn to_new_incidence(&self) -> Incidence {
        let mut incidence = Incidence::new(self.title.clone(), self.description.clone());
        incidence.id = self.id;
        self.apply_to(&mut incidence);
        incidence
    }

    /// Overwrites the fields an update is allowed to touch.
    pub(crate) fn apply_to(&self, incidence: &mut Incidence) {
        incidence.title = self.title.clone();
        incidence.description = self.description.clone();
        incidence.start_date = self.start_date;
        incidence.end_date = self.end_date;
        incidence.status = self.status;
        incidence.priority = self.priority;
        incidence.location = self.location();
    }
}

/// Photo detail exposed to callers allowed to see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSummary {
    pub id: PhotoId,
    pub file_name: String,
    pub content_type: Option<String>,
    pub storage_key: String,
    pub size_bytes: u64,
    pub created_at: i64,
}

impl From<&Photo> for PhotoSummary {
    fn from(photo: &Photo) -> Self {
        Self {
            id: photo.id,
            file_name: photo.file_name.clone(),
            content_type: photo.content_type.clone(),
            storage_key: photo.storage_key.clone(),
            size_bytes: photo.size_bytes,
            created_at: photo.created_at,
        }
    }
}

/// Flat incidence view returned by update, list and detail reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidenceSummary {
    pub id: Option<IncidenceId>,
    pub title: String,
    pub description: String,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub status: IncidenceStatus,
    pub priority: IncidencePriority,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub organization_id: Option<OrganizationId>,
    pub employee_id: Option<EmployeeId>,
    /// Number of photos the incidence owns, whether or not they are expanded.
    pub photo_count: usize,
    /// Expanded photo details; empty unless the read path fills it.
    pub photos: Vec<PhotoSummary>,
}

impl From<&Incidence> for IncidenceSummary {
    fn from(incidence: &Incidence) -> Self {
        Self {
            id: incidence.id,
            title: incidence.title.clone(),
            description: incidence.description.clone(),
            start_date: incidence.start_date,
            end_date: incidence.end_date,
            status: incidence.status,
            priority: incidence.priority,
            longitude: incidence.location.map(|location| location.longitude),
            latitude: incidence.location.map(|location| location.latitude),
            organization_id: incidence.organization_id,
            employee_id: incidence.employee_id,
            photo_count: incidence.photos.len(),
            photos: Vec::new(),
        }
    }
}

impl From<Incidence> for IncidenceSummary {
    fn from(incidence: Incidence) -> Self {
        Self::from(&incidence)
    }
}

impl IncidenceSummary {
    /// Summary with every owned photo expanded, in owned order.
    pub fn with_photos(incidence: &Incidence) -> Self {
        let mut summary = Self::from(incidence);
        summary.photos = incidence.photos.iter().map(PhotoSummary::from).collect();
        summary
    }
}
