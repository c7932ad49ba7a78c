//! Incidence aggregate model.
//!
//! # Responsibility
//! - Define the maintenance ticket record and its value objects.
//! - Provide validation used by repository write paths.
//!
//! # Invariants
//! - `id` is `None` only before the first store insert.
//! - `location` is either fully present or absent, never half-filled.
//! - `end_date` should not be earlier than `start_date` when both are set.
//! - Every entry of `photos` has `incidence_id == id`.

use crate::model::directory::{EmployeeId, OrganizationId};
use crate::model::photo::Photo;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Store-assigned incidence identity.
pub type IncidenceId = i64;

/// Lifecycle state of an incidence.
///
/// Stored exactly as given; the core applies no transition rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidenceStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl IncidenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "in_progress" => Some(Self::InProgress),
            "resolved" => Some(Self::Resolved),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidencePriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl IncidencePriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Longitude/latitude pair attached to an incidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    pub longitude: f64,
    pub latitude: f64,
}

impl Geolocation {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Builds a location only when both coordinates are supplied.
    ///
    /// A single coordinate is dropped rather than kept as a partial value.
    pub fn from_parts(longitude: Option<f64>, latitude: Option<f64>) -> Option<Self> {
        match (longitude, latitude) {
            (Some(longitude), Some(latitude)) => Some(Self::new(longitude, latitude)),
            _ => None,
        }
    }
}

/// Validation errors for incidence write paths.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IncidenceValidationError {
    #[error("incidence title must not be blank")]
    BlankTitle,
    #[error("incidence end_date {end_date} is earlier than start_date {start_date}")]
    EndBeforeStart { start_date: i64, end_date: i64 },
    #[error("incidence location has non-finite coordinates ({longitude}, {latitude})")]
    NonFiniteLocation { longitude: f64, latitude: f64 },
    #[error("photo {photo_id} is owned by incidence {owner:?}, not {expected:?}")]
    ForeignPhoto {
        photo_id: String,
        owner: IncidenceId,
        expected: Option<IncidenceId>,
    },
    #[error("incidence update requires an id")]
    MissingId,
}

/// Maintenance ticket aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incidence {
    pub id: Option<IncidenceId>,
    pub title: String,
    pub description: String,
    /// Epoch milliseconds.
    pub start_date: Option<i64>,
    /// Epoch milliseconds. Should be >= `start_date` when set.
    pub end_date: Option<i64>,
    pub status: IncidenceStatus,
    pub priority: IncidencePriority,
    pub location: Option<Geolocation>,
    pub organization_id: Option<OrganizationId>,
    pub employee_id: Option<EmployeeId>,
    /// Owned photos in attach order.
    pub photos: Vec<Photo>,
}

impl Incidence {
    /// Creates an unsaved incidence with default status and priority.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: description.into(),
            start_date: None,
            end_date: None,
            status: IncidenceStatus::default(),
            priority: IncidencePriority::default(),
            location: None,
            organization_id: None,
            employee_id: None,
            photos: Vec::new(),
        }
    }

    pub fn has_photos(&self) -> bool {
        !self.photos.is_empty()
    }

    /// Validates field-level invariants before persistence.
    pub fn validate(&self) -> Result<(), IncidenceValidationError> {
        if self.title.trim().is_empty() {
            return Err(IncidenceValidationError::BlankTitle);
        }

        if let (Some(start_date), Some(end_date)) = (self.start_date, self.end_date) {
            if end_date < start_date {
                return Err(IncidenceValidationError::EndBeforeStart {
                    start_date,
                    end_date,
                });
            }
        }

        if let Some(location) = self.location {
            if !location.longitude.is_finite() || !location.latitude.is_finite() {
                return Err(IncidenceValidationError::NonFiniteLocation {
                    longitude: location.longitude,
                    latitude: location.latitude,
                });
            }
        }

        for photo in &self.photos {
            if Some(photo.incidence_id) != self.id {
                return Err(IncidenceValidationError::ForeignPhoto {
                    photo_id: photo.id.to_string(),
                    owner: photo.incidence_id,
                    expected: self.id,
                });
            }
        }

        Ok(())
    }
}
