//! Core domain logic for the MyHome property-management portal.
//! This crate is the single source of truth for incidence invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod photo;
pub mod repo;
pub mod service;

pub use config::{AppConfig, ConfigError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::directory::{Employee, EmployeeId, Organization, OrganizationId};
pub use model::incidence::{
    Geolocation, Incidence, IncidenceId, IncidencePriority, IncidenceStatus,
    IncidenceValidationError,
};
pub use model::photo::{Photo, PhotoId, PhotoUpload};
pub use model::user::{Authority, UserIdentity, EMPLOYEE_AUTHORITY_MARKER};
pub use photo::{FsPhotoManager, PhotoError, PhotoManager, PhotoResult};
pub use repo::directory_repo::{
    EmployeeRepository, NewEmployee, OrganizationRepository, SqliteEmployeeRepository,
    SqliteOrganizationRepository,
};
pub use repo::incidence_repo::{IncidenceRepository, SqliteIncidenceRepository};
pub use repo::page::{Page, PageRequest};
pub use repo::{RepoError, RepoResult};
pub use service::current_user::{CurrentUserResolver, StaticUserResolver};
pub use service::dto::{IncidenceRequest, IncidenceSummary, PhotoSummary};
pub use service::incidence_service::{
    is_employee_only_view, IncidenceService, IncidenceServiceError, LinkPolicy, ServiceResult,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
