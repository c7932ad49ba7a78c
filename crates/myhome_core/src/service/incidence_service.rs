//! Incidence use-case service.
//!
//! # Responsibility
//! - Orchestrate incidence create/update/read/delete over the stores, the
//!   photo manager and the current-user resolver.
//! - Own the unit of work: one SQLite transaction per operation.
//!
//! # Invariants
//! - Reads run in a deferred transaction with `PRAGMA query_only` set;
//!   writes run in an immediate one.
//! - Every mutation goes through an explicit store write before commit.
//! - A failed create leaves no incidence row and no stored photo binaries.
//! - Unknown organization/employee ids leave the link unset under
//!   `LinkPolicy::Lenient`.
//! - Callers holding a `ROLE_EMPLOYEE*` authority get no expanded photo
//!   details for incidences that have photos.

use crate::model::directory::{EmployeeId, OrganizationId};
use crate::model::incidence::{Incidence, IncidenceId, IncidenceValidationError};
use crate::model::photo::Photo;
use crate::model::user::UserIdentity;
use crate::photo::{PhotoError, PhotoManager};
use crate::repo::directory_repo::{
    EmployeeRepository, OrganizationRepository, SqliteEmployeeRepository,
    SqliteOrganizationRepository,
};
use crate::repo::incidence_repo::{IncidenceRepository, SqliteIncidenceRepository};
use crate::repo::page::{Page, PageRequest};
use crate::repo::RepoError;
use crate::service::current_user::CurrentUserResolver;
use crate::service::dto::{IncidenceRequest, IncidenceSummary};
use log::{debug, error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, IncidenceServiceError>;

/// Service error for incidence use-cases.
#[derive(Debug, Error)]
pub enum IncidenceServiceError {
    #[error(transparent)]
    Validation(#[from] IncidenceValidationError),
    /// Only raised under `LinkPolicy::Strict`.
    #[error("organization not found: {0}")]
    OrganizationNotFound(OrganizationId),
    /// Only raised under `LinkPolicy::Strict`.
    #[error("employee not found: {0}")]
    EmployeeNotFound(EmployeeId),
    #[error(transparent)]
    Storage(RepoError),
    #[error(transparent)]
    Photo(#[from] PhotoError),
}

impl IncidenceServiceError {
    /// Stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::OrganizationNotFound(_) => "organization_not_found",
            Self::EmployeeNotFound(_) => "employee_not_found",
            Self::Storage(_) => "storage_failed",
            Self::Photo(_) => "photo_failed",
        }
    }
}

impl From<RepoError> for IncidenceServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Storage(other),
        }
    }
}

impl From<rusqlite::Error> for IncidenceServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(RepoError::from(value))
    }
}

/// How create treats organization/employee ids that do not resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPolicy {
    /// Leave the link unset and carry on.
    #[default]
    Lenient,
    /// Fail the create with a not-found error.
    Strict,
}

/// Incidence orchestrator over one SQLite connection.
pub struct IncidenceService<'conn, P: PhotoManager, U: CurrentUserResolver> {
    conn: &'conn Connection,
    photos: P,
    users: U,
    link_policy: LinkPolicy,
}

impl<'conn, P: PhotoManager, U: CurrentUserResolver> IncidenceService<'conn, P, U> {
    /// Creates a service with the default lenient link policy.
    ///
    /// `conn` must come from `db::open_db*` and must not have an open
    /// transaction; every call opens its own.
    pub fn new(conn: &'conn Connection, photos: P, users: U) -> Self {
        Self {
            conn,
            photos,
            users,
            link_policy: LinkPolicy::default(),
        }
    }

    pub fn with_link_policy(mut self, link_policy: LinkPolicy) -> Self {
        self.link_policy = link_policy;
        self
    }

    pub fn link_policy(&self) -> LinkPolicy {
        self.link_policy
    }

    /// Creates an incidence, links it and attaches the uploaded photos.
    ///
    /// # Contract
    /// - Two store writes: insert (assigns id), then save (photo links).
    /// - Photos are attached in request order.
    /// - Any failure rolls the whole create back and discards photo
    ///   binaries already stored for it.
    pub fn create(&self, request: &IncidenceRequest) -> ServiceResult<Incidence> {
        let started_at = Instant::now();
        let mut stored: Vec<Photo> = Vec::new();

        let result = self.in_transaction(TransactionBehavior::Immediate, |tx| {
            let incidences = SqliteIncidenceRepository::try_new(tx)?;

            let mut incidence = request.to_new_incidence();
            incidence.validate()?;
            incidence.organization_id = self.resolve_organization(tx, request.organization_id)?;
            incidence.employee_id = self.resolve_employee(tx, request.employee_id)?;

            let id = incidences.insert(&incidence)?;
            incidence.id = Some(id);

            for upload in &request.photo_files {
                let photo = self.photos.attach(&incidence, upload)?;
                stored.push(photo.clone());
                incidence.photos.push(photo);
            }

            incidences.save(&incidence)?;
            Ok(incidence)
        });

        match result {
            Ok(incidence) => {
                info!(
                    "event=incidence_create module=service status=ok incidence_id={} photo_count={} duration_ms={}",
                    incidence.id.unwrap_or_default(),
                    incidence.photos.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(incidence)
            }
            Err(err) => {
                self.discard_all(&stored);
                error!(
                    "event=incidence_create module=service status=error duration_ms={} discarded_photos={} error_code={} error={}",
                    started_at.elapsed().as_millis(),
                    stored.len(),
                    err.code(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Gets one incidence aggregate by id.
    pub fn get_by_id(&self, id: IncidenceId) -> ServiceResult<Option<Incidence>> {
        self.read_only(|tx| Ok(SqliteIncidenceRepository::try_new(tx)?.find_by_id(id)?))
    }

    /// Overwrites the editable fields of an existing incidence.
    ///
    /// # Contract
    /// - Returns `Ok(None)` when no incidence has `request.id`.
    /// - Organization, employee and photos are left untouched.
    /// - The returned summary does not expand photos.
    pub fn update(&self, request: &IncidenceRequest) -> ServiceResult<Option<IncidenceSummary>> {
        let id = request.id.ok_or(IncidenceValidationError::MissingId)?;

        let updated = self.in_transaction(TransactionBehavior::Immediate, |tx| {
            let incidences = SqliteIncidenceRepository::try_new(tx)?;
            let Some(mut incidence) = incidences.find_by_id(id)? else {
                return Ok(None);
            };

            request.apply_to(&mut incidence);
            incidence.validate()?;
            incidences.save(&incidence)?;
            Ok(Some(IncidenceSummary::from(&incidence)))
        })?;

        match &updated {
            Some(_) => debug!("event=incidence_update module=service status=ok incidence_id={id}"),
            None => debug!(
                "event=incidence_update module=service status=not_found incidence_id={id}"
            ),
        }
        Ok(updated)
    }

    /// Deletes one incidence and its photos.
    ///
    /// Missing ids follow the store: the SQLite store treats them as a no-op.
    /// Photo binaries are discarded after commit; discard failures are logged
    /// and do not fail the delete.
    pub fn delete(&self, id: IncidenceId) -> ServiceResult<()> {
        let removed = self.in_transaction(TransactionBehavior::Immediate, |tx| {
            let incidences = SqliteIncidenceRepository::try_new(tx)?;
            let photos = incidences
                .find_by_id(id)?
                .map(|incidence| incidence.photos)
                .unwrap_or_default();
            incidences.delete_by_id(id)?;
            Ok(photos)
        })?;

        self.discard_all(&removed);
        debug!(
            "event=incidence_delete module=service status=ok incidence_id={} photo_count={}",
            id,
            removed.len()
        );
        Ok(())
    }

    /// Lists incidence summaries page by page.
    pub fn list_page(&self, request: &PageRequest) -> ServiceResult<Page<IncidenceSummary>> {
        let page =
            self.read_only(|tx| Ok(SqliteIncidenceRepository::try_new(tx)?.find_page(request)?))?;
        Ok(page.map(IncidenceSummary::from))
    }

    /// Gets one incidence summary, expanding photos if the caller may see them.
    ///
    /// # Contract
    /// - Returns `Ok(None)` when the id does not exist.
    /// - Employee-only view (see `is_employee_only_view`) returns the summary
    ///   with an empty photo list.
    /// - Otherwise every owned photo is expanded, in owned order.
    pub fn get_by_id_with_visibility(
        &self,
        id: IncidenceId,
    ) -> ServiceResult<Option<IncidenceSummary>> {
        let Some(incidence) = self.get_by_id(id)? else {
            warn!("event=incidence_visible_read module=service status=not_found incidence_id={id}");
            return Ok(None);
        };

        let user = self.users.current_user();
        let employee_only_view = is_employee_only_view(&incidence, user.as_ref());
        debug!(
            "event=incidence_visible_read module=service status=ok incidence_id={} employee_only_view={}",
            id, employee_only_view
        );

        if employee_only_view {
            return Ok(Some(IncidenceSummary::from(&incidence)));
        }
        Ok(Some(IncidenceSummary::with_photos(&incidence)))
    }

    fn resolve_organization(
        &self,
        conn: &Connection,
        organization_id: Option<OrganizationId>,
    ) -> ServiceResult<Option<OrganizationId>> {
        let Some(organization_id) = organization_id else {
            return Ok(None);
        };
        let found = SqliteOrganizationRepository::try_new(conn)?.find_by_id(organization_id)?;
        match (found, self.link_policy) {
            (Some(organization), _) => Ok(Some(organization.id)),
            (None, LinkPolicy::Strict) => {
                Err(IncidenceServiceError::OrganizationNotFound(organization_id))
            }
            (None, LinkPolicy::Lenient) => {
                warn!(
                    "event=incidence_link module=service status=unresolved link=organization id={organization_id}"
                );
                Ok(None)
            }
        }
    }

    fn resolve_employee(
        &self,
        conn: &Connection,
        employee_id: Option<EmployeeId>,
    ) -> ServiceResult<Option<EmployeeId>> {
        let Some(employee_id) = employee_id else {
            return Ok(None);
        };
        let found = SqliteEmployeeRepository::try_new(conn)?.find_by_id(employee_id)?;
        match (found, self.link_policy) {
            (Some(employee), _) => Ok(Some(employee.id)),
            (None, LinkPolicy::Strict) => Err(IncidenceServiceError::EmployeeNotFound(employee_id)),
            (None, LinkPolicy::Lenient) => {
                warn!(
                    "event=incidence_link module=service status=unresolved link=employee id={employee_id}"
                );
                Ok(None)
            }
        }
    }

    fn discard_all(&self, photos: &[Photo]) {
        for photo in photos {
            if let Err(err) = self.photos.discard(photo) {
                warn!(
                    "event=photo_discard module=service status=error incidence_id={} photo_id={} error={}",
                    photo.incidence_id, photo.id, err
                );
            }
        }
    }

    /// Runs `work` inside one transaction; commits only when it succeeds.
    fn in_transaction<T>(
        &self,
        behavior: TransactionBehavior,
        work: impl FnOnce(&Transaction<'_>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let tx = Transaction::new_unchecked(self.conn, behavior)?;
        let value = work(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Runs `work` in a deferred transaction that rejects writes.
    fn read_only<T>(
        &self,
        work: impl FnOnce(&Transaction<'_>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        self.conn.pragma_update(None, "query_only", true)?;
        let result = self.in_transaction(TransactionBehavior::Deferred, work);
        let reset = self.conn.pragma_update(None, "query_only", false);
        let value = result?;
        reset?;
        Ok(value)
    }
}

/// Whether photo details are withheld for `user` on `incidence`.
///
/// True iff a caller is present, the incidence owns at least one photo and
/// some authority name contains `ROLE_EMPLOYEE`.
pub fn is_employee_only_view(incidence: &Incidence, user: Option<&UserIdentity>) -> bool {
    match user {
        Some(user) => incidence.has_photos() && user.is_employee(),
        None => false,
    }
}
