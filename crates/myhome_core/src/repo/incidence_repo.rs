//! Incidence repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist the incidence aggregate (row + owned photo rows).
//! - Provide id lookup, paginated listing and delete-by-id.
//!
//! # Invariants
//! - Write paths call `Incidence::validate()` before SQL mutations.
//! - Photo rows are append-only through `save`; an existing photo row is
//!   never rewritten or moved to another incidence.
//! - Photos are returned in attach order (`position ASC`).
//! - Read paths reject invalid persisted state instead of masking it.

use crate::model::incidence::{
    Geolocation, Incidence, IncidenceId, IncidencePriority, IncidenceStatus,
    IncidenceValidationError,
};
use crate::model::photo::Photo;
use crate::repo::page::{Page, PageRequest};
use crate::repo::{ensure_schema_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const INCIDENCE_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    start_date,
    end_date,
    status,
    priority,
    longitude,
    latitude,
    organization_id,
    employee_id
FROM incidences";

/// Repository interface for the incidence aggregate.
pub trait IncidenceRepository {
    /// Inserts a new incidence and returns its identity.
    ///
    /// A pre-assigned `id` is kept when free; a taken id is a storage error.
    fn insert(&self, incidence: &Incidence) -> RepoResult<IncidenceId>;
    /// Writes scalar fields of an existing incidence and appends new photos.
    fn save(&self, incidence: &Incidence) -> RepoResult<()>;
    fn find_by_id(&self, id: IncidenceId) -> RepoResult<Option<Incidence>>;
    /// Lists incidences ordered by id.
    fn find_page(&self, request: &PageRequest) -> RepoResult<Page<Incidence>>;
    /// Deletes one incidence with its photo rows. Missing ids are a no-op.
    fn delete_by_id(&self, id: IncidenceId) -> RepoResult<()>;
}

/// SQLite-backed incidence repository.
///
/// Accepts a plain connection or a `rusqlite::Transaction` (via deref), so
/// the caller decides the transaction boundary.
pub struct SqliteIncidenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteIncidenceRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl IncidenceRepository for SqliteIncidenceRepository<'_> {
    fn insert(&self, incidence: &Incidence) -> RepoResult<IncidenceId> {
        incidence.validate()?;

        self.conn.execute(
            "INSERT INTO incidences (
                id,
                title,
                description,
                start_date,
                end_date,
                status,
                priority,
                longitude,
                latitude,
                organization_id,
                employee_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                incidence.id,
                incidence.title.as_str(),
                incidence.description.as_str(),
                incidence.start_date,
                incidence.end_date,
                incidence.status.as_str(),
                incidence.priority.as_str(),
                incidence.location.map(|location| location.longitude),
                incidence.location.map(|location| location.latitude),
                incidence.organization_id,
                incidence.employee_id,
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        append_photos(self.conn, id, &incidence.photos)?;
        Ok(id)
    }

    fn save(&self, incidence: &Incidence) -> RepoResult<()> {
        let id = incidence.id.ok_or(IncidenceValidationError::MissingId)?;
        incidence.validate()?;

        let changed = self.conn.execute(
            "UPDATE incidences
             SET
                title = ?1,
                description = ?2,
                start_date = ?3,
                end_date = ?4,
                status = ?5,
                priority = ?6,
                longitude = ?7,
                latitude = ?8,
                organization_id = ?9,
                employee_id = ?10,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?11;",
            params![
                incidence.title.as_str(),
                incidence.description.as_str(),
                incidence.start_date,
                incidence.end_date,
                incidence.status.as_str(),
                incidence.priority.as_str(),
                incidence.location.map(|location| location.longitude),
                incidence.location.map(|location| location.latitude),
                incidence.organization_id,
                incidence.employee_id,
                id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        append_photos(self.conn, id, &incidence.photos)
    }

    fn find_by_id(&self, id: IncidenceId) -> RepoResult<Option<Incidence>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{INCIDENCE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => {
                let mut incidence = parse_incidence_row(row)?;
                incidence.photos = load_photos(self.conn, id)?;
                Ok(Some(incidence))
            }
            None => Ok(None),
        }
    }

    fn find_page(&self, request: &PageRequest) -> RepoResult<Page<Incidence>> {
        let size = request.normalized_size();
        let total_items: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM incidences;", [], |row| row.get(0))?;

        let offset = i64::try_from(request.offset()).map_err(|_| {
            RepoError::InvalidData(format!("page offset out of range: {}", request.offset()))
        })?;
        let mut stmt = self.conn.prepare(&format!(
            "{INCIDENCE_SELECT_SQL} ORDER BY id ASC LIMIT ?1 OFFSET ?2;"
        ))?;
        let mut rows = stmt.query(params![i64::from(size), offset])?;

        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_incidence_row(row)?);
        }
        for incidence in &mut items {
            if let Some(id) = incidence.id {
                incidence.photos = load_photos(self.conn, id)?;
            }
        }

        Ok(Page {
            items,
            page: request.page,
            size,
            total_items: u64::try_from(total_items).unwrap_or_default(),
        })
    }

    fn delete_by_id(&self, id: IncidenceId) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM incidences WHERE id = ?1;", [id])?;
        Ok(())
    }
}

fn append_photos(conn: &Connection, incidence_id: IncidenceId, photos: &[Photo]) -> RepoResult<()> {
    for (position, photo) in photos.iter().enumerate() {
        let existing_owner: Option<IncidenceId> = conn
            .query_row(
                "SELECT incidence_id FROM photos WHERE id = ?1;",
                [photo.id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match existing_owner {
            Some(owner) if owner == incidence_id => continue,
            Some(owner) => {
                return Err(IncidenceValidationError::ForeignPhoto {
                    photo_id: photo.id.to_string(),
                    owner,
                    expected: Some(incidence_id),
                }
                .into());
            }
            None => {}
        }

        let size_bytes = i64::try_from(photo.size_bytes).map_err(|_| {
            RepoError::InvalidData(format!("photo {} is too large to index", photo.id))
        })?;
        conn.execute(
            "INSERT INTO photos (
                id,
                incidence_id,
                position,
                file_name,
                content_type,
                storage_key,
                size_bytes,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                photo.id.to_string(),
                incidence_id,
                position as i64,
                photo.file_name.as_str(),
                photo.content_type.as_deref(),
                photo.storage_key.as_str(),
                size_bytes,
                photo.created_at,
            ],
        )?;
    }
    Ok(())
}

fn load_photos(conn: &Connection, incidence_id: IncidenceId) -> RepoResult<Vec<Photo>> {
    let mut stmt = conn.prepare(
        "SELECT
            id,
            incidence_id,
            file_name,
            content_type,
            storage_key,
            size_bytes,
            created_at
         FROM photos
         WHERE incidence_id = ?1
         ORDER BY position ASC, created_at ASC;",
    )?;
    let mut rows = stmt.query([incidence_id])?;
    let mut photos = Vec::new();
    while let Some(row) = rows.next()? {
        photos.push(parse_photo_row(row)?);
    }
    Ok(photos)
}

fn parse_incidence_row(row: &Row<'_>) -> RepoResult<Incidence> {
    let id: IncidenceId = row.get("id")?;

    let status_text: String = row.get("status")?;
    let status = IncidenceStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in incidences.status (id={id})"
        ))
    })?;

    let priority_text: String = row.get("priority")?;
    let priority = IncidencePriority::parse(&priority_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid priority `{priority_text}` in incidences.priority (id={id})"
        ))
    })?;

    let longitude: Option<f64> = row.get("longitude")?;
    let latitude: Option<f64> = row.get("latitude")?;
    let location = Geolocation::from_parts(longitude, latitude);
    if location.is_none() && (longitude.is_some() || latitude.is_some()) {
        return Err(RepoError::InvalidData(format!(
            "half-filled location in incidences (id={id})"
        )));
    }

    Ok(Incidence {
        id: Some(id),
        title: row.get("title")?,
        description: row.get("description")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        status,
        priority,
        location,
        organization_id: row.get("organization_id")?,
        employee_id: row.get("employee_id")?,
        photos: Vec::new(),
    })
}

fn parse_photo_row(row: &Row<'_>) -> RepoResult<Photo> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in photos.id"))
    })?;

    let size_bytes: i64 = row.get("size_bytes")?;
    let size_bytes = u64::try_from(size_bytes).map_err(|_| {
        RepoError::InvalidData(format!(
            "negative size `{size_bytes}` in photos.size_bytes (id={id_text})"
        ))
    })?;

    Ok(Photo {
        id,
        incidence_id: row.get("incidence_id")?,
        file_name: row.get("file_name")?,
        content_type: row.get("content_type")?,
        storage_key: row.get("storage_key")?,
        size_bytes,
        created_at: row.get("created_at")?,
    })
}
