//! Organization and employee lookups used to link incidences.
//!
//! # Responsibility
//! - Resolve organization/employee ids to records.
//! - Seed directory rows for tooling and tests.
//!
//! # Invariants
//! - Lookups return `Ok(None)` for unknown ids; absence is not an error.

use crate::model::directory::{Employee, EmployeeId, Organization, OrganizationId};
use crate::repo::{ensure_schema_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Input for seeding one employee row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEmployee {
    pub organization_id: Option<OrganizationId>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

pub trait OrganizationRepository {
    fn create(&self, name: &str) -> RepoResult<Organization>;
    fn find_by_id(&self, id: OrganizationId) -> RepoResult<Option<Organization>>;
}

pub trait EmployeeRepository {
    fn create(&self, input: &NewEmployee) -> RepoResult<Employee>;
    fn find_by_id(&self, id: EmployeeId) -> RepoResult<Option<Employee>>;
}

/// SQLite-backed organization store.
pub struct SqliteOrganizationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOrganizationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl OrganizationRepository for SqliteOrganizationRepository<'_> {
    fn create(&self, name: &str) -> RepoResult<Organization> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepoError::InvalidData(
                "organization name must not be blank".to_string(),
            ));
        }

        self.conn
            .execute("INSERT INTO organizations (name) VALUES (?1);", [name])?;
        Ok(Organization {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    fn find_by_id(&self, id: OrganizationId) -> RepoResult<Option<Organization>> {
        let organization = self
            .conn
            .query_row(
                "SELECT id, name FROM organizations WHERE id = ?1;",
                [id],
                |row| {
                    Ok(Organization {
                        id: row.get("id")?,
                        name: row.get("name")?,
                    })
                },
            )
            .optional()?;
        Ok(organization)
    }
}

/// SQLite-backed employee store.
pub struct SqliteEmployeeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEmployeeRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl EmployeeRepository for SqliteEmployeeRepository<'_> {
    fn create(&self, input: &NewEmployee) -> RepoResult<Employee> {
        if input.first_name.trim().is_empty() || input.last_name.trim().is_empty() {
            return Err(RepoError::InvalidData(
                "employee first and last name must not be blank".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT INTO employees (organization_id, first_name, last_name, email)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                input.organization_id,
                input.first_name.trim(),
                input.last_name.trim(),
                input.email.as_deref(),
            ],
        )?;

        Ok(Employee {
            id: self.conn.last_insert_rowid(),
            organization_id: input.organization_id,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            email: input.email.clone(),
        })
    }

    fn find_by_id(&self, id: EmployeeId) -> RepoResult<Option<Employee>> {
        let employee = self
            .conn
            .query_row(
                "SELECT id, organization_id, first_name, last_name, email
                 FROM employees
                 WHERE id = ?1;",
                [id],
                |row| {
                    Ok(Employee {
                        id: row.get("id")?,
                        organization_id: row.get("organization_id")?,
                        first_name: row.get("first_name")?,
                        last_name: row.get("last_name")?,
                        email: row.get("email")?,
                    })
                },
            )
            .optional()?;
        Ok(employee)
    }
}
