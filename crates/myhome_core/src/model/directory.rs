//! Organization and employee records referenced by incidences.
//!
//! The incidence core only resolves these by id; it never mutates them.

use serde::{Deserialize, Serialize};

pub type OrganizationId = i64;
pub type EmployeeId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub organization_id: Option<OrganizationId>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
