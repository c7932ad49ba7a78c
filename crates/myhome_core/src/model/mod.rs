//! Domain model for the incidence portal.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep the incidence aggregate (incidence + owned photos) in one shape.
//!
//! # Invariants
//! - An incidence location is present iff both coordinates are known.
//! - A photo belongs to exactly one incidence for its whole lifetime.

pub mod directory;
pub mod incidence;
pub mod photo;
pub mod user;
