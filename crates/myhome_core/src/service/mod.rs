//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and collaborator calls into use-case level APIs.
//! - Keep request layers decoupled from storage details.

pub mod current_user;
pub mod dto;
pub mod incidence_service;
