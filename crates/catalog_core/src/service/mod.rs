//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate image storage and repository calls into use-case APIs.
//! - Keep transport layers decoupled from storage details.

pub mod catalog_service;
