//! Catalog domain model.
//!
//! # Responsibility
//! - Define the item and category records shared by repositories and services.
//! - Own write-side validation and category label normalization.
//!
//! # Invariants
//! - Every persisted item has a non-empty name and a resolvable category.
//! - Item ids are assigned by the store and never reused.

pub mod category;
pub mod item;
