//! Item domain model.
//!
//! # Responsibility
//! - Define the materialized item view returned by every read path.
//! - Define the insert payload and validate it before persistence.
//!
//! # Invariants
//! - `Item::category` is the canonical display name, never a raw id.
//! - `Item::image_name` is either a content-hash file name or `default.jpg`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned item identity. Monotonic, never reused.
pub type ItemId = i64;

/// Fully materialized catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Canonical category display name resolved at read time.
    pub category: String,
    pub image_name: String,
}

/// Insert payload for [`crate::repo::ItemRepository::insert`].
///
/// `image_name` must come from [`crate::image::ImageStore::store`]; the
/// repository does not touch image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub name: String,
    /// Human-supplied category label, normalized by the repository.
    pub category: String,
    pub image_name: String,
}

impl NewItem {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        image_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            image_name: image_name.into(),
        }
    }

    /// Validates write-side invariants.
    ///
    /// # Errors
    /// - [`ItemValidationError::EmptyName`] when `name` is blank.
    /// - [`ItemValidationError::EmptyCategory`] when `category` is blank.
    /// - [`ItemValidationError::EmptyImageName`] when `image_name` is blank.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.name.trim().is_empty() {
            return Err(ItemValidationError::EmptyName);
        }
        if self.category.trim().is_empty() {
            return Err(ItemValidationError::EmptyCategory);
        }
        if self.image_name.trim().is_empty() {
            return Err(ItemValidationError::EmptyImageName);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemValidationError {
    EmptyName,
    EmptyCategory,
    EmptyImageName,
}

impl ItemValidationError {
    /// Name of the offending field, as the caller layer spells it.
    pub fn field(self) -> &'static str {
        match self {
            Self::EmptyName => "name",
            Self::EmptyCategory => "category",
            Self::EmptyImageName => "image",
        }
    }
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} is required", self.field())
    }
}

impl Error for ItemValidationError {}
