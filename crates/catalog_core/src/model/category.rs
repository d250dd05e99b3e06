//! Category model and label normalization.
//!
//! # Invariants
//! - Normalized labels are trimmed and use single spaces between words.
//! - Label comparison is case-insensitive; the first stored spelling wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Storage-internal category identity.
pub type CategoryId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// How an unseen category label is handled during insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryPolicy {
    /// Unknown labels are created inside the insert transaction.
    #[default]
    LazyCreate,
    /// Labels must be seeded beforehand; unknown labels fail the insert.
    Strict,
}

impl CategoryPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LazyCreate => "lazy",
            Self::Strict => "strict",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lazy" | "lazy_create" | "lazy-create" => Some(Self::LazyCreate),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

/// Normalizes one category label.
///
/// Returns `None` when nothing but whitespace remains.
pub fn normalize_category_label(label: &str) -> Option<String> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(WHITESPACE_RE.replace_all(trimmed, " ").into_owned())
}
