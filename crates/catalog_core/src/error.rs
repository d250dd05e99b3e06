//! Caller-facing error taxonomy.
//!
//! # Responsibility
//! - Collapse repository and image-store failures into one error type for
//!   the service boundary.
//! - Map every failure to a stable [`ErrorKind`] and HTTP status so the
//!   transport layer stays a thin translation.

use crate::cancel::Cancelled;
use crate::image::ImageError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    CategoryNotFound,
    NotFound,
    InvalidPath,
    InvalidExtension,
    Storage,
    Cancelled,
}

impl ErrorKind {
    pub fn http_status(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Validation | Self::InvalidPath | Self::InvalidExtension => 400,
            Self::Storage | Self::CategoryNotFound => 500,
            Self::Cancelled => 503,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::CategoryNotFound => "category_not_found",
            Self::NotFound => "not_found",
            Self::InvalidPath => "invalid_path",
            Self::InvalidExtension => "invalid_extension",
            Self::Storage => "storage",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug)]
pub enum CatalogError {
    /// A required request field was absent or blank.
    ValidationInputMissing(&'static str),
    Repo(RepoError),
    Image(ImageError),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationInputMissing(_) => ErrorKind::Validation,
            Self::Repo(err) => match err {
                RepoError::Validation(_) => ErrorKind::Validation,
                RepoError::CategoryNotFound(_) => ErrorKind::CategoryNotFound,
                RepoError::NotFound(_) => ErrorKind::NotFound,
                RepoError::Cancelled(_) => ErrorKind::Cancelled,
                RepoError::Storage { .. }
                | RepoError::InvalidData(_)
                | RepoError::UninitializedConnection { .. }
                | RepoError::MissingRequiredTable(_)
                | RepoError::MissingRequiredColumn { .. } => ErrorKind::Storage,
            },
            Self::Image(err) => match err {
                ImageError::InvalidPath(_) => ErrorKind::InvalidPath,
                ImageError::InvalidExtension(_) => ErrorKind::InvalidExtension,
                ImageError::NotFound { .. } => ErrorKind::NotFound,
                ImageError::Io { .. } => ErrorKind::Storage,
                ImageError::Cancelled(_) => ErrorKind::Cancelled,
            },
        }
    }

    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ValidationInputMissing(field) => write!(f, "{field} is required"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Image(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ValidationInputMissing(_) => None,
            Self::Repo(err) => Some(err),
            Self::Image(err) => Some(err),
        }
    }
}

impl From<RepoError> for CatalogError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::ValidationInputMissing(err.field()),
            other => Self::Repo(other),
        }
    }
}

impl From<ImageError> for CatalogError {
    fn from(value: ImageError) -> Self {
        Self::Image(value)
    }
}

impl From<Cancelled> for CatalogError {
    fn from(value: Cancelled) -> Self {
        Self::Repo(RepoError::Cancelled(value))
    }
}
