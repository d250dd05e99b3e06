//! Core domain logic for the item catalog.
//! This crate is the single source of truth for catalog invariants:
//! content-addressed images and transactional item/category persistence.

pub mod cancel;
pub mod config;
pub mod db;
pub mod error;
pub mod image;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use cancel::{CancelSignal, Cancelled};
pub use config::{CatalogConfig, ConfigError, StorageBackend};
pub use error::{CatalogError, CatalogResult, ErrorKind};
pub use image::{content_file_name, ImageError, ImageResult, ImageStore, DEFAULT_IMAGE_NAME};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::category::{normalize_category_label, Category, CategoryId, CategoryPolicy};
pub use model::item::{Item, ItemId, ItemValidationError, NewItem};
pub use repo::{
    open_repository, ItemRepository, JsonItemRepository, RepoError, RepoResult,
    SqliteItemRepository, StorageFailure,
};
pub use service::catalog_service::{CatalogService, NewItemRequest};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
