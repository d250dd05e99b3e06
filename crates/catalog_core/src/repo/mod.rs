//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the item capability set {insert, load, get-by-id, search}.
//! - Isolate SQLite and JSON-file details from the service layer.
//!
//! # Invariants
//! - Write paths validate [`NewItem`] before any mutation.
//! - Storage failures always name the operation that hit them.
//! - Exactly one implementation is active per repository handle, chosen at
//!   construction (see [`open_repository`]).

use crate::cancel::{CancelSignal, Cancelled};
use crate::config::{CatalogConfig, StorageBackend};
use crate::db::DbError;
use crate::model::item::{Item, ItemId, ItemValidationError, NewItem};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod json_repo;
pub mod sqlite_repo;

pub use json_repo::JsonItemRepository;
pub use sqlite_repo::SqliteItemRepository;

pub(crate) const OP_OPEN: &str = "open";
pub(crate) const OP_INSERT: &str = "insert";
pub(crate) const OP_LOAD_ITEMS: &str = "load_items";
pub(crate) const OP_GET_ITEM: &str = "get_item_by_id";
pub(crate) const OP_SEARCH: &str = "search_items_by_name";
pub(crate) const OP_LIST_CATEGORIES: &str = "list_categories";
pub(crate) const OP_SEED_CATEGORIES: &str = "seed_categories";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for item persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ItemValidationError),
    /// Strict policy: the label has not been seeded.
    CategoryNotFound(String),
    NotFound(ItemId),
    Storage {
        operation: &'static str,
        source: StorageFailure,
    },
    InvalidData(String),
    Cancelled(Cancelled),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

/// Low-level failure wrapped by [`RepoError::Storage`].
#[derive(Debug)]
pub enum StorageFailure {
    Db(DbError),
    Io(std::io::Error),
    Json(serde_json::Error),
    /// A previous holder of the store handle panicked mid-operation.
    LockPoisoned,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::CategoryNotFound(label) => write!(f, "category not found: `{label}`"),
            Self::NotFound(id) => write!(f, "item not found: {id}"),
            Self::Storage { operation, source } => {
                write!(f, "storage failure during {operation}: {source}")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted item data: {message}"),
            Self::Cancelled(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} is behind required {expected_version}; open it with db::open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage { source, .. } => Some(source),
            Self::Cancelled(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for StorageFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "malformed catalog file: {err}"),
            Self::LockPoisoned => write!(f, "store handle lock poisoned"),
        }
    }
}

impl Error for StorageFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::LockPoisoned => None,
        }
    }
}

impl From<ItemValidationError> for RepoError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<Cancelled> for RepoError {
    fn from(value: Cancelled) -> Self {
        Self::Cancelled(value)
    }
}

impl From<DbError> for StorageFailure {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageFailure {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<std::io::Error> for StorageFailure {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for StorageFailure {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Tags a low-level result with the repository operation it belongs to.
pub(crate) trait StorageContext<T> {
    fn during(self, operation: &'static str) -> RepoResult<T>;
}

impl<T, E: Into<StorageFailure>> StorageContext<T> for Result<T, E> {
    fn during(self, operation: &'static str) -> RepoResult<T> {
        self.map_err(|err| RepoError::Storage {
            operation,
            source: err.into(),
        })
    }
}

/// Repository interface for catalog items.
///
/// Implementations are shared across request threads, so every method takes
/// `&self` and must be safe to call concurrently.
pub trait ItemRepository: Send + Sync {
    /// Resolves the category and inserts the item atomically.
    ///
    /// Returns the materialized item with its store-assigned id and the
    /// canonical category name.
    fn insert(&self, item: &NewItem, cancel: &CancelSignal) -> RepoResult<Item>;

    /// Lists every item in insertion order. Empty catalogs yield an empty vec.
    fn load_items(&self, cancel: &CancelSignal) -> RepoResult<Vec<Item>>;

    /// Looks up one item by its stored id (never by list position).
    fn get_item_by_id(&self, id: ItemId, cancel: &CancelSignal) -> RepoResult<Item>;

    /// Case-insensitive substring match on item names, in insertion order.
    ///
    /// An empty keyword matches every item.
    fn search_items_by_name(&self, keyword: &str, cancel: &CancelSignal)
        -> RepoResult<Vec<Item>>;
}

impl<R: ItemRepository + ?Sized> ItemRepository for Box<R> {
    fn insert(&self, item: &NewItem, cancel: &CancelSignal) -> RepoResult<Item> {
        (**self).insert(item, cancel)
    }

    fn load_items(&self, cancel: &CancelSignal) -> RepoResult<Vec<Item>> {
        (**self).load_items(cancel)
    }

    fn get_item_by_id(&self, id: ItemId, cancel: &CancelSignal) -> RepoResult<Item> {
        (**self).get_item_by_id(id, cancel)
    }

    fn search_items_by_name(
        &self,
        keyword: &str,
        cancel: &CancelSignal,
    ) -> RepoResult<Vec<Item>> {
        (**self).search_items_by_name(keyword, cancel)
    }
}

impl<R: ItemRepository + ?Sized> ItemRepository for Arc<R> {
    fn insert(&self, item: &NewItem, cancel: &CancelSignal) -> RepoResult<Item> {
        (**self).insert(item, cancel)
    }

    fn load_items(&self, cancel: &CancelSignal) -> RepoResult<Vec<Item>> {
        (**self).load_items(cancel)
    }

    fn get_item_by_id(&self, id: ItemId, cancel: &CancelSignal) -> RepoResult<Item> {
        (**self).get_item_by_id(id, cancel)
    }

    fn search_items_by_name(
        &self,
        keyword: &str,
        cancel: &CancelSignal,
    ) -> RepoResult<Vec<Item>> {
        (**self).search_items_by_name(keyword, cancel)
    }
}

/// Opens the repository implementation selected by `config.backend`.
pub fn open_repository(config: &CatalogConfig) -> RepoResult<Box<dyn ItemRepository>> {
    match config.backend {
        StorageBackend::Sqlite => Ok(Box::new(SqliteItemRepository::open(
            &config.db_path,
            config.category_policy,
        )?)),
        StorageBackend::Json => Ok(Box::new(JsonItemRepository::new(
            &config.json_path,
            config.category_policy,
        ))),
    }
}

/// Case-insensitive (ASCII) substring test shared by non-SQL paths.
pub(crate) fn name_matches(name: &str, keyword: &str) -> bool {
    name.to_ascii_lowercase()
        .contains(&keyword.to_ascii_lowercase())
}
