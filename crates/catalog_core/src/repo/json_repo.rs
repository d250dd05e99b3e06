//! JSON-file item repository.
//!
//! # Responsibility
//! - Persist the whole catalog as one array of item objects.
//! - Persist strict-mode category seeds in a sibling `<stem>.categories.json`.
//! - Offer the same capability set as the SQLite store for small deployments.
//!
//! # Invariants
//! - Both files are replaced atomically (temp file, fsync, rename); a crash
//!   mid-write leaves the previous contents intact.
//! - Ids are `max(id) + 1`; with no delete path they are never reused.
//! - Category is a plain string; labels match case-insensitively (ASCII) and
//!   the first stored spelling is canonical.
//! - A missing or empty file is an empty array.

use super::{
    name_matches, ItemRepository, RepoError, RepoResult, StorageContext, StorageFailure,
    OP_GET_ITEM, OP_INSERT, OP_LOAD_ITEMS, OP_SEARCH, OP_SEED_CATEGORIES,
};
use crate::cancel::CancelSignal;
use crate::model::category::{normalize_category_label, CategoryPolicy};
use crate::model::item::{Item, ItemId, ItemValidationError, NewItem};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;

/// JSON-file-backed item repository.
pub struct JsonItemRepository {
    path: PathBuf,
    categories_path: PathBuf,
    policy: CategoryPolicy,
    /// Serializes every file access made through this handle.
    io: Mutex<()>,
}

impl JsonItemRepository {
    pub fn new(path: impl AsRef<Path>, policy: CategoryPolicy) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            categories_path: path.with_extension("categories.json"),
            path,
            policy,
            io: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File holding seeded category labels, next to the item file.
    pub fn categories_path(&self) -> &Path {
        &self.categories_path
    }

    pub fn policy(&self) -> CategoryPolicy {
        self.policy
    }

    /// Registers category labels for strict mode and persists them.
    ///
    /// Returns the canonical label for every non-blank input, in input order.
    /// Labels already known (seeded or used by an item) are not duplicated.
    pub fn seed_categories<I, S>(
        &self,
        labels: I,
        cancel: &CancelSignal,
    ) -> RepoResult<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        cancel.check(OP_SEED_CATEGORIES)?;
        let _guard = self.lock(OP_SEED_CATEGORIES)?;
        let items: Vec<Item> = read_array(&self.path).during(OP_SEED_CATEGORIES)?;
        let mut seeded: Vec<String> =
            read_array(&self.categories_path).during(OP_SEED_CATEGORIES)?;
        let known_before = seeded.len();

        let mut canonical = Vec::new();
        for label in labels {
            let Some(label) = normalize_category_label(label.as_ref()) else {
                continue;
            };
            let name = match find_category(&seeded, &items, &label) {
                Some(existing) => existing,
                None => {
                    seeded.push(label.clone());
                    label
                }
            };
            canonical.push(name);
        }

        if seeded.len() != known_before {
            cancel.check(OP_SEED_CATEGORIES)?;
            write_array_atomically(&self.categories_path, &seeded).during(OP_SEED_CATEGORIES)?;
        }
        Ok(canonical)
    }

    fn lock(&self, operation: &'static str) -> RepoResult<MutexGuard<'_, ()>> {
        self.io.lock().map_err(|_| RepoError::Storage {
            operation,
            source: StorageFailure::LockPoisoned,
        })
    }

    fn read_locked(
        &self,
        operation: &'static str,
        cancel: &CancelSignal,
    ) -> RepoResult<Vec<Item>> {
        cancel.check(operation)?;
        let _guard = self.lock(operation)?;
        read_array(&self.path).during(operation)
    }
}

impl ItemRepository for JsonItemRepository {
    fn insert(&self, item: &NewItem, cancel: &CancelSignal) -> RepoResult<Item> {
        item.validate()?;
        let label = normalize_category_label(&item.category)
            .ok_or(RepoError::Validation(ItemValidationError::EmptyCategory))?;
        cancel.check(OP_INSERT)?;

        let _guard = self.lock(OP_INSERT)?;
        let mut items: Vec<Item> = read_array(&self.path).during(OP_INSERT)?;
        let seeded: Vec<String> = read_array(&self.categories_path).during(OP_INSERT)?;
        let category = match (find_category(&seeded, &items, &label), self.policy) {
            (Some(existing), _) => existing,
            (None, CategoryPolicy::LazyCreate) => label,
            (None, CategoryPolicy::Strict) => return Err(RepoError::CategoryNotFound(label)),
        };

        let max_id = items.iter().map(|existing| existing.id).max().unwrap_or(0);
        let id = max_id.checked_add(1).ok_or_else(|| {
            RepoError::InvalidData(format!("item id {max_id} leaves no room for a new id"))
        })?;
        let stored = Item {
            id,
            name: item.name.clone(),
            category,
            image_name: item.image_name.clone(),
        };
        items.push(stored.clone());
        cancel.check(OP_INSERT)?;

        write_array_atomically(&self.path, &items).during(OP_INSERT)?;
        Ok(stored)
    }

    fn load_items(&self, cancel: &CancelSignal) -> RepoResult<Vec<Item>> {
        let mut items = self.read_locked(OP_LOAD_ITEMS, cancel)?;
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    fn get_item_by_id(&self, id: ItemId, cancel: &CancelSignal) -> RepoResult<Item> {
        self.read_locked(OP_GET_ITEM, cancel)?
            .into_iter()
            .find(|item| item.id == id)
            .ok_or(RepoError::NotFound(id))
    }

    fn search_items_by_name(
        &self,
        keyword: &str,
        cancel: &CancelSignal,
    ) -> RepoResult<Vec<Item>> {
        let mut items = self.read_locked(OP_SEARCH, cancel)?;
        items.retain(|item| name_matches(&item.name, keyword));
        items.sort_by_key(|item| item.id);
        Ok(items)
    }
}

fn find_category(seeded: &[String], items: &[Item], label: &str) -> Option<String> {
    seeded
        .iter()
        .chain(items.iter().map(|item| &item.category))
        .find(|known| known.eq_ignore_ascii_case(label))
        .cloned()
}

fn read_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StorageFailure> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&raw)?)
}

fn write_array_atomically<T: Serialize>(path: &Path, values: &[T]) -> Result<(), StorageFailure> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, values)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
