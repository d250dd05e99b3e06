//! Catalog use-case service.
//!
//! # Responsibility
//! - Provide the entry points a transport layer calls: add, list, get,
//!   search and image lookup.
//! - Validate required request fields before touching storage.
//!
//! # Invariants
//! - The image is stored before the item row, so a persisted item never
//!   names a blob that failed to write. A blob whose insert later fails is
//!   left behind; content addressing makes it harmless.
//! - Service APIs never bypass repository validation/persistence contracts.

use crate::cancel::CancelSignal;
use crate::config::CatalogConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::image::ImageStore;
use crate::model::item::{Item, ItemId, NewItem};
use crate::repo::{open_repository, ItemRepository};
use std::path::PathBuf;

/// Request model for adding an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItemRequest {
    pub name: String,
    pub category: String,
    /// Raw uploaded image bytes.
    pub image: Vec<u8>,
}

/// Use-case service over one repository and one image store.
pub struct CatalogService<R: ItemRepository> {
    repo: R,
    images: ImageStore,
}

impl CatalogService<Box<dyn ItemRepository>> {
    /// Builds a service from configuration, selecting the storage backend.
    pub fn from_config(config: &CatalogConfig) -> CatalogResult<Self> {
        let repo = open_repository(config)?;
        let images = ImageStore::new(&config.image_dir)?;
        Ok(Self::new(repo, images))
    }
}

impl<R: ItemRepository> CatalogService<R> {
    pub fn new(repo: R, images: ImageStore) -> Self {
        Self { repo, images }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn image_store(&self) -> &ImageStore {
        &self.images
    }

    /// Stores the image, then inserts the item referencing it.
    ///
    /// # Errors
    /// - [`CatalogError::ValidationInputMissing`] for a blank name or
    ///   category, or empty image bytes.
    /// - Image-store and repository failures otherwise.
    pub fn add_item(
        &self,
        request: &NewItemRequest,
        cancel: &CancelSignal,
    ) -> CatalogResult<Item> {
        if request.name.trim().is_empty() {
            return Err(CatalogError::ValidationInputMissing("name"));
        }
        if request.category.trim().is_empty() {
            return Err(CatalogError::ValidationInputMissing("category"));
        }
        if request.image.is_empty() {
            return Err(CatalogError::ValidationInputMissing("image"));
        }

        let image_name = self.images.store(&request.image, cancel)?;
        let item = NewItem::new(
            request.name.as_str(),
            request.category.as_str(),
            image_name,
        );
        Ok(self.repo.insert(&item, cancel)?)
    }

    pub fn load_items(&self, cancel: &CancelSignal) -> CatalogResult<Vec<Item>> {
        Ok(self.repo.load_items(cancel)?)
    }

    pub fn get_item_by_id(&self, id: ItemId, cancel: &CancelSignal) -> CatalogResult<Item> {
        Ok(self.repo.get_item_by_id(id, cancel)?)
    }

    /// Searches item names. Unlike the repository, a blank keyword is
    /// rejected here, as the transport contract requires one.
    pub fn search_items_by_name(
        &self,
        keyword: &str,
        cancel: &CancelSignal,
    ) -> CatalogResult<Vec<Item>> {
        if keyword.trim().is_empty() {
            return Err(CatalogError::ValidationInputMissing("keyword"));
        }
        Ok(self.repo.search_items_by_name(keyword, cancel)?)
    }

    /// Resolves `/images/{filename}` to the file to stream back.
    pub fn get_image(&self, filename: &str, cancel: &CancelSignal) -> CatalogResult<PathBuf> {
        if filename.is_empty() {
            return Err(CatalogError::ValidationInputMissing("filename"));
        }
        Ok(self.images.resolve(filename, cancel)?)
    }
}
