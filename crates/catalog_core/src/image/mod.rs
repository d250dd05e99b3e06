//! Content-addressed image storage.
//!
//! # Responsibility
//! - Store uploaded image bytes under a name derived from their SHA-256.
//! - Resolve requested file names to safe on-disk paths, falling back to the
//!   pre-provisioned `default.jpg` when a file is missing.
//!
//! # Invariants
//! - Stored names are `<lowercase hex sha256>.jpg`; client file names are
//!   never used.
//! - An existing blob is never rewritten; identical bytes map to one file.
//! - `resolve` never yields a path outside the image directory.

use crate::cancel::{CancelSignal, Cancelled};
use log::debug;
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

pub const DEFAULT_IMAGE_NAME: &str = "default.jpg";
const STORED_EXTENSION: &str = ".jpg";
const ALLOWED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg"];

const OP_STORE: &str = "store_image";
const OP_RESOLVE: &str = "resolve_image";
const OP_PROVISION_DEFAULT: &str = "provision_default_image";

pub type ImageResult<T> = Result<T, ImageError>;

#[derive(Debug)]
pub enum ImageError {
    /// Requested name escapes the image directory or cannot be joined.
    InvalidPath(String),
    /// Requested name does not end in `.jpg` / `.jpeg` (case-sensitive).
    InvalidExtension(String),
    /// The candidate exists but cannot be inspected.
    NotFound {
        path: PathBuf,
        source: std::io::Error,
    },
    Io {
        operation: &'static str,
        source: std::io::Error,
    },
    Cancelled(Cancelled),
}

impl Display for ImageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPath(requested) => write!(f, "invalid image path: `{requested}`"),
            Self::InvalidExtension(requested) => write!(
                f,
                "image path does not end with .jpg or .jpeg: `{requested}`"
            ),
            Self::NotFound { path, source } => {
                write!(f, "image not found: {} ({source})", path.display())
            }
            Self::Io { operation, source } => write!(f, "{operation} failed: {source}"),
            Self::Cancelled(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound { source, .. } | Self::Io { source, .. } => Some(source),
            Self::Cancelled(err) => Some(err),
            Self::InvalidPath(_) | Self::InvalidExtension(_) => None,
        }
    }
}

impl From<Cancelled> for ImageError {
    fn from(value: Cancelled) -> Self {
        Self::Cancelled(value)
    }
}

fn io_error(operation: &'static str) -> impl FnOnce(std::io::Error) -> ImageError {
    move |source| ImageError::Io { operation, source }
}

/// Returns the content-addressed file name for `bytes`.
pub fn content_file_name(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{}{STORED_EXTENSION}", hex::encode(digest))
}

/// Filesystem-backed content-addressed image store.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Creates a store rooted at `dir`. Relative paths are resolved against
    /// the current working directory; the directory itself is created lazily.
    pub fn new(dir: impl AsRef<Path>) -> ImageResult<Self> {
        let dir = std::path::absolute(dir.as_ref()).map_err(io_error(OP_RESOLVE))?;
        Ok(Self {
            dir: normalize_lexically(&dir),
        })
    }

    pub fn image_dir(&self) -> &Path {
        &self.dir
    }

    pub fn default_image_path(&self) -> PathBuf {
        self.dir.join(DEFAULT_IMAGE_NAME)
    }

    /// Stores `bytes` and returns the content-derived file name.
    ///
    /// Storing identical bytes again is a no-op returning the same name.
    /// Writes go through a temp file renamed into place, so concurrent
    /// stores of the same content never expose a partial blob.
    pub fn store(&self, bytes: &[u8], cancel: &CancelSignal) -> ImageResult<String> {
        cancel.check(OP_STORE)?;
        let file_name = content_file_name(bytes);
        let target = self.dir.join(&file_name);

        std::fs::create_dir_all(&self.dir).map_err(io_error(OP_STORE))?;
        if target.is_file() {
            debug!("event=image_store module=image status=ok deduplicated=true file={file_name}");
            return Ok(file_name);
        }

        cancel.check(OP_STORE)?;
        write_atomically(&self.dir, &target, bytes, false).map_err(io_error(OP_STORE))?;
        debug!(
            "event=image_store module=image status=ok deduplicated=false file={file_name} bytes={}",
            bytes.len()
        );
        Ok(file_name)
    }

    /// Writes the fallback image when none is provisioned yet.
    ///
    /// Returns `true` when the file was written, `false` when one existed.
    pub fn ensure_default_image(
        &self,
        bytes: &[u8],
        cancel: &CancelSignal,
    ) -> ImageResult<bool> {
        cancel.check(OP_PROVISION_DEFAULT)?;
        let target = self.default_image_path();
        std::fs::create_dir_all(&self.dir).map_err(io_error(OP_PROVISION_DEFAULT))?;
        if target.exists() {
            return Ok(false);
        }
        cancel.check(OP_PROVISION_DEFAULT)?;
        match write_atomically(&self.dir, &target, bytes, true) {
            Ok(()) => Ok(true),
            // Lost a race with another provisioner; theirs stays.
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(io_error(OP_PROVISION_DEFAULT)(err)),
        }
    }

    /// Resolves a requested file name to a readable path inside the store.
    ///
    /// # Errors
    /// - [`ImageError::InvalidPath`] when the cleaned name is empty, absolute
    ///   or climbs out of the image directory (`../../etc/passwd`).
    /// - [`ImageError::InvalidExtension`] unless the name ends in `.jpg` or
    ///   `.jpeg` (case-sensitive).
    /// - [`ImageError::NotFound`] when the candidate cannot be inspected for
    ///   any reason other than not existing.
    ///
    /// A candidate that does not exist resolves to [`Self::default_image_path`].
    pub fn resolve(&self, requested: &str, cancel: &CancelSignal) -> ImageResult<PathBuf> {
        cancel.check(OP_RESOLVE)?;
        let relative = clean_relative(requested)
            .ok_or_else(|| ImageError::InvalidPath(requested.to_string()))?;
        let candidate = self.dir.join(&relative);
        if !candidate.starts_with(&self.dir) {
            return Err(ImageError::InvalidPath(requested.to_string()));
        }

        let has_allowed_extension = candidate
            .to_str()
            .is_some_and(|path| ALLOWED_EXTENSIONS.iter().any(|ext| path.ends_with(ext)));
        if !has_allowed_extension {
            return Err(ImageError::InvalidExtension(requested.to_string()));
        }

        match std::fs::metadata(&candidate) {
            Ok(_) => {
                debug!("event=image_resolve module=image status=ok fallback=false");
                Ok(candidate)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("event=image_resolve module=image status=ok fallback=true");
                Ok(self.default_image_path())
            }
            Err(source) => Err(ImageError::NotFound {
                path: candidate,
                source,
            }),
        }
    }
}

/// Collapses `.` and `..` in a requested name, relative to the store root.
///
/// Returns `None` when the name is empty after cleaning, is absolute, or
/// climbs above the root.
fn clean_relative(requested: &str) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(requested).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.iter().collect())
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

fn write_atomically(
    dir: &Path,
    target: &Path,
    bytes: &[u8],
    fail_if_exists: bool,
) -> std::io::Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    if fail_if_exists {
        tmp.persist_noclobber(target).map_err(|err| err.error)?;
    } else {
        tmp.persist(target).map_err(|err| err.error)?;
    }
    Ok(())
}
