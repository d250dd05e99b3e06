use catalog_core::{content_file_name, CancelSignal, ImageError, ImageStore, DEFAULT_IMAGE_NAME};

fn store() -> (tempfile::TempDir, ImageStore) {
    let dir = tempfile::tempdir().unwrap();
    let images = ImageStore::new(dir.path().join("images")).unwrap();
    (dir, images)
}

#[test]
fn store_names_file_by_content_hash() {
    let (_dir, images) = store();

    let name = images.store(b"jacket-bytes", &CancelSignal::none()).unwrap();
    assert_eq!(name, content_file_name(b"jacket-bytes"));
    assert_eq!(name.len(), 64 + ".jpg".len());
    assert!(name.ends_with(".jpg"));

    let written = std::fs::read(images.image_dir().join(&name)).unwrap();
    assert_eq!(written, b"jacket-bytes");
}

#[test]
fn storing_identical_bytes_is_idempotent() {
    let (_dir, images) = store();

    let first = images.store(b"same", &CancelSignal::none()).unwrap();
    let second = images.store(b"same", &CancelSignal::none()).unwrap();
    assert_eq!(first, second);

    let files = std::fs::read_dir(images.image_dir()).unwrap().count();
    assert_eq!(files, 1);
}

#[test]
fn different_bytes_get_different_names() {
    let (_dir, images) = store();

    let first = images.store(b"one", &CancelSignal::none()).unwrap();
    let second = images.store(b"two", &CancelSignal::none()).unwrap();
    assert_ne!(first, second);
}

#[test]
fn resolve_returns_existing_file() {
    let (_dir, images) = store();
    let name = images.store(b"coat", &CancelSignal::none()).unwrap();

    let path = images.resolve(&name, &CancelSignal::none()).unwrap();
    assert_eq!(path, images.image_dir().join(&name));
}

#[test]
fn resolve_accepts_jpeg_and_inner_dot_segments() {
    let (_dir, images) = store();
    std::fs::create_dir_all(images.image_dir()).unwrap();
    std::fs::write(images.image_dir().join("photo.jpeg"), b"x").unwrap();

    let path = images
        .resolve("nested/../photo.jpeg", &CancelSignal::none())
        .unwrap();
    assert_eq!(path, images.image_dir().join("photo.jpeg"));
}

#[test]
fn resolve_missing_file_falls_back_to_default() {
    let (_dir, images) = store();

    let path = images.resolve("missing.jpg", &CancelSignal::none()).unwrap();
    assert_eq!(path, images.default_image_path());
    assert!(path.ends_with(DEFAULT_IMAGE_NAME));
}

#[test]
fn resolve_rejects_traversal() {
    let (_dir, images) = store();

    for requested in ["../../etc/passwd", "../secret.jpg", "a/../../b.jpg"] {
        let err = images
            .resolve(requested, &CancelSignal::none())
            .unwrap_err();
        assert!(
            matches!(err, ImageError::InvalidPath(ref value) if value == requested),
            "{requested}: {err}"
        );
    }
}

#[test]
fn resolve_rejects_absolute_and_empty_names() {
    let (_dir, images) = store();

    assert!(matches!(
        images.resolve("/etc/cover.jpg", &CancelSignal::none()),
        Err(ImageError::InvalidPath(_))
    ));
    assert!(matches!(
        images.resolve("", &CancelSignal::none()),
        Err(ImageError::InvalidPath(_))
    ));
}

#[test]
fn resolve_rejects_other_extensions_case_sensitively() {
    let (_dir, images) = store();

    for requested in ["x.png", "x.JPG", "x.Jpeg", "jpg"] {
        let err = images
            .resolve(requested, &CancelSignal::none())
            .unwrap_err();
        assert!(
            matches!(err, ImageError::InvalidExtension(_)),
            "{requested}: {err}"
        );
    }
}

#[test]
fn ensure_default_image_never_overwrites() {
    let (_dir, images) = store();

    assert!(images
        .ensure_default_image(b"first", &CancelSignal::none())
        .unwrap());
    assert!(!images
        .ensure_default_image(b"second", &CancelSignal::none())
        .unwrap());
    assert_eq!(
        std::fs::read(images.default_image_path()).unwrap(),
        b"first"
    );
}

#[test]
fn relative_dirs_are_made_absolute() {
    let images = ImageStore::new("images/./sub/..").unwrap();
    assert!(images.image_dir().is_absolute());
    assert!(images.image_dir().ends_with("images"));
}

#[test]
fn cancelled_store_writes_nothing() {
    let (_dir, images) = store();
    let cancel = CancelSignal::new();
    cancel.cancel();

    assert!(matches!(
        images.store(b"late", &cancel),
        Err(ImageError::Cancelled(_))
    ));
    assert!(!images.image_dir().exists());
}

#[test]
fn resolve_reports_uninspectable_candidate_as_not_found() {
    let (_dir, images) = store();
    let blob = images.store(b"flat file", &CancelSignal::none()).unwrap();

    // The stored blob is a file, so it cannot be walked into as a directory.
    let err = images
        .resolve(&format!("{blob}/inner.jpg"), &CancelSignal::none())
        .unwrap_err();
    assert!(
        matches!(err, ImageError::NotFound { ref path, .. } if path.ends_with("inner.jpg")),
        "{err}"
    );
}

#[test]
fn cancelled_default_provisioning_writes_nothing() {
    let (_dir, images) = store();
    let cancel = CancelSignal::new();
    cancel.cancel();

    assert!(matches!(
        images.ensure_default_image(b"fallback", &cancel),
        Err(ImageError::Cancelled(_))
    ));
    assert!(!images.default_image_path().exists());
}
