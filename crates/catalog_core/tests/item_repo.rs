use catalog_core::db::migrations::latest_version;
use catalog_core::db::{open_db, open_db_in_memory};
use catalog_core::{
    CancelSignal, CategoryPolicy, ItemRepository, ItemValidationError, NewItem, RepoError,
    SqliteItemRepository,
};
use rusqlite::Connection;
use std::sync::Arc;

fn repo() -> SqliteItemRepository {
    SqliteItemRepository::try_new(open_db_in_memory().unwrap()).unwrap()
}

fn strict_repo() -> SqliteItemRepository {
    SqliteItemRepository::with_policy(open_db_in_memory().unwrap(), CategoryPolicy::Strict)
        .unwrap()
}

fn insert(repo: &SqliteItemRepository, name: &str, category: &str) -> catalog_core::Item {
    repo.insert(
        &NewItem::new(name, category, "default.jpg"),
        &CancelSignal::none(),
    )
    .unwrap()
}

fn count(conn_path: &std::path::Path, table: &str) -> i64 {
    let conn = Connection::open(conn_path).unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn insert_then_load_roundtrip() {
    let repo = repo();
    let image = catalog_core::content_file_name(b"jacket-bytes");

    let created = repo
        .insert(
            &NewItem::new("jacket", "fashion", image.as_str()),
            &CancelSignal::none(),
        )
        .unwrap();
    assert_eq!(created.name, "jacket");
    assert_eq!(created.category, "fashion");
    assert_eq!(created.image_name, image);

    let items = repo.load_items(&CancelSignal::none()).unwrap();
    assert_eq!(items, vec![created]);
}

#[test]
fn load_items_on_empty_catalog_is_empty() {
    let repo = repo();
    assert!(repo.load_items(&CancelSignal::none()).unwrap().is_empty());
}

#[test]
fn ids_are_monotonic_and_items_load_in_insertion_order() {
    let repo = repo();
    let first = insert(&repo, "coat", "fashion");
    let second = insert(&repo, "lamp", "home");
    let third = insert(&repo, "scarf", "fashion");
    assert!(first.id < second.id && second.id < third.id);

    let names: Vec<_> = repo
        .load_items(&CancelSignal::none())
        .unwrap()
        .into_iter()
        .map(|item| item.name)
        .collect();
    assert_eq!(names, ["coat", "lamp", "scarf"]);
}

#[test]
fn get_item_by_id_uses_stored_id_not_list_position() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    let repo = SqliteItemRepository::open(&path, CategoryPolicy::LazyCreate).unwrap();

    insert(&repo, "first", "misc");
    let second = insert(&repo, "second", "misc");
    insert(&repo, "third", "misc");

    // Knock the first row out behind the repository's back so list position
    // and id diverge.
    let conn = Connection::open(&path).unwrap();
    conn.execute("DELETE FROM items WHERE name = 'first';", [])
        .unwrap();

    let fetched = repo
        .get_item_by_id(second.id, &CancelSignal::none())
        .unwrap();
    assert_eq!(fetched.name, "second");
    assert_eq!(fetched.id, second.id);

    let positional = &repo.load_items(&CancelSignal::none()).unwrap()[1];
    assert_eq!(positional.name, "third");
}

#[test]
fn deleted_ids_are_never_reused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    let repo = SqliteItemRepository::open(&path, CategoryPolicy::LazyCreate).unwrap();

    let last = insert(&repo, "gone", "misc");
    Connection::open(&path)
        .unwrap()
        .execute("DELETE FROM items;", [])
        .unwrap();

    let next = insert(&repo, "fresh", "misc");
    assert!(next.id > last.id);
}

#[test]
fn get_item_by_id_missing_returns_not_found() {
    let repo = repo();
    insert(&repo, "coat", "fashion");

    let err = repo
        .get_item_by_id(999, &CancelSignal::none())
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(999)));
}

#[test]
fn search_is_case_insensitive_substring_in_storage_order() {
    let repo = repo();
    insert(&repo, "Jacket", "fashion");
    insert(&repo, "Coat", "fashion");
    insert(&repo, "jackets", "fashion");

    let names: Vec<_> = repo
        .search_items_by_name("jack", &CancelSignal::none())
        .unwrap()
        .into_iter()
        .map(|item| item.name)
        .collect();
    assert_eq!(names, ["Jacket", "jackets"]);

    let upper = repo
        .search_items_by_name("JACK", &CancelSignal::none())
        .unwrap();
    assert_eq!(upper.len(), 2);
}

#[test]
fn search_with_empty_keyword_matches_everything() {
    let repo = repo();
    insert(&repo, "Jacket", "fashion");
    insert(&repo, "Coat", "fashion");

    let all = repo.search_items_by_name("", &CancelSignal::none()).unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn search_treats_like_wildcards_literally() {
    let repo = repo();
    insert(&repo, "50% off jacket", "fashion");
    insert(&repo, "500 coats", "fashion");
    insert(&repo, "snake_case mug", "home");
    insert(&repo, "snakes mug", "home");

    let percent = repo.search_items_by_name("50%", &CancelSignal::none()).unwrap();
    assert_eq!(percent.len(), 1);
    assert_eq!(percent[0].name, "50% off jacket");

    let underscore = repo.search_items_by_name("e_c", &CancelSignal::none()).unwrap();
    assert_eq!(underscore.len(), 1);
    assert_eq!(underscore[0].name, "snake_case mug");
}

#[test]
fn lazy_policy_reuses_category_case_insensitively() {
    let repo = repo();
    let first = insert(&repo, "coat", "Fashion");
    let second = insert(&repo, "scarf", "  fashion ");

    assert_eq!(first.category, "Fashion");
    assert_eq!(second.category, "Fashion");

    let categories = repo.list_categories(&CancelSignal::none()).unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].name, "Fashion");
}

#[test]
fn category_labels_are_whitespace_normalized() {
    let repo = repo();
    let item = insert(&repo, "rake", " home   and\tgarden ");
    assert_eq!(item.category, "home and garden");
}

#[test]
fn strict_policy_rejects_unknown_category_and_leaves_no_rows() {
    let repo = strict_repo();

    let err = repo
        .insert(
            &NewItem::new("jacket", "fashion", "default.jpg"),
            &CancelSignal::none(),
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::CategoryNotFound(ref label) if label == "fashion"));

    assert!(repo.load_items(&CancelSignal::none()).unwrap().is_empty());
    assert!(repo.list_categories(&CancelSignal::none()).unwrap().is_empty());
}

#[test]
fn strict_policy_accepts_seeded_categories() {
    let repo = strict_repo();
    let seeded = repo
        .seed_categories(["Fashion", "home", " ", "FASHION"], &CancelSignal::none())
        .unwrap();
    let names: Vec<_> = seeded.into_iter().map(|category| category.name).collect();
    assert_eq!(names, ["Fashion", "home", "Fashion"]);

    let item = repo
        .insert(
            &NewItem::new("jacket", "fashion", "default.jpg"),
            &CancelSignal::none(),
        )
        .unwrap();
    assert_eq!(item.category, "Fashion");
    assert_eq!(repo.list_categories(&CancelSignal::none()).unwrap().len(), 2);
}

#[test]
fn failed_item_insert_rolls_back_lazily_created_category() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    let repo = SqliteItemRepository::open(&path, CategoryPolicy::LazyCreate).unwrap();

    Connection::open(&path)
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER reject_items BEFORE INSERT ON items
             BEGIN
                SELECT RAISE(ABORT, 'items are read-only');
             END;",
        )
        .unwrap();

    let err = repo
        .insert(
            &NewItem::new("jacket", "brand-new", "default.jpg"),
            &CancelSignal::none(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Storage {
            operation: "insert",
            ..
        }
    ));

    assert_eq!(count(&path, "items"), 0);
    assert_eq!(count(&path, "categories"), 0);
}

#[test]
fn insert_validates_before_touching_storage() {
    let repo = repo();

    let blank_name = repo
        .insert(&NewItem::new("  ", "fashion", "default.jpg"), &CancelSignal::none())
        .unwrap_err();
    assert!(matches!(
        blank_name,
        RepoError::Validation(ItemValidationError::EmptyName)
    ));

    let blank_category = repo
        .insert(&NewItem::new("coat", "\n", "default.jpg"), &CancelSignal::none())
        .unwrap_err();
    assert!(matches!(
        blank_category,
        RepoError::Validation(ItemValidationError::EmptyCategory)
    ));

    assert!(repo.list_categories(&CancelSignal::none()).unwrap().is_empty());
}

#[test]
fn cancelled_signal_aborts_before_any_write() {
    let repo = repo();
    let cancel = CancelSignal::new();
    cancel.cancel();

    let err = repo
        .insert(&NewItem::new("coat", "fashion", "default.jpg"), &cancel)
        .unwrap_err();
    assert!(matches!(err, RepoError::Cancelled(_)));

    assert!(matches!(
        repo.load_items(&cancel).unwrap_err(),
        RepoError::Cancelled(_)
    ));
    assert!(repo.load_items(&CancelSignal::none()).unwrap().is_empty());
}

#[test]
fn concurrent_inserts_of_one_new_category_create_it_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    let repo = Arc::new(SqliteItemRepository::open(&path, CategoryPolicy::LazyCreate).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|index| {
            let repo = Arc::clone(&repo);
            std::thread::spawn(move || {
                repo.insert(
                    &NewItem::new(format!("item-{index}"), "Shared", "default.jpg"),
                    &CancelSignal::none(),
                )
                .unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().category, "Shared");
    }

    assert_eq!(count(&path, "items"), 8);
    assert_eq!(count(&path, "categories"), 1);
}

#[test]
fn separate_handles_on_one_file_share_category_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    let first = SqliteItemRepository::open(&path, CategoryPolicy::LazyCreate).unwrap();
    let second = SqliteItemRepository::open(&path, CategoryPolicy::LazyCreate).unwrap();

    insert(&first, "coat", "fashion");
    let from_second = insert(&second, "scarf", "FASHION");
    assert_eq!(from_second.category, "fashion");
    assert_eq!(count(&path, "categories"), 1);
    assert_eq!(first.load_items(&CancelSignal::none()).unwrap().len(), 2);
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteItemRepository::try_new(conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_without_items_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE categories (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         PRAGMA user_version = {};",
        latest_version()
    ))
    .unwrap();

    assert!(matches!(
        SqliteItemRepository::try_new(conn),
        Err(RepoError::MissingRequiredTable("items"))
    ));
}

#[test]
fn repository_rejects_connection_missing_required_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE categories (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL, category_id INTEGER);
         PRAGMA user_version = {};",
        latest_version()
    ))
    .unwrap();

    assert!(matches!(
        SqliteItemRepository::try_new(conn),
        Err(RepoError::MissingRequiredColumn {
            table: "items",
            column: "image_name"
        })
    ));
}

#[test]
fn reopened_database_keeps_items() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    {
        let repo = SqliteItemRepository::open(&path, CategoryPolicy::LazyCreate).unwrap();
        insert(&repo, "coat", "fashion");
    }

    let repo = SqliteItemRepository::try_new(open_db(&path).unwrap()).unwrap();
    let items = repo.load_items(&CancelSignal::none()).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].category, "fashion");
}

#[test]
fn cancelled_seed_creates_no_categories() {
    let repo = strict_repo();
    let cancel = CancelSignal::new();
    cancel.cancel();

    let err = repo.seed_categories(["fashion"], &cancel).unwrap_err();
    assert!(matches!(err, RepoError::Cancelled(_)));
    assert!(repo.list_categories(&CancelSignal::none()).unwrap().is_empty());
}
