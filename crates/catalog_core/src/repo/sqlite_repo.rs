//! SQLite-backed item repository.
//!
//! # Responsibility
//! - Persist items against normalized `categories`/`items` tables.
//! - Resolve category labels inside the same transaction as the item insert.
//!
//! # Invariants
//! - `insert` is all-or-nothing: a failure at any step rolls back both the
//!   item row and any category row created for it.
//! - Category names are unique case-insensitively (`COLLATE NOCASE`), so
//!   concurrent inserts of one new label never duplicate the category.
//! - Read paths join categories and return display names, never raw ids.

use super::{
    ItemRepository, RepoError, RepoResult, StorageContext, StorageFailure,
    OP_GET_ITEM, OP_INSERT, OP_LIST_CATEGORIES, OP_LOAD_ITEMS, OP_OPEN, OP_SEARCH,
    OP_SEED_CATEGORIES,
};
use crate::cancel::CancelSignal;
use crate::db::migrations::{current_version, latest_version};
use crate::db::open_db;
use crate::model::category::{normalize_category_label, Category, CategoryPolicy};
use crate::model::item::{Item, ItemId, ItemValidationError, NewItem};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const ITEM_SELECT_SQL: &str = "SELECT
    items.id AS id,
    items.name AS name,
    categories.name AS category,
    items.image_name AS image_name
FROM items
INNER JOIN categories ON categories.id = items.category_id";

const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("categories", &["id", "name"]),
    ("items", &["id", "name", "category_id", "image_name"]),
];

/// SQLite-backed item repository.
///
/// Owns its connection; share it across threads through `Arc`.
pub struct SqliteItemRepository {
    conn: Mutex<Connection>,
    policy: CategoryPolicy,
}

impl SqliteItemRepository {
    /// Wraps a migrated connection using the default lazy-create policy.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        Self::with_policy(conn, CategoryPolicy::default())
    }

    /// Wraps a migrated connection with an explicit category policy.
    ///
    /// # Errors
    /// - [`RepoError::UninitializedConnection`] when migrations were not applied.
    /// - [`RepoError::MissingRequiredTable`] / [`RepoError::MissingRequiredColumn`]
    ///   when the schema does not match this binary.
    pub fn with_policy(conn: Connection, policy: CategoryPolicy) -> RepoResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            policy,
        })
    }

    /// Opens (and migrates) a database file, then wraps it.
    pub fn open(path: impl AsRef<Path>, policy: CategoryPolicy) -> RepoResult<Self> {
        let conn = open_db(path).during(OP_OPEN)?;
        Self::with_policy(conn, policy)
    }

    pub fn policy(&self) -> CategoryPolicy {
        self.policy
    }

    /// Pre-seeds category labels. Existing labels are left untouched.
    ///
    /// Returns the canonical category for every non-blank input label, in
    /// input order. Runs in one transaction.
    pub fn seed_categories<I, S>(
        &self,
        labels: I,
        cancel: &CancelSignal,
    ) -> RepoResult<Vec<Category>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        cancel.check(OP_SEED_CATEGORIES)?;
        let mut conn = self.lock(OP_SEED_CATEGORIES)?;
        let tx = conn.transaction().during(OP_SEED_CATEGORIES)?;
        let mut seeded = Vec::new();
        for label in labels {
            let Some(label) = normalize_category_label(label.as_ref()) else {
                continue;
            };
            let category = resolve_category(&tx, &label, CategoryPolicy::LazyCreate)
                .map_err(|err| retag(err, OP_SEED_CATEGORIES))?;
            seeded.push(category);
        }
        cancel.check(OP_SEED_CATEGORIES)?;
        tx.commit().during(OP_SEED_CATEGORIES)?;
        Ok(seeded)
    }

    /// Lists all categories ordered by id.
    pub fn list_categories(&self, cancel: &CancelSignal) -> RepoResult<Vec<Category>> {
        cancel.check(OP_LIST_CATEGORIES)?;
        let conn = self.lock(OP_LIST_CATEGORIES)?;
        let mut stmt = conn
            .prepare("SELECT id, name FROM categories ORDER BY id ASC;")
            .during(OP_LIST_CATEGORIES)?;
        let mut rows = stmt.query([]).during(OP_LIST_CATEGORIES)?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next().during(OP_LIST_CATEGORIES)? {
            cancel.check(OP_LIST_CATEGORIES)?;
            categories.push(parse_category_row(row).during(OP_LIST_CATEGORIES)?);
        }
        Ok(categories)
    }

    fn lock(&self, operation: &'static str) -> RepoResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RepoError::Storage {
            operation,
            source: StorageFailure::LockPoisoned,
        })
    }

    fn query_items(
        &self,
        operation: &'static str,
        sql: &str,
        params: impl rusqlite::Params,
        cancel: &CancelSignal,
    ) -> RepoResult<Vec<Item>> {
        cancel.check(operation)?;
        let conn = self.lock(operation)?;
        let mut stmt = conn.prepare(sql).during(operation)?;
        let mut rows = stmt.query(params).during(operation)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().during(operation)? {
            cancel.check(operation)?;
            items.push(ensure_valid(parse_item_row(row).during(operation)?)?);
        }
        Ok(items)
    }
}

impl ItemRepository for SqliteItemRepository {
    fn insert(&self, item: &NewItem, cancel: &CancelSignal) -> RepoResult<Item> {
        item.validate()?;
        let label = normalize_category_label(&item.category)
            .ok_or(RepoError::Validation(ItemValidationError::EmptyCategory))?;
        cancel.check(OP_INSERT)?;

        let mut conn = self.lock(OP_INSERT)?;
        // IMMEDIATE takes the write lock up front so the category lookup and
        // the item insert observe the same snapshot.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .during(OP_INSERT)?;

        let category = resolve_category(&tx, &label, self.policy)?;
        cancel.check(OP_INSERT)?;

        tx.execute(
            "INSERT INTO items (name, category_id, image_name) VALUES (?1, ?2, ?3);",
            params![item.name.as_str(), category.id, item.image_name.as_str()],
        )
        .during(OP_INSERT)?;
        let id = tx.last_insert_rowid();

        let stored = tx
            .query_row(
                &format!("{ITEM_SELECT_SQL} WHERE items.id = ?1;"),
                [id],
                parse_item_row,
            )
            .during(OP_INSERT)?;
        cancel.check(OP_INSERT)?;

        tx.commit().during(OP_INSERT)?;
        Ok(stored)
    }

    fn load_items(&self, cancel: &CancelSignal) -> RepoResult<Vec<Item>> {
        self.query_items(
            OP_LOAD_ITEMS,
            &format!("{ITEM_SELECT_SQL} ORDER BY items.id ASC;"),
            [],
            cancel,
        )
    }

    fn get_item_by_id(&self, id: ItemId, cancel: &CancelSignal) -> RepoResult<Item> {
        let mut found = self.query_items(
            OP_GET_ITEM,
            &format!("{ITEM_SELECT_SQL} WHERE items.id = ?1;"),
            [id],
            cancel,
        )?;
        found.pop().ok_or(RepoError::NotFound(id))
    }

    fn search_items_by_name(
        &self,
        keyword: &str,
        cancel: &CancelSignal,
    ) -> RepoResult<Vec<Item>> {
        // LIKE folds ASCII case only, the same rule the JSON store applies.
        let pattern = format!("%{}%", escape_like(keyword));
        self.query_items(
            OP_SEARCH,
            &format!(
                "{ITEM_SELECT_SQL} WHERE items.name LIKE ?1 ESCAPE '\\' ORDER BY items.id ASC;"
            ),
            [pattern],
            cancel,
        )
    }
}

fn resolve_category(
    conn: &Connection,
    label: &str,
    policy: CategoryPolicy,
) -> RepoResult<Category> {
    if policy == CategoryPolicy::LazyCreate {
        conn.execute(
            "INSERT OR IGNORE INTO categories (name) VALUES (?1);",
            [label],
        )
        .during(OP_INSERT)?;
    }

    conn.query_row(
        "SELECT id, name FROM categories WHERE name = ?1;",
        [label],
        parse_category_row,
    )
    .optional()
    .during(OP_INSERT)?
    .ok_or_else(|| RepoError::CategoryNotFound(label.to_string()))
}

fn retag(err: RepoError, operation: &'static str) -> RepoError {
    match err {
        RepoError::Storage { source, .. } => RepoError::Storage { operation, source },
        other => other,
    }
}

fn parse_item_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get("id")?,
        name: row.get("name")?,
        category: row.get("category")?,
        image_name: row.get("image_name")?,
    })
}

fn ensure_valid(item: Item) -> RepoResult<Item> {
    if item.name.trim().is_empty() {
        return Err(RepoError::InvalidData(format!(
            "item {} has an empty name in items.name",
            item.id
        )));
    }
    Ok(item)
}

fn parse_category_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let actual_version = current_version(conn).during(OP_OPEN)?;
    let expected_version = latest_version();
    if actual_version < expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for (table, columns) in REQUIRED_COLUMNS {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(*table));
        }
        for column in *columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn {
                    table: *table,
                    column: *column,
                });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )
        .during(OP_OPEN)?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table});"))
        .during(OP_OPEN)?;
    let mut rows = stmt.query([]).during(OP_OPEN)?;
    while let Some(row) = rows.next().during(OP_OPEN)? {
        let current: String = row.get(1).during(OP_OPEN)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("jack"), "jack");
    }
}
