use crate::domain::models::{Category, CategoryId};
use crate::infrastructure::error::InfraError;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Read-only category access. Levels feed the reward computation; emoji and
/// color feed event titles and occupancy rendering.
pub trait CategoryLookup: Send + Sync {
    fn get(&self, id: CategoryId) -> Result<Option<Category>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteCategoryStore {
    db_path: PathBuf,
}

impl SqliteCategoryStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl CategoryLookup for SqliteCategoryStore {
    fn get(&self, id: CategoryId) -> Result<Option<Category>, InfraError> {
        let connection = self.connect()?;
        let category = connection
            .query_row(
                "SELECT id, name, level, emoji, color FROM categories WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        level: row.get(2)?,
                        emoji: row.get(3)?,
                        color: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(category)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCategoryStore {
    categories: Mutex<HashMap<CategoryId, Category>>,
}

impl InMemoryCategoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, category: Category) {
        self.categories
            .lock()
            .expect("category lock poisoned")
            .insert(category.id, category);
    }
}

impl CategoryLookup for InMemoryCategoryStore {
    fn get(&self, id: CategoryId) -> Result<Option<Category>, InfraError> {
        let categories = self
            .categories
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("category lock poisoned: {error}")))?;
        Ok(categories.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::initialize_database;

    #[test]
    fn sqlite_lookup_returns_seeded_category() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("questcal.sqlite");
        initialize_database(&db_path).expect("schema");

        let connection = Connection::open(&db_path).expect("open");
        connection
            .execute(
                "INSERT INTO categories (id, name, level, emoji, color) VALUES (1, 'Fitness', 3, '💪', '#ff0000')",
                [],
            )
            .expect("seed category");

        let store = SqliteCategoryStore::new(&db_path);
        let category = store.get(1).expect("get").expect("category exists");
        assert_eq!(category.name, "Fitness");
        assert_eq!(category.level, 3);
        assert_eq!(category.emoji.as_deref(), Some("💪"));
        assert!(store.get(2).expect("get missing").is_none());
    }
}
