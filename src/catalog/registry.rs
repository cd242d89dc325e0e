/// Relation registry keyed by table name
use crate::error::{EngineError, Result};
use crate::storage::Relation;
use crate::types::Table;
use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Engine-wide catalog.
///
/// The mutex is held only for the lookup, insertion or removal itself.
/// Callers clone the `Arc<Relation>` out and lock the relation afterwards,
/// never while the catalog lock is held.
#[derive(Default)]
pub struct Catalog {
    relations: Mutex<AHashMap<String, Arc<Relation>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new relation for `table`.
    pub fn create(&self, table: Table) -> Result<Arc<Relation>> {
        let mut relations = self.relations.lock();
        if relations.contains_key(&table.name) {
            return Err(EngineError::TableExists(table.name));
        }
        let relation = Arc::new(Relation::new(table));
        relations.insert(relation.name().to_string(), Arc::clone(&relation));
        Ok(relation)
    }

    pub fn get(&self, name: &str) -> Result<Arc<Relation>> {
        self.relations
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::TableNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.relations.lock().contains_key(name)
    }

    /// Remove a relation. Statements already holding it finish normally.
    pub fn drop_relation(&self, name: &str) -> Result<Arc<Relation>> {
        self.relations
            .lock()
            .remove(name)
            .ok_or_else(|| EngineError::TableNotFound(name.to_string()))
    }

    /// Table names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.relations.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Attribute;

    fn table(name: &str) -> Table {
        Table::new(name, vec![Attribute::new("id", "int")]).unwrap()
    }

    #[test]
    fn test_create_get_drop() {
        let catalog = Catalog::new();
        catalog.create(table("b")).unwrap();
        catalog.create(table("a")).unwrap();
        assert_eq!(catalog.names(), vec!["a", "b"]);
        assert!(matches!(catalog.create(table("a")), Err(EngineError::TableExists(_))));

        let relation = catalog.get("a").unwrap();
        assert_eq!(relation.name(), "a");

        catalog.drop_relation("a").unwrap();
        assert!(!catalog.contains("a"));
        assert!(matches!(catalog.get("a"), Err(EngineError::TableNotFound(_))));
        assert!(matches!(catalog.drop_relation("a"), Err(EngineError::TableNotFound(_))));
    }
}
