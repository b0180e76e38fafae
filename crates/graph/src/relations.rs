use crate::lenient;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// File-level relations written by the indexer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationRecord {
    #[serde(default, deserialize_with = "lenient::string_list", skip_serializing_if = "Option::is_none")]
    pub import_links: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::string_list", skip_serializing_if = "Option::is_none")]
    pub usages: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::string_list", skip_serializing_if = "Option::is_none")]
    pub exports: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::string_list", skip_serializing_if = "Option::is_none")]
    pub imports: Option<Vec<String>>,
}

/// File path -> relations. Treated as immutable once shared behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileRelationsStore {
    entries: HashMap<String, RelationRecord>,
}

impl FileRelationsStore {
    pub fn new(entries: HashMap<String, RelationRecord>) -> Self {
        Self { entries }
    }

    pub fn get(&self, file: &str) -> Option<&RelationRecord> {
        self.entries.get(file)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, RelationRecord)> for FileRelationsStore {
    fn from_iter<I: IntoIterator<Item = (String, RelationRecord)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Outcome of a relation lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationLookup<'a> {
    Found(&'a RelationRecord),
    Missing,
    /// Several differently-cased paths collide with different records.
    Ambiguous,
}

impl<'a> RelationLookup<'a> {
    pub fn found(self) -> Option<&'a RelationRecord> {
        match self {
            Self::Found(record) => Some(record),
            Self::Missing | Self::Ambiguous => None,
        }
    }
}

#[derive(Debug, Clone)]
enum LowerEntry {
    Unique(String),
    Ambiguous,
}

struct LowerIndex {
    store: Weak<FileRelationsStore>,
    entries: HashMap<String, LowerEntry>,
}

impl LowerIndex {
    fn build(store: &Arc<FileRelationsStore>) -> Self {
        let mut entries: HashMap<String, LowerEntry> = HashMap::with_capacity(store.len());
        // Sorted so the surviving original key does not depend on hash order.
        let mut keys: Vec<&String> = store.entries.keys().collect();
        keys.sort();

        for key in keys {
            let lower = key.to_lowercase();
            match entries.get(&lower) {
                None => {
                    entries.insert(lower, LowerEntry::Unique(key.clone()));
                }
                Some(LowerEntry::Unique(existing)) => {
                    if store.entries.get(existing) != store.entries.get(key) {
                        entries.insert(lower, LowerEntry::Ambiguous);
                    }
                }
                Some(LowerEntry::Ambiguous) => {}
            }
        }

        let ambiguous = entries
            .values()
            .filter(|e| matches!(e, LowerEntry::Ambiguous))
            .count();
        if ambiguous > 0 {
            log::debug!(
                "File relations index has {} ambiguous case-insensitive paths",
                ambiguous
            );
        }

        Self {
            store: Arc::downgrade(store),
            entries,
        }
    }
}

/// Case-policy aware lookup of file relations.
///
/// The lower-cased index is built lazily once per store instance and memoized by
/// `Arc` identity. Replacing the store (a new `Arc`) forces a rebuild; mutating a
/// store in place is not supported.
#[derive(Default)]
pub struct RelationResolver {
    memo: Vec<LowerIndex>,
}

impl RelationResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve_file_relations<'a>(
        &mut self,
        store: &'a Arc<FileRelationsStore>,
        file_path: &str,
        case_sensitive: bool,
    ) -> Option<&'a RelationRecord> {
        self.lookup(store, file_path, case_sensitive).found()
    }

    pub fn lookup<'a>(
        &mut self,
        store: &'a Arc<FileRelationsStore>,
        file_path: &str,
        case_sensitive: bool,
    ) -> RelationLookup<'a> {
        if file_path.is_empty() {
            return RelationLookup::Missing;
        }
        if let Some(record) = store.get(file_path) {
            return RelationLookup::Found(record);
        }
        if case_sensitive {
            return RelationLookup::Missing;
        }

        let index = self.index_for(store);
        match index.entries.get(&file_path.to_lowercase()) {
            Some(LowerEntry::Unique(original)) => store
                .get(original)
                .map_or(RelationLookup::Missing, RelationLookup::Found),
            Some(LowerEntry::Ambiguous) => RelationLookup::Ambiguous,
            None => RelationLookup::Missing,
        }
    }

    /// Number of stores with a live memoized index.
    pub fn memoized_stores(&self) -> usize {
        self.memo.iter().filter(|i| i.store.strong_count() > 0).count()
    }

    fn index_for(&mut self, store: &Arc<FileRelationsStore>) -> &LowerIndex {
        let needle = Arc::downgrade(store);
        if let Some(pos) = self.memo.iter().position(|i| i.store.ptr_eq(&needle)) {
            return &self.memo[pos];
        }

        self.memo.retain(|i| i.store.strong_count() > 0);
        log::debug!("Building case-insensitive relations index ({} files)", store.len());
        self.memo.push(LowerIndex::build(store));
        let last = self.memo.len() - 1;
        &self.memo[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(link: &str) -> RelationRecord {
        RelationRecord {
            import_links: Some(vec![link.to_string()]),
            ..RelationRecord::default()
        }
    }

    fn store(entries: &[(&str, RelationRecord)]) -> Arc<FileRelationsStore> {
        Arc::new(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_exact_match_wins() {
        let store = store(&[("src/App.ts", record("a"))]);
        let mut resolver = RelationResolver::new();
        assert_eq!(
            resolver.resolve_file_relations(&store, "src/App.ts", true),
            Some(&record("a"))
        );
        assert_eq!(resolver.memoized_stores(), 0);
    }

    #[test]
    fn test_case_sensitive_miss_is_none() {
        let store = store(&[("src/App.ts", record("a"))]);
        let mut resolver = RelationResolver::new();
        assert_eq!(resolver.resolve_file_relations(&store, "src/app.ts", true), None);
        assert_eq!(
            resolver.resolve_file_relations(&store, "src/app.ts", false),
            Some(&record("a"))
        );
    }

    #[test]
    fn test_colliding_keys_are_ambiguous() {
        let store = store(&[("src/App.ts", record("a")), ("src/app.TS", record("b"))]);
        let mut resolver = RelationResolver::new();

        assert_eq!(resolver.resolve_file_relations(&store, "src/app.ts", false), None);
        assert_eq!(
            resolver.lookup(&store, "SRC/APP.TS", false),
            RelationLookup::Ambiguous
        );
        assert_eq!(
            resolver.resolve_file_relations(&store, "src/App.ts", false),
            Some(&record("a"))
        );
        assert_eq!(
            resolver.resolve_file_relations(&store, "src/app.TS", false),
            Some(&record("b"))
        );
    }

    #[test]
    fn test_colliding_keys_with_equal_records_resolve() {
        let store = store(&[("src/App.ts", record("a")), ("src/app.TS", record("a"))]);
        let mut resolver = RelationResolver::new();
        assert_eq!(
            resolver.resolve_file_relations(&store, "src/app.ts", false),
            Some(&record("a"))
        );
    }

    #[test]
    fn test_new_store_instance_rebuilds_index() {
        let mut resolver = RelationResolver::new();
        let first = store(&[("A.rs", record("one"))]);
        assert!(resolver.resolve_file_relations(&first, "a.rs", false).is_some());
        assert_eq!(resolver.memoized_stores(), 1);

        let second = store(&[("B.rs", record("two"))]);
        assert_eq!(resolver.resolve_file_relations(&second, "a.rs", false), None);
        assert_eq!(
            resolver.resolve_file_relations(&second, "b.rs", false),
            Some(&record("two"))
        );
        assert_eq!(resolver.memoized_stores(), 2);

        drop(first);
        let third = store(&[("C.rs", record("three"))]);
        assert!(resolver.resolve_file_relations(&third, "c.rs", false).is_some());
        assert_eq!(resolver.memoized_stores(), 2);
    }

    #[test]
    fn test_empty_path_is_missing() {
        let store = store(&[("", record("a"))]);
        let mut resolver = RelationResolver::new();
        assert_eq!(resolver.lookup(&store, "", false), RelationLookup::Missing);
    }
}
