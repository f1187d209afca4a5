//! Task id interning for the graph arena.
//!
//! Task ids are opaque host strings; the graph stores nodes in a `Vec` and
//! refers to them by dense `u32` keys so adjacency lists stay small and
//! copying a snapshot copies flat vectors rather than a web of references.

use rustc_hash::FxHashMap;

/// Dense index of a task inside one graph snapshot.
pub type TaskKey = u32;

/// Bidirectional map between task id strings and arena keys.
///
/// Keys are handed out in insertion order, which makes every traversal
/// that iterates keys deterministic for a given input order.
#[derive(Debug, Clone, Default)]
pub struct TaskIdInterner {
    to_key: FxHashMap<String, TaskKey>,
    from_key: Vec<String>,
}

impl TaskIdInterner {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            to_key: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            from_key: Vec::with_capacity(capacity),
        }
    }

    /// Register a new id. Returns `None` if the id is already known.
    pub fn insert_unique(&mut self, id: &str) -> Option<TaskKey> {
        if self.to_key.contains_key(id) {
            return None;
        }
        let key = self.from_key.len() as TaskKey;
        self.from_key.push(id.to_string());
        self.to_key.insert(id.to_string(), key);
        Some(key)
    }

    #[inline]
    pub fn get(&self, id: &str) -> Option<TaskKey> {
        self.to_key.get(id).copied()
    }

    /// Resolve a key handed out by this interner.
    ///
    /// Keys never leave the graph that owns the interner, so an unknown key
    /// is an internal bug; it resolves to the empty string rather than panicking.
    #[inline]
    pub fn resolve(&self, key: TaskKey) -> &str {
        self.from_key
            .get(key as usize)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.from_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.from_key.is_empty()
    }

    /// Map a sequence of keys back to owned ids.
    pub fn resolve_all(&self, keys: &[TaskKey]) -> Vec<String> {
        keys.iter().map(|&k| self.resolve(k).to_string()).collect()
    }
}
