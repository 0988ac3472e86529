// ── Generic reactive entity collection ──
//
// Lock-free concurrent storage with O(1) lookups and push-based
// change notification via `watch` channels.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// A lock-free, reactive collection keyed by string.
///
/// Every mutation rebuilds the sorted snapshot that subscribers receive.
pub(crate) struct EntityCollection<T: Clone + Send + Sync + 'static> {
    by_key: DashMap<String, Arc<T>>,

    /// Full snapshot in key order, rebuilt on mutation.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_key: DashMap::new(),
            snapshot,
        }
    }

    /// Insert or update an entity. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: String, entity: T) -> bool {
        let is_new = self.by_key.insert(key, Arc::new(entity)).is_none();
        self.rebuild_snapshot();
        is_new
    }

    /// Apply `f` to a copy of the entity under `key` and store the result.
    /// Returns `false` if the key is unknown.
    pub(crate) fn update(&self, key: &str, f: impl FnOnce(&mut T)) -> bool {
        let updated = match self.by_key.get_mut(key) {
            Some(mut entry) => {
                let mut value = T::clone(entry.value());
                f(&mut value);
                *entry = Arc::new(value);
                true
            }
            None => false,
        };
        if updated {
            self.rebuild_snapshot();
        }
        updated
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    /// All current keys, sorted.
    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.by_key.iter().map(|r| r.key().clone()).collect();
        keys.sort_unstable();
        keys
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebuild_snapshot(&self) {
        let mut entries: Vec<(String, Arc<T>)> = self
            .by_key
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        let values = entries.into_iter().map(|(_, v)| v).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn upsert_returns_true_for_new_key() {
        let col: EntityCollection<String> = EntityCollection::new();
        assert!(col.upsert("key1".into(), "hello".into()));
        assert!(!col.upsert("key1".into(), "world".into()));
        assert_eq!(*col.get("key1").unwrap(), "world");
    }

    #[test]
    fn update_rewrites_existing_only() {
        let col: EntityCollection<String> = EntityCollection::new();
        assert!(!col.update("missing", |s| s.push('!')));
        col.upsert("a".into(), "x".into());
        assert!(col.update("a", |s| s.push('!')));
        assert_eq!(*col.get("a").unwrap(), "x!");
    }

    #[test]
    fn snapshot_is_sorted_by_key() {
        let col: EntityCollection<String> = EntityCollection::new();
        assert!(col.snapshot().is_empty());
        assert_eq!(col.len(), 0);

        col.upsert("b".into(), "second".into());
        col.upsert("a".into(), "first".into());

        let snap = col.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(*snap[0], "first");
        assert_eq!(col.keys(), vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(col.len(), 2);
    }

    #[test]
    fn subscribers_see_mutations() {
        let col: EntityCollection<String> = EntityCollection::new();
        let mut rx = col.subscribe();
        col.upsert("a".into(), "x".into());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
    }
}
