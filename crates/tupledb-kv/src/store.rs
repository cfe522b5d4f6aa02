//! In-process ordered key/value store with atomic transactions.
//!
//! [`Database`] is a cheaply clonable handle over a single ordered map.
//! All access goes through closure-scoped transactions: writes are
//! buffered inside the [`Transaction`] and applied to the map only when
//! the closure returns `Ok`, so a statement's writes are all-or-nothing.
//! A transaction handle never outlives its closure.
//!
//! Write transactions hold the store's write lock for their duration,
//! which gives every statement a serializable view. Range scans yield
//! key/value pairs in ascending key order over half-open byte ranges.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// Shared handle to the key/value store.
///
/// Clones share the same underlying map; one handle is cloned into every
/// connection task.
#[derive(Debug, Clone, Default)]
pub struct Database {
    inner: Arc<RwLock<Map>>,
}

impl Database {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` inside a write transaction.
    ///
    /// Buffered writes are applied atomically when `f` returns `Ok` and
    /// discarded when it returns `Err`.
    pub fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E>,
    {
        let mut guard = self.inner.write();
        let mut tx = Transaction {
            base: &*guard,
            overlay: BTreeMap::new(),
            cleared: Vec::new(),
            mutations: Vec::new(),
        };
        let out = f(&mut tx)?;
        let mutations = std::mem::take(&mut tx.mutations);
        drop(tx);
        for mutation in mutations {
            mutation.apply(&mut guard);
        }
        Ok(out)
    }

    /// Runs `f` against a read-only snapshot.
    pub fn read_transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&ReadTransaction<'_>) -> Result<T, E>,
    {
        let guard = self.inner.read();
        f(&ReadTransaction { base: &*guard })
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns true if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

enum Mutation {
    Set(Vec<u8>, Vec<u8>),
    ClearRange(Vec<u8>, Vec<u8>),
    ClearAll,
}

impl Mutation {
    fn apply(self, map: &mut Map) {
        match self {
            Mutation::Set(key, value) => {
                map.insert(key, value);
            }
            Mutation::ClearRange(begin, end) => {
                let doomed: Vec<_> = map.range(begin..end).map(|(k, _)| k.clone()).collect();
                for key in doomed {
                    map.remove(&key);
                }
            }
            Mutation::ClearAll => map.clear(),
        }
    }
}

/// A write transaction scoped to one [`Database::transact`] call.
pub struct Transaction<'a> {
    base: &'a Map,
    /// Writes made by this transaction, visible to its own reads.
    overlay: Map,
    /// Ranges cleared by this transaction, hidden from its own reads.
    /// An end of `None` means the range is unbounded above.
    cleared: Vec<(Vec<u8>, Option<Vec<u8>>)>,
    mutations: Vec<Mutation>,
}

impl Transaction<'_> {
    /// Reads a key, observing this transaction's own writes.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(value) = self.overlay.get(key) {
            return Some(value.clone());
        }
        if self.is_cleared(key) {
            return None;
        }
        self.base.get(key).cloned()
    }

    /// Buffers a write.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.overlay.insert(key.clone(), value.clone());
        self.mutations.push(Mutation::Set(key, value));
    }

    /// Buffers removal of every key in `[begin, end)`.
    pub fn clear_range(&mut self, begin: Vec<u8>, end: Vec<u8>) {
        self.overlay
            .retain(|k, _| !(k.as_slice() >= begin.as_slice() && k.as_slice() < end.as_slice()));
        self.cleared.push((begin.clone(), Some(end.clone())));
        self.mutations.push(Mutation::ClearRange(begin, end));
    }

    /// Buffers removal of the entire keyspace.
    pub fn clear_all(&mut self) {
        self.overlay.clear();
        self.cleared.push((Vec::new(), None));
        self.mutations.clear();
        self.mutations.push(Mutation::ClearAll);
    }

    /// Scans `[begin, end)` in ascending key order, observing this
    /// transaction's own writes.
    pub fn get_range(&self, begin: &[u8], end: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merged: Map = self
            .base
            .range(begin.to_vec()..end.to_vec())
            .filter(|(k, _)| !self.is_cleared(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (k, v) in self.overlay.range(begin.to_vec()..end.to_vec()) {
            merged.insert(k.clone(), v.clone());
        }
        merged.into_iter().collect()
    }

    fn is_cleared(&self, key: &[u8]) -> bool {
        self.cleared.iter().any(|(b, e)| {
            key >= b.as_slice() && e.as_deref().map_or(true, |e| key < e)
        })
    }
}

/// A read-only snapshot scoped to one [`Database::read_transact`] call.
pub struct ReadTransaction<'a> {
    base: &'a Map,
}

impl ReadTransaction<'_> {
    /// Reads a key.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.base.get(key).cloned()
    }

    /// Scans `[begin, end)` in ascending key order.
    pub fn get_range(&self, begin: &[u8], end: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.base
            .range(begin.to_vec()..end.to_vec())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    #[test]
    fn test_commit_applies_writes() {
        let db = Database::new();
        db.transact::<_, (), _>(|tx| {
            tx.set(key("a"), key("1"));
            tx.set(key("b"), key("2"));
            Ok(())
        })
        .unwrap();

        db.read_transact::<_, (), _>(|tx| {
            assert_eq!(tx.get(b"a"), Some(key("1")));
            assert_eq!(tx.get(b"b"), Some(key("2")));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_error_discards_writes() {
        let db = Database::new();
        let result: Result<(), &str> = db.transact(|tx| {
            tx.set(key("a"), key("1"));
            Err("boom")
        });
        assert_eq!(result, Err("boom"));
        assert!(db.is_empty());
    }

    #[test]
    fn test_read_your_writes() {
        let db = Database::new();
        db.transact::<_, (), _>(|tx| {
            tx.set(key("a"), key("1"));
            assert_eq!(tx.get(b"a"), Some(key("1")));
            assert_eq!(tx.get_range(b"a", b"z").len(), 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_range_scan_is_ordered_and_half_open() {
        let db = Database::new();
        db.transact::<_, (), _>(|tx| {
            for k in ["b", "a", "c", "d"] {
                tx.set(key(k), key(k));
            }
            Ok(())
        })
        .unwrap();

        db.read_transact::<_, (), _>(|tx| {
            let hits = tx.get_range(b"a", b"d");
            let keys: Vec<_> = hits.iter().map(|(k, _)| k.clone()).collect();
            assert_eq!(keys, vec![key("a"), key("b"), key("c")]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_clear_range_scoped() {
        let db = Database::new();
        db.transact::<_, (), _>(|tx| {
            tx.set(key("a1"), key("x"));
            tx.set(key("a2"), key("x"));
            tx.set(key("b1"), key("x"));
            Ok(())
        })
        .unwrap();

        db.transact::<_, (), _>(|tx| {
            tx.clear_range(key("a"), key("b"));
            // Cleared keys are invisible inside the transaction too.
            assert!(tx.get(b"a1").is_none());
            assert!(tx.get(b"b1").is_some());
            Ok(())
        })
        .unwrap();

        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_clear_all() {
        let db = Database::new();
        db.transact::<_, (), _>(|tx| {
            tx.set(key("a"), key("x"));
            tx.set(vec![0xff, 0x01], key("x"));
            Ok(())
        })
        .unwrap();

        db.transact::<_, (), _>(|tx| {
            tx.clear_all();
            Ok(())
        })
        .unwrap();
        assert!(db.is_empty());
    }

    #[test]
    fn test_set_after_clear_survives() {
        let db = Database::new();
        db.transact::<_, (), _>(|tx| {
            tx.set(key("a"), key("old"));
            Ok(())
        })
        .unwrap();

        db.transact::<_, (), _>(|tx| {
            tx.clear_range(key("a"), key("b"));
            tx.set(key("a"), key("new"));
            assert_eq!(tx.get(b"a"), Some(key("new")));
            Ok(())
        })
        .unwrap();

        db.read_transact::<_, (), _>(|tx| {
            assert_eq!(tx.get(b"a"), Some(key("new")));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_clones_share_state() {
        let db = Database::new();
        let other = db.clone();
        db.transact::<_, (), _>(|tx| {
            tx.set(key("a"), key("1"));
            Ok(())
        })
        .unwrap();
        assert_eq!(other.len(), 1);
    }
}
