//! Copy-on-write overlay with explicit commit/discard
//!
//! An `Overlay` records writes without touching its parent store. Reads and
//! iteration see the merged view: overlay entries shadow parent entries with
//! the same key, and deletions hide them. Dropping the overlay discards all
//! of its writes; `into_writes` extracts them for application to the parent
//! (see `apply_writes`).
//!
//! This is the isolation primitive behind simulate calls (run, read the
//! result, drop) and per-market batch matching (run each market on its own
//! overlay, commit only on success).

use crate::{prefix_end, Store};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::ops::Bound;

/// Uncommitted writes layered over a parent store
pub struct Overlay<'a, S: Store + ?Sized> {
    parent: &'a S,
    /// `None` marks a deletion of a parent key
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, S: Store + ?Sized> Overlay<'a, S> {
    pub fn new(parent: &'a S) -> Self {
        Self {
            parent,
            writes: BTreeMap::new(),
        }
    }

    /// Number of pending writes (including deletions)
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Consume the overlay, returning its writes in key order
    pub fn into_writes(self) -> Vec<(Vec<u8>, Option<Vec<u8>>)> {
        self.writes.into_iter().collect()
    }

    fn merged_iter<'b>(
        &'b self,
        prefix: &[u8],
        reverse: bool,
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'b> {
        let start = Bound::Included(prefix.to_vec());
        let end = match prefix_end(prefix) {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        let overlay: Box<dyn Iterator<Item = (Vec<u8>, Option<Vec<u8>>)> + 'b> = if reverse {
            Box::new(
                self.writes
                    .range((start, end))
                    .rev()
                    .map(|(k, v)| (k.clone(), v.clone())),
            )
        } else {
            Box::new(
                self.writes
                    .range((start, end))
                    .map(|(k, v)| (k.clone(), v.clone())),
            )
        };
        let parent = if reverse {
            self.parent.iter_prefix_rev(prefix)
        } else {
            self.parent.iter_prefix(prefix)
        };
        Box::new(MergedIter {
            parent: parent.peekable(),
            overlay: overlay.peekable(),
            reverse,
        })
    }
}

impl<S: Store + ?Sized> Store for Overlay<'_, S> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.writes.get(key) {
            Some(Some(value)) => Some(value.clone()),
            Some(None) => None,
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
    }

    fn delete(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }

    fn iter_prefix<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        self.merged_iter(prefix, false)
    }

    fn iter_prefix_rev<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        self.merged_iter(prefix, true)
    }
}

/// Ordered merge of the parent iterator and the overlay's write set
struct MergedIter<'a> {
    parent: Peekable<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>>,
    overlay: Peekable<Box<dyn Iterator<Item = (Vec<u8>, Option<Vec<u8>>)> + 'a>>,
    reverse: bool,
}

impl MergedIter<'_> {
    fn key_cmp(reverse: bool, a: &[u8], b: &[u8]) -> Ordering {
        let ord = a.cmp(b);
        if reverse {
            ord.reverse()
        } else {
            ord
        }
    }
}

impl Iterator for MergedIter<'_> {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let reverse = self.reverse;
            let take_overlay = match (self.parent.peek(), self.overlay.peek()) {
                (None, None) => return None,
                (Some(_), None) => false,
                (None, Some(_)) => true,
                (Some((pk, _)), Some((ok, _))) => match Self::key_cmp(reverse, ok, pk) {
                    Ordering::Less => true,
                    Ordering::Greater => false,
                    Ordering::Equal => {
                        // Overlay shadows the parent entry.
                        self.parent.next();
                        true
                    }
                },
            };
            if take_overlay {
                match self.overlay.next() {
                    Some((key, Some(value))) => return Some((key, value)),
                    // Deletion: hidden from the merged view.
                    Some((_, None)) => continue,
                    None => continue,
                }
            } else {
                return self.parent.next();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{apply_writes, MemStore};

    fn seeded() -> MemStore {
        let mut store = MemStore::new();
        store.set(b"k/1", b"a");
        store.set(b"k/3", b"c");
        store.set(b"k/5", b"e");
        store
    }

    #[test]
    fn test_overlay_reads_through() {
        let store = seeded();
        let overlay = Overlay::new(&store);
        assert_eq!(overlay.get(b"k/1"), Some(b"a".to_vec()));
        assert_eq!(overlay.get(b"k/9"), None);
    }

    #[test]
    fn test_overlay_shadows_and_deletes() {
        let store = seeded();
        let mut overlay = Overlay::new(&store);
        overlay.set(b"k/1", b"A");
        overlay.delete(b"k/3");
        overlay.set(b"k/4", b"d");

        assert_eq!(overlay.get(b"k/1"), Some(b"A".to_vec()));
        assert_eq!(overlay.get(b"k/3"), None);

        let merged: Vec<(Vec<u8>, Vec<u8>)> = overlay.iter_prefix(b"k/").collect();
        let keys: Vec<&[u8]> = merged.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"k/1" as &[u8], b"k/4", b"k/5"]);
        assert_eq!(merged[0].1, b"A".to_vec());
    }

    #[test]
    fn test_overlay_reverse_iteration() {
        let store = seeded();
        let mut overlay = Overlay::new(&store);
        overlay.set(b"k/2", b"b");
        overlay.delete(b"k/5");

        let keys: Vec<Vec<u8>> = overlay.iter_prefix_rev(b"k/").map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"k/3".to_vec(), b"k/2".to_vec(), b"k/1".to_vec()]);
    }

    #[test]
    fn test_discard_leaves_parent_untouched() {
        let store = seeded();
        {
            let mut overlay = Overlay::new(&store);
            overlay.set(b"k/1", b"A");
            overlay.delete(b"k/3");
            // Dropped without commit.
        }
        assert_eq!(store.get(b"k/1"), Some(b"a".to_vec()));
        assert_eq!(store.get(b"k/3"), Some(b"c".to_vec()));
    }

    #[test]
    fn test_commit_applies_writes() {
        let mut store = seeded();
        let mut overlay = Overlay::new(&store);
        overlay.set(b"k/2", b"b");
        overlay.delete(b"k/3");
        let writes = overlay.into_writes();

        apply_writes(&mut store, writes);
        assert_eq!(store.get(b"k/2"), Some(b"b".to_vec()));
        assert_eq!(store.get(b"k/3"), None);
    }

    proptest::proptest! {
        /// Merged iteration over any parent/write-set pair equals iterating
        /// a plain map with the writes applied, in both directions.
        #[test]
        fn prop_merged_iteration_matches_reference(
            parent in proptest::collection::btree_map(
                proptest::collection::vec(proptest::arbitrary::any::<u8>(), 1..4),
                proptest::collection::vec(proptest::arbitrary::any::<u8>(), 0..3),
                0..16,
            ),
            writes in proptest::collection::btree_map(
                proptest::collection::vec(proptest::arbitrary::any::<u8>(), 1..4),
                proptest::option::of(
                    proptest::collection::vec(proptest::arbitrary::any::<u8>(), 0..3),
                ),
                0..16,
            ),
        ) {
            let mut store = MemStore::new();
            let mut reference: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
            for (key, value) in &parent {
                store.set(key, value);
                reference.insert(key.clone(), value.clone());
            }
            let mut overlay = Overlay::new(&store);
            for (key, write) in &writes {
                match write {
                    Some(value) => {
                        overlay.set(key, value);
                        reference.insert(key.clone(), value.clone());
                    }
                    None => {
                        overlay.delete(key);
                        reference.remove(key);
                    }
                }
            }

            let forward: Vec<(Vec<u8>, Vec<u8>)> = overlay.iter_prefix(b"").collect();
            let expected: Vec<(Vec<u8>, Vec<u8>)> =
                reference.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            proptest::prop_assert_eq!(&forward, &expected);

            let backward: Vec<(Vec<u8>, Vec<u8>)> = overlay.iter_prefix_rev(b"").collect();
            let mut expected_rev = expected;
            expected_rev.reverse();
            proptest::prop_assert_eq!(backward, expected_rev);
        }
    }
}
