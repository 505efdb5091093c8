//! Ordered key-value storage port
//!
//! The matching core reads and writes consensus state through this trait:
//! an ordered byte-keyed store with prefix iteration in both directions.
//! Iteration order is part of the contract: order-book keys are laid out so
//! that byte order equals price priority, and every iterator here visits
//! keys in strict lexicographic (or reverse-lexicographic) order.
//!
//! `Overlay` layers uncommitted writes over any store, giving the explicit
//! commit/discard snapshot used for simulate calls and per-market batch
//! isolation.

pub mod memory;
pub mod overlay;

pub use memory::MemStore;
pub use overlay::Overlay;

/// Ordered key-value store
pub trait Store {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn set(&mut self, key: &[u8], value: &[u8]);

    fn delete(&mut self, key: &[u8]);

    /// Iterate all entries whose key starts with `prefix`, ascending
    fn iter_prefix<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;

    /// Iterate all entries whose key starts with `prefix`, descending
    fn iter_prefix_rev<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;
}

/// Smallest key strictly greater than every key with this prefix, or `None`
/// when the prefix is all `0xff`
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.last_mut() {
        if *last < 0xff {
            *last += 1;
            return Some(end);
        }
        end.pop();
    }
    None
}

/// Apply a batch of writes (`None` = delete) to a store
pub fn apply_writes<S: Store + ?Sized>(store: &mut S, writes: Vec<(Vec<u8>, Option<Vec<u8>>)>) {
    for (key, value) in writes {
        match value {
            Some(value) => store.set(&key, &value),
            None => store.delete(&key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_end() {
        assert_eq!(prefix_end(&[1, 2, 3]), Some(vec![1, 2, 4]));
        assert_eq!(prefix_end(&[1, 0xff]), Some(vec![2]));
        assert_eq!(prefix_end(&[0xff, 0xff]), None);
    }
}
