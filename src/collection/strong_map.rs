use crate::{
    composer::DEFAULT_SWEEP_INTERVAL,
    core::{ComposeError, Slot, Value},
    hasher::Hasher,
};
use ahash::AHashMap;
use log::*;

/// Map keyed by a fixed number of values, all held strongly.
///
/// Needs only a Hasher. Entries hold their keys, so the only thing to reclaim are
/// Hasher identifiers of objects from deleted keys. Those are freed every so often
/// by set, or on sweep.
#[derive(Debug)]
pub struct StrongCompositeMap<V> {
    arity: usize,
    hasher: Hasher,
    entries: AHashMap<String, (Vec<Value>, V)>,
    since_sweep: usize,
}

impl<V> StrongCompositeMap<V> {
    /// Key order matters.
    pub fn new(arity: usize) -> Self {
        Self::with_hasher(arity, Hasher::new())
    }

    /// Keys are equal if they contain the same values in any order.
    pub fn unordered(arity: usize) -> Self {
        Self::with_hasher(arity, Hasher::sorted())
    }

    fn with_hasher(arity: usize, hasher: Hasher) -> Self {
        Self {
            arity,
            hasher,
            entries: AHashMap::default(),
            since_sweep: 0,
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn hasher(&self) -> &Hasher {
        &self.hasher
    }

    pub fn get(&self, key: &[Value]) -> Option<&V> {
        self.hash_if_exists(key)
            .and_then(|hash| self.entries.get(&hash))
            .map(|(_, value)| value)
    }

    pub fn has(&self, key: &[Value]) -> bool {
        self.get(key).is_some()
    }

    /// Returns previous value.
    pub fn set(&mut self, key: &[Value], value: V) -> Result<Option<V>, ComposeError> {
        if key.len() != self.arity {
            return Err(ComposeError::arity(Slot::Strong, self.arity, key.len()));
        }

        let hash = self.hasher.get_hash(key);
        let previous = self
            .entries
            .insert(hash, (key.to_vec(), value))
            .map(|(_, previous)| previous);

        if previous.is_none() {
            self.since_sweep += 1;
            if self.since_sweep >= DEFAULT_SWEEP_INTERVAL {
                self.sweep();
            }
        }

        Ok(previous)
    }

    pub fn delete(&mut self, key: &[Value]) -> Option<V> {
        let hash = self.hash_if_exists(key)?;
        self.entries.remove(&hash).map(|(_, value)| value)
    }

    /// Frees Hasher identifiers of dropped objects. Returns number of freed identifiers.
    pub fn sweep(&mut self) -> usize {
        self.since_sweep = 0;
        let freed = self.hasher.sweep();
        debug!(
            "Sweep of strong map: freed {} identifiers, {} entries remain",
            freed,
            self.entries.len()
        );
        freed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[Value], &V)> + '_ {
        self.entries
            .values()
            .map(|(key, value)| (key.as_slice(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn hash_if_exists(&self, key: &[Value]) -> Option<String> {
        // Empty key hashes to empty string, so has_hash decides.
        if key.len() != self.arity || !self.hasher.has_hash(key) {
            return None;
        }
        Some(self.hasher.get_hash_if_exists(key))
    }
}
