use crate::{
    composer::{Arity, Composer, ComposerOptions},
    core::{ComposeError, Value, WeakCompositeKey},
};
use ahash::AHashMap;
use log::*;

/// Map keyed by a tuple of weak and strong arguments.
///
/// Doesn't keep weak arguments alive. Once all weak arguments of an entry are dropped,
/// the entry and its value are dropped on a following sweep.
#[derive(Debug)]
pub struct WeakCompositeMap<V> {
    composer: Composer,
    /// Weakly holds keys, so entries go with their key.
    entries: AHashMap<WeakCompositeKey, V>,
}

impl<V> WeakCompositeMap<V> {
    pub fn new(arity: Arity) -> Result<Self, ComposeError> {
        Self::with_options(arity, ComposerOptions::default())
    }

    pub fn with_options(arity: Arity, options: ComposerOptions) -> Result<Self, ComposeError> {
        Ok(Self {
            composer: Composer::with_options(arity, options)?,
            entries: AHashMap::default(),
        })
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn get(&self, weak: &[Value], strong: &[Value]) -> Option<&V> {
        let key = self.composer.get_key_if_exists(weak, strong)?;
        self.entries.get(&key.downgrade())
    }

    pub fn get_mut(&mut self, weak: &[Value], strong: &[Value]) -> Option<&mut V> {
        let key = self.composer.get_key_if_exists(weak, strong)?;
        self.entries.get_mut(&key.downgrade())
    }

    pub fn has(&self, weak: &[Value], strong: &[Value]) -> bool {
        self.get(weak, strong).is_some()
    }

    /// Returns previous value.
    pub fn set(
        &mut self,
        weak: &[Value],
        strong: &[Value],
        value: V,
    ) -> Result<Option<V>, ComposeError> {
        let key = self.composer.get_key(weak, strong)?;
        let previous = self.entries.insert(key.downgrade(), value);

        // Composer swept on its own.
        if self.composer.len() < self.entries.len() {
            self.prune();
        }

        Ok(previous)
    }

    /// Removes the entry now, regardless of its weak arguments.
    pub fn delete(&mut self, weak: &[Value], strong: &[Value]) -> Option<V> {
        let key = self.composer.get_key_if_exists(weak, strong)?;
        self.composer.delete_key(weak, strong);
        self.entries.remove(&key.downgrade())
    }

    /// Drops entries whose weak arguments are all gone. Returns number of dropped entries.
    pub fn sweep(&mut self) -> usize {
        self.composer.sweep();
        self.prune()
    }

    /// Number of entries, including those whose weak arguments are gone but weren't swept yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.is_alive());
        let pruned = before - self.entries.len();
        if pruned > 0 {
            trace!("Dropped {} entries with reclaimed keys", pruned);
        }
        pruned
    }
}
