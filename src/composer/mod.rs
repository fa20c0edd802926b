mod anchor;
mod arity;
mod registry;

pub use arity::Arity;

use crate::{
    core::{ComposeError, CompositeKey, Slot, Value},
    hasher::Hasher,
};
use ahash::AHashMap;
use anchor::{Anchor, AnchorId, Graveyard, Tombstone};
use log::*;
use registry::LinkTable;
use std::{
    num::NonZeroUsize,
    rc::{Rc, Weak},
};

/// Default number of new keys between automatic sweeps.
pub const DEFAULT_SWEEP_INTERVAL: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposerOptions {
    /// Composer sweeps on its own after this many new keys. None disables it, in which case
    /// keys are reclaimed only on explicit sweep.
    pub sweep_interval: Option<NonZeroUsize>,
}

impl Default for ComposerOptions {
    fn default() -> Self {
        Self {
            sweep_interval: NonZeroUsize::new(DEFAULT_SWEEP_INTERVAL),
        }
    }
}

/// Provides canonical composite keys for tuples of weak and strong arguments.
///
/// The same tuple always yields the same key. Weak arguments, and strong arguments once
/// their key is reclaimed, aren't kept alive by the Composer.
///
/// Key of a tuple is reclaimed once all of its weak arguments are dropped, at the latest
/// by the next sweep. As long as any of them is alive, the key stays.
///
/// # Reclamation
/// Each tuple has an anchor. Every weak argument holds the anchor through a per position
/// link table that references the argument weakly. Sweeping drops links of dropped
/// arguments; when the last link of an anchor goes, the anchor drops and leaves a
/// tombstone for its hash. Tombstones are processed at the start of every mutating call,
/// and remove the index entry only if it still belongs to the same anchor.
#[derive(Debug)]
pub struct Composer {
    arity: Arity,
    options: ComposerOptions,
    hasher: Hasher,
    index: AHashMap<String, Entry>,
    /// One per weak position.
    links: Vec<LinkTable>,
    graveyard: Graveyard,
    next_anchor: u64,
    since_sweep: usize,
}

#[derive(Debug)]
struct Entry {
    anchor: Weak<Anchor>,
    anchor_id: AnchorId,
    key: CompositeKey,
}

impl Composer {
    pub fn new(arity: Arity) -> Result<Self, ComposeError> {
        Self::with_options(arity, ComposerOptions::default())
    }

    pub fn with_options(arity: Arity, options: ComposerOptions) -> Result<Self, ComposeError> {
        if arity.weak() == 0 {
            return Err(ComposeError::NoWeakArguments);
        }

        Ok(Self {
            links: (0..arity.weak()).map(|_| LinkTable::default()).collect(),
            arity,
            options,
            hasher: Hasher::new(),
            index: AHashMap::default(),
            graveyard: Graveyard::default(),
            next_anchor: 0,
            since_sweep: 0,
        })
    }

    pub fn arity(&self) -> &Arity {
        &self.arity
    }

    pub fn options(&self) -> ComposerOptions {
        self.options
    }

    /// Ok if arguments match declared arity and all weak arguments are objects.
    pub fn validate(&self, weak: &[Value], strong: &[Value]) -> Result<(), ComposeError> {
        if weak.len() != self.arity.weak() {
            return Err(ComposeError::arity(Slot::Weak, self.arity.weak(), weak.len()));
        }
        if strong.len() != self.arity.strong() {
            return Err(ComposeError::arity(
                Slot::Strong,
                self.arity.strong(),
                strong.len(),
            ));
        }
        match weak.iter().position(|value| !value.is_object()) {
            Some(position) => Err(ComposeError::not_an_object(
                position,
                self.arity.weak_name(position),
                weak[position].kind(),
            )),
            None => Ok(()),
        }
    }

    pub fn is_valid_for_key(&self, weak: &[Value], strong: &[Value]) -> bool {
        self.validate(weak, strong).is_ok()
    }

    /// Canonical key of the tuple, composed on first call.
    ///
    /// Errors if arguments aren't valid for a key.
    pub fn get_key(
        &mut self,
        weak: &[Value],
        strong: &[Value],
    ) -> Result<CompositeKey, ComposeError> {
        self.validate(weak, strong)?;
        self.bury();

        let hash = self.hasher.get_hash(weak.iter().chain(strong));
        if let Some(entry) = self.index.get(&hash) {
            return Ok(entry.key.clone());
        }

        let anchor_id = AnchorId(self.next_anchor);
        self.next_anchor += 1;
        let anchor = self.graveyard.anchor(anchor_id, hash.clone());
        for (table, value) in self.links.iter_mut().zip(weak) {
            if let Some(object) = value.as_object() {
                table.link(object, &anchor);
            }
        }

        let key = CompositeKey::new(anchor_id.0);
        trace!("Composed {:?} for {:?}", key, hash);
        self.index.insert(
            hash,
            Entry {
                anchor: Rc::downgrade(&anchor),
                anchor_id,
                key: key.clone(),
            },
        );

        self.since_sweep += 1;
        if let Some(interval) = self.options.sweep_interval {
            if self.since_sweep >= interval.get() {
                self.sweep();
            }
        }

        Ok(key)
    }

    /// Key of the tuple if it was composed and not since deleted or reclaimed.
    pub fn get_key_if_exists(&self, weak: &[Value], strong: &[Value]) -> Option<CompositeKey> {
        self.entry(weak, strong).map(|entry| entry.key.clone())
    }

    pub fn has_key(&self, weak: &[Value], strong: &[Value]) -> bool {
        self.entry(weak, strong).is_some()
    }

    /// Removes the key of the tuple now, without waiting for its weak arguments to drop.
    /// Returns false if there was no key.
    pub fn delete_key(&mut self, weak: &[Value], strong: &[Value]) -> bool {
        if !self.is_valid_for_key(weak, strong) {
            return false;
        }
        self.bury();

        let hash = self.hasher.get_hash_if_exists(weak.iter().chain(strong));
        if hash.is_empty() {
            return false;
        }
        let entry = match self.index.remove(&hash) {
            Some(entry) => entry,
            None => return false,
        };

        for (table, value) in self.links.iter_mut().zip(weak) {
            if let Some(object) = value.as_object() {
                table.unlink(object, entry.anchor_id);
            }
        }
        debug_assert!(entry.anchor.upgrade().is_none(), "Anchor outlived its links");

        // The anchor left a tombstone, it will find the slot empty or taken by a newer anchor.
        trace!("Deleted {:?} for {:?}", entry.key, hash);
        true
    }

    /// Forces a collection cycle. Drops links of dropped weak arguments, frees their
    /// identifiers, and removes keys whose weak arguments are all gone.
    ///
    /// Returns number of reclaimed keys.
    pub fn sweep(&mut self) -> usize {
        let unlinked: usize = self.links.iter_mut().map(LinkTable::sweep).sum();
        let freed = self.hasher.sweep();
        let reclaimed = self.bury();
        self.since_sweep = 0;

        debug!(
            "Sweep of {} composer: dropped {} links, freed {} identifiers, reclaimed {} keys, {} keys remain",
            self.arity,
            unlinked,
            freed,
            reclaimed,
            self.index.len()
        );
        reclaimed
    }

    /// Number of live keys, including those whose arguments are gone but weren't swept yet.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of links from weak arguments to anchors, over all positions.
    pub fn link_count(&self) -> usize {
        self.links.iter().map(LinkTable::len).sum()
    }

    /// Number of distinct objects linked at weak argument positions.
    pub fn linked_objects(&self) -> usize {
        self.links.iter().map(LinkTable::objects).sum()
    }

    fn entry(&self, weak: &[Value], strong: &[Value]) -> Option<&Entry> {
        if !self.is_valid_for_key(weak, strong)
            || !self.hasher.has_hash(weak.iter().chain(strong))
        {
            return None;
        }
        self.index
            .get(&self.hasher.get_hash_if_exists(weak.iter().chain(strong)))
    }

    /// Processes tombstones. Returns number of removed entries.
    fn bury(&mut self) -> usize {
        let mut buried = 0;
        for Tombstone { hash, anchor } in self.graveyard.drain() {
            if self.index.get(&hash).map(|entry| entry.anchor_id) == Some(anchor) {
                if let Some(entry) = self.index.remove(&hash) {
                    trace!("Reclaimed {:?} for {:?}", entry.key, hash);
                    buried += 1;
                }
            } else {
                trace!("Tombstone of anchor {} for {:?} already resolved", anchor, hash);
            }
        }
        buried
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Object, ValueKind};
    use rand::{seq::SliceRandom, Rng};

    fn composer(weak: usize, strong: usize) -> Composer {
        Composer::new(Arity::new(weak, strong)).unwrap()
    }

    fn manual(weak: usize, strong: usize) -> Composer {
        Composer::with_options(
            Arity::new(weak, strong),
            ComposerOptions {
                sweep_interval: None,
            },
        )
        .unwrap()
    }

    fn objects(n: usize) -> Vec<Value> {
        (0..n).map(Value::object).collect()
    }

    #[test]
    fn no_weak_arguments() {
        assert_eq!(
            Composer::new(Arity::new(0, 2)).unwrap_err(),
            ComposeError::NoWeakArguments
        );
    }

    #[test]
    fn same_tuple_same_key() {
        let mut composer = composer(2, 0);
        let w = objects(2);

        let k1 = composer.get_key(&w, &[]).unwrap();
        let k2 = composer.get_key(&w, &[]).unwrap();
        assert_eq!(k1, k2);
        assert_eq!(composer.len(), 1);
    }

    #[test]
    fn same_key_across_other_operations() {
        let mut composer = composer(1, 1);
        let w = objects(1);
        let other = objects(1);

        let key = composer.get_key(&w, &[Value::from("s")]).unwrap();
        composer.get_key(&other, &[Value::from("s")]).unwrap();
        composer.get_key(&w, &[Value::from("t")]).unwrap();
        composer.delete_key(&other, &[Value::from("s")]);
        composer.sweep();

        assert_eq!(composer.get_key(&w, &[Value::from("s")]).unwrap(), key);
    }

    #[test]
    fn different_tuples_different_keys() {
        let mut composer = composer(2, 1);
        let w = objects(3);
        let strong = [Value::Int(1)];

        let a = composer.get_key(&w[0..2], &strong).unwrap();
        let swapped = composer
            .get_key(&[w[1].clone(), w[0].clone()], &strong)
            .unwrap();
        let replaced = composer.get_key(&w[1..3], &strong).unwrap();
        let other_strong = composer.get_key(&w[0..2], &[Value::Int(2)]).unwrap();
        let same_twice = composer
            .get_key(&[w[0].clone(), w[0].clone()], &strong)
            .unwrap();

        let keys = [a, swapped, replaced, other_strong, same_twice];
        for (i, x) in keys.iter().enumerate() {
            for y in &keys[i + 1..] {
                assert_ne!(x, y);
            }
        }
    }

    #[test]
    fn invalid_arguments() {
        let mut composer = Composer::new(Arity::named(&["a", "b"], &["c"])).unwrap();
        let o = Value::object(1);

        assert!(!composer.is_valid_for_key(&[o.clone(), Value::from("x")], &[Value::Null]));
        assert_eq!(
            composer.get_key(&[o.clone(), Value::from("x")], &[Value::Null]),
            Err(ComposeError::NotAnObject {
                position: 1,
                name: Some("b".to_string()),
                found: ValueKind::Str
            })
        );
        assert_eq!(
            composer.get_key(&[o.clone()], &[Value::Null]),
            Err(ComposeError::arity(Slot::Weak, 2, 1))
        );
        assert_eq!(
            composer.get_key(&[o.clone(), o.clone()], &[]),
            Err(ComposeError::arity(Slot::Strong, 1, 0))
        );
        assert!(composer.is_valid_for_key(&[o.clone(), o.clone()], &[Value::object(2)]));
        assert!(composer.is_empty());

        assert!(composer
            .get_key_if_exists(&[o.clone(), Value::Int(1)], &[Value::Null])
            .is_none());
        assert!(!composer.delete_key(&[o], &[Value::Null]));
    }

    #[test]
    fn lookup_consistency() {
        let mut composer = composer(2, 0);
        let w = objects(2);

        assert!(!composer.has_key(&w, &[]));
        assert!(composer.get_key_if_exists(&w, &[]).is_none());

        let key = composer.get_key(&w, &[]).unwrap();
        assert!(composer.has_key(&w, &[]));
        assert_eq!(composer.get_key_if_exists(&w, &[]), Some(key));

        assert!(composer.delete_key(&w, &[]));
        assert!(!composer.has_key(&w, &[]));
        assert!(composer.get_key_if_exists(&w, &[]).is_none());
        assert!(!composer.delete_key(&w, &[]));
    }

    #[test]
    fn unknown_tuple() {
        let mut composer = composer(1, 1);
        composer.get_key(&objects(1), &[Value::Int(1)]).unwrap();

        assert!(composer
            .get_key_if_exists(&objects(1), &[Value::Int(1)])
            .is_none());
        assert!(!composer.delete_key(&objects(1), &[Value::Int(7)]));
    }

    #[test]
    fn delete_unlinks_eagerly() {
        let mut composer = manual(2, 0);
        let w = objects(2);

        let weak_key = composer.get_key(&w, &[]).unwrap().downgrade();
        assert_eq!(composer.link_count(), 2);

        assert!(composer.delete_key(&w, &[]));
        assert_eq!(composer.link_count(), 0);
        assert_eq!(composer.linked_objects(), 0);
        assert!(!weak_key.is_alive());
    }

    #[test]
    fn delete_then_compose_again() {
        let mut composer = manual(1, 0);
        let w = objects(1);

        let first = composer.get_key(&w, &[]).unwrap();
        assert!(composer.delete_key(&w, &[]));
        let second = composer.get_key(&w, &[]).unwrap();
        assert_ne!(first, second);

        // Tombstone of the first anchor must not touch the second entry.
        composer.sweep();
        assert_eq!(composer.get_key_if_exists(&w, &[]), Some(second));
    }

    #[test]
    fn stale_tombstone_is_ignored() {
        let mut composer = manual(1, 0);
        let w = objects(1);
        let key = composer.get_key(&w, &[]).unwrap();

        let hash = composer.hasher.get_hash_if_exists(&w);
        drop(composer.graveyard.anchor(AnchorId(u64::MAX), hash));
        assert_eq!(composer.graveyard.pending(), 1);

        assert_eq!(composer.sweep(), 0);
        assert_eq!(composer.graveyard.pending(), 0);
        assert_eq!(composer.get_key_if_exists(&w, &[]), Some(key));
    }

    #[test]
    fn reclaimed_after_all_weak_dropped() {
        let mut composer = manual(2, 1);
        let w = objects(2);
        let strong = Value::object("strong");

        let weak_key = composer.get_key(&w, &[strong.clone()]).unwrap().downgrade();
        let weak_args = w
            .iter()
            .map(|value| value.as_object().unwrap().downgrade())
            .collect::<Vec<_>>();
        assert!(weak_key.is_alive());

        drop(w);
        // Weak arguments aren't kept alive by the composer.
        assert!(weak_args.iter().all(|weak| !weak.is_alive()));
        // Nothing happens until a collection cycle.
        assert_eq!(composer.len(), 1);

        assert_eq!(composer.hasher.len(), 3);

        assert_eq!(composer.sweep(), 1);
        assert!(composer.is_empty());
        assert_eq!(composer.link_count(), 0);
        assert!(!weak_key.is_alive());
        assert_eq!(strong.as_object().unwrap().strong_count(), 1);
        // Only the surviving strong object keeps its identifier.
        assert_eq!(composer.hasher.len(), 1);
        assert!(composer.hasher.has_hash([&strong]));
    }

    #[test]
    fn retained_while_any_weak_alive() {
        let mut composer = manual(2, 0);
        let survivor = Value::object("survivor");
        let doomed = Value::object("doomed");

        let key = composer
            .get_key(&[survivor.clone(), doomed.clone()], &[])
            .unwrap();
        let weak_key = key.downgrade();
        drop(key);

        drop(doomed);
        assert_eq!(composer.sweep(), 0);
        assert_eq!(composer.len(), 1);
        assert_eq!(composer.link_count(), 1);
        assert!(weak_key.is_alive());

        drop(survivor);
        assert_eq!(composer.sweep(), 1);
        assert!(!weak_key.is_alive());
    }

    #[test]
    fn shared_weak_argument() {
        let mut composer = manual(1, 1);
        let shared = objects(1);

        let a = composer.get_key(&shared, &[Value::Int(1)]).unwrap();
        let b = composer.get_key(&shared, &[Value::Int(2)]).unwrap();
        assert_ne!(a, b);
        assert_eq!(composer.link_count(), 2);
        assert_eq!(composer.linked_objects(), 1);

        assert!(composer.delete_key(&shared, &[Value::Int(1)]));
        assert_eq!(composer.link_count(), 1);
        assert_eq!(composer.get_key_if_exists(&shared, &[Value::Int(2)]), Some(b));

        drop(shared);
        assert_eq!(composer.sweep(), 1);
        assert!(composer.is_empty());
    }

    #[test]
    fn automatic_sweep() {
        let interval = 8;
        let mut composer = Composer::with_options(
            Arity::new(1, 0),
            ComposerOptions {
                sweep_interval: NonZeroUsize::new(interval),
            },
        )
        .unwrap();

        for _ in 0..interval - 1 {
            composer.get_key(&objects(1), &[]).unwrap();
        }
        assert_eq!(composer.len(), interval - 1);

        let kept = objects(1);
        composer.get_key(&kept, &[]).unwrap();
        assert_eq!(composer.len(), 1);
        assert!(composer.has_key(&kept, &[]));
    }

    #[test]
    fn randomized_idempotence_and_distinctness() {
        let mut rng = rand::thread_rng();
        let mut composer = composer(2, 2);
        let pool = objects(6);
        let choices = [Value::Int(0), Value::Int(1), Value::from("s"), Value::Null];

        let mut seen: Vec<(Vec<Value>, Vec<Value>, CompositeKey)> = Vec::new();
        for _ in 0..500 {
            let weak = (0..2)
                .map(|_| pool.choose(&mut rng).unwrap().clone())
                .collect::<Vec<_>>();
            let strong = (0..2)
                .map(|_| choices[rng.gen_range(0..choices.len())].clone())
                .collect::<Vec<_>>();
            let key = composer.get_key(&weak, &strong).unwrap();

            for (w, s, k) in &seen {
                let same = w
                    .iter()
                    .zip(&weak)
                    .all(|(a, b)| a.as_object() == b.as_object())
                    && format!("{:?}", s) == format!("{:?}", strong);
                assert_eq!(same, *k == key);
            }
            seen.push((weak, strong, key));
        }
    }

    #[test]
    fn composer_drops_before_keys() {
        let mut composer = manual(1, 0);
        let w = objects(1);
        let key = composer.get_key(&w, &[]).unwrap();

        drop(composer);
        drop(w);
        assert_eq!(key, key.clone());
    }

    #[test]
    fn objects_by_reference() {
        let mut composer = manual(1, 0);
        let a = Object::new(5);
        let b = Object::new(5);

        assert_ne!(
            composer.get_key(&[Value::from(a)], &[]).unwrap(),
            composer.get_key(&[Value::from(b)], &[]).unwrap()
        );
    }
}
