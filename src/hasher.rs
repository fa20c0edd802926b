use crate::core::{Object, Primitive, Value, WeakObject};
use ahash::AHashMap;
use log::*;
use std::collections::hash_map::Entry;

/// Separator of identifiers in a hash.
pub const SEPARATOR: char = ',';

/// Assigns each value a short identifier, stable for the lifetime of the Hasher,
/// and joins identifiers of a sequence of values into a single comparison key.
///
/// Objects are identified by reference, everything else by value.
/// Identifiers are assigned, not derived from content, so two different sequences
/// never produce the same hash.
///
/// Hash of the empty sequence is the empty string, same as the "doesn't exist" result
/// of [`Hasher::get_hash_if_exists`].
#[derive(Debug, Default)]
pub struct Hasher {
    sorted: bool,
    /// Last assigned identifier.
    counter: u64,
    /// Freed by sweep once the object is gone.
    objects: AHashMap<usize, Tracked>,
    /// Never evicted.
    primitives: AHashMap<Primitive, u64>,
}

#[derive(Debug)]
struct Tracked {
    target: WeakObject,
    id: u64,
}

impl Hasher {
    /// Order sensitive hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Order insensitive hasher, identifiers are sorted before joining.
    pub fn sorted() -> Self {
        Self {
            sorted: true,
            ..Self::default()
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Hash of values. Assigns identifiers to values seen for the first time.
    pub fn get_hash<'a>(&mut self, values: impl IntoIterator<Item = &'a Value>) -> String {
        let ids = values
            .into_iter()
            .map(|value| self.assign(value))
            .collect::<Vec<_>>();
        self.join(ids)
    }

    /// Hash of values if all of them were seen by get_hash, else empty string.
    pub fn get_hash_if_exists<'a>(&self, values: impl IntoIterator<Item = &'a Value>) -> String {
        values
            .into_iter()
            .map(|value| self.id(value))
            .collect::<Option<Vec<_>>>()
            .map(|ids| self.join(ids))
            .unwrap_or_default()
    }

    /// True if all values were seen by get_hash. Doesn't build the hash.
    pub fn has_hash<'a>(&self, values: impl IntoIterator<Item = &'a Value>) -> bool {
        values.into_iter().all(|value| self.id(value).is_some())
    }

    /// Frees identifiers of dropped objects. Returns number of freed identifiers.
    ///
    /// Identifiers are never reused, so hashes built with freed identifiers stay unique.
    pub fn sweep(&mut self) -> usize {
        let before = self.objects.len();
        self.objects.retain(|_, tracked| tracked.target.is_alive());
        let freed = before - self.objects.len();
        if freed > 0 {
            trace!("Hasher freed {} object identifiers", freed);
        }
        freed
    }

    /// Number of identified values.
    pub fn len(&self) -> usize {
        self.objects.len() + self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn assign(&mut self, value: &Value) -> u64 {
        let counter = &mut self.counter;
        match Primitive::of(value) {
            Err(object) => match self.objects.entry(object.addr()) {
                Entry::Occupied(entry) => {
                    debug_assert!(entry.get().target.is_alive(), "Stale object identifier");
                    entry.get().id
                }
                Entry::Vacant(entry) => {
                    let id = next(counter);
                    entry.insert(Tracked {
                        target: object.downgrade(),
                        id,
                    });
                    id
                }
            },
            Ok(primitive) => *self
                .primitives
                .entry(primitive)
                .or_insert_with(|| next(counter)),
        }
    }

    fn id(&self, value: &Value) -> Option<u64> {
        match Primitive::of(value) {
            Err(object) => self.object_id(object),
            Ok(primitive) => self.primitives.get(&primitive).copied(),
        }
    }

    fn object_id(&self, object: &Object) -> Option<u64> {
        self.objects.get(&object.addr()).map(|tracked| tracked.id)
    }

    fn join(&self, mut ids: Vec<u64>) -> String {
        if self.sorted {
            ids.sort_unstable();
        }

        let mut hash = String::with_capacity(ids.len() * 4);
        for (i, id) in ids.into_iter().enumerate() {
            if i > 0 {
                hash.push(SEPARATOR);
            }
            push_base36(&mut hash, id);
        }
        hash
    }
}

fn next(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

fn push_base36(out: &mut String, mut n: u64) {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    // u64::MAX has 13 digits in base 36.
    let mut buf = [0u8; 13];
    let mut at = buf.len();
    loop {
        at -= 1;
        buf[at] = DIGITS[(n % 36) as usize];
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.extend(buf[at..].iter().map(|&digit| digit as char));
}
