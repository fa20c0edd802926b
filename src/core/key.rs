use std::{
    fmt,
    hash::{Hash, Hasher},
    rc::{Rc, Weak},
};

struct KeyCell {
    /// Only for Debug.
    serial: u64,
}

/// Canonical identity of an argument tuple.
///
/// Has no observable fields. Two keys are equal only if they are the same key,
/// which for keys from the same Composer means they were composed from the same tuple.
#[derive(Clone)]
pub struct CompositeKey(Rc<KeyCell>);

impl CompositeKey {
    pub(crate) fn new(serial: u64) -> Self {
        Self(Rc::new(KeyCell { serial }))
    }

    /// Handle for weakly holding stores.
    pub fn downgrade(&self) -> WeakCompositeKey {
        WeakCompositeKey(Rc::downgrade(&self.0))
    }

    #[inline(always)]
    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl Eq for CompositeKey {}

impl PartialEq for CompositeKey {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq<WeakCompositeKey> for CompositeKey {
    fn eq(&self, other: &WeakCompositeKey) -> bool {
        self.addr() == other.addr()
    }
}

impl Hash for CompositeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompositeKey#{}", self.0.serial)
    }
}

/// Doesn't keep the key alive.
///
/// Hashes and compares the same way as the CompositeKey it came from, also after
/// the key was reclaimed, so it can be used as the key of a weakly holding map.
#[derive(Clone)]
pub struct WeakCompositeKey(Weak<KeyCell>);

impl WeakCompositeKey {
    pub fn upgrade(&self) -> Option<CompositeKey> {
        self.0.upgrade().map(CompositeKey)
    }

    /// False once the Composer reclaimed the key and nobody else holds it.
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    #[inline(always)]
    fn addr(&self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl Eq for WeakCompositeKey {}

impl PartialEq for WeakCompositeKey {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Hash for WeakCompositeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for WeakCompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(key) => write!(f, "Weak({:?})", key),
            None => write!(f, "Weak(CompositeKey reclaimed)"),
        }
    }
}
