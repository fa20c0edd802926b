use log::*;
use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct AnchorId(pub u64);

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kept alive by the weak arguments of one tuple. When the last of them lets go,
/// the anchor drops and leaves a Tombstone behind.
pub(crate) struct Anchor {
    id: AnchorId,
    hash: String,
    graveyard: Weak<RefCell<Vec<Tombstone>>>,
}

impl Anchor {
    pub fn id(&self) -> AnchorId {
        self.id
    }
}

impl Drop for Anchor {
    fn drop(&mut self) {
        // Composer is gone, so is its index.
        let Some(graveyard) = self.graveyard.upgrade() else {
            return;
        };

        let tombstone = Tombstone {
            hash: std::mem::take(&mut self.hash),
            anchor: self.id,
        };
        let queue = graveyard.try_borrow_mut();
        match queue {
            Ok(mut queue) => queue.push(tombstone),
            Err(_) => warn!(
                "Tombstone of anchor {} for {:?} lost, entry stays until deleted",
                tombstone.anchor, tombstone.hash
            ),
        };
    }
}

impl fmt::Debug for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Anchor{}({:?})", self.id, self.hash)
    }
}

/// Notice that the anchor for hash is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tombstone {
    pub hash: String,
    pub anchor: AnchorId,
}

/// Collects tombstones of dropped anchors until the Composer gets around to them.
#[derive(Debug, Default)]
pub(crate) struct Graveyard(Rc<RefCell<Vec<Tombstone>>>);

impl Graveyard {
    /// New anchor that reports to this graveyard.
    pub fn anchor(&self, id: AnchorId, hash: String) -> Rc<Anchor> {
        Rc::new(Anchor {
            id,
            hash,
            graveyard: Rc::downgrade(&self.0),
        })
    }

    /// Takes all pending tombstones.
    pub fn drain(&self) -> Vec<Tombstone> {
        self.0
            .try_borrow_mut()
            .map(|mut graveyard| std::mem::take(&mut *graveyard))
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.0.try_borrow().map(|graveyard| graveyard.len()).unwrap_or(0)
    }
}
