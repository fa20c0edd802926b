use super::anchor::{Anchor, AnchorId};
use crate::core::{Object, WeakObject};
use ahash::AHashMap;
use std::rc::Rc;

/// Links objects at one argument position to the anchors of the tuples they are part of.
///
/// Objects are held weakly, anchors strongly. An anchor stays alive as long as at least
/// one of its links is here.
#[derive(Debug, Default)]
pub(crate) struct LinkTable {
    links: AHashMap<usize, Links>,
}

#[derive(Debug)]
struct Links {
    target: WeakObject,
    anchors: AHashMap<AnchorId, Rc<Anchor>>,
}

impl LinkTable {
    pub fn link(&mut self, object: &Object, anchor: &Rc<Anchor>) {
        self.links
            .entry(object.addr())
            .or_insert_with(|| Links {
                target: object.downgrade(),
                anchors: AHashMap::default(),
            })
            .anchors
            .insert(anchor.id(), anchor.clone());
    }

    /// True if there was such link.
    pub fn unlink(&mut self, object: &Object, anchor: AnchorId) -> bool {
        let links = match self.links.get_mut(&object.addr()) {
            Some(links) => links,
            None => return false,
        };
        let removed = links.anchors.remove(&anchor).is_some();
        if links.anchors.is_empty() {
            self.links.remove(&object.addr());
        }
        removed
    }

    /// Drops links of dropped objects. Returns number of dropped links.
    pub fn sweep(&mut self) -> usize {
        let mut dropped = 0;
        self.links.retain(|_, links| {
            if links.target.is_alive() {
                true
            } else {
                dropped += links.anchors.len();
                false
            }
        });
        dropped
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.links.values().map(|links| links.anchors.len()).sum()
    }

    /// Number of linked objects.
    pub fn objects(&self) -> usize {
        self.links.len()
    }
}
