use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::id::SubscriberId;

/// A dense handle for one interned `(owner, path)` pair.
///
/// Paths are slash-separated property chains relative to their owning
/// instance (`"items/0/title"`). Interning them once avoids re-hashing the
/// full string on every notify, and the per-owner index makes teardown a
/// simple sweep instead of a scan of the whole map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PathId(u32);

struct PathEntry {
    owner: SubscriberId,
    /// At most one entry per subscriber: re-subscribing overwrites.
    subscribers: SmallVec<[SubscriberId; 2]>,
    cleared: bool,
}

#[derive(Default)]
pub(crate) struct PathArena {
    index: FxHashMap<(SubscriberId, Box<str>), PathId>,
    entries: Vec<PathEntry>,
    by_owner: FxHashMap<SubscriberId, Vec<PathId>>,
    /// Reverse map used to re-track a subscriber from scratch on each run.
    watched: FxHashMap<SubscriberId, Vec<PathId>>,
}

impl PathArena {
    pub fn intern(&mut self, owner: SubscriberId, path: &str) -> PathId {
        if let Some(id) = self.index.get(&(owner, Box::from(path))) {
            return *id;
        }
        let id = PathId(self.entries.len() as u32);
        self.entries.push(PathEntry {
            owner,
            subscribers: SmallVec::new(),
            cleared: false,
        });
        self.index.insert((owner, Box::from(path)), id);
        self.by_owner.entry(owner).or_default().push(id);
        id
    }

    pub fn lookup(&self, owner: SubscriberId, path: &str) -> Option<PathId> {
        self.index.get(&(owner, Box::from(path))).copied()
    }

    pub fn subscribe(&mut self, id: PathId, subscriber: SubscriberId) {
        let entry = &mut self.entries[id.0 as usize];
        if entry.cleared {
            return;
        }
        if !entry.subscribers.contains(&subscriber) {
            entry.subscribers.push(subscriber);
            self.watched.entry(subscriber).or_default().push(id);
        }
    }

    pub fn subscribers(&self, id: PathId) -> SmallVec<[SubscriberId; 2]> {
        self.entries[id.0 as usize].subscribers.clone()
    }

    /// Drop every subscription held by `subscriber`, so the next tracked run
    /// re-registers only the paths it actually reads.
    pub fn clear_subscriber(&mut self, subscriber: SubscriberId) {
        if let Some(ids) = self.watched.remove(&subscriber) {
            for id in ids {
                let entry = &mut self.entries[id.0 as usize];
                entry.subscribers.retain(|s| *s != subscriber);
            }
        }
    }

    /// Tear down every path owned by `owner`. The dense entries stay behind
    /// as tombstones; `PathId`s are never reused.
    pub fn sweep_owner(&mut self, owner: SubscriberId) {
        if let Some(ids) = self.by_owner.remove(&owner) {
            for id in ids {
                let entry = &mut self.entries[id.0 as usize];
                entry.subscribers.clear();
                entry.cleared = true;
            }
        }
        self.index.retain(|(o, _), _| *o != owner);
        self.clear_subscriber(owner);
    }

    #[cfg(test)]
    pub fn owned_path_count(&self, owner: SubscriberId) -> usize {
        self.by_owner.get(&owner).map(Vec::len).unwrap_or(0)
    }

    #[cfg(test)]
    pub fn live_subscription_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.cleared)
            .map(|e| e.subscribers.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resubscribe_does_not_duplicate() {
        let mut arena = PathArena::default();
        let owner = SubscriberId::next();
        let sub = SubscriberId::next();
        let id = arena.intern(owner, "items/0");
        arena.subscribe(id, sub);
        arena.subscribe(id, sub);
        assert_eq!(arena.subscribers(id).len(), 1);
    }

    #[test]
    fn sweep_owner_clears_subscriptions() {
        let mut arena = PathArena::default();
        let owner = SubscriberId::next();
        let sub = SubscriberId::next();
        let a = arena.intern(owner, "count");
        let b = arena.intern(owner, "items");
        arena.subscribe(a, sub);
        arena.subscribe(b, sub);
        arena.sweep_owner(owner);
        assert_eq!(arena.live_subscription_count(), 0);
        // interning after a sweep allocates a fresh entry
        let c = arena.intern(owner, "count");
        assert_ne!(a, c);
    }
}
