use std::sync::atomic::{AtomicU64, Ordering};

/// A stable identifier for a rendering context (a component instance or an
/// ad hoc watcher) that registers reads against observable paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Allocate a new, unique `SubscriberId`.
    pub fn next() -> SubscriberId {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        SubscriberId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn to_raw(self) -> u64 {
        self.0
    }
}
