use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use rustc_hash::FxHashMap;

use crate::{id::SubscriberId, path::PathArena};

thread_local! {
    static RUNTIME: RuntimeInner = RuntimeInner::new();
}

/// A rendering context that can be scheduled by the dependency registry.
///
/// `run` is always executed inside a tracking scope: the runtime clears the
/// subscriber's previous path subscriptions first, so each run re-tracks
/// exactly the paths it reads.
pub trait Subscriber {
    fn id(&self) -> SubscriberId;
    fn run(&self);
}

/// The reactive runtime: the current-subscriber slot, the path arena, the
/// subscriber registry, and the deferred-work queue, all in a thread local.
struct RuntimeInner {
    current: Cell<Option<SubscriberId>>,
    subscribers: RefCell<FxHashMap<SubscriberId, Weak<dyn Subscriber>>>,
    arena: RefCell<PathArena>,
    pending: RefCell<Vec<SubscriberId>>,
    draining: Cell<bool>,
}

impl RuntimeInner {
    fn new() -> Self {
        Self {
            current: Cell::new(None),
            subscribers: RefCell::new(FxHashMap::default()),
            arena: RefCell::new(PathArena::default()),
            pending: RefCell::new(Vec::new()),
            draining: Cell::new(false),
        }
    }

    fn add_pending(&self, id: SubscriberId) {
        let mut pending = self.pending.borrow_mut();
        if !pending.contains(&id) {
            pending.push(id);
        }
    }
}

/// Public facade over the thread-local runtime.
pub struct Runtime;

impl Runtime {
    /// Register a subscriber so `notify` can reach it. Only a weak handle is
    /// held: a dropped subscriber becomes silently inert.
    pub fn register_subscriber(subscriber: &Rc<dyn Subscriber>) {
        RUNTIME.with(|rt| {
            rt.subscribers
                .borrow_mut()
                .insert(subscriber.id(), Rc::downgrade(subscriber));
        });
    }

    pub fn unregister_subscriber(id: SubscriberId) {
        RUNTIME.with(|rt| {
            rt.subscribers.borrow_mut().remove(&id);
            rt.arena.borrow_mut().clear_subscriber(id);
            rt.pending.borrow_mut().retain(|p| *p != id);
        });
    }

    /// The identity of the render pass presently executing, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        RUNTIME.with(|rt| rt.current.get())
    }

    /// Run `subscriber` inside a tracking scope: its previous subscriptions
    /// are cleared, reads during the run re-register, and the previous
    /// current-subscriber is restored afterwards.
    pub fn run_tracked(subscriber: &Rc<dyn Subscriber>) {
        Runtime::register_subscriber(subscriber);
        let id = subscriber.id();
        let prev = RUNTIME.with(|rt| {
            rt.arena.borrow_mut().clear_subscriber(id);
            rt.current.replace(Some(id))
        });
        subscriber.run();
        RUNTIME.with(|rt| rt.current.set(prev));
    }

    /// Reads inside `f` do not register dependencies.
    pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
        let prev = RUNTIME.with(|rt| rt.current.replace(None));
        let result = f();
        RUNTIME.with(|rt| rt.current.set(prev));
        result
    }

    /// Register a dependency of the currently active subscriber on
    /// `(owner, path)`. A no-op returning `true` when no subscriber is
    /// active (plain data access, SSR).
    pub fn dep(owner: SubscriberId, path: &str) -> bool {
        RUNTIME.with(|rt| {
            let Some(current) = rt.current.get() else {
                return true;
            };
            let mut arena = rt.arena.borrow_mut();
            let id = arena.intern(owner, path);
            arena.subscribe(id, current);
            true
        })
    }

    /// Schedule every subscriber of exactly `(owner, path)`.
    ///
    /// Scheduling is deferred: nothing runs inside the mutation that caused
    /// the notification, so multiple synchronous writes coalesce into one
    /// run per subscriber at the next [`Runtime::drain_pending_work`].
    pub fn notify(owner: SubscriberId, path: &str) {
        RUNTIME.with(|rt| {
            let id = rt.arena.borrow().lookup(owner, path);
            if let Some(id) = id {
                for subscriber in rt.arena.borrow().subscribers(id) {
                    rt.add_pending(subscriber);
                }
            }
        });
    }

    /// Explicitly schedule a subscriber, deduplicated against the queue.
    pub fn schedule(id: SubscriberId) {
        RUNTIME.with(|rt| rt.add_pending(id));
    }

    pub fn has_pending_work() -> bool {
        RUNTIME.with(|rt| !rt.pending.borrow().is_empty())
    }

    /// Drain the deferred queue, running each scheduled subscriber once,
    /// until no further work is scheduled. Subscribers whose owners have
    /// been torn down are skipped without error.
    pub fn drain_pending_work() {
        RUNTIME.with(|rt| {
            if rt.draining.get() {
                return;
            }
            rt.draining.set(true);
        });
        loop {
            let batch = RUNTIME.with(|rt| std::mem::take(&mut *rt.pending.borrow_mut()));
            if batch.is_empty() {
                break;
            }
            for id in batch {
                let subscriber =
                    RUNTIME.with(|rt| rt.subscribers.borrow().get(&id).and_then(Weak::upgrade));
                if let Some(subscriber) = subscriber {
                    Runtime::run_tracked(&subscriber);
                }
            }
        }
        RUNTIME.with(|rt| rt.draining.set(false));
    }

    /// Tear down everything owned by `owner`: its path slots, its
    /// subscriptions, and its registry entry.
    pub fn dispose_owner(owner: SubscriberId) {
        RUNTIME.with(|rt| {
            rt.arena.borrow_mut().sweep_owner(owner);
            rt.subscribers.borrow_mut().remove(&owner);
            rt.pending.borrow_mut().retain(|p| *p != owner);
        });
    }
}
