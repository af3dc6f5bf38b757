use std::rc::Rc;

use crate::{
    id::SubscriberId,
    runtime::{Runtime, Subscriber},
};

/// A synthetic subscriber whose "render" action is invoking a callback.
///
/// Backs the component `watch` contract: the callback evaluates its watched
/// expression inside the tracking scope the runtime provides, so each run
/// re-tracks exactly the paths the expression reads.
pub struct Watcher {
    id: SubscriberId,
    action: Box<dyn Fn()>,
}

impl Watcher {
    pub fn new(action: impl Fn() + 'static) -> Rc<Watcher> {
        Rc::new(Watcher {
            id: SubscriberId::next(),
            action: Box::new(action),
        })
    }

    /// Run the watcher once under tracking, registering its dependencies.
    pub fn activate(self: &Rc<Self>) {
        let subscriber: Rc<dyn Subscriber> = self.clone();
        Runtime::run_tracked(&subscriber);
    }

    pub fn dispose(&self) {
        Runtime::unregister_subscriber(self.id);
    }
}

impl Subscriber for Watcher {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn run(&self) {
        (self.action)();
    }
}
