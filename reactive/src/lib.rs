//! Path-addressed observable state with fine-grained dependency tracking.
//!
//! Component state lives in a [`Store`]: a bag of dynamic [`Value`]s whose
//! slots are addressed by slash-separated paths (`"items/0/title"`). While a
//! subscriber (a component render pass or a [`Watcher`]) is active, reads
//! through the store register dependencies on the exact paths they touch;
//! writes notify the exact changed path and schedule the affected
//! subscribers on a deferred queue. Nothing re-runs synchronously inside a
//! mutation — multiple writes in one synchronous block coalesce into one
//! run per subscriber at the next [`Runtime::drain_pending_work`].

mod id;
mod path;
mod runtime;
mod store;
mod value;
mod watcher;

pub use id::SubscriberId;
pub use runtime::{Runtime, Subscriber};
pub use store::Store;
pub use value::{identity_token, Value};
pub use watcher::Watcher;
