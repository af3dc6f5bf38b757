use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{id::SubscriberId, runtime::Runtime, value::Value};

/// The observable state bag of one component instance.
///
/// Every reactive slot is addressed by a slash-separated path relative to
/// the store (`"count"`, `"items/0/title"`). Reads register a dependency of
/// the currently active subscriber on every path prefix they touch; writes
/// notify the exact changed path. Dependency side effects are explicit
/// method calls here rather than transparent interception, so callers go
/// through the store instead of plain field access.
#[derive(Clone)]
pub struct Store {
    owner: SubscriberId,
    root: Rc<RefCell<IndexMap<String, Value>>>,
}

impl Store {
    pub fn new(owner: SubscriberId) -> Store {
        Store {
            owner,
            root: Rc::new(RefCell::new(IndexMap::new())),
        }
    }

    pub fn owner(&self) -> SubscriberId {
        self.owner
    }

    /// Register a dependency on `path` without reading it.
    pub fn track(&self, path: &str) {
        Runtime::dep(self.owner, path);
    }

    /// Read the value at `path`, registering a dependency on each prefix
    /// along the way. Missing segments yield `Value::Null`.
    pub fn get(&self, path: &str) -> Value {
        let mut prefix = String::with_capacity(path.len());
        for segment in path.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            Runtime::dep(self.owner, &prefix);
        }
        self.get_untracked(path)
    }

    /// The raw-value escape hatch: no dependency registration, no
    /// notification. Used for identity comparisons and serialization.
    pub fn get_untracked(&self, path: &str) -> Value {
        let mut segments = path.split('/');
        let first = match segments.next() {
            Some(s) if !s.is_empty() => s,
            _ => return Value::Null,
        };
        let mut value = match self.root.borrow().get(first) {
            Some(v) => v.clone(),
            None => return Value::Null,
        };
        for segment in segments {
            value = value.get_member(segment);
        }
        value
    }

    /// Whether a top-level property exists. Never registers a dependency.
    pub fn has(&self, key: &str) -> bool {
        self.root.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.root.borrow().keys().cloned().collect()
    }

    /// Write `value` at `path`, notifying subscribers of that exact path
    /// before the underlying mutation is applied. Subscribers run deferred,
    /// never inside this call. A write that cannot land (no reachable
    /// parent container) notifies nobody.
    pub fn set(&self, path: &str, value: Value) {
        if self.writable(path) {
            Runtime::notify(self.owner, path);
        }
        self.write(path, value);
    }

    /// Write without notifying. Used to promote initial properties and to
    /// hydrate serialized state, where no render should be scheduled.
    pub fn set_silent(&self, path: &str, value: Value) {
        self.write(path, value);
    }

    /// Append to the list at `path`, notifying `path/length` — the slot a
    /// loop over the list registered when it measured it.
    pub fn push(&self, path: &str, value: Value) {
        Runtime::notify(self.owner, &format!("{path}/length"));
        if let Value::List(items) = self.get_untracked(path) {
            items.borrow_mut().push(value);
        }
    }

    /// Remove `index` from the list at `path`, notifying `path/length`.
    pub fn remove_index(&self, path: &str, index: usize) {
        Runtime::notify(self.owner, &format!("{path}/length"));
        if let Value::List(items) = self.get_untracked(path) {
            let mut items = items.borrow_mut();
            if index < items.len() {
                items.remove(index);
            }
        }
    }

    /// A snapshot of the whole state bag as one `Value::Map` sharing the
    /// underlying containers.
    pub fn root_value(&self) -> Value {
        Value::Map(self.root.clone())
    }

    /// Whether a write to `path` would land: the root accepts any new key,
    /// nested writes need a container parent, and list writes an index at
    /// most one past the end.
    fn writable(&self, path: &str) -> bool {
        match path.rsplit_once('/') {
            None => !path.is_empty(),
            Some((parent, key)) => match self.get_untracked(parent) {
                Value::Map(_) => true,
                Value::List(items) => key
                    .parse::<usize>()
                    .map(|index| index <= items.borrow().len())
                    .unwrap_or(false),
                _ => false,
            },
        }
    }

    fn write(&self, path: &str, value: Value) {
        match path.rsplit_once('/') {
            None => {
                if !path.is_empty() {
                    self.root.borrow_mut().insert(path.to_string(), value);
                }
            }
            Some((parent, key)) => {
                // writing through a missing parent is a silent no-op
                let target = self.get_untracked(parent);
                let _ = target.set_member(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_missing_is_null() {
        let store = Store::new(SubscriberId::next());
        assert_eq!(store.get("nope"), Value::Null);
        assert_eq!(store.get("nope/deeper"), Value::Null);
    }

    #[test]
    fn nested_write_through_paths() {
        let store = Store::new(SubscriberId::next());
        store.set_silent(
            "items",
            Value::list(vec![Value::map(
                [("title".to_string(), Value::str("one"))].into_iter().collect(),
            )]),
        );
        store.set("items/0/title", Value::str("two"));
        assert_eq!(store.get_untracked("items/0/title"), Value::str("two"));
    }

    #[test]
    fn write_through_a_missing_parent_is_ignored() {
        let store = Store::new(SubscriberId::next());
        store.set("ghost/name", Value::str("x"));
        assert_eq!(store.get_untracked("ghost"), Value::Null);

        store.set_silent("items", Value::list(vec![Value::Int(1)]));
        store.set("items/5", Value::Int(9));
        assert_eq!(store.get_untracked("items/length"), Value::Int(1));
    }
}
