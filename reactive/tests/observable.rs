use std::{cell::Cell, rc::Rc};

use cairn_reactive::{Runtime, Store, SubscriberId, Value, Watcher};

fn counting_watcher(store: &Store, path: &'static str) -> (Rc<Watcher>, Rc<Cell<u32>>) {
    let runs = Rc::new(Cell::new(0));
    let watcher = Watcher::new({
        let store = store.clone();
        let runs = runs.clone();
        move || {
            store.get(path);
            runs.set(runs.get() + 1);
        }
    });
    watcher.activate();
    (watcher, runs)
}

#[test]
fn set_schedules_subscriber() {
    let store = Store::new(SubscriberId::next());
    store.set_silent("count", Value::Int(0));

    let (_watcher, runs) = counting_watcher(&store, "count");
    assert_eq!(runs.get(), 1);

    store.set("count", Value::Int(1));
    // deferred: nothing runs inside the mutation
    assert_eq!(runs.get(), 1);
    Runtime::drain_pending_work();
    assert_eq!(runs.get(), 2);
}

#[test]
fn mutations_coalesce_into_one_run() {
    let store = Store::new(SubscriberId::next());
    store.set_silent("a", Value::Int(0));
    store.set_silent("b", Value::Int(0));

    let runs = Rc::new(Cell::new(0));
    let watcher = Watcher::new({
        let store = store.clone();
        let runs = runs.clone();
        move || {
            store.get("a");
            store.get("b");
            runs.set(runs.get() + 1);
        }
    });
    watcher.activate();
    assert_eq!(runs.get(), 1);

    store.set("a", Value::Int(1));
    store.set("a", Value::Int(2));
    store.set("b", Value::Int(3));
    Runtime::drain_pending_work();
    assert_eq!(runs.get(), 2, "three writes coalesce into one run");
}

#[test]
fn dependency_precision_on_exact_paths() {
    let store = Store::new(SubscriberId::next());
    store.set_silent(
        "items",
        Value::list(vec![
            Value::map([("title".to_string(), Value::str("a"))].into_iter().collect()),
            Value::map([("title".to_string(), Value::str("b"))].into_iter().collect()),
        ]),
    );

    let (_watcher, runs) = counting_watcher(&store, "items/0/title");
    assert_eq!(runs.get(), 1);

    // a path the watcher never read must not schedule it
    store.set("items/1/title", Value::str("changed"));
    Runtime::drain_pending_work();
    assert_eq!(runs.get(), 1);

    store.set("items/0/title", Value::str("changed"));
    Runtime::drain_pending_work();
    assert_eq!(runs.get(), 2);
}

#[test]
fn prefix_reads_subscribe_to_parents() {
    let store = Store::new(SubscriberId::next());
    store.set_silent("user", Value::map([("name".to_string(), Value::str("ada"))].into_iter().collect()));

    let (_watcher, runs) = counting_watcher(&store, "user/name");

    // replacing the whole object notifies the `user` slot the read walked through
    store.set("user", Value::map([("name".to_string(), Value::str("grace"))].into_iter().collect()));
    Runtime::drain_pending_work();
    assert_eq!(runs.get(), 2);
}

#[test]
fn untracked_reads_do_not_subscribe() {
    let store = Store::new(SubscriberId::next());
    store.set_silent("count", Value::Int(0));

    let runs = Rc::new(Cell::new(0));
    let watcher = Watcher::new({
        let store = store.clone();
        let runs = runs.clone();
        move || {
            store.get_untracked("count");
            runs.set(runs.get() + 1);
        }
    });
    watcher.activate();

    store.set("count", Value::Int(1));
    Runtime::drain_pending_work();
    assert_eq!(runs.get(), 1, "untracked read must not resubscribe");
}

#[test]
fn push_notifies_length_subscribers() {
    let store = Store::new(SubscriberId::next());
    store.set_silent("items", Value::list(vec![Value::Int(1)]));

    let runs = Rc::new(Cell::new(0));
    let watcher = Watcher::new({
        let store = store.clone();
        let runs = runs.clone();
        move || {
            store.get("items/length");
            runs.set(runs.get() + 1);
        }
    });
    watcher.activate();

    store.push("items", Value::Int(2));
    Runtime::drain_pending_work();
    assert_eq!(runs.get(), 2);
    assert_eq!(store.get_untracked("items/length"), Value::Int(2));
}

#[test]
fn set_through_a_missing_parent_schedules_nothing() {
    let store = Store::new(SubscriberId::next());
    let (_watcher, runs) = counting_watcher(&store, "ghost/name");
    assert_eq!(runs.get(), 1);

    // nothing at `ghost`: the write cannot land, so nobody is scheduled
    store.set("ghost/name", Value::str("x"));
    Runtime::drain_pending_work();
    assert_eq!(runs.get(), 1, "a write that never landed must not notify");
}

#[test]
fn dropped_watcher_is_silently_inert() {
    let store = Store::new(SubscriberId::next());
    store.set_silent("count", Value::Int(0));

    let (watcher, runs) = counting_watcher(&store, "count");
    watcher.dispose();
    drop(watcher);

    store.set("count", Value::Int(1));
    Runtime::drain_pending_work();
    assert_eq!(runs.get(), 1);
}

#[test]
fn disposed_owner_stops_notifying() {
    let owner = SubscriberId::next();
    let store = Store::new(owner);
    store.set_silent("count", Value::Int(0));

    let (_watcher, runs) = counting_watcher(&store, "count");

    Runtime::dispose_owner(owner);
    store.set("count", Value::Int(1));
    Runtime::drain_pending_work();
    assert_eq!(runs.get(), 1);
}

#[test]
fn rerun_retracks_only_current_reads() {
    let store = Store::new(SubscriberId::next());
    store.set_silent("flag", Value::Bool(true));
    store.set_silent("a", Value::Int(0));
    store.set_silent("b", Value::Int(0));

    let runs = Rc::new(Cell::new(0));
    let watcher = Watcher::new({
        let store = store.clone();
        let runs = runs.clone();
        move || {
            if store.get("flag").truthy() {
                store.get("a");
            } else {
                store.get("b");
            }
            runs.set(runs.get() + 1);
        }
    });
    watcher.activate();
    assert_eq!(runs.get(), 1);

    store.set("flag", Value::Bool(false));
    Runtime::drain_pending_work();
    assert_eq!(runs.get(), 2);

    // `a` is no longer read; mutating it must not schedule the watcher
    store.set("a", Value::Int(5));
    Runtime::drain_pending_work();
    assert_eq!(runs.get(), 2);

    store.set("b", Value::Int(5));
    Runtime::drain_pending_work();
    assert_eq!(runs.get(), 3);
}
