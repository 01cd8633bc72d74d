use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use futures::executor::LocalPool;
use rstest::rstest;
use weave_scope::{Deregistration, Event, Scope, Value, DESTROY_EVENT};

struct Tree {
    _pool: LocalPool,
    parent: Scope,
    scope: Scope,
    child: Scope,
    isolated_child: Scope,
}

fn tree() -> Tree {
    let pool = LocalPool::new();
    let parent = Scope::new_root(pool.spawner());
    let scope = parent.new_child(false);
    let child = scope.new_child(false);
    let isolated_child = scope.new_child(true);
    Tree {
        _pool: pool,
        parent,
        scope,
        child,
        isolated_child,
    }
}

fn record(scope: &Scope, name: &str) -> Rc<RefCell<Vec<String>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    scope.on(name, move |event, _| {
        sink.borrow_mut().push(event.name().to_string());
        Ok(())
    });
    seen
}

#[derive(Clone, Copy)]
enum Dispatch {
    Emit,
    Broadcast,
}

impl Dispatch {
    fn fire(self, scope: &Scope, name: &str, args: &[Value]) -> Event {
        match self {
            Dispatch::Emit => scope.emit(name, args),
            Dispatch::Broadcast => scope.broadcast(name, args),
        }
    }
}

#[test]
fn listeners_are_kept_per_event_name() {
    let tree = tree();
    let some = record(&tree.scope, "someEvent");
    let other = record(&tree.scope, "someOtherEvent");

    tree.scope.emit("someEvent", &[]);
    assert_eq!(*some.borrow(), ["someEvent"]);
    assert!(other.borrow().is_empty());
}

#[rstest]
#[case(Dispatch::Emit)]
#[case(Dispatch::Broadcast)]
fn calls_listeners_registered_for_matching_events(#[case] dispatch: Dispatch) {
    let tree = tree();
    let matching = record(&tree.scope, "someEvent");
    let other = record(&tree.scope, "someOtherEvent");

    dispatch.fire(&tree.scope, "someEvent", &[]);
    assert_eq!(matching.borrow().len(), 1);
    assert!(other.borrow().is_empty());
}

#[rstest]
#[case(Dispatch::Emit)]
#[case(Dispatch::Broadcast)]
fn passes_the_event_and_additional_arguments(#[case] dispatch: Dispatch) {
    let tree = tree();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let sink = seen.clone();
    tree.scope.on("someEvent", move |event, args| {
        assert_eq!(event.name(), "someEvent");
        sink.borrow_mut().extend_from_slice(args);
        Ok(())
    });

    let args = [
        Value::from("and"),
        Value::array(["additional", "arguments"]),
        Value::from("..."),
    ];
    dispatch.fire(&tree.scope, "someEvent", &args);
    assert_eq!(*seen.borrow(), args);
}

#[rstest]
#[case(Dispatch::Emit)]
#[case(Dispatch::Broadcast)]
fn returns_the_event(#[case] dispatch: Dispatch) {
    let tree = tree();
    let event = dispatch.fire(&tree.scope, "someEvent", &[]);
    assert_eq!(event.name(), "someEvent");
    assert_eq!(event.target_scope(), &tree.scope);
}

#[rstest]
#[case(Dispatch::Emit)]
#[case(Dispatch::Broadcast)]
fn deregistered_listeners_are_not_called(#[case] dispatch: Dispatch) {
    let tree = tree();
    let calls = Rc::new(Cell::new(0));

    let sink = calls.clone();
    let handle = tree.scope.on("someEvent", move |_, _| {
        sink.set(sink.get() + 1);
        Ok(())
    });
    handle.cancel();

    dispatch.fire(&tree.scope, "someEvent", &[]);
    assert_eq!(calls.get(), 0);
}

#[rstest]
#[case(Dispatch::Emit)]
#[case(Dispatch::Broadcast)]
fn a_listener_removing_itself_does_not_skip_the_next(#[case] dispatch: Dispatch) {
    let tree = tree();
    let calls = Rc::new(Cell::new(0));

    let own: Rc<RefCell<Option<Deregistration>>> = Rc::new(RefCell::new(None));
    let handle = own.clone();
    *own.borrow_mut() = Some(tree.scope.on("someEvent", move |_, _| {
        if let Some(handle) = handle.borrow().as_ref() {
            handle.cancel();
        }
        Ok(())
    }));
    let sink = calls.clone();
    tree.scope.on("someEvent", move |_, _| {
        sink.set(sink.get() + 1);
        Ok(())
    });

    dispatch.fire(&tree.scope, "someEvent", &[]);
    dispatch.fire(&tree.scope, "someEvent", &[]);
    assert_eq!(calls.get(), 2);
}

#[rstest]
#[case(Dispatch::Emit)]
#[case(Dispatch::Broadcast)]
fn sets_default_prevented(#[case] dispatch: Dispatch) {
    let tree = tree();
    tree.scope.on("someEvent", |event, _| {
        event.prevent_default();
        Ok(())
    });

    let event = dispatch.fire(&tree.scope, "someEvent", &[]);
    assert!(event.default_prevented());
}

#[rstest]
#[case(Dispatch::Emit)]
#[case(Dispatch::Broadcast)]
fn current_scope_is_cleared_after_dispatch(#[case] dispatch: Dispatch) {
    let tree = tree();
    let during = Rc::new(RefCell::new(None));

    let sink = during.clone();
    tree.scope.on("someEvent", move |event, _| {
        *sink.borrow_mut() = event.current_scope();
        Ok(())
    });

    let event = dispatch.fire(&tree.scope, "someEvent", &[]);
    assert_eq!(*during.borrow(), Some(tree.scope.clone()));
    assert_eq!(event.current_scope(), None);
}

#[rstest]
#[case(Dispatch::Emit)]
#[case(Dispatch::Broadcast)]
fn failing_listeners_do_not_stop_dispatch(#[case] dispatch: Dispatch) {
    let tree = tree();
    let calls = Rc::new(Cell::new(0));

    tree.scope.on("someEvent", |_, _| Err("bang".into()));
    let sink = calls.clone();
    tree.scope.on("someEvent", move |_, _| {
        sink.set(sink.get() + 1);
        Ok(())
    });

    dispatch.fire(&tree.scope, "someEvent", &[]);
    assert_eq!(calls.get(), 1);
}

#[test]
fn emit_propagates_up_the_hierarchy() {
    let tree = tree();
    let parent = record(&tree.parent, "someEvent");
    let scope = record(&tree.scope, "someEvent");
    let child = record(&tree.child, "someEvent");

    tree.scope.emit("someEvent", &[]);
    assert_eq!(parent.borrow().len(), 1);
    assert_eq!(scope.borrow().len(), 1);
    assert!(child.borrow().is_empty());
}

#[test]
fn emit_reaches_parents_of_isolated_scopes() {
    let tree = tree();
    let parent = record(&tree.parent, "someEvent");

    tree.isolated_child.emit("someEvent", &[]);
    assert_eq!(parent.borrow().len(), 1);
}

#[test]
fn emit_tracks_the_target_and_current_scopes() {
    let tree = tree();
    let seen = Rc::new(RefCell::new(Vec::new()));

    for scope in [&tree.parent, &tree.scope] {
        let sink = seen.clone();
        scope.on("someEvent", move |event, _| {
            sink.borrow_mut().push((event.target_scope().clone(), event.current_scope()));
            Ok(())
        });
    }

    tree.scope.emit("someEvent", &[]);
    assert_eq!(
        *seen.borrow(),
        [
            (tree.scope.clone(), Some(tree.scope.clone())),
            (tree.scope.clone(), Some(tree.parent.clone())),
        ]
    );
}

#[test]
fn stop_propagation_ends_emit_after_the_current_scope() {
    let tree = tree();
    let parent = record(&tree.parent, "someEvent");
    let calls = Rc::new(Cell::new(0));

    tree.scope.on("someEvent", |event, _| {
        event.stop_propagation();
        Ok(())
    });
    let sink = calls.clone();
    tree.scope.on("someEvent", move |_, _| {
        sink.set(sink.get() + 1);
        Ok(())
    });

    tree.child.emit("someEvent", &[]);
    assert_eq!(calls.get(), 1);
    assert!(parent.borrow().is_empty());
}

#[test]
fn broadcast_propagates_down_the_hierarchy() {
    let tree = tree();
    let parent = record(&tree.parent, "someEvent");
    let scope = record(&tree.scope, "someEvent");
    let child = record(&tree.child, "someEvent");
    let isolated = record(&tree.isolated_child, "someEvent");

    tree.scope.broadcast("someEvent", &[]);
    assert!(parent.borrow().is_empty());
    assert_eq!(scope.borrow().len(), 1);
    assert_eq!(child.borrow().len(), 1);
    assert_eq!(isolated.borrow().len(), 1);
}

#[test]
fn broadcast_ignores_stop_propagation() {
    let tree = tree();
    let child = record(&tree.child, "someEvent");
    tree.scope.on("someEvent", |event, _| {
        event.stop_propagation();
        Ok(())
    });

    tree.scope.broadcast("someEvent", &[]);
    assert_eq!(child.borrow().len(), 1);
}

#[test]
fn broadcast_tracks_the_current_scope() {
    let tree = tree();
    let seen = Rc::new(RefCell::new(None));

    let sink = seen.clone();
    tree.child.on("someEvent", move |event, _| {
        *sink.borrow_mut() = Some((event.target_scope().clone(), event.current_scope()));
        Ok(())
    });

    tree.scope.broadcast("someEvent", &[]);
    assert_eq!(
        *seen.borrow(),
        Some((tree.scope.clone(), Some(tree.child.clone())))
    );
}

#[test]
fn destroy_broadcasts_the_destroy_event() {
    let tree = tree();
    let scope = record(&tree.scope, DESTROY_EVENT);
    let child = record(&tree.child, DESTROY_EVENT);
    let parent = record(&tree.parent, DESTROY_EVENT);

    tree.scope.destroy();
    assert_eq!(*scope.borrow(), [DESTROY_EVENT]);
    assert_eq!(*child.borrow(), [DESTROY_EVENT]);
    assert!(parent.borrow().is_empty());
}

#[test]
fn destroyed_scopes_drop_their_listeners() {
    let tree = tree();
    let calls = Rc::new(Cell::new(0));

    let sink = calls.clone();
    tree.scope.on("someEvent", move |_, _| {
        sink.set(sink.get() + 1);
        Ok(())
    });

    tree.scope.destroy();
    tree.scope.emit("someEvent", &[]);
    assert_eq!(calls.get(), 0);
}

#[test]
fn destroyed_scopes_are_detached_from_their_parent() {
    let tree = tree();
    let scope = record(&tree.scope, "someEvent");

    tree.scope.destroy();
    tree.parent.broadcast("someEvent", &[]);
    assert!(scope.borrow().is_empty());
    assert!(!tree.parent.children().contains(&tree.scope));
}

#[test]
fn destroying_the_first_child_detaches_it() {
    let tree = tree();
    let sibling = tree.parent.new_child(false);
    assert_eq!(tree.parent.children()[0], tree.scope);

    tree.scope.destroy();
    assert_eq!(tree.parent.children(), [sibling]);
}

#[test]
fn destroying_the_root_drops_its_watchers() {
    let tree = tree();
    let calls = Rc::new(Cell::new(0));

    let sink = calls.clone();
    tree.parent.watch(
        |_| Ok(Value::from(1)),
        move |_, _, _| {
            sink.set(sink.get() + 1);
            Ok(())
        },
        false,
    );

    tree.parent.destroy();
    tree.parent.digest().unwrap();
    assert_eq!(calls.get(), 0);
}
