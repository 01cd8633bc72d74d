use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use futures::executor::LocalPool;
use weave_scope::{watch_fn, Scope, Value};

fn root() -> (LocalPool, Scope) {
    let pool = LocalPool::new();
    let scope = Scope::new_root(pool.spawner());
    (pool, scope)
}

type Calls = Rc<RefCell<Vec<(Vec<Value>, Vec<Value>)>>>;

fn group_on(scope: &Scope, keys: &[&'static str]) -> (Calls, weave_scope::Deregistration) {
    let calls: Calls = Rc::new(RefCell::new(Vec::new()));
    let sink = calls.clone();
    let fns = keys
        .iter()
        .map(|key| {
            let key = *key;
            watch_fn(move |scope| Ok(scope.get(key)))
        })
        .collect();
    let handle = scope
        .watch_group(fns, move |new_values, old_values, _| {
            sink.borrow_mut().push((new_values.to_vec(), old_values.to_vec()));
            Ok(())
        })
        .unwrap();
    (calls, handle)
}

#[test]
fn group_passes_new_and_old_values_as_slices() {
    let (_pool, scope) = root();
    scope.set("aValue", 1);
    scope.set("anotherValue", 2);
    let (calls, _) = group_on(&scope, &["aValue", "anotherValue"]);

    scope.digest().unwrap();
    assert_eq!(calls.borrow()[0].0, [Value::from(1), Value::from(2)]);
}

#[test]
fn group_calls_the_listener_once_per_digest() {
    let (_pool, scope) = root();
    scope.set("aValue", 1);
    scope.set("anotherValue", 2);
    let (calls, _) = group_on(&scope, &["aValue", "anotherValue"]);

    scope.digest().unwrap();
    assert_eq!(calls.borrow().len(), 1);
}

#[test]
fn group_uses_the_same_slice_for_old_and_new_on_first_run() {
    let (_pool, scope) = root();
    scope.set("aValue", 1);
    scope.set("anotherValue", 2);
    let (calls, _) = group_on(&scope, &["aValue", "anotherValue"]);

    scope.digest().unwrap();
    let (new_values, old_values) = calls.borrow()[0].clone();
    assert_eq!(new_values, old_values);
}

#[test]
fn group_reports_old_values_on_subsequent_runs() {
    let (_pool, scope) = root();
    scope.set("aValue", 1);
    scope.set("anotherValue", 2);
    let (calls, _) = group_on(&scope, &["aValue", "anotherValue"]);

    scope.digest().unwrap();
    scope.set("anotherValue", 3);
    scope.digest().unwrap();

    let (new_values, old_values) = calls.borrow()[1].clone();
    assert_eq!(new_values, [Value::from(1), Value::from(3)]);
    assert_eq!(old_values, [Value::from(1), Value::from(2)]);
}

#[test]
fn group_without_watch_functions_calls_the_listener_once() {
    let (mut pool, scope) = root();
    let (calls, _) = group_on(&scope, &[]);

    scope.digest().unwrap();
    assert_eq!(calls.borrow().len(), 1);
    assert_eq!(calls.borrow()[0], (Vec::new(), Vec::new()));

    scope.digest().unwrap();
    pool.run_until_stalled();
    assert_eq!(calls.borrow().len(), 1);
}

#[test]
fn group_without_watch_functions_runs_on_the_executor() {
    let (mut pool, scope) = root();
    let (calls, _) = group_on(&scope, &[]);

    pool.run_until_stalled();
    assert_eq!(calls.borrow().len(), 1);
}

#[test]
fn group_can_be_deregistered() {
    let (_pool, scope) = root();
    scope.set("aValue", 1);
    scope.set("anotherValue", 2);
    let (calls, handle) = group_on(&scope, &["aValue", "anotherValue"]);

    scope.digest().unwrap();
    scope.set("anotherValue", 3);
    handle.cancel();
    scope.digest().unwrap();
    assert_eq!(calls.borrow().len(), 1);
}

#[test]
fn group_without_watch_functions_can_be_cancelled_before_it_fires() {
    let (mut pool, scope) = root();
    let (calls, handle) = group_on(&scope, &[]);

    handle.cancel();
    scope.digest().unwrap();
    pool.run_until_stalled();
    assert!(calls.borrow().is_empty());
}

fn collection_counter(scope: &Scope, key: &'static str) -> Rc<Cell<u32>> {
    let calls = Rc::new(Cell::new(0));
    let sink = calls.clone();
    scope.watch_collection(
        move |scope| Ok(scope.get(key)),
        move |_, _, _| {
            sink.set(sink.get() + 1);
            Ok(())
        },
    );
    calls
}

#[test]
fn collection_works_like_a_normal_watch_for_scalars() {
    let (_pool, scope) = root();
    scope.set("aValue", 42);
    let calls = collection_counter(&scope, "aValue");

    scope.digest().unwrap();
    assert_eq!(calls.get(), 1);

    scope.set("aValue", 43);
    scope.digest().unwrap();
    assert_eq!(calls.get(), 2);

    scope.digest().unwrap();
    assert_eq!(calls.get(), 2);
}

#[test]
fn collection_notices_when_a_value_becomes_an_array() {
    let (_pool, scope) = root();
    let calls = collection_counter(&scope, "arr");

    scope.digest().unwrap();
    assert_eq!(calls.get(), 1);

    scope.set("arr", Value::array([1, 2, 3]));
    scope.digest().unwrap();
    assert_eq!(calls.get(), 2);

    scope.digest().unwrap();
    assert_eq!(calls.get(), 2);
}

#[test]
fn collection_fires_once_when_an_item_is_added_and_not_again_when_unchanged() {
    let (_pool, scope) = root();
    scope.set("arr", Value::array([1, 2, 3]));
    let calls = collection_counter(&scope, "arr");

    scope.digest().unwrap();
    assert_eq!(calls.get(), 1);

    scope.get("arr").push(4);
    scope.digest().unwrap();
    assert_eq!(calls.get(), 2);

    scope.digest().unwrap();
    assert_eq!(calls.get(), 2);
}

#[test]
fn collection_notices_items_removed_replaced_and_reordered() {
    let (_pool, scope) = root();
    scope.set("arr", Value::array([1, 2, 3]));
    let calls = collection_counter(&scope, "arr");
    scope.digest().unwrap();

    let arr = scope.get("arr");
    let items = arr.as_array().unwrap().clone();

    items.borrow_mut().remove(0);
    scope.digest().unwrap();
    assert_eq!(calls.get(), 2);

    items.borrow_mut()[1] = Value::from(42);
    scope.digest().unwrap();
    assert_eq!(calls.get(), 3);

    items.borrow_mut().reverse();
    scope.digest().unwrap();
    assert_eq!(calls.get(), 4);
}

#[test]
fn collection_does_not_fail_on_nan_in_arrays() {
    let (_pool, scope) = root();
    scope.set("arr", Value::array([Value::from(2), Value::from(f64::NAN), Value::from(3)]));
    let calls = collection_counter(&scope, "arr");

    scope.digest().unwrap();
    scope.digest().unwrap();
    assert_eq!(calls.get(), 1);
}

#[test]
fn collection_notices_object_attribute_changes() {
    let (_pool, scope) = root();
    scope.set("obj", Value::object([("a", Value::from(1))]));
    let calls = collection_counter(&scope, "obj");
    scope.digest().unwrap();
    assert_eq!(calls.get(), 1);

    let obj = scope.get("obj");
    obj.set("b", 2);
    scope.digest().unwrap();
    assert_eq!(calls.get(), 2);

    obj.set("b", 3);
    scope.digest().unwrap();
    assert_eq!(calls.get(), 3);

    obj.remove("a");
    scope.digest().unwrap();
    assert_eq!(calls.get(), 4);

    scope.digest().unwrap();
    assert_eq!(calls.get(), 4);
}

#[test]
fn collection_ignores_nested_mutations() {
    let (_pool, scope) = root();
    let inner = Value::object([("x", Value::from(1))]);
    scope.set("obj", Value::object([("inner", inner.clone())]));
    let calls = collection_counter(&scope, "obj");
    scope.digest().unwrap();

    inner.set("x", 2);
    scope.digest().unwrap();
    assert_eq!(calls.get(), 1);
}

#[test]
fn collection_listener_gets_the_new_value() {
    let (_pool, scope) = root();
    scope.set("arr", Value::array([1, 1]));
    let seen = Rc::new(RefCell::new(Value::Undefined));

    let sink = seen.clone();
    scope.watch_collection(
        |scope| Ok(scope.get("arr")),
        move |new_value, _, _| {
            *sink.borrow_mut() = new_value.clone();
            Ok(())
        },
    );

    scope.digest().unwrap();
    assert!(seen.borrow().identical(&scope.get("arr")));

    scope.get("arr").push(1);
    scope.digest().unwrap();
    assert_eq!(*seen.borrow(), Value::array([1, 1, 1]));
}

#[test]
fn collection_listener_gets_a_copy_of_the_previous_value() {
    let (_pool, scope) = root();
    scope.set("arr", Value::array([1, 2]));
    let history = Rc::new(RefCell::new(Vec::new()));

    let sink = history.clone();
    scope.watch_collection(
        |scope| Ok(scope.get("arr")),
        move |new_value, old_value, _| {
            sink.borrow_mut().push((new_value.deep_copy(), old_value.deep_copy()));
            Ok(())
        },
    );

    scope.digest().unwrap();
    scope.get("arr").push(3);
    scope.digest().unwrap();

    let history = history.borrow();
    assert_eq!(history[0], (Value::array([1, 2]), Value::array([1, 2])));
    assert_eq!(history[1], (Value::array([1, 2, 3]), Value::array([1, 2])));
}

#[test]
fn collection_new_only_listener_gets_the_new_value() {
    let (_pool, scope) = root();
    scope.set("obj", Value::object([("a", Value::from(1))]));
    let seen = Rc::new(RefCell::new(Vec::new()));

    let sink = seen.clone();
    scope.watch_collection_new_only(
        |scope| Ok(scope.get("obj")),
        move |new_value, _| {
            sink.borrow_mut().push(new_value.deep_copy());
            Ok(())
        },
    );

    scope.digest().unwrap();
    scope.get("obj").set("b", 2);
    scope.digest().unwrap();

    assert_eq!(
        *seen.borrow(),
        [
            Value::object([("a", Value::from(1))]),
            Value::object([("a", Value::from(1)), ("b", Value::from(2))]),
        ]
    );
}
