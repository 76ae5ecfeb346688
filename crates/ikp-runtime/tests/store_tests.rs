//! Integration tests for the variable store and interpolation.
//!
//! Covers:
//! - get/set, undefined vs null, version counters
//! - synchronous notification, unsubscribe, reentrancy
//! - single-pass interpolation and its properties

use std::cell::RefCell;
use std::rc::Rc;

use ikp_runtime::{interpolate, RuntimeError, VarChange, VariableStore};
use ikp_types::Value;
use proptest::prelude::*;

// ══════════════════════════════════════════════════════════════════════════════
// Get / set
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn unset_key_is_undefined_not_null() {
    let store = VariableStore::new();
    assert_eq!(store.get("name"), None);
    store.set("name", Value::Null).unwrap();
    assert_eq!(store.get("name"), Some(Value::Null));
    assert!(store.contains("name"));
}

#[test]
fn set_accepts_every_kind() {
    let store = VariableStore::new();
    for (key, value) in [
        ("a", Value::Null),
        ("b", Value::Bool(true)),
        ("c", Value::Number(2.5)),
        ("d", Value::from("text")),
    ] {
        assert!(store.set(key, value.clone()).unwrap());
        assert_eq!(store.get(key), Some(value));
    }
    assert_eq!(store.len(), 4);
}

#[test]
fn no_coercion_between_kinds() {
    let store = VariableStore::new();
    store.set("x", Value::Number(1.0)).unwrap();
    store.set("x", Value::from("1")).unwrap();
    assert_eq!(store.get("x"), Some(Value::from("1")));
}

#[test]
fn version_bumps_only_on_change() {
    let store = VariableStore::new();
    assert_eq!(store.version("x"), 0);
    assert!(store.set("x", Value::from("a")).unwrap());
    assert_eq!(store.version("x"), 1);
    assert!(!store.set("x", Value::from("a")).unwrap());
    assert_eq!(store.version("x"), 1);
    assert!(store.set("x", Value::from("b")).unwrap());
    assert_eq!(store.version("x"), 2);
    assert_eq!(store.version("y"), 0);
}

#[test]
fn snapshot_is_ordered_by_key() {
    let store = VariableStore::new();
    store.set("b", Value::from(2i64)).unwrap();
    store.set("a", Value::from(1i64)).unwrap();
    let keys: Vec<_> = store.snapshot().into_keys().collect();
    assert_eq!(keys, vec!["a", "b"]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Notification
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn subscribers_notified_before_set_returns() {
    let store = VariableStore::new();
    let seen: Rc<RefCell<Vec<VarChange>>> = Rc::default();
    {
        let seen = Rc::clone(&seen);
        store
            .subscribe(move |change| seen.borrow_mut().push(change.clone()))
            .unwrap();
    }

    store.set("name", Value::from("Ava")).unwrap();
    assert_eq!(seen.borrow().len(), 1);
    store.set("name", Value::from("Ava")).unwrap();
    assert_eq!(seen.borrow().len(), 1, "equal write must not notify");
    store.set("name", Value::from("Bo")).unwrap();

    let seen = seen.borrow();
    assert_eq!(seen[0].old, None);
    assert_eq!(seen[1].old, Some(Value::from("Ava")));
    assert_eq!(seen[1].new, Value::from("Bo"));
    assert_eq!(seen[1].version, 2);
}

#[test]
fn listener_can_read_during_notification() {
    let store = Rc::new(VariableStore::new());
    let observed = Rc::new(RefCell::new(None));
    {
        let reader = Rc::clone(&store);
        let observed = Rc::clone(&observed);
        store
            .subscribe(move |change| {
                *observed.borrow_mut() = reader.get(&change.key);
            })
            .unwrap();
    }
    store.set("x", Value::from(3i64)).unwrap();
    assert_eq!(*observed.borrow(), Some(Value::Number(3.0)));
}

#[test]
fn unsubscribe_stops_notifications() {
    let store = VariableStore::new();
    let count = Rc::new(RefCell::new(0));
    let id = {
        let count = Rc::clone(&count);
        store.subscribe(move |_| *count.borrow_mut() += 1).unwrap()
    };
    store.set("x", Value::from(1i64)).unwrap();
    assert!(store.unsubscribe(id));
    store.set("x", Value::from(2i64)).unwrap();
    assert_eq!(*count.borrow(), 1);
    assert_eq!(store.subscriber_count(), 0);
}

#[test]
fn recursive_set_is_reentrancy_error() {
    let store = Rc::new(VariableStore::new());
    let result = Rc::new(RefCell::new(None));
    {
        let writer = Rc::clone(&store);
        let result = Rc::clone(&result);
        store
            .subscribe(move |_| {
                *result.borrow_mut() = Some(writer.set("echo", Value::Bool(true)));
            })
            .unwrap();
    }

    store.set("x", Value::from(1i64)).unwrap();
    assert_eq!(
        *result.borrow(),
        Some(Err(RuntimeError::Reentrancy {
            key: "echo".into()
        }))
    );
    assert_eq!(store.get("echo"), None);
    assert!(!store.is_notifying());
    // The store is usable again once notification is over.
    assert!(store.set("y", Value::from(1i64)).unwrap());
}

// ══════════════════════════════════════════════════════════════════════════════
// Interpolation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn interpolates_current_values() {
    let store = VariableStore::new();
    store.set("name", Value::from("Ava")).unwrap();
    store.set("age", Value::from(30i64)).unwrap();
    store.set("ok", Value::Bool(true)).unwrap();
    assert_eq!(
        interpolate("${name} is ${age} (${ok})", &store),
        "Ava is 30 (true)"
    );
}

#[test]
fn undefined_and_null_render_empty() {
    let store = VariableStore::new();
    store.set("nothing", Value::Null).unwrap();
    assert_eq!(interpolate("[${missing}][${nothing}]", &store), "[][]");
}

#[test]
fn malformed_spans_left_verbatim() {
    let store = VariableStore::new();
    store.set("a", Value::from("A")).unwrap();
    assert_eq!(interpolate("${a", &store), "${a");
    assert_eq!(interpolate("${} ${a-b} $a", &store), "${} ${a-b} $a");
    assert_eq!(interpolate("${${a}}", &store), "${A}");
}

#[test]
fn substituted_text_is_not_rescanned() {
    let store = VariableStore::new();
    store.set("a", Value::from("${b}")).unwrap();
    store.set("b", Value::from("boom")).unwrap();
    assert_eq!(interpolate("x${a}x", &store), "x${b}x");
}

proptest! {
    #[test]
    fn text_without_spans_is_identity(text in "[^$]*") {
        let store = VariableStore::new();
        store.set("x", Value::from("value")).unwrap();
        prop_assert_eq!(interpolate(&text, &store), text);
    }

    #[test]
    fn unwritten_key_renders_empty(key in "[A-Za-z_][A-Za-z0-9_]{0,16}") {
        let store = VariableStore::new();
        prop_assert_eq!(store.get(&key), None);
        prop_assert_eq!(interpolate(&format!("${{{key}}}"), &store), "");
    }
}
