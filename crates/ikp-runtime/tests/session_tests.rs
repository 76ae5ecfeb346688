//! Integration tests for sessions and action dispatch.
//!
//! Covers:
//! - start scene and session lifecycle
//! - goto: success, idempotence, atomicity on unresolved targets
//! - set / progress / if actions and binding kinds
//! - forward compatibility with unknown widgets and actions
//! - redraw notifications, history limits, back navigation
//! - render snapshots

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use ikp_runtime::{Redraw, RuntimeError, SceneChange, Session, SessionConfig, SessionState};
use ikp_types::document::{Action, ActionValue, Document};
use ikp_types::{Template, Value};
use ikp_validator::load_document;
use serde_json::{json, Value as Json};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn document(tree: Json) -> Arc<Document> {
    Arc::new(load_document(&tree).expect("document should validate"))
}

/// Main: input bound to `name`, a button to Hello. Hello: a greeting label.
fn hello_doc() -> Arc<Document> {
    document(json!({
        "ikp": "0.4",
        "start": "Main",
        "scenes": {
            "Main": {
                "ui": [
                    { "type": "input", "label": "Your name", "var": "name" },
                    { "type": "button", "text": "Continue", "action": { "type": "goto", "target": "Hello" } }
                ]
            },
            "Hello": {
                "ui": [
                    { "type": "label", "text": "Hello ${name}!" },
                    { "type": "button", "text": "Again", "goto": "Main" }
                ]
            }
        }
    }))
}

fn session() -> Session {
    Session::open(hello_doc())
}

fn scene_name(session: &Session) -> String {
    session.current_scene().unwrap().name.clone()
}

fn set(var: &str, value: impl Into<Value>) -> Action {
    Action::Set {
        var: var.into(),
        value: ActionValue::Literal(value.into()),
    }
}

fn if_action(condition: &str, then: Vec<Action>, otherwise: Vec<Action>) -> Action {
    Action::If {
        condition: ikp_expr::parse_condition(condition).unwrap(),
        source: condition.into(),
        then,
        otherwise,
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Lifecycle
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn starts_ready_at_start_scene_with_empty_state() {
    let session = session();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(scene_name(&session), "Main");
    assert!(session.history().unwrap().is_empty());
    assert!(session.store().unwrap().is_empty());
}

#[test]
fn implicit_start_is_first_scene() {
    let session = Session::open(document(json!({
        "ikp": "0.4",
        "scenes": { "Intro": { "ui": [] }, "Outro": { "ui": [] } }
    })));
    assert_eq!(scene_name(&session), "Intro");
}

#[test]
fn start_override() {
    let config = SessionConfig {
        start: Some("Hello".into()),
        ..SessionConfig::default()
    };
    let session = Session::new(hello_doc(), config).unwrap();
    assert_eq!(scene_name(&session), "Hello");

    let config = SessionConfig {
        start: Some("Nowhere".into()),
        ..SessionConfig::default()
    };
    let err = Session::new(hello_doc(), config).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::Navigation {
            target: "Nowhere".into()
        }
    );
}

#[test]
fn sessions_over_one_document_are_independent() {
    let doc = hello_doc();
    let mut a = Session::open(Arc::clone(&doc));
    let b = Session::open(Arc::clone(&doc));
    a.set_var("name", Value::from("Ava")).unwrap();
    a.dispatch(&Action::goto("Hello")).unwrap();
    assert_eq!(scene_name(&a), "Hello");
    assert_eq!(scene_name(&b), "Main");
    assert_eq!(b.get_var("name").unwrap(), None);
}

#[test]
fn terminated_session_rejects_calls() {
    let mut session = session();
    session.set_var("name", Value::from("Ava")).unwrap();
    let store = Rc::clone(session.store().unwrap());
    session.terminate();
    assert_eq!(session.state(), SessionState::Terminated);
    assert!(store.is_empty());
    assert!(store.is_closed());
    assert_eq!(store.set("k", Value::from(1i64)), Err(RuntimeError::SessionClosed));
    assert_eq!(store.get("k"), None);
    assert_eq!(
        store.subscribe(|_| {}).unwrap_err(),
        RuntimeError::SessionClosed
    );
    assert_eq!(session.store().unwrap_err(), RuntimeError::SessionClosed);

    assert_eq!(
        session.dispatch(&Action::goto("Hello")),
        Err(RuntimeError::SessionClosed)
    );
    assert_eq!(session.current_scene().unwrap_err(), RuntimeError::SessionClosed);
    assert_eq!(
        session.set_var("name", Value::from("x")),
        Err(RuntimeError::SessionClosed)
    );
    assert!(session.history().is_err());
    assert!(session.render().is_err());
    assert!(!RuntimeError::SessionClosed.is_recoverable());
    session.terminate();
}

// ══════════════════════════════════════════════════════════════════════════════
// End-to-end scenarios
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn greeting_scenario() {
    let mut session = session();
    session.set_var("name", Value::from("Ava")).unwrap();

    let button = session.current_scene().unwrap().widgets[1].clone();
    let result = session.dispatch(button.action.as_ref().unwrap()).unwrap();
    assert_eq!(
        result.navigations,
        vec![SceneChange {
            from: "Main".into(),
            to: "Hello".into()
        }]
    );

    assert_eq!(scene_name(&session), "Hello");
    let label = session.current_scene().unwrap().widgets[0].clone();
    assert_eq!(session.interpolated_text(&label).unwrap(), "Hello Ava!");
}

#[test]
fn unresolved_goto_leaves_scene_unchanged() {
    let mut session = session();
    let err = session.dispatch(&Action::goto("Nowhere")).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::Navigation {
            target: "Nowhere".into()
        }
    );
    assert!(err.is_recoverable());
    assert_eq!(scene_name(&session), "Main");
    assert!(session.history().unwrap().is_empty());
    assert_eq!(session.state(), SessionState::Ready);
}

#[test]
fn greeting_with_unset_name_renders_empty() {
    let mut session = session();
    session.activate(1).unwrap();
    let label = session.current_scene().unwrap().widgets[0].clone();
    assert_eq!(session.interpolated_text(&label).unwrap(), "Hello !");
}

// ══════════════════════════════════════════════════════════════════════════════
// Navigation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn repeated_goto_appends_equal_history_entries() {
    let mut session = Session::open(document(json!({
        "ikp": "0.4",
        "scenes": { "A": { "ui": [] }, "B": { "ui": [] } }
    })));
    let first = session.dispatch(&Action::goto("B")).unwrap();
    session.go_back().unwrap();
    let second = session.dispatch(&Action::goto("B")).unwrap();
    assert_eq!(first, second);
    assert_eq!(scene_name(&session), "B");
    assert_eq!(session.history().unwrap(), vec!["A"]);

    let mut session = Session::open(document(json!({
        "ikp": "0.4",
        "scenes": { "A": { "ui": [] } }
    })));
    session.dispatch(&Action::goto("A")).unwrap();
    session.dispatch(&Action::goto("A")).unwrap();
    assert_eq!(scene_name(&session), "A");
    assert_eq!(session.history().unwrap(), vec!["A", "A"]);
}

#[test]
fn goto_shorthand_and_back() {
    let mut session = session();
    session.activate(1).unwrap();
    session.activate(1).unwrap();
    assert_eq!(scene_name(&session), "Main");
    assert_eq!(session.history().unwrap(), vec!["Main", "Hello"]);

    let back = session.go_back().unwrap().unwrap();
    assert_eq!(back.to, "Hello");
    assert_eq!(session.history().unwrap(), vec!["Main"]);
    session.go_back().unwrap();
    assert_eq!(scene_name(&session), "Main");
    assert_eq!(session.go_back().unwrap(), None);
}

#[test]
fn bounded_history_drops_oldest() {
    let config = SessionConfig {
        history_limit: Some(2),
        ..SessionConfig::default()
    };
    let mut session = Session::new(hello_doc(), config).unwrap();
    for _ in 0..3 {
        session.activate(1).unwrap();
    }
    assert_eq!(scene_name(&session), "Hello");
    assert_eq!(session.history().unwrap(), vec!["Hello", "Main"]);
}

#[test]
fn goto_does_not_touch_store() {
    let mut session = session();
    let version = session.store().unwrap().version("name");
    let result = session.dispatch(&Action::goto("Hello")).unwrap();
    assert!(result.changed.is_empty());
    assert_eq!(session.store().unwrap().version("name"), version);
}

#[test]
fn activate_rejects_bad_index() {
    let mut session = session();
    assert_eq!(
        session.activate(9),
        Err(RuntimeError::NoSuchWidget {
            scene: "Main".into(),
            index: 9
        })
    );
    // A widget without an action is a no-op.
    assert!(session.activate(0).unwrap().is_noop());
}

// ══════════════════════════════════════════════════════════════════════════════
// Variable actions
// ══════════════════════════════════════════════════════════════════════════════

fn form_doc() -> Arc<Document> {
    document(json!({
        "ikp": "0.4",
        "scenes": {
            "Form": { "ui": [
                { "type": "checkbox", "var": "agree", "label": "I agree" },
                { "type": "progress", "var": "done" },
                { "type": "input", "var": "name" }
            ] },
            "Next": { "ui": [] }
        }
    }))
}

#[test]
fn set_writes_and_reports_changes() {
    let mut session = Session::open(form_doc());
    let result = session.dispatch(&set("agree", true)).unwrap();
    assert_eq!(result.changed, vec!["agree"]);
    assert_eq!(session.get_var("agree").unwrap(), Some(Value::Bool(true)));

    let again = session.dispatch(&set("agree", true)).unwrap();
    assert!(again.is_noop());
}

#[test]
fn set_kind_mismatch_is_rejected() {
    let mut session = Session::open(form_doc());
    session.dispatch(&set("agree", true)).unwrap();
    let err = session.dispatch(&set("agree", "yes")).unwrap_err();
    assert!(matches!(err, RuntimeError::Validation { ref var, .. } if var == "agree"));
    assert!(err.is_recoverable());
    assert_eq!(session.get_var("agree").unwrap(), Some(Value::Bool(true)));

    assert!(matches!(
        session.set_var("agree", Value::Null),
        Err(RuntimeError::Validation { .. })
    ));
}

#[test]
fn unbound_variables_take_any_kind() {
    let mut session = Session::open(form_doc());
    session.dispatch(&set("free", 3i64)).unwrap();
    session.dispatch(&set("free", "text")).unwrap();
    assert_eq!(session.get_var("free").unwrap(), Some(Value::from("text")));
}

#[test]
fn set_template_renders_against_store() {
    let mut session = Session::open(form_doc());
    session.set_var("name", Value::from("Ava")).unwrap();
    let action = Action::Set {
        var: "greeting".into(),
        value: ActionValue::Template(Template::parse("Hi ${name}")),
    };
    session.dispatch(&action).unwrap();
    assert_eq!(session.get_var("greeting").unwrap(), Some(Value::from("Hi Ava")));
}

#[test]
fn blank_condition_runs_else_branch() {
    let doc = document(json!({
        "ikp": "0.4",
        "scenes": {
            "Main": { "ui": [
                { "type": "button", "text": "Go", "action": {
                    "type": "if", "condition": " ", "then": "goto(Yes)", "else": "goto(No)"
                } },
                { "type": "button", "text": "Go", "action": { "type": "if", "else": "goto(No)" } }
            ] },
            "Yes": { "ui": [] },
            "No": { "ui": [] }
        }
    }));
    for index in 0..2 {
        let mut session = Session::open(Arc::clone(&doc));
        session.activate(index).unwrap();
        assert_eq!(scene_name(&session), "No");
    }
}

#[test]
fn progress_values() {
    let mut session = Session::open(form_doc());
    let progress = |value: ActionValue| Action::Progress {
        var: "done".into(),
        value,
    };

    session
        .dispatch(&progress(ActionValue::Literal(Value::Number(40.0))))
        .unwrap();
    assert_eq!(session.get_var("done").unwrap(), Some(Value::Number(40.0)));

    session
        .dispatch(&progress(ActionValue::Literal(Value::from("75"))))
        .unwrap();
    assert_eq!(session.get_var("done").unwrap(), Some(Value::Number(75.0)));

    let err = session
        .dispatch(&progress(ActionValue::Literal(Value::from("lots"))))
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Validation { .. }));
    assert_eq!(session.get_var("done").unwrap(), Some(Value::Number(75.0)));

    for text in ["NaN", "inf", "-infinity"] {
        let err = session
            .dispatch(&progress(ActionValue::Literal(Value::from(text))))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Validation { .. }), "{text} accepted");
    }
    assert_eq!(session.get_var("done").unwrap(), Some(Value::Number(75.0)));
    assert_eq!(session.store().unwrap().version("done"), 2);
}

#[test]
fn if_runs_matching_branch() {
    let mut session = Session::open(form_doc());
    let action = if_action(
        "agree",
        vec![Action::goto("Next")],
        vec![set("name", "please agree")],
    );

    session.dispatch(&action).unwrap();
    assert_eq!(scene_name(&session), "Form");
    assert_eq!(
        session.get_var("name").unwrap(),
        Some(Value::from("please agree"))
    );

    session.set_var("agree", Value::Bool(true)).unwrap();
    session.dispatch(&action).unwrap();
    assert_eq!(scene_name(&session), "Next");
}

#[test]
fn failing_condition_counts_as_false() {
    let mut session = Session::open(form_doc());
    let action = if_action("1 / 0 > 1", vec![set("x", 1i64)], vec![set("x", 2i64)]);
    session.dispatch(&action).unwrap();
    assert_eq!(session.get_var("x").unwrap(), Some(Value::Number(2.0)));
}

#[test]
fn branch_sees_its_own_staged_writes() {
    let mut session = Session::open(form_doc());
    let action = if_action(
        "true",
        vec![
            set("count", 2i64),
            if_action("count == 2", vec![set("seen", true)], vec![]),
        ],
        vec![],
    );
    session.dispatch(&action).unwrap();
    assert_eq!(session.get_var("seen").unwrap(), Some(Value::Bool(true)));
}

#[test]
fn failed_action_commits_nothing() {
    let mut session = Session::open(form_doc());
    let action = if_action(
        "true",
        vec![set("name", "Ava"), Action::goto("Next"), Action::goto("Nowhere")],
        vec![],
    );
    assert!(matches!(
        session.dispatch(&action),
        Err(RuntimeError::Navigation { .. })
    ));
    assert_eq!(session.get_var("name").unwrap(), None);
    assert_eq!(scene_name(&session), "Form");
    assert!(session.history().unwrap().is_empty());
}

// ══════════════════════════════════════════════════════════════════════════════
// Forward compatibility
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn unknown_widget_survives_verbatim() {
    let hologram = json!({ "type": "hologram3d", "beam": { "color": "teal" }, "text": "Hi ${name}" });
    let mut session = Session::open(document(json!({
        "ikp": "0.4",
        "scenes": { "S": { "ui": [ { "type": "label", "text": "x" }, hologram.clone() ] } }
    })));

    let scene = session.current_scene().unwrap();
    assert_eq!(scene.widgets.len(), 2);
    assert_eq!(Json::Object(scene.widgets[1].raw.clone()), hologram);

    assert_eq!(
        session.activate(1),
        Err(RuntimeError::UnsupportedWidget {
            kind: "hologram3d".into()
        })
    );

    let rendered = session.render().unwrap();
    assert!(!rendered.widgets[1].known);
    assert_eq!(rendered.widgets[1].kind, "hologram3d");
}

#[test]
fn unknown_action_is_unsupported() {
    let mut session = Session::open(document(json!({
        "ikp": "0.4",
        "scenes": { "S": { "ui": [
            { "type": "button", "action": { "type": "play_sound", "file": "ding.wav" } }
        ] } }
    })));
    let err = session.activate(0).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::UnsupportedAction {
            kind: "play_sound".into()
        }
    );
    assert!(err.is_recoverable());
    assert_eq!(session.state(), SessionState::Ready);
}

// ══════════════════════════════════════════════════════════════════════════════
// Redraw, defaults, render
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn redraw_notifications() {
    let mut session = session();
    let events: Rc<RefCell<Vec<Redraw>>> = Rc::default();
    {
        let events = Rc::clone(&events);
        session
            .subscribe(move |event| events.borrow_mut().push(event.clone()))
            .unwrap();
    }

    session.set_var("name", Value::from("Ava")).unwrap();
    session.dispatch(&Action::goto("Hello")).unwrap();
    assert_eq!(
        *events.borrow(),
        vec![
            Redraw::Variable { key: "name".into() },
            Redraw::SceneChanged {
                from: "Main".into(),
                to: "Hello".into()
            },
        ]
    );

    session.dispatch(&Action::goto("Nowhere")).unwrap_err();
    assert_eq!(events.borrow().len(), 2, "failed dispatch must not notify");
}

#[test]
fn seeding_defaults_is_opt_in() {
    let doc = document(json!({
        "ikp": "0.4",
        "scenes": { "S": { "ui": [
            { "type": "checkbox", "var": "agree" },
            { "type": "slider", "var": "volume", "value": 5 },
            { "type": "dropdown", "var": "colour", "options": ["red", "blue"] },
            { "type": "colorpicker", "var": "accent" }
        ] } }
    }));

    let plain = Session::open(Arc::clone(&doc));
    assert!(plain.store().unwrap().is_empty());

    let config = SessionConfig {
        seed_defaults: true,
        ..SessionConfig::default()
    };
    let seeded = Session::new(doc, config).unwrap();
    assert_eq!(seeded.state(), SessionState::Ready);
    assert_eq!(seeded.get_var("agree").unwrap(), Some(Value::Bool(false)));
    assert_eq!(seeded.get_var("volume").unwrap(), Some(Value::Number(5.0)));
    assert_eq!(seeded.get_var("colour").unwrap(), Some(Value::from("red")));
    assert_eq!(seeded.get_var("accent").unwrap(), Some(Value::from("#ffffff")));
}

/// `x` is a checkbox in Bind and a slider in Other; the validator only
/// warns and the first binding (boolean) wins.
fn conflicting_defaults_doc() -> Arc<Document> {
    document(json!({
        "ikp": "0.4",
        "start": "Main",
        "scenes": {
            "Main": { "ui": [ { "type": "label", "text": "start" } ] },
            "Bind": { "ui": [ { "type": "checkbox", "var": "x" } ] },
            "Other": { "ui": [ { "type": "slider", "var": "x", "value": 5 } ] }
        }
    }))
}

fn seeding() -> SessionConfig {
    SessionConfig {
        seed_defaults: true,
        ..SessionConfig::default()
    }
}

#[test]
fn mismatched_default_does_not_fail_navigation() {
    let mut session = Session::new(conflicting_defaults_doc(), seeding()).unwrap();

    let result = session.dispatch(&Action::goto("Other")).unwrap();
    assert_eq!(
        result.navigations,
        vec![SceneChange {
            from: "Main".into(),
            to: "Other".into()
        }]
    );
    assert_eq!(scene_name(&session), "Other");
    assert_eq!(session.history().unwrap(), vec!["Main"]);
    assert_eq!(session.get_var("x").unwrap(), None);

    session.dispatch(&Action::goto("Bind")).unwrap();
    assert_eq!(session.get_var("x").unwrap(), Some(Value::Bool(false)));

    session.go_back().unwrap();
    assert_eq!(scene_name(&session), "Other");
    assert_eq!(session.get_var("x").unwrap(), Some(Value::Bool(false)));
}

#[test]
fn mismatched_default_does_not_fail_session_start() {
    let config = SessionConfig {
        start: Some("Other".into()),
        ..seeding()
    };
    let session = Session::new(conflicting_defaults_doc(), config).unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(scene_name(&session), "Other");
    assert_eq!(session.get_var("x").unwrap(), None);
}

#[test]
fn render_snapshot() {
    let session = session();
    session.set_var("name", Value::from("Ava")).unwrap();
    let rendered = session.render().unwrap();
    assert_eq!(rendered.scene, "Main");
    assert_eq!(rendered.widgets[0].value, Some(Value::from("Ava")));
    assert_eq!(rendered.widgets[0].text["label"], "Your name");
    assert_eq!(rendered.widgets[1].action.as_deref(), Some("goto"));

    let json = serde_json::to_value(&rendered).unwrap();
    assert_eq!(json["widgets"][0]["type"], json!("input"));
    assert_eq!(json["widgets"][0]["value"], json!("Ava"));
    assert!(json["widgets"][1].get("var").is_none());
}
