//! Action dispatch with atomic commit.
//!
//! An action runs against a [`Transaction`] that stages variable writes and
//! scene transitions. Reads inside the action see its own staged writes.
//! Only when the whole action (including every nested branch) succeeds are
//! the staged effects applied to the session; any failure leaves the
//! session exactly as it was.

use ikp_types::document::{Action, ActionValue, Document};
use ikp_types::{Value, ValueKind};
use serde::Serialize;

use crate::error::RuntimeError;
use crate::evaluator::condition_holds;
use crate::interpolate::render_template;
use crate::session::Session;
use crate::store::Lookup;
use crate::RuntimeResult;

/// One scene transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneChange {
    pub from: String,
    pub to: String,
}

/// The committed effects of a successful dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dispatched {
    /// Variables whose value changed, in write order.
    pub changed: Vec<String>,
    /// Scene transitions, in order.
    pub navigations: Vec<SceneChange>,
}

impl Dispatched {
    pub fn navigated(&self) -> bool {
        !self.navigations.is_empty()
    }

    /// True when nothing observable happened.
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty() && self.navigations.is_empty()
    }
}

/// Execute `action` against `session`.
///
/// Recoverable failures (`Navigation`, `UnsupportedAction`, `Validation`)
/// leave the session unchanged and in the `Ready` state.
pub fn dispatch(action: &Action, session: &mut Session) -> RuntimeResult<Dispatched> {
    session.ensure_open()?;

    let (writes, gotos) = {
        let mut tx = Transaction::new(session);
        if let Err(err) = tx.run(action) {
            tracing::warn!(action = action.kind_name(), error = %err, "dispatch rejected");
            return Err(err);
        }
        (tx.writes, tx.gotos)
    };

    if let Some((key, _)) = writes.first() {
        if session.vars().is_notifying() {
            return Err(RuntimeError::Reentrancy { key: key.clone() });
        }
    }

    let mut dispatched = Dispatched::default();
    for (key, value) in writes {
        if session.vars().set(&key, value)? {
            dispatched.changed.push(key);
        }
    }
    for target in gotos {
        dispatched.navigations.push(session.navigate(target));
    }
    tracing::debug!(
        action = action.kind_name(),
        changed = dispatched.changed.len(),
        navigations = dispatched.navigations.len(),
        "dispatch committed"
    );
    Ok(dispatched)
}

/// Reject `value` if `var` is bound to a widget expecting another kind.
pub(crate) fn check_write(document: &Document, var: &str, value: &Value) -> RuntimeResult<()> {
    match document.binding(var) {
        Some(expected) if value.kind() != expected => Err(RuntimeError::validation(
            var,
            format!("expected {expected}, got {}", value.kind()),
        )),
        _ => Ok(()),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Transaction
// ══════════════════════════════════════════════════════════════════════════════

struct Transaction<'s> {
    session: &'s Session,
    writes: Vec<(String, Value)>,
    gotos: Vec<String>,
}

impl<'s> Transaction<'s> {
    fn new(session: &'s Session) -> Self {
        Self {
            session,
            writes: Vec::new(),
            gotos: Vec::new(),
        }
    }

    fn document(&self) -> &'s Document {
        self.session.document()
    }

    fn run(&mut self, action: &Action) -> RuntimeResult<()> {
        match action {
            Action::Goto { target } => {
                if !self.document().has_scene(target) {
                    return Err(RuntimeError::Navigation {
                        target: target.clone(),
                    });
                }
                self.gotos.push(target.clone());
                Ok(())
            }
            Action::Set { var, value } => {
                let value = self.resolve_set(var, value);
                check_write(self.document(), var, &value)?;
                self.stage(var, value);
                Ok(())
            }
            Action::Progress { var, value } => {
                let value = Value::Number(self.resolve_progress(var, value)?);
                check_write(self.document(), var, &value)?;
                self.stage(var, value);
                Ok(())
            }
            Action::If {
                condition,
                source,
                then,
                otherwise,
            } => {
                let holds = condition_holds(condition, &*self).unwrap_or_else(|err| {
                    tracing::warn!(condition = %source, error = %err, "condition failed; treated as false");
                    false
                });
                let branch = if holds { then } else { otherwise };
                branch.iter().try_for_each(|action| self.run(action))
            }
            Action::Unknown { kind, .. } => Err(RuntimeError::UnsupportedAction { kind: kind.clone() }),
        }
    }

    /// Literal values are written as-is. Templates render to a string,
    /// then to the bound kind when the text reads as one.
    fn resolve_set(&self, var: &str, value: &ActionValue) -> Value {
        let template = match value {
            ActionValue::Literal(value) => return value.clone(),
            ActionValue::Template(template) => template,
        };
        let rendered = Value::String(render_template(template, self));
        match self.document().binding(var) {
            Some(kind) if kind != ValueKind::String => {
                let coerced = rendered.coerced();
                if coerced.kind() == kind {
                    coerced
                } else {
                    rendered
                }
            }
            _ => rendered,
        }
    }

    fn resolve_progress(&self, var: &str, value: &ActionValue) -> RuntimeResult<f64> {
        let text = match value {
            ActionValue::Literal(Value::Number(n)) => return Ok(*n),
            ActionValue::Literal(Value::String(s)) => s.clone(),
            ActionValue::Template(template) => render_template(template, self),
            ActionValue::Literal(other) => {
                return Err(RuntimeError::validation(
                    var,
                    format!("progress value must be a number, got {}", other.kind()),
                ))
            }
        };
        match text.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(n),
            _ => Err(RuntimeError::validation(
                var,
                format!("progress value '{text}' is not a finite number"),
            )),
        }
    }

    fn stage(&mut self, var: &str, value: Value) {
        match self.writes.iter_mut().find(|(key, _)| key == var) {
            Some(slot) => slot.1 = value,
            None => self.writes.push((var.to_string(), value)),
        }
    }
}

impl Lookup for Transaction<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.writes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .or_else(|| self.session.vars().get(name))
    }
}
