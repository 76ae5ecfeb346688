//! Session: one live instantiation of a document.
//!
//! States: `Loading → Ready → Terminated`. Dispatch failures are returned
//! as results and never change the state; after `terminate` every call
//! returns [`RuntimeError::SessionClosed`].

use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use ikp_types::document::{Action, Document, RawMap, Scene, Widget};
use ikp_types::Value;
use serde::Serialize;

use crate::config::SessionConfig;
use crate::dispatch::{check_write, dispatch, Dispatched, SceneChange};
use crate::error::RuntimeError;
use crate::interpolate::{interpolate, interpolated_props, interpolated_text};
use crate::listeners::{Listeners, SubscriptionId};
use crate::store::VariableStore;
use crate::RuntimeResult;

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Loading,
    Ready,
    Terminated,
}

/// A "redraw needed" notification for renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Redraw {
    /// A variable changed value.
    Variable { key: String },
    /// The current scene changed.
    SceneChanged { from: String, to: String },
}

/// Snapshot of the current scene with every template resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedScene {
    pub scene: String,
    pub widgets: Vec<RenderedWidget>,
}

/// One widget of a [`RenderedScene`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedWidget {
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: String,
    /// False for widget types this runtime does not understand; renderers
    /// may skip them.
    pub known: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub var: Option<String>,
    /// Current value of `var`; `None` when unbound or unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Interpolated string properties.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub text: BTreeMap<String, String>,
    /// Discriminant of the attached action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub props: RawMap,
}

/// One live, stateful instantiation of a [`Document`].
///
/// The document is shared and read-only; any number of sessions may run
/// over the same `Arc<Document>`. Each owns its own store and history.
pub struct Session {
    document: Arc<Document>,
    config: SessionConfig,
    state: SessionState,
    current: String,
    history: VecDeque<String>,
    store: Rc<VariableStore>,
    redraw: Rc<Listeners<Redraw>>,
}

impl Session {
    /// Start a session at the document's resolved start scene.
    pub fn open(document: Arc<Document>) -> Self {
        let start = document.start().to_string();
        Self::build(document, SessionConfig::default(), start)
    }

    /// Start a session with explicit settings.
    ///
    /// Fails with [`RuntimeError::Navigation`] when `config.start` names an
    /// undeclared scene.
    pub fn new(document: Arc<Document>, config: SessionConfig) -> RuntimeResult<Self> {
        let start = match &config.start {
            Some(start) if !document.has_scene(start) => {
                return Err(RuntimeError::Navigation {
                    target: start.clone(),
                })
            }
            Some(start) => start.clone(),
            None => document.start().to_string(),
        };
        let mut session = Self::build(document, config, start);
        if session.config.seed_defaults {
            session.state = SessionState::Loading;
            session.seed_defaults();
            session.state = SessionState::Ready;
        }
        Ok(session)
    }

    fn build(document: Arc<Document>, config: SessionConfig, start: String) -> Self {
        let redraw: Rc<Listeners<Redraw>> = Rc::new(Listeners::new());
        let store = {
            let redraw = Rc::clone(&redraw);
            Rc::new(VariableStore::with_listener(move |change| {
                redraw.emit(&Redraw::Variable {
                    key: change.key.clone(),
                })
            }))
        };
        tracing::debug!(
            start = %start,
            scenes = document.scenes().count(),
            version = document.version(),
            "session ready"
        );
        Self {
            document,
            config,
            state: SessionState::Ready,
            current: start,
            history: VecDeque::new(),
            store,
            redraw,
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Accessors
    // ══════════════════════════════════════════════════════════════════════

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The variable store. Hosts write input-bearing widget values through
    /// [`Session::set_var`], which also checks binding kinds. A store kept
    /// past [`Session::terminate`] rejects writes with `SessionClosed`.
    pub fn store(&self) -> RuntimeResult<&Rc<VariableStore>> {
        self.ensure_open()?;
        Ok(&self.store)
    }

    pub(crate) fn vars(&self) -> &VariableStore {
        &self.store
    }

    pub(crate) fn ensure_open(&self) -> RuntimeResult<()> {
        match self.state {
            SessionState::Terminated => Err(RuntimeError::SessionClosed),
            SessionState::Loading | SessionState::Ready => Ok(()),
        }
    }

    pub fn current_scene(&self) -> RuntimeResult<&Scene> {
        self.ensure_open()?;
        self.document
            .scene(&self.current)
            .ok_or_else(|| RuntimeError::Navigation {
                target: self.current.clone(),
            })
    }

    pub fn current_scene_name(&self) -> RuntimeResult<&str> {
        self.ensure_open()?;
        Ok(&self.current)
    }

    /// Scenes navigated away from, oldest first.
    pub fn history(&self) -> RuntimeResult<Vec<&str>> {
        self.ensure_open()?;
        Ok(self.history.iter().map(String::as_str).collect())
    }

    // ══════════════════════════════════════════════════════════════════════
    // Variables & text
    // ══════════════════════════════════════════════════════════════════════

    pub fn get_var(&self, key: &str) -> RuntimeResult<Option<Value>> {
        self.ensure_open()?;
        Ok(self.store.get(key))
    }

    /// Write a variable on behalf of an input-bearing widget.
    ///
    /// Values for bound variables must match the binding's kind; a rejected
    /// write leaves the prior value in place.
    pub fn set_var(&self, key: &str, value: Value) -> RuntimeResult<bool> {
        self.ensure_open()?;
        check_write(&self.document, key, &value)?;
        self.store.set(key, value)
    }

    pub fn interpolate(&self, template: &str) -> RuntimeResult<String> {
        self.ensure_open()?;
        Ok(interpolate(template, self.store.as_ref()))
    }

    /// The widget's main text with `${name}` spans resolved.
    pub fn interpolated_text(&self, widget: &Widget) -> RuntimeResult<String> {
        self.ensure_open()?;
        Ok(interpolated_text(widget, self.store.as_ref()))
    }

    /// Subscribe to redraw notifications: variable changes and scene
    /// transitions, delivered synchronously.
    pub fn subscribe(&self, listener: impl Fn(&Redraw) + 'static) -> RuntimeResult<SubscriptionId> {
        self.ensure_open()?;
        Ok(self.redraw.add(listener))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.redraw.remove(id)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Interaction
    // ══════════════════════════════════════════════════════════════════════

    pub fn dispatch(&mut self, action: &Action) -> RuntimeResult<Dispatched> {
        dispatch(action, self)
    }

    /// Activate the widget at `index` in the current scene, dispatching its
    /// action if it has one.
    pub fn activate(&mut self, index: usize) -> RuntimeResult<Dispatched> {
        let widget = self
            .current_scene()?
            .widget(index)
            .ok_or_else(|| RuntimeError::NoSuchWidget {
                scene: self.current.clone(),
                index,
            })?;
        if !widget.kind.is_known() {
            return Err(RuntimeError::UnsupportedWidget {
                kind: widget.kind.as_str().to_string(),
            });
        }
        match widget.action.clone() {
            Some(action) => dispatch(&action, self),
            None => Ok(Dispatched::default()),
        }
    }

    /// Return to the most recent history entry.
    ///
    /// The entry is popped and the current scene replaced; nothing is
    /// pushed, so repeated calls walk back through history. Returns
    /// `Ok(None)` when the history is empty.
    pub fn go_back(&mut self) -> RuntimeResult<Option<SceneChange>> {
        self.ensure_open()?;
        let Some(previous) = self.history.pop_back() else {
            return Ok(None);
        };
        let from = std::mem::replace(&mut self.current, previous);
        let change = SceneChange {
            from,
            to: self.current.clone(),
        };
        self.redraw.emit(&Redraw::SceneChanged {
            from: change.from.clone(),
            to: change.to.clone(),
        });
        self.seed_defaults();
        Ok(Some(change))
    }

    /// Move to `target`, recording the current scene in history. The
    /// target has already been checked by the dispatcher.
    pub(crate) fn navigate(&mut self, target: String) -> SceneChange {
        let from = std::mem::replace(&mut self.current, target);
        self.history.push_back(from.clone());
        if let Some(limit) = self.config.history_limit {
            while self.history.len() > limit {
                self.history.pop_front();
            }
        }
        let change = SceneChange {
            from,
            to: self.current.clone(),
        };
        tracing::debug!(from = %change.from, to = %change.to, "scene changed");
        self.redraw.emit(&Redraw::SceneChanged {
            from: change.from.clone(),
            to: change.to.clone(),
        });
        self.seed_defaults();
        change
    }

    /// Give unset variables bound in the current scene their widget
    /// defaults. No-op unless `seed_defaults` is enabled.
    ///
    /// Never fails: a default that does not match its variable's binding
    /// (possible when widgets disagree on a variable's kind) is skipped.
    fn seed_defaults(&self) {
        if !self.config.seed_defaults {
            return;
        }
        let Some(scene) = self.document.scene(&self.current) else {
            return;
        };
        for widget in &scene.widgets {
            let (Some(var), Some(default)) = (&widget.var, widget.default_value()) else {
                continue;
            };
            if self.store.contains(var) {
                continue;
            }
            if let Err(err) = check_write(&self.document, var, &default)
                .and_then(|()| self.store.set(var, default).map(drop))
            {
                tracing::warn!(scene = %self.current, var = %var, error = %err, "default not seeded");
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Rendering & teardown
    // ══════════════════════════════════════════════════════════════════════

    /// Resolve the current scene for display.
    pub fn render(&self) -> RuntimeResult<RenderedScene> {
        let scene = self.current_scene()?;
        let store = self.store.as_ref();
        let widgets = scene
            .widgets
            .iter()
            .enumerate()
            .map(|(index, widget)| RenderedWidget {
                index,
                kind: widget.kind.as_str().to_string(),
                known: widget.kind.is_known(),
                var: widget.var.clone(),
                value: widget.var.as_deref().and_then(|var| store.get(var)),
                text: interpolated_props(widget, store),
                action: widget.action.as_ref().map(|a| a.kind_name().to_string()),
                props: widget.props.clone(),
            })
            .collect();
        Ok(RenderedScene {
            scene: scene.name.clone(),
            widgets,
        })
    }

    /// Tear the session down, discarding variables, history and
    /// subscribers. Idempotent.
    pub fn terminate(&mut self) {
        if self.state == SessionState::Terminated {
            return;
        }
        self.state = SessionState::Terminated;
        self.store.close();
        self.history.clear();
        self.redraw.clear();
        tracing::debug!(scene = %self.current, "session terminated");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("current", &self.current)
            .field("history", &self.history)
            .field("store", &self.store)
            .finish()
    }
}
