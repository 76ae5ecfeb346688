//! Structural validation and normalisation of IKP documents.
//!
//! Diagnostic codes emitted:
//! - D100–D113: root, version, scenes, `ui` lists, start scene
//! - D200–D204: widget entries and `var` bindings
//! - D300–D307: actions (see `action.rs`)
//! - D400: condition syntax
//! - D401: empty or missing condition (warning; the condition is false)
//! - D500: one variable bound to widgets of different kinds

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use ikp_types::document::{Document, RawMap, Scene, Widget, WidgetKind, WIDGET_RESERVED_KEYS};
use ikp_types::{Diagnostics, DocumentError, ErrorCode, NodePath, Template, ValueKind};
use serde_json::Value as Json;

use crate::{ImplicitStart, ValidationOutcome, ValidatorOptions};

/// Root keys the validator interprets.
const ROOT_KEYS: &[&str] = &["ikp", "meta", "start", "scenes"];

/// True for names usable as variables: `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Walks a raw document tree, collecting diagnostics and building the model.
pub struct Validator<'a> {
    options: &'a ValidatorOptions,
    pub(crate) diagnostics: Diagnostics,
    /// Declared scene names, known before any widget is visited.
    pub(crate) scene_names: HashSet<String>,
    /// First binding of each variable, with the path that declared it.
    bindings: BTreeMap<String, (ValueKind, NodePath)>,
}

impl<'a> Validator<'a> {
    pub fn new(options: &'a ValidatorOptions) -> Self {
        Self {
            options,
            diagnostics: Diagnostics::empty(),
            scene_names: HashSet::new(),
            bindings: BTreeMap::new(),
        }
    }

    pub(crate) fn error(&mut self, code: ErrorCode, path: NodePath, message: impl Into<String>) {
        self.diagnostics
            .push_error(DocumentError::new(code, path, message));
    }

    pub(crate) fn warn(&mut self, code: ErrorCode, path: NodePath, message: impl Into<String>) {
        self.diagnostics
            .push_warning(DocumentError::warning(code, path, message));
    }

    /// Validate `tree`, consuming the validator.
    pub fn validate(mut self, tree: &Json) -> ValidationOutcome {
        let document = self.check_root(tree);
        let document = if self.diagnostics.has_errors() {
            None
        } else {
            document
        };
        tracing::debug!(
            valid = document.is_some(),
            errors = self.diagnostics.total_errors,
            warnings = self.diagnostics.total_warnings,
            "validated IKP document"
        );
        ValidationOutcome {
            document,
            diagnostics: self.diagnostics,
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Root
    // ══════════════════════════════════════════════════════════════════════

    fn check_root(&mut self, tree: &Json) -> Option<Document> {
        let root = NodePath::root();
        let Some(map) = tree.as_object() else {
            self.error(
                ErrorCode::ROOT_NOT_MAPPING,
                root,
                "document root must be a mapping",
            );
            return None;
        };

        let version = self.check_version(map.get("ikp"));
        let meta = map.get("meta").cloned().unwrap_or(Json::Null);

        let mut extras = RawMap::new();
        for (key, value) in map {
            if !ROOT_KEYS.contains(&key.as_str()) {
                self.warn(
                    ErrorCode::UNKNOWN_FIELD,
                    root.key(key),
                    format!("unknown top-level field '{key}' is ignored"),
                );
                extras.insert(key.clone(), value.clone());
            }
        }

        let scenes_path = root.key("scenes");
        let scenes_map = match map.get("scenes") {
            None => {
                self.error(
                    ErrorCode::MISSING_SCENES,
                    scenes_path,
                    "missing required field 'scenes'",
                );
                return None;
            }
            Some(Json::Object(scenes)) if scenes.is_empty() => {
                self.error(
                    ErrorCode::EMPTY_SCENES,
                    scenes_path,
                    "'scenes' must declare at least one scene",
                );
                return None;
            }
            Some(Json::Object(scenes)) => scenes,
            Some(_) => {
                self.error(
                    ErrorCode::SCENES_NOT_MAPPING,
                    scenes_path,
                    "'scenes' must be a mapping of scene name to scene",
                );
                return None;
            }
        };

        self.scene_names = scenes_map.keys().cloned().collect();
        let start = self.resolve_start(map.get("start"), scenes_map);

        let mut scenes = IndexMap::new();
        for (name, scene) in scenes_map {
            if let Some(scene) = self.check_scene(name, scene, &scenes_path.key(name)) {
                scenes.insert(name.clone(), scene);
            }
        }

        let version = version?;
        let start = start?;
        if self.diagnostics.has_errors() {
            return None;
        }

        let bindings = std::mem::take(&mut self.bindings)
            .into_iter()
            .map(|(var, (kind, _))| (var, kind))
            .collect();
        match Document::new(version, meta, start, scenes, extras, bindings) {
            Ok(document) => Some(document),
            Err(err) => {
                self.diagnostics.push_error(err);
                None
            }
        }
    }

    fn check_version(&mut self, raw: Option<&Json>) -> Option<String> {
        let path = NodePath::root().key("ikp");
        match raw {
            Some(Json::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            // `ikp: 0.4` in YAML arrives as a number.
            Some(Json::Number(n)) => Some(n.to_string()),
            None | Some(Json::Null) => {
                self.error(
                    ErrorCode::MISSING_VERSION,
                    path,
                    "missing required field 'ikp' (format version)",
                );
                None
            }
            Some(_) => {
                self.error(
                    ErrorCode::INVALID_VERSION,
                    path,
                    "'ikp' must be a version string such as \"0.4\"",
                );
                None
            }
        }
    }

    fn resolve_start(&mut self, raw: Option<&Json>, scenes: &RawMap) -> Option<String> {
        let path = NodePath::root().key("start");
        let first = scenes.keys().next()?.clone();
        let require = self.options.implicit_start == ImplicitStart::Require;

        let declared = match raw {
            None | Some(Json::Null) => None,
            Some(Json::String(name)) => Some(name.clone()),
            Some(_) => {
                self.error(
                    ErrorCode::INVALID_START,
                    path,
                    "'start' must be a scene name",
                );
                return None;
            }
        };

        match declared {
            Some(name) if scenes.contains_key(&name) => Some(name),
            Some(name) if require => {
                self.error(
                    ErrorCode::UNKNOWN_START,
                    path,
                    format!("start scene '{name}' is not declared"),
                );
                None
            }
            Some(name) => {
                self.diagnostics.push_warning(
                    DocumentError::warning(
                        ErrorCode::UNKNOWN_START,
                        path,
                        format!("start scene '{name}' is not declared"),
                    )
                    .with_suggestion(format!("starting at the first scene, '{first}'")),
                );
                Some(first)
            }
            None if require => {
                self.error(
                    ErrorCode::MISSING_START,
                    path,
                    "missing required field 'start'",
                );
                None
            }
            None => Some(first),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Scenes
    // ══════════════════════════════════════════════════════════════════════

    fn check_scene(&mut self, name: &str, raw: &Json, path: &NodePath) -> Option<Scene> {
        if name.trim().is_empty() {
            self.error(
                ErrorCode::INVALID_SCENE_NAME,
                path.clone(),
                "scene names must not be empty",
            );
            return None;
        }
        let Some(map) = raw.as_object() else {
            self.error(
                ErrorCode::SCENE_NOT_MAPPING,
                path.clone(),
                format!("scene '{name}' must be a mapping"),
            );
            return None;
        };

        let extras: RawMap = map
            .iter()
            .filter(|(k, _)| k.as_str() != "ui")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let ui_path = path.key("ui");
        let entries = match map.get("ui") {
            None | Some(Json::Null) => {
                self.warn(
                    ErrorCode::MISSING_UI,
                    ui_path,
                    format!("scene '{name}' has no `ui` list"),
                );
                return Some(Scene {
                    name: name.to_string(),
                    widgets: Vec::new(),
                    extras,
                });
            }
            Some(Json::Array(entries)) => entries,
            Some(_) => {
                self.error(
                    ErrorCode::UI_NOT_SEQUENCE,
                    ui_path,
                    format!("scene '{name}': `ui` must be a list"),
                );
                return None;
            }
        };

        let mut widgets = Vec::with_capacity(entries.len());
        let mut failed = false;
        for (i, entry) in entries.iter().enumerate() {
            match self.check_widget(entry, &ui_path.index(i)) {
                Some(widget) => widgets.push(widget),
                None => failed = true,
            }
        }
        if failed {
            return None;
        }
        Some(Scene {
            name: name.to_string(),
            widgets,
            extras,
        })
    }

    // ══════════════════════════════════════════════════════════════════════
    // Widgets
    // ══════════════════════════════════════════════════════════════════════

    fn check_widget(&mut self, raw: &Json, path: &NodePath) -> Option<Widget> {
        let Some(map) = raw.as_object() else {
            self.error(
                ErrorCode::WIDGET_NOT_MAPPING,
                path.clone(),
                "widget entry must be a mapping",
            );
            return None;
        };

        let kind = match map.get("type") {
            Some(Json::String(t)) if !t.trim().is_empty() => WidgetKind::parse(t.trim()),
            None | Some(Json::Null) => {
                self.error(
                    ErrorCode::MISSING_WIDGET_TYPE,
                    path.clone(),
                    "widget is missing required field 'type'",
                );
                return None;
            }
            Some(_) => {
                self.error(
                    ErrorCode::INVALID_WIDGET_TYPE,
                    path.key("type"),
                    "widget 'type' must be a non-empty string",
                );
                return None;
            }
        };
        if let WidgetKind::Unknown(raw_kind) = &kind {
            self.diagnostics.push_warning(
                DocumentError::warning(
                    ErrorCode::UNKNOWN_WIDGET_TYPE,
                    path.key("type"),
                    format!("unknown widget type '{raw_kind}'"),
                )
                .with_suggestion("the widget is kept as-is; renderers may skip it"),
            );
        }

        let var = self.check_var(map.get("var"), &path.key("var"))?;
        if let (Some(var), Some(bound)) = (&var, kind.bound_kind()) {
            self.record_binding(var, bound, path);
        }

        let action = match (map.get("action"), map.get("goto")) {
            (Some(raw_action), _) if !raw_action.is_null() => {
                Some(self.check_action(raw_action, &path.key("action"), 0)?)
            }
            (_, Some(Json::String(target))) => {
                Some(self.check_goto_target(target, &path.key("goto"))?)
            }
            (_, Some(Json::Null)) | (_, None) => None,
            (_, Some(_)) => {
                self.error(
                    ErrorCode::INVALID_ACTION_FIELD,
                    path.key("goto"),
                    "'goto' must be a scene name",
                );
                return None;
            }
        };

        let props: RawMap = map
            .iter()
            .filter(|(k, _)| !WIDGET_RESERVED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let templates = props
            .iter()
            .filter_map(|(k, v)| Some((k.clone(), Template::parse(v.as_str()?))))
            .collect();

        Some(Widget {
            kind,
            var,
            action,
            props,
            raw: map.clone(),
            templates,
        })
    }

    /// `Some(None)` when no variable is bound, `None` on error.
    fn check_var(&mut self, raw: Option<&Json>, path: &NodePath) -> Option<Option<String>> {
        match raw {
            None | Some(Json::Null) => Some(None),
            Some(Json::String(name)) if is_identifier(name) => Some(Some(name.clone())),
            Some(other) => {
                self.diagnostics.push_error(
                    DocumentError::new(
                        ErrorCode::INVALID_VAR,
                        path.clone(),
                        format!("'var' must be an identifier, got {other}"),
                    )
                    .with_suggestion("use letters, digits and '_', not starting with a digit"),
                );
                None
            }
        }
    }

    fn record_binding(&mut self, var: &str, kind: ValueKind, path: &NodePath) {
        match self.bindings.get(var) {
            None => {
                self.bindings.insert(var.to_string(), (kind, path.clone()));
            }
            Some((existing, first)) if *existing != kind => {
                let message = format!(
                    "variable '{var}' is bound as {kind} here but as {existing} at {first}"
                );
                self.warn(ErrorCode::CONFLICTING_BINDING, path.key("var"), message);
            }
            Some(_) => {}
        }
    }
}
