//! Action normalisation: structured mappings and the legacy string forms.

use ikp_types::document::{Action, ActionValue, RawMap};
use ikp_types::expr::{Expr, ExprKind, Span};
use ikp_types::{DocumentError, ErrorCode, NodePath, Template, Value};
use serde_json::Value as Json;

use crate::validator::{is_identifier, Validator};

/// Maximum nesting of `if` actions inside one another.
pub(crate) const MAX_ACTION_DEPTH: usize = 8;

impl Validator<'_> {
    /// Normalise one action node. Returns `None` after recording an error.
    pub(crate) fn check_action(
        &mut self,
        raw: &Json,
        path: &NodePath,
        depth: usize,
    ) -> Option<Action> {
        if depth > MAX_ACTION_DEPTH {
            self.error(
                ErrorCode::ACTION_TOO_DEEP,
                path.clone(),
                format!("actions may nest at most {MAX_ACTION_DEPTH} levels deep"),
            );
            return None;
        }
        match raw {
            Json::String(source) => self.check_legacy(source, path),
            Json::Object(map) => self.check_structured(map, path, depth),
            _ => {
                self.error(
                    ErrorCode::INVALID_ACTION,
                    path.clone(),
                    "action must be a mapping with a 'type' field",
                );
                None
            }
        }
    }

    pub(crate) fn check_goto_target(&mut self, target: &str, path: &NodePath) -> Option<Action> {
        let target = target.trim();
        if target.is_empty() {
            self.error(
                ErrorCode::INVALID_ACTION_FIELD,
                path.clone(),
                "goto target must be a non-empty scene name",
            );
            return None;
        }
        if !self.scene_names.contains(target) {
            self.warn(
                ErrorCode::DANGLING_TARGET,
                path.clone(),
                format!("goto target '{target}' does not name a declared scene"),
            );
        }
        Some(Action::goto(target))
    }

    // ══════════════════════════════════════════════════════════════════════
    // Structured actions
    // ══════════════════════════════════════════════════════════════════════

    fn check_structured(&mut self, map: &RawMap, path: &NodePath, depth: usize) -> Option<Action> {
        let kind = match map.get("type") {
            Some(Json::String(kind)) => kind.trim().to_ascii_lowercase(),
            None | Some(Json::Null) => {
                self.error(
                    ErrorCode::MISSING_ACTION_TYPE,
                    path.clone(),
                    "action is missing required field 'type'",
                );
                return None;
            }
            Some(_) => {
                self.error(
                    ErrorCode::INVALID_ACTION_FIELD,
                    path.key("type"),
                    "action 'type' must be a string",
                );
                return None;
            }
        };

        match kind.as_str() {
            "goto" => match map.get("target") {
                Some(Json::String(target)) => self.check_goto_target(target, &path.key("target")),
                None | Some(Json::Null) => {
                    self.missing_field(path, "goto", "target");
                    None
                }
                Some(_) => {
                    self.error(
                        ErrorCode::INVALID_ACTION_FIELD,
                        path.key("target"),
                        "goto target must be a scene name",
                    );
                    None
                }
            },
            "set" => {
                let var = self.action_var(map, path, "set", &["var"])?;
                let value = self.action_value(map.get("value"), &path.key("value"))?;
                Some(Action::Set { var, value })
            }
            "progress" => {
                let var = self.action_var(map, path, "progress", &["target", "var"])?;
                let value = match map.get("value") {
                    None | Some(Json::Null) => ActionValue::Literal(Value::Number(0.0)),
                    Some(raw @ (Json::Number(_) | Json::String(_))) => {
                        self.action_value(Some(raw), &path.key("value"))?
                    }
                    Some(_) => {
                        self.error(
                            ErrorCode::INVALID_ACTION_FIELD,
                            path.key("value"),
                            "progress value must be a number",
                        );
                        return None;
                    }
                };
                Some(Action::Progress { var, value })
            }
            "if" => self.check_if(map, path, depth),
            _ => {
                let raw_kind = map
                    .get("type")
                    .and_then(Json::as_str)
                    .unwrap_or_default()
                    .to_string();
                self.diagnostics.push_warning(
                    DocumentError::warning(
                        ErrorCode::UNKNOWN_ACTION_TYPE,
                        path.key("type"),
                        format!("unknown action type '{raw_kind}'"),
                    )
                    .with_suggestion("the action is kept as-is; dispatching it reports it as unsupported"),
                );
                let params = map
                    .iter()
                    .filter(|(k, _)| k.as_str() != "type")
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Some(Action::Unknown {
                    kind: raw_kind,
                    params,
                })
            }
        }
    }

    fn missing_field(&mut self, path: &NodePath, kind: &str, field: &str) {
        self.error(
            ErrorCode::MISSING_ACTION_FIELD,
            path.clone(),
            format!("'{kind}' action is missing required field '{field}'"),
        );
    }

    /// The variable named by the first present key of `keys`.
    fn action_var(
        &mut self,
        map: &RawMap,
        path: &NodePath,
        kind: &str,
        keys: &[&str],
    ) -> Option<String> {
        let Some((key, raw)) = keys
            .iter()
            .find_map(|k| map.get(*k).filter(|v| !v.is_null()).map(|v| (*k, v)))
        else {
            self.missing_field(path, kind, keys[0]);
            return None;
        };
        match raw.as_str() {
            Some(name) if is_identifier(name) => Some(name.to_string()),
            _ => {
                self.error(
                    ErrorCode::INVALID_ACTION_FIELD,
                    path.key(key),
                    format!("'{key}' must be a variable name"),
                );
                None
            }
        }
    }

    fn action_value(&mut self, raw: Option<&Json>, path: &NodePath) -> Option<ActionValue> {
        let Some(raw) = raw else {
            return Some(ActionValue::Literal(Value::Null));
        };
        if let Json::String(text) = raw {
            let template = Template::parse(text);
            if !template.is_literal() {
                return Some(ActionValue::Template(template));
            }
        }
        match Value::from_json(raw) {
            Some(value) => Some(ActionValue::Literal(value)),
            None => {
                self.error(
                    ErrorCode::INVALID_ACTION_FIELD,
                    path.clone(),
                    "action values must be a string, number, boolean or null",
                );
                None
            }
        }
    }

    fn check_if(&mut self, map: &RawMap, path: &NodePath, depth: usize) -> Option<Action> {
        let cond_path = path.key("condition");
        let (condition, source) = match map.get("condition") {
            None | Some(Json::Null) => self.empty_condition(&cond_path, "missing"),
            Some(Json::String(source)) if source.trim().is_empty() => {
                self.empty_condition(&cond_path, "empty")
            }
            Some(Json::String(source)) => match ikp_expr::parse_condition(source) {
                Ok(expr) => (expr, source.clone()),
                Err(err) => {
                    self.diagnostics.push_error(
                        DocumentError::new(
                            ErrorCode::INVALID_EXPRESSION,
                            cond_path,
                            format!("invalid condition '{source}': {err}"),
                        )
                        .with_suggestion(
                            "conditions allow literals, variables, arithmetic, comparisons, and/or/not",
                        ),
                    );
                    return None;
                }
            },
            Some(Json::Bool(b)) => (
                Expr::new(ExprKind::Bool(*b), Span::default()),
                b.to_string(),
            ),
            Some(_) => {
                self.error(
                    ErrorCode::INVALID_ACTION_FIELD,
                    cond_path,
                    "condition must be a string expression",
                );
                return None;
            }
        };

        let then = self.check_branch(map.get("then"), &path.key("then"), depth)?;
        let otherwise = self.check_branch(map.get("else"), &path.key("else"), depth)?;
        Some(Action::If {
            condition,
            source,
            then,
            otherwise,
        })
    }

    /// An absent or blank condition never holds, so the `else` branch runs.
    fn empty_condition(&mut self, path: &NodePath, what: &str) -> (Expr, String) {
        self.warn(
            ErrorCode::EMPTY_CONDITION,
            path.clone(),
            format!("{what} condition is always false"),
        );
        (Expr::new(ExprKind::Bool(false), Span::default()), String::new())
    }

    /// A branch is absent, a single action, or a list of actions.
    fn check_branch(
        &mut self,
        raw: Option<&Json>,
        path: &NodePath,
        depth: usize,
    ) -> Option<Vec<Action>> {
        match raw {
            None | Some(Json::Null) => Some(Vec::new()),
            Some(Json::Array(items)) => {
                let mut actions = Vec::with_capacity(items.len());
                let mut failed = false;
                for (i, item) in items.iter().enumerate() {
                    match self.check_action(item, &path.index(i), depth + 1) {
                        Some(action) => actions.push(action),
                        None => failed = true,
                    }
                }
                (!failed).then_some(actions)
            }
            Some(single) => self
                .check_action(single, path, depth + 1)
                .map(|action| vec![action]),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Legacy string actions
    // ══════════════════════════════════════════════════════════════════════

    /// `goto(Scene)`, `set(var, value)` and `progress(var, number)`.
    fn check_legacy(&mut self, source: &str, path: &NodePath) -> Option<Action> {
        if let Some(action) = parse_legacy(source) {
            if let Action::Goto { target } = &action {
                return self.check_goto_target(target, path);
            }
            return Some(action);
        }
        self.warn(
            ErrorCode::UNRECOGNISED_LEGACY_ACTION,
            path.clone(),
            format!("unrecognised action string '{source}'"),
        );
        let mut params = RawMap::new();
        params.insert("source".to_string(), Json::String(source.to_string()));
        Some(Action::Unknown {
            kind: "legacy".to_string(),
            params,
        })
    }
}

/// Parse `name(args)` where `name` is matched case-insensitively.
fn call_args<'s>(source: &'s str, name: &str) -> Option<&'s str> {
    let trimmed = source.trim();
    let head = trimmed.get(..name.len() + 1)?;
    if !head.eq_ignore_ascii_case(&format!("{name}(")) {
        return None;
    }
    trimmed[name.len() + 1..].strip_suffix(')')
}

fn strip_quotes(s: &str) -> Option<&str> {
    s.strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .or_else(|| s.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')))
}

fn parse_legacy(source: &str) -> Option<Action> {
    if let Some(args) = call_args(source, "goto") {
        let target = args.trim();
        let target = strip_quotes(target).unwrap_or(target).trim();
        return (!target.is_empty()).then(|| Action::goto(target));
    }
    if let Some(args) = call_args(source, "set") {
        let (var, value) = args.split_once(',')?;
        let var = var.trim();
        if !is_identifier(var) {
            return None;
        }
        let value = value.trim();
        // Quoted values stay strings; bare ones read as booleans or numbers
        // when they look like one.
        let value = match strip_quotes(value) {
            Some(inner) => Value::from(inner),
            None => Value::from(value).coerced(),
        };
        return Some(Action::Set {
            var: var.to_string(),
            value: ActionValue::Literal(value),
        });
    }
    if let Some(args) = call_args(source, "progress") {
        let (var, value) = args.split_once(',')?;
        let var = var.trim();
        let value = value.trim().parse::<f64>().ok()?;
        if !is_identifier(var) {
            return None;
        }
        return Some(Action::Progress {
            var: var.to_string(),
            value: ActionValue::Literal(Value::Number(value)),
        });
    }
    None
}
