//! The IKP document model.
//!
//! A [`Document`] is built once by the validator and never mutated
//! afterwards; sessions share it read-only. Widgets and actions are
//! closed sets of known variants plus an explicit unknown variant that
//! carries the raw discriminant, so unrecognised content survives
//! untouched for renderers that understand it.

use crate::expr::Expr;
use crate::{DocumentError, ErrorCode, NodePath, Template, Value, ValueKind};
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// A raw mapping node, kept verbatim.
pub type RawMap = serde_json::Map<String, serde_json::Value>;

// ══════════════════════════════════════════════════════════════════════════════
// Document
// ══════════════════════════════════════════════════════════════════════════════

/// A validated IKP document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    version: String,
    meta: serde_json::Value,
    start: String,
    scenes: IndexMap<String, Scene>,
    extras: RawMap,
    bindings: BTreeMap<String, ValueKind>,
}

impl Document {
    /// Assemble a document, enforcing that `start` names a declared scene.
    pub fn new(
        version: impl Into<String>,
        meta: serde_json::Value,
        start: impl Into<String>,
        scenes: IndexMap<String, Scene>,
        extras: RawMap,
        bindings: BTreeMap<String, ValueKind>,
    ) -> crate::Result<Self> {
        let start = start.into();
        if !scenes.contains_key(&start) {
            return Err(DocumentError::new(
                ErrorCode::UNKNOWN_START,
                NodePath::root().key("start"),
                format!("start scene '{start}' is not declared"),
            ));
        }
        Ok(Self {
            version: version.into(),
            meta,
            start,
            scenes,
            extras,
            bindings,
        })
    }

    /// The `ikp` format version string, as written.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Opaque `meta` block (`null` when absent).
    pub fn meta(&self) -> &serde_json::Value {
        &self.meta
    }

    /// The resolved start scene name.
    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn scene(&self, name: &str) -> Option<&Scene> {
        self.scenes.get(name)
    }

    pub fn has_scene(&self, name: &str) -> bool {
        self.scenes.contains_key(name)
    }

    /// Scenes in source order.
    pub fn scenes(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.values()
    }

    pub fn scene_names(&self) -> impl Iterator<Item = &str> {
        self.scenes.keys().map(String::as_str)
    }

    /// The start scene. Always present by construction.
    pub fn start_scene(&self) -> &Scene {
        &self.scenes[self.start.as_str()]
    }

    /// Unrecognised top-level fields, preserved verbatim.
    pub fn extras(&self) -> &RawMap {
        &self.extras
    }

    /// The value kind expected by the widgets bound to `var`.
    pub fn binding(&self, var: &str) -> Option<ValueKind> {
        self.bindings.get(var).copied()
    }

    pub fn bindings(&self) -> &BTreeMap<String, ValueKind> {
        &self.bindings
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Scene
// ══════════════════════════════════════════════════════════════════════════════

/// A named, ordered collection of widgets.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub name: String,
    pub widgets: Vec<Widget>,
    /// Scene-level fields other than `ui`.
    pub extras: RawMap,
}

impl Scene {
    pub fn widget(&self, index: usize) -> Option<&Widget> {
        self.widgets.get(index)
    }

    /// Variables bound by widgets of this scene, in widget order.
    pub fn bound_vars(&self) -> impl Iterator<Item = &str> {
        self.widgets.iter().filter_map(|w| w.var.as_deref())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Widget
// ══════════════════════════════════════════════════════════════════════════════

/// Widget type discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Label,
    RichText,
    Input,
    TextArea,
    Button,
    Slider,
    Progress,
    Checkbox,
    Dropdown,
    RadioGroup,
    Image,
    Tabs,
    Accordion,
    ColorPicker,
    /// Any other discriminant, exactly as written.
    Unknown(String),
}

impl WidgetKind {
    /// Case-insensitive lookup of a discriminant.
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "label" => Self::Label,
            "richtext" => Self::RichText,
            "input" => Self::Input,
            "textarea" => Self::TextArea,
            "button" => Self::Button,
            "slider" => Self::Slider,
            "progress" => Self::Progress,
            "checkbox" => Self::Checkbox,
            "dropdown" => Self::Dropdown,
            "radiogroup" => Self::RadioGroup,
            "image" => Self::Image,
            "tabs" => Self::Tabs,
            "accordion" => Self::Accordion,
            "colorpicker" => Self::ColorPicker,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Label => "label",
            Self::RichText => "richtext",
            Self::Input => "input",
            Self::TextArea => "textarea",
            Self::Button => "button",
            Self::Slider => "slider",
            Self::Progress => "progress",
            Self::Checkbox => "checkbox",
            Self::Dropdown => "dropdown",
            Self::RadioGroup => "radiogroup",
            Self::Image => "image",
            Self::Tabs => "tabs",
            Self::Accordion => "accordion",
            Self::ColorPicker => "colorpicker",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// The value kind a variable bound to this widget holds.
    pub fn bound_kind(&self) -> Option<ValueKind> {
        match self {
            Self::Checkbox => Some(ValueKind::Boolean),
            Self::Slider | Self::Progress => Some(ValueKind::Number),
            Self::Input
            | Self::TextArea
            | Self::Dropdown
            | Self::RadioGroup
            | Self::ColorPicker => Some(ValueKind::String),
            _ => None,
        }
    }

    /// Property names whose string values are interpolated for display.
    pub fn text_props(&self) -> &'static [&'static str] {
        match self {
            Self::Label | Self::RichText => &["text"],
            Self::Button => &["text", "label"],
            Self::Image => &["alt", "caption"],
            Self::Unknown(_) => &[],
            _ => &["label", "placeholder"],
        }
    }
}

/// Widget-level keys the core interprets; everything else is a property.
pub const WIDGET_RESERVED_KEYS: &[&str] = &["type", "var", "action", "goto"];

/// A declarative UI block.
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub kind: WidgetKind,
    /// Variable this widget reads and writes, if any.
    pub var: Option<String>,
    /// Action run when the widget is activated.
    pub action: Option<Action>,
    /// Type-specific properties (everything but the reserved keys).
    pub props: RawMap,
    /// The entry exactly as it appeared in the source.
    pub raw: RawMap,
    /// Pre-scanned templates for string properties, keyed by property name.
    pub templates: BTreeMap<String, Template>,
}

impl Widget {
    pub fn prop(&self, name: &str) -> Option<&serde_json::Value> {
        self.props.get(name)
    }

    pub fn str_prop(&self, name: &str) -> Option<&str> {
        self.props.get(name).and_then(serde_json::Value::as_str)
    }

    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// The property shown as the widget's main text: the first text
    /// property of its kind that is present.
    pub fn primary_text_prop(&self) -> Option<&str> {
        self.kind
            .text_props()
            .iter()
            .copied()
            .find(|p| self.templates.contains_key(*p))
    }

    /// Initial value for the bound variable, taken from the widget's
    /// `default` (or `value` for sliders and progress bars).
    ///
    /// Falls back to the kind's zero value when the authored default is
    /// missing or of the wrong kind.
    pub fn default_value(&self) -> Option<Value> {
        let kind = self.kind.bound_kind()?;
        let key = match self.kind {
            WidgetKind::Slider | WidgetKind::Progress => "value",
            _ => "default",
        };
        let authored = self
            .prop(key)
            .and_then(Value::from_json)
            .filter(|v| v.kind() == kind);
        if let Some(value) = authored {
            return Some(value);
        }
        Some(match self.kind {
            WidgetKind::Checkbox => Value::Bool(false),
            WidgetKind::Slider => Value::Number(
                self.prop("from")
                    .and_then(serde_json::Value::as_f64)
                    .unwrap_or(0.0),
            ),
            WidgetKind::Progress => Value::Number(0.0),
            WidgetKind::Dropdown => Value::String(
                self.prop("options")
                    .and_then(serde_json::Value::as_array)
                    .and_then(|opts| opts.first())
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
            WidgetKind::ColorPicker => Value::from("#ffffff"),
            _ => Value::String(String::new()),
        })
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Action
// ══════════════════════════════════════════════════════════════════════════════

/// A value carried by an action: a literal, or a string template resolved
/// against the store when the action runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionValue {
    Literal(Value),
    Template(Template),
}

/// A structured, code-free behavior descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Navigate to another scene.
    Goto { target: String },
    /// Write a variable.
    Set { var: String, value: ActionValue },
    /// Write a numeric variable, typically one bound to a progress bar.
    Progress { var: String, value: ActionValue },
    /// Run one of two action lists depending on a condition.
    If {
        condition: Expr,
        /// The condition as written, for diagnostics.
        source: String,
        then: Vec<Action>,
        otherwise: Vec<Action>,
    },
    /// Any other discriminant, exactly as written.
    Unknown { kind: String, params: RawMap },
}

impl Action {
    /// Shorthand for a navigation action.
    pub fn goto(target: impl Into<String>) -> Self {
        Self::Goto {
            target: target.into(),
        }
    }

    /// The `type` discriminant.
    pub fn kind_name(&self) -> &str {
        match self {
            Self::Goto { .. } => "goto",
            Self::Set { .. } => "set",
            Self::Progress { .. } => "progress",
            Self::If { .. } => "if",
            Self::Unknown { kind, .. } => kind,
        }
    }
}
