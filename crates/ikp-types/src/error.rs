use crate::NodePath;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of errors stored before further ones are only counted.
pub const MAX_ERRORS: usize = 20;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Diagnostic category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Structure,
    Widget,
    Action,
    Expression,
    Binding,
}

/// Numeric diagnostic code (D100–D599).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Structure (D100–D199) ──
    pub const ROOT_NOT_MAPPING: Self = Self(100);
    pub const MISSING_VERSION: Self = Self(101);
    pub const INVALID_VERSION: Self = Self(102);
    pub const MISSING_SCENES: Self = Self(103);
    pub const SCENES_NOT_MAPPING: Self = Self(104);
    pub const EMPTY_SCENES: Self = Self(105);
    pub const SCENE_NOT_MAPPING: Self = Self(106);
    pub const UI_NOT_SEQUENCE: Self = Self(107);
    pub const MISSING_UI: Self = Self(108);
    pub const UNKNOWN_START: Self = Self(109);
    pub const MISSING_START: Self = Self(110);
    pub const INVALID_START: Self = Self(111);
    pub const UNKNOWN_FIELD: Self = Self(112);
    pub const INVALID_SCENE_NAME: Self = Self(113);

    // ── Widget (D200–D299) ──
    pub const WIDGET_NOT_MAPPING: Self = Self(200);
    pub const MISSING_WIDGET_TYPE: Self = Self(201);
    pub const INVALID_WIDGET_TYPE: Self = Self(202);
    pub const UNKNOWN_WIDGET_TYPE: Self = Self(203);
    pub const INVALID_VAR: Self = Self(204);

    // ── Action (D300–D399) ──
    pub const INVALID_ACTION: Self = Self(300);
    pub const MISSING_ACTION_TYPE: Self = Self(301);
    pub const MISSING_ACTION_FIELD: Self = Self(302);
    pub const INVALID_ACTION_FIELD: Self = Self(303);
    pub const UNKNOWN_ACTION_TYPE: Self = Self(304);
    pub const UNRECOGNISED_LEGACY_ACTION: Self = Self(305);
    pub const ACTION_TOO_DEEP: Self = Self(306);
    pub const DANGLING_TARGET: Self = Self(307);

    // ── Expression (D400–D499) ──
    pub const INVALID_EXPRESSION: Self = Self(400);
    pub const EMPTY_CONDITION: Self = Self(401);

    // ── Binding (D500–D599) ──
    pub const CONFLICTING_BINDING: Self = Self(500);

    /// Get the category for this code.
    pub fn category(self) -> ErrorCategory {
        match self.0 {
            100..=199 => ErrorCategory::Structure,
            200..=299 => ErrorCategory::Widget,
            300..=399 => ErrorCategory::Action,
            400..=499 => ErrorCategory::Expression,
            500..=599 => ErrorCategory::Binding,
            _ => ErrorCategory::Structure,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D{}", self.0)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structure => write!(f, "structure"),
            Self::Widget => write!(f, "widget"),
            Self::Action => write!(f, "action"),
            Self::Expression => write!(f, "expression"),
            Self::Binding => write!(f, "binding"),
        }
    }
}

/// A structured problem found in a raw document.
///
/// Always carries the [`NodePath`] of the offending node so hosts can point
/// authors at it without parsing the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{path}: {code} [{category}] {message}")]
pub struct DocumentError {
    pub code: ErrorCode,
    pub severity: Severity,
    pub category: ErrorCategory,
    pub path: NodePath,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl DocumentError {
    /// Create a new error.
    pub fn new(code: ErrorCode, path: NodePath, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            category: code.category(),
            path,
            message: message.into(),
            suggestion: None,
        }
    }

    /// Create a new warning.
    pub fn warning(code: ErrorCode, path: NodePath, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::new(code, path, message)
        }
    }

    /// Attach a fix suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Errors and warnings collected while validating one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub errors: Vec<DocumentError>,
    pub warnings: Vec<DocumentError>,
    pub total_errors: usize,
    pub total_warnings: usize,
}

impl Diagnostics {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Add an error, respecting the [`MAX_ERRORS`] limit.
    pub fn push_error(&mut self, error: DocumentError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total_errors += 1;
    }

    pub fn push_warning(&mut self, warning: DocumentError) {
        self.warnings.push(warning);
        self.total_warnings += 1;
    }

    /// Route a diagnostic by its severity.
    pub fn push(&mut self, diagnostic: DocumentError) {
        match diagnostic.severity {
            Severity::Error => self.push_error(diagnostic),
            Severity::Warning => self.push_warning(diagnostic),
        }
    }

    /// The first recorded error, in document order.
    pub fn first_error(&self) -> Option<&DocumentError> {
        self.errors.first()
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .any(|d| d.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget_path() -> NodePath {
        NodePath::root().key("scenes").key("Hello").key("ui").index(2)
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::MISSING_SCENES.category(), ErrorCategory::Structure);
        assert_eq!(ErrorCode::MISSING_WIDGET_TYPE.category(), ErrorCategory::Widget);
        assert_eq!(ErrorCode::UNKNOWN_ACTION_TYPE.category(), ErrorCategory::Action);
        assert_eq!(
            ErrorCode::INVALID_EXPRESSION.category(),
            ErrorCategory::Expression
        );
        assert_eq!(
            ErrorCode::CONFLICTING_BINDING.category(),
            ErrorCategory::Binding
        );
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::MISSING_WIDGET_TYPE.to_string(), "D201");
        assert_eq!(ErrorCode::ROOT_NOT_MAPPING.to_string(), "D100");
    }

    #[test]
    fn test_document_error_display_includes_path() {
        let err = DocumentError::new(
            ErrorCode::WIDGET_NOT_MAPPING,
            widget_path(),
            "widget entry must be a mapping",
        );
        assert_eq!(
            err.to_string(),
            "scenes.Hello.ui[2]: D200 [widget] widget entry must be a mapping"
        );
        assert_eq!(err.severity, Severity::Error);
    }

    #[test]
    fn test_warning_constructor() {
        let warn = DocumentError::warning(
            ErrorCode::UNKNOWN_WIDGET_TYPE,
            widget_path(),
            "unknown widget type 'map'",
        )
        .with_suggestion("renderers will ignore it");
        assert_eq!(warn.severity, Severity::Warning);
        assert_eq!(warn.category, ErrorCategory::Widget);
        assert_eq!(warn.suggestion.as_deref(), Some("renderers will ignore it"));
    }

    #[test]
    fn test_document_error_json() {
        let err = DocumentError::new(
            ErrorCode::MISSING_WIDGET_TYPE,
            widget_path(),
            "missing required field 'type'",
        );
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"path\":\"scenes.Hello.ui[2]\""));
        assert!(json.contains("\"severity\":\"error\""));
        assert!(!json.contains("suggestion"));

        let back: DocumentError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_diagnostics_max_limit() {
        let mut diags = Diagnostics::empty();
        for i in 0..25 {
            diags.push_error(DocumentError::new(
                ErrorCode::WIDGET_NOT_MAPPING,
                NodePath::root().key("scenes").key("S").key("ui").index(i),
                format!("error {i}"),
            ));
        }
        assert_eq!(diags.errors.len(), 20);
        assert_eq!(diags.total_errors, 25);
        assert!(diags.has_errors());
    }

    #[test]
    fn test_push_routes_by_severity() {
        let mut diags = Diagnostics::empty();
        diags.push(DocumentError::warning(
            ErrorCode::MISSING_UI,
            NodePath::root().key("scenes").key("Empty"),
            "scene has no `ui` list",
        ));
        assert!(!diags.has_errors());
        assert_eq!(diags.total_warnings, 1);
        assert!(diags.has_code(ErrorCode::MISSING_UI));
        assert!(diags.first_error().is_none());
    }
}
