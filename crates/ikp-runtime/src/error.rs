//! Runtime error types.

use thiserror::Error;

/// A failure reported by a live session.
///
/// Navigation, unsupported-catalog and validation failures are recoverable:
/// the session is unchanged and stays `Ready`. Reentrancy and use after
/// teardown indicate host misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// A `goto` named a scene the document does not declare.
    #[error("navigation failed: scene '{target}' is not declared")]
    Navigation { target: String },

    /// The action's discriminant is not one the runtime executes.
    #[error("unsupported action type '{kind}'")]
    UnsupportedAction { kind: String },

    /// The widget's discriminant is not one the runtime understands.
    #[error("unsupported widget type '{kind}'")]
    UnsupportedWidget { kind: String },

    /// A variable write was rejected; the prior value is retained.
    #[error("invalid value for '{var}': {message}")]
    Validation { var: String, message: String },

    /// A widget index outside the current scene.
    #[error("scene '{scene}' has no widget at index {index}")]
    NoSuchWidget { scene: String, index: usize },

    /// A variable was written from inside a change notification.
    #[error("variable '{key}' was written while subscribers were being notified")]
    Reentrancy { key: String },

    /// The session has been terminated.
    #[error("session has been terminated")]
    SessionClosed,
}

impl RuntimeError {
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Reentrancy { .. } | Self::SessionClosed)
    }

    pub(crate) fn validation(var: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            var: var.to_string(),
            message: message.into(),
        }
    }
}

/// A condition that could not be evaluated.
///
/// Never surfaced from `dispatch`: a failing condition counts as false.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: String,
        right: String,
    },

    #[error("cannot apply '{op}' to {operand}")]
    BadOperand { op: &'static str, operand: String },

    #[error("division by zero")]
    DivisionByZero,
}
