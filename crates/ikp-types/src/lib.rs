//! Shared types for IKP.
//!
//! This crate defines the document model, scalar values, node paths,
//! diagnostics, template segments and the condition AST used by every
//! other stage: validation, runtime and the command-line host.

mod error;
mod path;
mod template;
mod value;
pub mod document;
pub mod expr;

pub use error::{Diagnostics, DocumentError, ErrorCategory, ErrorCode, Severity, MAX_ERRORS};
pub use path::{NodePath, PathSegment};
pub use template::{Segment, Template};
pub use value::{Value, ValueKind};

/// Result type used by document construction.
pub type Result<T> = std::result::Result<T, DocumentError>;
