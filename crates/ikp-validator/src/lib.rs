//! IKP validator: turns an already-parsed document tree into a [`Document`].
//!
//! ```text
//! tree (serde_json::Value) → Validator → Document + Diagnostics
//! ```
//!
//! The tree comes from an external loader (YAML or JSON); this crate does
//! no text parsing of its own. Unknown fields, widget types and action
//! types are preserved and reported as warnings, never as errors.

mod action;
mod validator;

pub use validator::Validator;

use ikp_types::document::Document;
use ikp_types::{Diagnostics, DocumentError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// How to choose the start scene when `start` is omitted or unresolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplicitStart {
    /// Use the first scene in source order.
    #[default]
    FirstScene,
    /// Treat a missing or unresolved `start` as an error.
    Require,
}

/// Validator settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorOptions {
    pub implicit_start: ImplicitStart,
}

/// Result of validating one document tree.
///
/// `document` is `Some` only when no errors were found; warnings never
/// prevent construction.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub document: Option<Document>,
    pub diagnostics: Diagnostics,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.document.is_some()
    }
}

/// Validate a tree and report every diagnostic found.
pub fn validate_tree(tree: &serde_json::Value, options: &ValidatorOptions) -> ValidationOutcome {
    Validator::new(options).validate(tree)
}

/// Validate with default options, failing on the first error.
pub fn load_document(tree: &serde_json::Value) -> Result<Document, DocumentError> {
    let outcome = validate_tree(tree, &ValidatorOptions::default());
    match outcome.document {
        Some(document) => Ok(document),
        None => Err(outcome
            .diagnostics
            .errors
            .into_iter()
            .next()
            .unwrap_or_else(|| {
                DocumentError::new(
                    ikp_types::ErrorCode::ROOT_NOT_MAPPING,
                    ikp_types::NodePath::root(),
                    "document could not be constructed",
                )
            })),
    }
}

/// SHA-256 hex digest of a tree's JSON form, used to identify documents
/// in logs and tool output.
pub fn fingerprint(tree: &serde_json::Value) -> String {
    let bytes = serde_json::to_vec(tree).unwrap_or_default();
    format!("{:x}", Sha256::digest(&bytes))
}
