//! Validation reports for `ikp check`.

use std::fmt::Write as _;

use ikp_types::{Diagnostics, DocumentError};
use ikp_validator::ValidationOutcome;
use serde::Serialize;

/// Machine-readable result of checking one file.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub file: String,
    pub valid: bool,
    /// SHA-256 of the parsed tree.
    pub fingerprint: String,
    /// Scene names in declaration order; empty when invalid.
    pub scenes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    pub diagnostics: Diagnostics,
}

impl CheckReport {
    pub fn new(file: impl Into<String>, fingerprint: String, outcome: ValidationOutcome) -> Self {
        let (scenes, start) = match &outcome.document {
            Some(doc) => (
                doc.scene_names().map(str::to_string).collect(),
                Some(doc.start().to_string()),
            ),
            None => (Vec::new(), None),
        };
        Self {
            file: file.into(),
            valid: outcome.is_valid(),
            fingerprint,
            scenes,
            start,
            diagnostics: outcome.diagnostics,
        }
    }

    /// Human-readable rendering, one diagnostic per line.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for error in &self.diagnostics.errors {
            push_diagnostic(&mut out, "error", error);
        }
        let hidden = self.diagnostics.total_errors.saturating_sub(self.diagnostics.errors.len());
        if hidden > 0 {
            let _ = writeln!(out, "... and {hidden} more errors");
        }
        for warning in &self.diagnostics.warnings {
            push_diagnostic(&mut out, "warning", warning);
        }
        if self.valid {
            let _ = writeln!(
                out,
                "{}: ok ({} scenes, start '{}', {} warnings)",
                self.file,
                self.scenes.len(),
                self.start.as_deref().unwrap_or_default(),
                self.diagnostics.total_warnings
            );
        } else {
            let _ = writeln!(
                out,
                "{}: invalid ({} errors, {} warnings)",
                self.file, self.diagnostics.total_errors, self.diagnostics.total_warnings
            );
        }
        out
    }
}

fn push_diagnostic(out: &mut String, label: &str, diagnostic: &DocumentError) {
    let _ = writeln!(out, "{label}[{}]: {}", diagnostic.code, diagnostic.message);
    let _ = writeln!(out, "  --> {}", diagnostic.path);
    if let Some(suggestion) = &diagnostic.suggestion {
        let _ = writeln!(out, "  = help: {suggestion}");
    }
}
