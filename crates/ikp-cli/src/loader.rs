//! Source loading: UTF-8 text → generic tree.
//!
//! The validator never sees text. YAML is read straight into
//! `serde_json::Value`, whose maps keep source order, so the first
//! declared scene stays first.

use std::path::{Path, PathBuf};

use serde_json::Value as Json;
use thiserror::Error;

/// Structured-data syntax of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// `.json` files are JSON; anything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse source text in the given format.
pub fn parse_tree(text: &str, format: Format) -> Result<Json, LoadError> {
    let tree: Json = match format {
        Format::Yaml => serde_yaml::from_str(text)?,
        Format::Json => serde_json::from_str(text)?,
    };
    Ok(tree)
}

/// Read and parse a file, choosing the format by extension.
pub fn load_tree(path: &Path) -> Result<Json, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "loaded source");
    parse_tree(&text, Format::from_path(path))
}
