//! Session settings.

use serde::{Deserialize, Serialize};

/// Settings a host passes when creating a [`Session`](crate::Session).
///
/// Deserialises from the `[session]` table of a TOML config; every field
/// is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum retained history entries. `None` keeps every entry; when
    /// bounded, the oldest entries are dropped first.
    pub history_limit: Option<usize>,
    /// Seed unset bound variables from widget defaults on scene entry.
    pub seed_defaults: bool,
    /// Start here instead of the document's resolved start scene.
    pub start: Option<String>,
}
