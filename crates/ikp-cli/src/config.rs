//! Optional TOML configuration for the command-line host.
//!
//! ```toml
//! [validator]
//! implicit_start = "require"
//!
//! [session]
//! history_limit = 50
//! seed_defaults = true
//! ```

use std::path::Path;

use anyhow::Context;
use ikp_runtime::SessionConfig;
use ikp_validator::ValidatorOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub validator: ValidatorOptions,
    pub session: SessionConfig,
}

impl CliConfig {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Read `path`, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ikp_validator::ImplicitStart;

    #[test]
    fn test_empty_is_default() {
        assert_eq!(CliConfig::parse("").unwrap(), CliConfig::default());
    }

    #[test]
    fn test_sections() {
        let config = CliConfig::parse(
            "[validator]\nimplicit_start = \"require\"\n\n[session]\nhistory_limit = 5\n",
        )
        .unwrap();
        assert_eq!(config.validator.implicit_start, ImplicitStart::Require);
        assert_eq!(config.session.history_limit, Some(5));
        assert!(!config.session.seed_defaults);
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(CliConfig::parse("[renderer]\ntheme = \"dark\"\n").is_err());
    }
}
