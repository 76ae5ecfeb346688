//! IKP command-line host.
//!
//! Loads `.ikp` sources (YAML or JSON) into a generic tree, hands them to
//! the validator, and drives sessions from scripted interactions. The
//! `ikp` binary is a thin wrapper over this library.

pub mod config;
pub mod loader;
pub mod report;
pub mod script;

pub use config::CliConfig;
pub use loader::{load_tree, parse_tree, Format, LoadError};
pub use report::CheckReport;
pub use script::{parse_script, run_script, Step, StepReport};
