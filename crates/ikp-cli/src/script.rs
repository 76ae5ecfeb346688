//! Scripted interactions for `ikp run`.
//!
//! A script is a list of steps, written in YAML or JSON:
//!
//! ```yaml
//! - set: { name: Ava }
//! - click: 1
//! - goto: Hello
//! - back
//! ```

use std::collections::BTreeMap;

use ikp_runtime::{RenderedScene, RuntimeError, Session};
use ikp_types::document::Action;
use ikp_types::Value;
use serde::{Deserialize, Serialize};

/// One simulated user interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Write variables as input widgets would.
    Set(BTreeMap<String, Value>),
    /// Activate the widget at this index in the current scene.
    Click(usize),
    /// Dispatch a `goto` action.
    Goto(String),
    /// Return to the previous scene in history.
    Back,
}

/// What happened at one step, with the scene as rendered afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub render: RenderedScene,
}

/// Parse a script from a generic tree.
pub fn parse_script(tree: serde_json::Value) -> serde_json::Result<Vec<Step>> {
    serde_json::from_value(tree)
}

fn apply(session: &mut Session, step: &Step) -> Result<(), RuntimeError> {
    match step {
        Step::Set(values) => {
            for (key, value) in values {
                session.set_var(key, value.clone())?;
            }
        }
        Step::Click(index) => {
            session.activate(*index)?;
        }
        Step::Goto(target) => {
            session.dispatch(&Action::goto(target.as_str()))?;
        }
        Step::Back => {
            session.go_back()?;
        }
    }
    Ok(())
}

/// Run `steps` in order, rendering after each.
///
/// Recoverable failures are recorded in the step's report and the script
/// continues; any other failure stops the run.
pub fn run_script(session: &mut Session, steps: &[Step]) -> Result<Vec<StepReport>, RuntimeError> {
    let mut reports = Vec::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        let error = match apply(session, step) {
            Ok(()) => None,
            Err(err) if err.is_recoverable() => {
                tracing::warn!(step = index, error = %err, "step failed");
                Some(err.to_string())
            }
            Err(err) => return Err(err),
        };
        reports.push(StepReport {
            step: index,
            ok: error.is_none(),
            error,
            render: session.render()?,
        });
    }
    Ok(reports)
}
