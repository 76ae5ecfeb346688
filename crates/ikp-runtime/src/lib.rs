//! IKP runtime: one live, stateful instantiation of a validated document.
//!
//! ```text
//! Document (Arc, shared) ──► Session ──► current scene + history
//!                              │
//!                              ├── VariableStore  (per session, subscribable)
//!                              ├── dispatch()     (atomic action transactions)
//!                              └── render()       (interpolated scene snapshot)
//! ```
//!
//! Everything here is synchronous and single-threaded. A host that drives a
//! session from several threads must serialise access itself.

mod config;
mod dispatch;
mod error;
mod evaluator;
mod interpolate;
mod listeners;
mod session;
mod store;

pub use config::SessionConfig;
pub use dispatch::{dispatch, Dispatched, SceneChange};
pub use error::{EvalError, RuntimeError};
pub use evaluator::{condition_holds, evaluate};
pub use interpolate::{interpolate, interpolated_props, interpolated_text, render_template};
pub use listeners::SubscriptionId;
pub use session::{Redraw, RenderedScene, RenderedWidget, Session, SessionState};
pub use store::{Lookup, VarChange, VariableStore};

/// Result alias for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
