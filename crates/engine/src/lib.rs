//! # rcm engine
//!
//! Reconciliation core of the rcm dotfile manager.
//!
//! - **Resolution**: variant and `common` overlays for templates, variables and configs
//! - **Templates**: discovery by logical name, change detection through a fingerprint cache
//! - **Data**: merged variables and rendered configs, compared against the saved [`State`]
//! - **Materialisation**: managed files copied or linked through a [`System`]
//! - **Watch**: a polling loop that re-runs a command on change

pub mod condition;
pub mod environment;
pub mod error;
pub mod fingerprint;
pub mod hash;
pub mod managed;
pub mod registry;
pub mod resolver;
pub mod state;
pub mod store;
pub mod system;
pub mod watch;

// Re-export path types from core
pub use rcm_core::path::AbsPath;

pub use environment::{ApplyOptions, ApplyReport, Engine, FileFailure, Phase};
pub use error::{Error, Result};
pub use state::{State, StateStore};
pub use system::{DryRunSystem, RealSystem, System};
