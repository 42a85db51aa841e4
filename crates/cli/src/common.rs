//! Shared runtime context for commands

use rcm_config::PathConfig;
use rcm_engine::environment::template_dirs;
use rcm_engine::{Engine, State, StateStore};
use rcm_template::TemplateEngine;

use crate::error::Result;

/// Paths and persistent state shared by every command
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    /// XDG locations
    pub paths: PathConfig,
    /// Where state is loaded from and saved to
    pub store: StateStore,
}

impl RuntimeContext {
    /// Context over explicit paths
    pub fn new(paths: PathConfig) -> Self {
        let store = StateStore::from_paths(&paths);
        Self { paths, store }
    }

    /// Context rooted at the XDG base directories
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(PathConfig::from_env()?))
    }

    /// Load the saved state, or the default one
    pub fn load_state(&self) -> Result<State> {
        Ok(self.store.load()?)
    }

    /// Load the state and bring a fresh engine to the ready phase
    pub fn engine(&self) -> Result<Engine<TemplateEngine>> {
        let state = self.load_state()?;
        let renderer = TemplateEngine::with_search_paths(template_dirs(&state));
        let mut engine = Engine::new(state, self.paths.clone(), renderer);
        engine.initialize()?;
        Ok(engine)
    }
}
