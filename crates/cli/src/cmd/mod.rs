//! CLI command implementations

pub mod apply;
pub mod directory;
pub mod dump;
pub mod variant;
pub mod watch;
