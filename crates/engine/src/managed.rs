//! Managed output files
//!
//! A [`ManagedFile`] is built from one manifest entry on every invocation.
//! Its output directory is expanded (`~`, `$VAR`) and made absolute against
//! the data repository root once, at construction. Unset variables stay
//! literal, so an entry for another platform never fails to load.

use crate::error::Result;
use crate::system::System;
use rcm_config::FileSpec;
use rcm_core::path::AbsPath;
use rcm_core::platform::Platform;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

/// One declared output and its update policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedFile {
    /// Primary template name
    pub template: String,
    /// Further templates whose changes make the output stale
    pub extra_templates: BTreeSet<String>,
    /// Directory the output goes in
    pub directory: AbsPath,
    /// Output file name
    pub name: String,
    /// Symlink to the source instead of copying
    pub link: bool,
    /// Set the executable bits
    pub executable: bool,
    /// Condition expression; `True` when omitted
    pub condition: String,
    /// Platforms the file applies to; empty means all
    pub platforms: BTreeSet<String>,
}

impl ManagedFile {
    /// Resolve a manifest entry against the repository `root`
    pub fn from_spec(spec: &FileSpec, root: &AbsPath) -> Self {
        let expanded = shellexpand::full_with_context_no_errors(
            &spec.directory,
            || dirs::home_dir().map(|home| home.to_string_lossy().into_owned()),
            |var| std::env::var(var).ok(),
        );

        Self {
            template: spec.template.clone(),
            extra_templates: spec.extra_templates.clone(),
            directory: root.resolve(Path::new(expanded.as_ref())),
            name: spec.output_name().to_string(),
            link: spec.link,
            executable: spec.executable,
            condition: spec.condition.clone(),
            platforms: spec.platforms.clone(),
        }
    }

    /// Full output path
    pub fn output(&self) -> AbsPath {
        self.directory.join(&self.name)
    }

    /// The primary template followed by every extra template
    pub fn templates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.template.as_str())
            .chain(self.extra_templates.iter().map(String::as_str))
    }

    /// Whether the platform filter admits `platform`
    pub fn applies_to(&self, platform: &Platform) -> bool {
        platform.allowed_by(&self.platforms)
    }

    /// Materialise the output from `source`
    ///
    /// Removes whatever is at the output path, creates the directory, then
    /// copies or links. The executable bit goes on the copy, or on the link
    /// target.
    pub fn update(&self, source: &AbsPath, system: &dyn System) -> Result<()> {
        let output = self.output();

        system.remove_file(&output)?;
        system.create_dir_all(&self.directory)?;

        if self.link {
            system.symlink(source.as_path(), &output)?;
        } else {
            system.copy_file(source, &output)?;
        }

        if self.executable {
            system.set_executable(if self.link { source } else { &output })?;
        }

        info!("'{}' -> '{}'.", source, output);
        Ok(())
    }
}
