//! The reconciliation engine
//!
//! One [`Engine`] performs one pass over a data repository:
//!
//! 1. `Uninitialized → ConfigLoaded`: decode the manifest (plus the variant's
//!    `includes/` overlay), merge variables and configs, and record whether
//!    any of them changed since the last save.
//! 2. `ConfigLoaded → TemplatesLoaded`: index the template overlays and make
//!    sure every template the manifest names exists.
//! 3. `TemplatesLoaded → Ready`: diff the template directories against the
//!    fingerprint cache, accepting only changes to selected, required
//!    templates.
//!
//! Any failing step leaves the engine `Failed`. In `Ready`, [`Engine::apply`]
//! decides per managed file whether to materialise it.

use crate::condition::ConditionEvaluator;
use crate::error::{Error, Result};
use crate::fingerprint::{ChangeKind, CompareMode, Fingerprint, FingerprintCache};
use crate::hash::hash_content;
use crate::managed::ManagedFile;
use crate::registry::{Template, TemplateRegistry};
use crate::resolver::{Category, resolve, resolve_dirs};
use crate::state::{State, StateStore};
use crate::store;
use crate::system::{DryRunSystem, RealSystem, System};
use rcm_config::data::{self, DataMap};
use rcm_config::{Manifest, PathConfig};
use rcm_core::TemplateRenderer;
use rcm_core::path::AbsPath;
use rcm_core::platform::CURRENT_PLATFORM;
use rcm_template::TemplateContext;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};

/// Base name of the manifest document at the repository root
pub const MANIFEST_NAME: &str = "rcm";
/// Directory holding per-variant manifest overlays
pub const INCLUDES_DIR: &str = "includes";
/// Scratch directory for rendered templates
pub const BUILD_DIR: &str = "build";

/// Template directories for the state's repository and variant, variant first
pub fn template_dirs(state: &State) -> Vec<PathBuf> {
    resolve_dirs(state.directory(), Category::Templates, state.variant())
}

/// Flags for [`Engine::apply`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Materialise every file regardless of staleness
    pub force: bool,
    /// Render and decide, but change nothing on disk
    pub dry_run: bool,
}

/// A managed file that could not be processed
#[derive(Debug)]
pub struct FileFailure {
    /// Primary template of the failed file
    pub template: String,
    /// What went wrong
    pub error: Error,
}

/// Outcome of one apply pass
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Whether the pass changed nothing on disk
    pub dry_run: bool,
    /// Outputs materialised
    pub updated: Vec<AbsPath>,
    /// Outputs already up to date
    pub unchanged: Vec<AbsPath>,
    /// Outputs filtered out by platform or condition
    pub skipped: Vec<AbsPath>,
    /// Per-file failures
    pub failures: Vec<FileFailure>,
}

impl ApplyReport {
    /// Process exit code: the number of per-file failures
    pub fn exit_code(&self) -> i32 {
        i32::try_from(self.failures.len()).unwrap_or(i32::MAX)
    }

    /// Whether no file failed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Observable loading phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Nothing loaded yet
    Uninitialized,
    /// Manifest, variables and configs are loaded
    ConfigLoaded,
    /// Every required template resolves
    TemplatesLoaded,
    /// Template changes are known
    Ready,
    /// A step failed with this message
    Failed(String),
}

struct Loaded {
    root: AbsPath,
    manifest: Manifest,
    files: Vec<ManagedFile>,
    context: JsonValue,
}

/// Cache entries accepted during polling, per template name, with the
/// fingerprint each replaced
type Accepted = BTreeMap<String, Vec<(PathBuf, Option<Fingerprint>)>>;

struct Ready {
    loaded: Loaded,
    registry: TemplateRegistry,
    cache: FingerprintCache,
    changed: BTreeSet<String>,
    accepted: Accepted,
}

enum Stage {
    Uninitialized,
    ConfigLoaded(Loaded),
    TemplatesLoaded(Loaded, TemplateRegistry, FingerprintCache),
    Ready(Box<Ready>),
    Failed(String),
}

enum Plan<'a> {
    Skip(&'static str),
    Unchanged,
    Update(&'a Template),
}

/// Reconciliation engine for one invocation
pub struct Engine<R> {
    state: State,
    paths: PathConfig,
    renderer: R,
    stage: Stage,
}

impl<R: TemplateRenderer> Engine<R> {
    /// Engine over `state`, rendering with `renderer`
    pub fn new(state: State, paths: PathConfig, renderer: R) -> Self {
        Self {
            state,
            paths,
            renderer,
            stage: Stage::Uninitialized,
        }
    }

    /// The state as updated by loading
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Take the state back
    pub fn into_state(self) -> State {
        self.state
    }

    /// Current loading phase
    pub fn phase(&self) -> Phase {
        match &self.stage {
            Stage::Uninitialized => Phase::Uninitialized,
            Stage::ConfigLoaded(_) => Phase::ConfigLoaded,
            Stage::TemplatesLoaded(..) => Phase::TemplatesLoaded,
            Stage::Ready(_) => Phase::Ready,
            Stage::Failed(reason) => Phase::Failed(reason.clone()),
        }
    }

    /// Template names whose changes were accepted during loading
    pub fn changed_templates(&self) -> Option<&BTreeSet<String>> {
        match &self.stage {
            Stage::Ready(ready) => Some(&ready.changed),
            _ => None,
        }
    }

    /// The rendering context (also used for conditions)
    pub fn context(&self) -> Result<&JsonValue> {
        match &self.stage {
            Stage::Ready(ready) => Ok(&ready.loaded.context),
            _ => Err(Error::Invariant("engine is not ready".to_string())),
        }
    }

    /// Drive the engine from `Uninitialized` to `Ready`
    pub fn initialize(&mut self) -> Result<()> {
        if !matches!(self.stage, Stage::Uninitialized) {
            return Err(Error::Invariant("engine initialized twice".to_string()));
        }

        while !matches!(self.stage, Stage::Ready(_)) {
            if let Err(e) = self.step() {
                error!("{e}");
                self.stage = Stage::Failed(e.to_string());
                return Err(e);
            }
        }
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        self.stage = match std::mem::replace(&mut self.stage, Stage::Uninitialized) {
            Stage::Uninitialized => Stage::ConfigLoaded(self.load_config()?),
            Stage::ConfigLoaded(loaded) => {
                let (registry, cache) = self.load_templates(&loaded)?;
                Stage::TemplatesLoaded(loaded, registry, cache)
            }
            Stage::TemplatesLoaded(loaded, registry, mut cache) => {
                let (changed, accepted) = Self::poll_templates(&loaded, &registry, &mut cache)?;
                Stage::Ready(Box::new(Ready {
                    loaded,
                    registry,
                    cache,
                    changed,
                    accepted,
                }))
            }
            Stage::Ready(ready) => Stage::Ready(ready),
            Stage::Failed(reason) => return Err(Error::Invariant(reason)),
        };
        Ok(())
    }

    #[instrument(skip_all)]
    fn load_config(&mut self) -> Result<Loaded> {
        let root = self.state.root()?;
        debug!("Loading data repository '{}'", root);
        let variant = self.state.variant().to_string();

        let base = root.join(MANIFEST_NAME).into_path_buf();
        let Some(mut manifest_data) = load_single_document(&base)? else {
            return Err(Error::ConfigNotFound {
                candidates: data::data_candidates(&base),
            });
        };

        if !variant.is_empty() {
            let overlay = root.join(INCLUDES_DIR).join(&variant).into_path_buf();
            if let Some(overlay) = load_single_document(&overlay)? {
                data::merge(&mut manifest_data, overlay);
            }
        }

        let manifest = Manifest::from_data(&manifest_data)?;
        if self.state.update_manifest(manifest_data) {
            info!("Manifest is updated.");
        }

        let variables = store::load_variables(&resolve(root.as_path(), Category::Variables, &variant))?;
        let configs = store::load_configs(
            &resolve(root.as_path(), Category::Configs, &variant),
            &variables,
            &self.renderer,
        )?;
        self.state.update_variables(variables.clone());
        self.state.update_configs(configs.clone());

        let files = manifest
            .files
            .iter()
            .map(|spec| ManagedFile::from_spec(spec, &root))
            .collect();

        let context = TemplateContext::new()
            .with_variant(variant)
            .with_variables(variables)
            .with_configs(configs)
            .to_value();

        Ok(Loaded {
            root,
            manifest,
            files,
            context,
        })
    }

    #[instrument(skip_all)]
    fn load_templates(&self, loaded: &Loaded) -> Result<(TemplateRegistry, FingerprintCache)> {
        let search = resolve(
            loaded.root.as_path(),
            Category::Templates,
            self.state.variant(),
        );
        let registry = TemplateRegistry::load(&search)?;
        let cache = FingerprintCache::load(self.paths.template_cache(), CompareMode::Contents);

        let mut first_error = None;
        for name in loaded.manifest.templates() {
            if registry.get(name).is_some() {
                continue;
            }

            let removed = registry
                .candidate_paths(name)
                .into_iter()
                .find(|path| cache.contains(path));
            let err = match removed {
                Some(path) => Error::TemplateRemoved {
                    name: name.to_string(),
                    path,
                },
                None => Error::TemplateNotFound {
                    name: name.to_string(),
                },
            };
            error!("{err}");
            first_error.get_or_insert(err);
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok((registry, cache)),
        }
    }

    #[instrument(skip_all)]
    fn poll_templates(
        loaded: &Loaded,
        registry: &TemplateRegistry,
        cache: &mut FingerprintCache,
    ) -> Result<(BTreeSet<String>, Accepted)> {
        let required = loaded.manifest.templates();
        let mut changed = BTreeSet::new();
        let mut accepted = Accepted::new();
        let mut failure = None;

        for search in registry.search_paths() {
            cache.poll_directory(&search.dir, |change| match change.kind {
                ChangeKind::Removed => {
                    let Some((name, rank)) = registry.locate(&change.path) else {
                        return false;
                    };
                    if !required.contains(name.as_str()) {
                        return false;
                    }
                    match registry.get(&name) {
                        Some(selected) => {
                            accepted
                                .entry(name.clone())
                                .or_default()
                                .push((change.path.clone(), change.old.clone()));
                            // Only a removal at or above the selected overlay affects output
                            if registry.rank(&selected.path).is_none_or(|r| rank <= r) {
                                changed.insert(name);
                            }
                            true
                        }
                        None => {
                            let err = Error::TemplateRemoved {
                                name,
                                path: change.path.clone(),
                            };
                            error!("{err}");
                            failure.get_or_insert(err);
                            false
                        }
                    }
                }
                ChangeKind::Added | ChangeKind::Changed => match registry.by_path(&change.path) {
                    Some(template) if required.contains(template.name.as_str()) => {
                        accepted
                            .entry(template.name.clone())
                            .or_default()
                            .push((change.path.clone(), change.old.clone()));
                        changed.insert(template.name.clone());
                        true
                    }
                    _ => false,
                },
            })?;
        }

        if let Some(err) = failure {
            return Err(err);
        }
        for name in &changed {
            info!("Detected change for template '{}'.", name);
        }
        Ok((changed, accepted))
    }

    /// Materialise every stale managed file
    ///
    /// Per-file problems (unknown template, render or condition failure) are
    /// collected in the report; filesystem failures abort the pass. Unless
    /// this is a dry run, state and the template cache are saved afterwards.
    /// Template changes of failed files stay uncommitted, so those files are
    /// attempted again next time.
    pub fn apply(&mut self, options: ApplyOptions, store: &StateStore) -> Result<ApplyReport> {
        let Stage::Ready(ready) = &self.stage else {
            return Err(Error::Invariant("apply called before the engine is ready".to_string()));
        };

        let real = RealSystem;
        let dry = DryRunSystem::new();
        let system: &dyn System = if options.dry_run { &dry } else { &real };

        let is_new = self.state.is_new();
        if is_new {
            info!("State changed, every managed file is stale.");
        }

        let evaluator = ConditionEvaluator::new(&ready.loaded.context);
        let mut report = ApplyReport {
            dry_run: options.dry_run,
            ..ApplyReport::default()
        };
        let mut failed = BTreeSet::new();

        for file in &ready.loaded.files {
            let output = file.output();
            let plan = Self::plan(ready, file, &evaluator, options.force || is_new, system);

            let template = match plan {
                Ok(Plan::Skip(reason)) => {
                    debug!("Skipping '{}': {}", output, reason);
                    report.skipped.push(output);
                    continue;
                }
                Ok(Plan::Unchanged) => {
                    debug!("'{}' is up to date", output);
                    report.unchanged.push(output);
                    continue;
                }
                Ok(Plan::Update(template)) => template,
                Err(error) => {
                    error!("{}: {}", file.template, error);
                    failed.extend(file.templates().map(str::to_string));
                    report.failures.push(FileFailure {
                        template: file.template.clone(),
                        error,
                    });
                    continue;
                }
            };

            let source = match self.prepare_source(&ready.loaded.root, template, &ready.loaded.context, system) {
                Ok(source) => source,
                Err(error @ Error::Render { .. }) => {
                    error!("{error}");
                    failed.extend(file.templates().map(str::to_string));
                    report.failures.push(FileFailure {
                        template: file.template.clone(),
                        error,
                    });
                    continue;
                }
                Err(error) => return Err(error),
            };

            file.update(&source, system)?;
            report.updated.push(output);
        }

        if options.dry_run {
            info!("Dry run, nothing persisted.");
        } else {
            if !report.is_success() {
                warn!(
                    "{} file(s) failed, their template changes are kept pending.",
                    report.failures.len()
                );
            }
            self.persist(store, &failed)?;
        }

        Ok(report)
    }

    fn plan<'a>(
        ready: &'a Ready,
        file: &ManagedFile,
        evaluator: &ConditionEvaluator<'_>,
        stale: bool,
        system: &dyn System,
    ) -> Result<Plan<'a>> {
        if !file.applies_to(&CURRENT_PLATFORM) {
            return Ok(Plan::Skip("not for this platform"));
        }
        if !evaluator.evaluate(&file.condition)? {
            return Ok(Plan::Skip("condition is false"));
        }

        let template = ready
            .registry
            .get(&file.template)
            .ok_or_else(|| Error::TemplateNotFound {
                name: file.template.clone(),
            })?;

        let stale = stale
            || !system.exists(&file.output())
            || file.templates().any(|name| ready.changed.contains(name));

        Ok(if stale {
            Plan::Update(template)
        } else {
            Plan::Unchanged
        })
    }

    /// Path the output should be copied or linked from
    fn prepare_source(
        &self,
        root: &AbsPath,
        template: &Template,
        context: &JsonValue,
        system: &dyn System,
    ) -> Result<AbsPath> {
        let source = AbsPath::from_path(&template.path)?;
        if !template.is_renderable() {
            return Ok(source);
        }

        let render_error = |message: String| Error::Render {
            name: template.name.clone(),
            message,
        };
        let text = fs::read_to_string(&template.path).map_err(|e| render_error(e.to_string()))?;
        let rendered = self
            .renderer
            .render_named_str(&template.name, &text, context)
            .map_err(|e| render_error(e.to_string()))?;

        let build = root.join(BUILD_DIR).join(&template.name);
        let unchanged = fs::read(build.as_path())
            .is_ok_and(|existing| hash_content(&existing) == hash_content(rendered.as_bytes()));
        if !unchanged {
            system.write_file(&build, rendered.as_bytes())?;
        }
        Ok(build)
    }

    fn persist(&mut self, store: &StateStore, failed: &BTreeSet<String>) -> Result<()> {
        if let Stage::Ready(ready) = &mut self.stage {
            for name in failed {
                for (path, old) in ready.accepted.remove(name).unwrap_or_default() {
                    debug!("Keeping change to '{}' pending", path.display());
                    ready.cache.revert(path, old);
                }
            }
            ready.cache.save()?;
        }
        self.state.mark_applied();
        store.save(&self.state)
    }
}

/// Decode the single document with base name `base`, if any
///
/// More than one candidate (e.g. both `rcm.json` and `rcm.yaml`) is an
/// internal-consistency violation.
fn load_single_document(base: &Path) -> Result<Option<DataMap>> {
    let candidates = data::existing_candidates(base);
    match candidates.as_slice() {
        [] => Ok(None),
        [single] => {
            let decoded = data::decode_file(single)?;
            info!("Loaded config '{}'.", single.display());
            Ok(Some(decoded))
        }
        many => Err(Error::Invariant(format!(
            "multiple candidates for '{}': {}",
            base.display(),
            many.iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}
