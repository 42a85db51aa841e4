//! End-to-end apply passes against temporary data repositories

#![allow(clippy::unwrap_used, clippy::panic)]

use rcm_config::PathConfig;
use rcm_engine::environment::template_dirs;
use rcm_engine::{AbsPath, ApplyOptions, ApplyReport, Engine, Error, Phase, StateStore};
use rcm_template::TemplateEngine;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

struct Repo {
    _temp: TempDir,
    root: PathBuf,
    out: PathBuf,
    paths: PathConfig,
}

impl Repo {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("repo");
        let out = temp.path().join("home");
        let paths = PathConfig::under(&temp.path().join("xdg"));

        let repo = Self {
            _temp: temp,
            root,
            out,
            paths,
        };
        repo.manifest(json!([{ "template": "greeting", "directory": repo.out, "link": false }]));
        repo.write("templates/common/greeting.j2", "{{ main.message }}\n");
        repo.write("variables/common/main.yaml", "message: hello\n");
        repo
    }

    fn manifest(&self, files: serde_json::Value) {
        self.write("rcm.json", &json!({ "files": files }).to_string());
    }

    fn write(&self, relative: &str, content: &str) {
        let path = self.root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn select_variant(&self, variant: &str) {
        let store = self.store();
        let mut state = store.load().unwrap();
        state.set_variant(Some(variant));
        store.save(&state).unwrap();
    }

    fn store(&self) -> StateStore {
        StateStore::new(self.paths.state_file(), &self.root)
    }

    fn engine(&self) -> Engine<TemplateEngine> {
        let state = self.store().load().unwrap();
        let renderer = TemplateEngine::with_search_paths(template_dirs(&state));
        Engine::new(state, self.paths.clone(), renderer)
    }

    fn apply(&self, options: ApplyOptions) -> ApplyReport {
        let mut engine = self.engine();
        engine.initialize().unwrap();
        engine.apply(options, &self.store()).unwrap()
    }

    fn output(&self, name: &str) -> PathBuf {
        self.out.join(name)
    }

    fn read(&self, name: &str) -> String {
        fs::read_to_string(self.output(name)).unwrap()
    }
}

fn force() -> ApplyOptions {
    ApplyOptions {
        force: true,
        ..ApplyOptions::default()
    }
}

fn dry_run() -> ApplyOptions {
    ApplyOptions {
        dry_run: true,
        ..ApplyOptions::default()
    }
}

#[test]
fn test_first_apply_renders_output() {
    let repo = Repo::new();

    let report = repo.apply(ApplyOptions::default());

    assert!(report.is_success());
    assert_eq!(report.updated.len(), 1);
    assert_eq!(repo.read("greeting"), "hello\n");
    assert!(repo.root.join("build/greeting").exists());
}

#[test]
fn test_literal_greeting_edit_then_no_op() {
    let repo = Repo::new();
    fs::remove_file(repo.root.join("templates/common/greeting.j2")).unwrap();
    repo.write("templates/common/greeting", "hello");

    let first = repo.apply(ApplyOptions::default());
    assert_eq!(first.exit_code(), 0);
    assert_eq!(repo.read("greeting"), "hello");

    repo.write("templates/common/greeting", "hi");
    let second = repo.apply(ApplyOptions::default());
    assert_eq!(second.updated.len(), 1);
    assert_eq!(repo.read("greeting"), "hi");

    let third = repo.apply(ApplyOptions::default());
    assert!(third.updated.is_empty());
    assert_eq!(third.exit_code(), 0);
}

#[test]
fn test_second_apply_is_a_no_op() {
    let repo = Repo::new();
    repo.apply(ApplyOptions::default());

    let report = repo.apply(ApplyOptions::default());

    assert!(report.updated.is_empty());
    assert_eq!(report.unchanged.len(), 1);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn test_variable_change_rematerialises() {
    let repo = Repo::new();
    repo.apply(ApplyOptions::default());

    repo.write("variables/common/main.yaml", "message: hi\n");
    let report = repo.apply(ApplyOptions::default());

    assert_eq!(report.updated.len(), 1);
    assert_eq!(repo.read("greeting"), "hi\n");
}

#[test]
fn test_template_edit_marks_only_its_files() {
    let repo = Repo::new();
    repo.write("templates/common/other", "static\n");
    repo.manifest(json!([
        { "template": "greeting", "directory": repo.out, "link": false },
        { "template": "other", "directory": repo.out, "link": false },
    ]));
    repo.apply(ApplyOptions::default());

    repo.write("templates/common/greeting.j2", "{{ main.message }}, world\n");
    let mut engine = repo.engine();
    engine.initialize().unwrap();
    assert_eq!(
        engine.changed_templates().unwrap().iter().collect::<Vec<_>>(),
        ["greeting"]
    );

    let report = engine.apply(ApplyOptions::default(), &repo.store()).unwrap();
    let greeting = AbsPath::from_path(&repo.output("greeting")).unwrap();
    assert_eq!(report.updated, vec![greeting]);
    assert_eq!(report.unchanged.len(), 1);
    assert_eq!(repo.read("greeting"), "hello, world\n");
}

#[test]
fn test_extra_template_edit_rematerialises_only_its_file() {
    let repo = Repo::new();
    repo.write("templates/common/greeting.j2", "{% include 'signature' %}: {{ main.message }}\n");
    repo.write("templates/common/signature", "bye");
    repo.write("templates/common/other", "static\n");
    repo.manifest(json!([
        {
            "template": "greeting",
            "extra_templates": ["signature"],
            "directory": repo.out,
            "link": false,
        },
        { "template": "other", "directory": repo.out, "link": false },
    ]));
    repo.apply(ApplyOptions::default());
    assert_eq!(repo.read("greeting"), "bye: hello\n");

    repo.write("templates/common/signature", "ciao");
    let mut engine = repo.engine();
    engine.initialize().unwrap();
    assert_eq!(
        engine.changed_templates().unwrap().iter().collect::<Vec<_>>(),
        ["signature"]
    );

    let report = engine.apply(ApplyOptions::default(), &repo.store()).unwrap();
    let greeting = AbsPath::from_path(&repo.output("greeting")).unwrap();
    assert_eq!(report.updated, vec![greeting]);
    assert_eq!(report.unchanged.len(), 1);
    assert_eq!(repo.read("greeting"), "ciao: hello\n");
}

#[test]
fn test_edit_to_shadowed_common_copy_changes_nothing() {
    let repo = Repo::new();
    repo.write("templates/laptop/greeting.j2", "laptop {{ main.message }}\n");
    repo.select_variant("laptop");
    repo.apply(ApplyOptions::default());
    assert_eq!(repo.read("greeting"), "laptop hello\n");

    repo.write("templates/common/greeting.j2", "common edit\n");
    let mut engine = repo.engine();
    engine.initialize().unwrap();
    assert!(engine.changed_templates().unwrap().is_empty());

    let report = engine.apply(ApplyOptions::default(), &repo.store()).unwrap();
    assert!(report.updated.is_empty());
    assert_eq!(report.unchanged.len(), 1);
    assert_eq!(repo.read("greeting"), "laptop hello\n");
}

#[test]
fn test_removing_variant_copy_falls_back_to_common_then_fails() {
    let repo = Repo::new();
    repo.write("templates/laptop/greeting.j2", "laptop {{ main.message }}\n");
    repo.select_variant("laptop");
    repo.apply(ApplyOptions::default());
    assert_eq!(repo.read("greeting"), "laptop hello\n");

    fs::remove_file(repo.root.join("templates/laptop/greeting.j2")).unwrap();
    let mut engine = repo.engine();
    engine.initialize().unwrap();
    assert!(engine.changed_templates().unwrap().contains("greeting"));

    let report = engine.apply(ApplyOptions::default(), &repo.store()).unwrap();
    assert!(report.is_success());
    assert_eq!(report.updated.len(), 1);
    assert_eq!(repo.read("greeting"), "hello\n");

    fs::remove_file(repo.root.join("templates/common/greeting.j2")).unwrap();
    let err = repo.engine().initialize().unwrap_err();
    assert!(matches!(err, Error::TemplateRemoved { ref name, .. } if name == "greeting"));
    assert_eq!(repo.read("greeting"), "hello\n");
}

#[test]
fn test_removed_template_fails_and_leaves_outputs() {
    let repo = Repo::new();
    repo.apply(ApplyOptions::default());

    fs::remove_file(repo.root.join("templates/common/greeting.j2")).unwrap();
    let mut engine = repo.engine();
    let err = engine.initialize().unwrap_err();

    assert!(matches!(err, Error::TemplateRemoved { ref name, .. } if name == "greeting"));
    assert!(matches!(engine.phase(), Phase::Failed(_)));
    assert!(engine.apply(ApplyOptions::default(), &repo.store()).is_err());
    assert_eq!(repo.read("greeting"), "hello\n");
}

#[test]
fn test_unknown_template_fails_to_load() {
    let repo = Repo::new();
    repo.manifest(json!([{ "template": "missing", "directory": repo.out, "link": false }]));

    let err = repo.engine().initialize().unwrap_err();

    assert!(matches!(err, Error::TemplateNotFound { ref name } if name == "missing"));
}

#[test]
fn test_missing_manifest_lists_candidates() {
    let repo = Repo::new();
    fs::remove_file(repo.root.join("rcm.json")).unwrap();

    let err = repo.engine().initialize().unwrap_err();

    let Error::ConfigNotFound { candidates } = err else {
        panic!("expected ConfigNotFound, got {err:?}");
    };
    assert!(candidates.contains(&repo.root.join("rcm.yaml")));
}

#[test]
fn test_two_manifests_are_an_invariant_violation() {
    let repo = Repo::new();
    repo.write("rcm.yaml", "files: []\n");

    let err = repo.engine().initialize().unwrap_err();

    assert!(err.is_invariant());
}

#[test]
fn test_platform_filter_skips_even_with_force() {
    let repo = Repo::new();
    repo.manifest(json!([{
        "template": "greeting",
        "directory": repo.out,
        "link": false,
        "platforms": ["plan9"],
    }]));

    let report = repo.apply(force());

    assert_eq!(report.skipped.len(), 1);
    assert!(!repo.output("greeting").exists());
}

#[test]
fn test_unset_variable_in_other_platform_entry_does_not_block_load() {
    let repo = Repo::new();
    repo.manifest(json!([
        { "template": "greeting", "directory": repo.out, "link": false },
        {
            "template": "greeting",
            "directory": "$RCM_TEST_APPDATA/settings",
            "name": "settings",
            "link": false,
            "platforms": ["plan9"],
        },
    ]));

    let report = temp_env::with_var_unset("RCM_TEST_APPDATA", || {
        repo.apply(ApplyOptions::default())
    });

    assert!(report.is_success());
    assert_eq!(report.updated.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(repo.read("greeting"), "hello\n");
}

#[test]
fn test_false_condition_skips() {
    let repo = Repo::new();
    repo.manifest(json!([{
        "template": "greeting",
        "directory": repo.out,
        "link": false,
        "condition": "variant == 'laptop'",
    }]));

    let report = repo.apply(ApplyOptions::default());

    assert_eq!(report.skipped.len(), 1);
    assert!(report.is_success());
}

#[test]
fn test_variant_switch_is_new_exactly_once() {
    let repo = Repo::new();
    repo.write("templates/laptop/greeting.j2", "{{ variant }}: {{ main.message }}\n");
    repo.apply(ApplyOptions::default());

    let store = repo.store();
    let mut state = store.load().unwrap();
    assert!(state.set_variant(Some("laptop")));
    store.save(&state).unwrap();

    let report = repo.apply(ApplyOptions::default());
    assert_eq!(report.updated.len(), 1);
    assert_eq!(repo.read("greeting"), "laptop: hello\n");

    let state = store.load().unwrap();
    assert!(!state.is_new());
    let report = repo.apply(ApplyOptions::default());
    assert!(report.updated.is_empty());
}

#[test]
fn test_variant_variables_win() {
    let repo = Repo::new();
    repo.write("variables/laptop/main.yaml", "message: howdy\n");
    let store = repo.store();
    let mut state = store.load().unwrap();
    state.set_variant(Some("laptop"));
    store.save(&state).unwrap();

    repo.apply(ApplyOptions::default());

    assert_eq!(repo.read("greeting"), "howdy\n");
}

#[test]
fn test_state_round_trips_after_apply() {
    let repo = Repo::new();
    repo.apply(ApplyOptions::default());

    let state = repo.store().load().unwrap();

    assert_eq!(state.directory(), repo.root);
    assert_eq!(state.previous().variables["main"]["message"], "hello");
    assert!(state.manifest().contains_key("files"));
}

#[test]
fn test_dry_run_writes_nothing() {
    let repo = Repo::new();

    let report = repo.apply(dry_run());

    assert!(report.dry_run);
    assert_eq!(report.updated.len(), 1);
    assert!(!repo.output("greeting").exists());
    assert!(!repo.root.join("build").exists());
    assert!(!repo.paths.state_file().exists());
    assert!(!repo.paths.template_cache().exists());
}

#[test]
fn test_render_failure_is_per_file_and_state_is_saved() {
    let repo = Repo::new();
    repo.write("templates/common/broken.j2", "{{ oops");
    repo.write("templates/common/plain", "fine\n");
    repo.manifest(json!([
        { "template": "broken", "directory": repo.out, "link": false },
        { "template": "plain", "directory": repo.out, "link": false },
    ]));

    let report = repo.apply(ApplyOptions::default());

    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.failures[0].template, "broken");
    assert_eq!(repo.read("plain"), "fine\n");
    assert!(repo.paths.state_file().exists());

    let again = repo.apply(ApplyOptions::default());
    assert_eq!(again.failures.len(), 1);
    assert!(again.updated.is_empty());
    assert_eq!(again.unchanged.len(), 1);
}

#[test]
fn test_failed_template_change_stays_pending() {
    let repo = Repo::new();
    repo.write("templates/common/plain", "fine\n");
    repo.manifest(json!([
        { "template": "greeting", "directory": repo.out, "link": false },
        { "template": "plain", "directory": repo.out, "link": false },
    ]));
    assert!(repo.apply(ApplyOptions::default()).is_success());

    repo.write("templates/common/greeting.j2", "{{ oops");
    let first = repo.apply(ApplyOptions::default());
    assert_eq!(first.exit_code(), 1);
    assert_eq!(first.unchanged.len(), 1);
    assert_eq!(repo.read("greeting"), "hello\n");

    let second = repo.apply(ApplyOptions::default());
    assert_eq!(second.failures[0].template, "greeting");
    assert_eq!(second.unchanged.len(), 1);

    repo.write("templates/common/greeting.j2", "{{ main.message }}!\n");
    let fixed = repo.apply(ApplyOptions::default());
    assert!(fixed.is_success());
    assert_eq!(fixed.updated.len(), 1);
    assert_eq!(repo.read("greeting"), "hello!\n");
}

#[test]
fn test_link_points_at_build_output() {
    let repo = Repo::new();
    repo.manifest(json!([{
        "template": "greeting",
        "directory": repo.out,
        "name": "hello.txt",
        "link": true,
    }]));

    repo.apply(ApplyOptions::default());

    let output = repo.output("hello.txt");
    assert!(output.symlink_metadata().unwrap().file_type().is_symlink());
    assert_eq!(fs::read_link(&output).unwrap(), repo.root.join("build/greeting"));
    assert_eq!(repo.read("hello.txt"), "hello\n");
}

#[test]
fn test_relative_output_directory_is_under_root() {
    let repo = Repo::new();
    repo.manifest(json!([{ "template": "greeting", "directory": "out", "link": false }]));

    repo.apply(ApplyOptions::default());

    assert!(repo.root.join("out/greeting").exists());
}

#[test]
fn test_dump_context_holds_variables_and_system() {
    let repo = Repo::new();
    let mut engine = repo.engine();
    engine.initialize().unwrap();

    let context = engine.context().unwrap();

    assert_eq!(context["main"]["message"], "hello");
    assert_eq!(context["variant"], "");
    assert!(context["system"]["os"].is_string());
}
