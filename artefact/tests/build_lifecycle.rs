//! End-to-end builds against real git repositories in temp dirs.
//!
//! Each test wires a source repository, a bare remote standing in for the
//! artefact repository and a scratch directory for the artefact work tree.

use std::fs;
use std::path::PathBuf;

use artefact::build::{BuildOutcome, DeployReport, PushMode, TagStep, run_build};
use artefact::context::{BuildOptions, RunContext};
use artefact::error::{BuildError, find_build_error};
use artefact::io::config::{BuildConfig, IdentityConfig};
use artefact::io::git::Git;
use artefact::io::sync_state::last_recorded_source_hash;
use artefact::test_support::{TestRemote, TestRepo, test_identity};
use tempfile::TempDir;

struct Fixture {
    source: TestRepo,
    remote: TestRemote,
    work: TempDir,
}

impl Fixture {
    /// Source repository with three commits and a remote with `master`.
    fn new() -> Self {
        let source = TestRepo::new().expect("source");
        source
            .commit_file("docroot/index.php", "<?php // A", "Add front controller")
            .expect("commit");
        source
            .commit_file("composer.json", "{}", "Add composer manifest")
            .expect("commit");
        source
            .commit_file("docroot/sites/default/settings.php", "<?php", "Add settings")
            .expect("commit");
        Self {
            source,
            remote: TestRemote::with_branch("master").expect("remote"),
            work: tempfile::tempdir().expect("work"),
        }
    }

    fn artefact_dir(&self) -> PathBuf {
        self.work.path().join("artefact")
    }

    fn options(&self, branch: &str) -> BuildOptions {
        BuildOptions {
            remote: self.remote.url(),
            branch: branch.to_string(),
            artefact: Some(self.artefact_dir()),
            deploy: true,
            ..BuildOptions::default()
        }
    }

    fn context(&self, options: BuildOptions) -> RunContext {
        let identity = test_identity();
        let config = BuildConfig {
            identity: Some(IdentityConfig {
                name: identity.name,
                email: identity.email,
            }),
            ..BuildConfig::default()
        };
        let root = self.source.path().canonicalize().expect("canonical root");
        RunContext::from_config(root, options, &config).expect("context")
    }

    fn build(&self, options: BuildOptions) -> anyhow::Result<BuildOutcome> {
        run_build(&self.context(options))
    }
}

fn deployed(outcome: BuildOutcome) -> DeployReport {
    match outcome {
        BuildOutcome::Deployed(report) => report,
        BuildOutcome::NoChanges => panic!("expected a deployment"),
    }
}

#[test]
fn first_build_lists_every_source_commit() {
    let fx = Fixture::new();
    let head = fx.source.head().expect("head");
    let report = deployed(fx.build(fx.options("master")).expect("build"));

    assert_eq!(report.push, PushMode::Pushed);
    assert_eq!(report.tags, TagStep::Disabled);
    let message = report.commit_message.expect("commit message");
    assert!(message.starts_with("Deployment commit on "));
    assert!(message.contains(&format!("\n\nSource commit: {head}\n")));
    assert!(message.contains("Commits since last artefact build:"));
    let listed: Vec<&str> = message
        .lines()
        .skip_while(|l| !l.starts_with("Commits since"))
        .skip(2)
        .collect();
    assert_eq!(listed.len(), 3);
    assert!(listed[0].starts_with("Add front controller ("));
    assert!(listed[2].starts_with("Add settings ("));
    assert!(listed[2].ends_with(&format!("({})", &head[..8])));

    let pushed = fx.remote.messages("master").expect("messages");
    assert_eq!(pushed.len(), 2);
    assert_eq!(pushed[0], message.trim_end());
    assert_eq!(
        fx.remote.files("master").expect("files"),
        vec![
            "composer.json",
            "docroot/index.php",
            "docroot/sites/default/settings.php"
        ]
    );

    let artefact = Git::new(fx.artefact_dir());
    assert_eq!(
        last_recorded_source_hash(&artefact).expect("marker"),
        Some(head)
    );
}

#[test]
fn second_build_without_new_commits_is_a_no_op() {
    let fx = Fixture::new();
    deployed(fx.build(fx.options("master")).expect("first build"));
    let before = fx.remote.messages("master").expect("messages");

    let outcome = fx.build(fx.options("master")).expect("second build");
    assert_eq!(outcome, BuildOutcome::NoChanges);
    assert_eq!(fx.remote.messages("master").expect("messages"), before);
}

#[test]
fn incremental_build_lists_only_newer_commits() {
    let fx = Fixture::new();
    let first_head = fx.source.head().expect("head");
    deployed(fx.build(fx.options("master")).expect("first build"));

    let d = fx
        .source
        .commit_file("docroot/about.php", "<?php", "Add about page")
        .expect("commit");
    let e = fx
        .source
        .commit_file("docroot/index.php", "<?php // E", "Rework front controller")
        .expect("commit");

    let report = deployed(fx.build(fx.options("master")).expect("second build"));
    let message = report.commit_message.expect("commit message");
    assert!(message.contains(&format!("Source commit: {e}")));
    assert!(message.contains(&format!("Add about page ({})", &d[..8])));
    assert!(message.contains(&format!("Rework front controller ({})", &e[..8])));
    assert!(!message.contains(&first_head[..8]));
    assert!(!message.contains("Add composer manifest"));

    assert_eq!(fx.remote.messages("master").expect("messages").len(), 3);
    assert_eq!(
        fx.remote
            .read_file("master", "docroot/index.php")
            .expect("read"),
        "<?php // E"
    );
}

#[test]
fn map_file_controls_artefact_layout() {
    let fx = Fixture::new();
    fx.source
        .commit_file("docroot/sites/default/files/cache.bin", "x", "Add cache")
        .expect("commit");
    fx.source
        .commit_file(
            ".artefactmap",
            "# deployable\ndocroot/:web/\ncomposer.json:config/\n!docroot/sites/default/files\n",
            "Add map",
        )
        .expect("commit");

    let options = BuildOptions {
        map: Some(PathBuf::from(".artefactmap")),
        ..fx.options("master")
    };
    deployed(fx.build(options).expect("build"));

    assert_eq!(
        fx.remote.files("master").expect("files"),
        vec![
            "config/composer.json",
            "web/index.php",
            "web/sites/default/settings.php"
        ]
    );
}

#[test]
fn missing_branch_falls_back_to_default_and_creates_it() {
    let fx = Fixture::new();
    deployed(fx.build(fx.options("develop")).expect("build"));

    assert!(fx.remote.has_branch("develop").expect("branch"));
    let messages = fx.remote.messages("develop").expect("messages");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1], "Initial artefact commit");
    assert_eq!(fx.remote.messages("master").expect("messages").len(), 1);
}

#[test]
fn unknown_branches_fail() {
    let fx = Fixture::new();
    let options = BuildOptions {
        default_branch: Some("trunk".to_string()),
        ..fx.options("develop")
    };
    let err = fx.build(options).unwrap_err();
    match find_build_error(&err) {
        Some(BuildError::BranchNotFound { branches, .. }) => {
            assert_eq!(branches, &vec!["develop".to_string(), "trunk".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn simulated_push_leaves_remote_untouched() {
    let fx = Fixture::new();
    let options = BuildOptions {
        deploy: false,
        ..fx.options("master")
    };
    let report = deployed(fx.build(options).expect("build"));

    assert_eq!(
        report.push,
        PushMode::Simulated {
            command: "git push --tags origin HEAD:master".to_string()
        }
    );
    assert!(report.commit_message.is_some());
    assert_eq!(
        fx.remote.messages("master").expect("messages"),
        vec!["Initial artefact commit"]
    );
}

#[test]
fn cleanup_removes_artefact_dir_on_success_and_failure() {
    let fx = Fixture::new();
    let options = BuildOptions {
        cleanup: true,
        ..fx.options("master")
    };
    deployed(fx.build(options).expect("build"));
    assert!(!fx.artefact_dir().exists());

    fx.source
        .write_file("broken.map", "vendor/:vendor/\n")
        .expect("write map");
    let options = BuildOptions {
        cleanup: true,
        map: Some(PathBuf::from("broken.map")),
        ..fx.options("master")
    };
    let err = fx.build(options).unwrap_err();
    assert!(matches!(
        find_build_error(&err),
        Some(BuildError::MissingSourcePath { .. })
    ));
    assert!(!fx.artefact_dir().exists());
}

#[test]
fn failed_build_keeps_artefact_dir_without_cleanup() {
    let fx = Fixture::new();
    fx.source
        .write_file("broken.map", "vendor/:vendor/\n")
        .expect("write map");
    let options = BuildOptions {
        map: Some(PathBuf::from("broken.map")),
        ..fx.options("master")
    };
    assert!(fx.build(options).is_err());
    assert!(fx.artefact_dir().join(".git").exists());
}

#[test]
fn uncommitted_source_changes_are_pushed_without_a_commit() {
    let fx = Fixture::new();
    deployed(fx.build(fx.options("master")).expect("first build"));
    fx.source
        .write_file("docroot/draft.php", "<?php")
        .expect("write");

    let report = deployed(fx.build(fx.options("master")).expect("second build"));
    assert_eq!(report.commit_message, None);
    assert_eq!(fx.remote.messages("master").expect("messages").len(), 2);
}

#[test]
fn empty_source_repository_fails() {
    let source = TestRepo::new().expect("source");
    source.write_file("index.php", "<?php").expect("write");
    let fx = Fixture {
        source,
        remote: TestRemote::with_branch("master").expect("remote"),
        work: tempfile::tempdir().expect("work"),
    };
    let err = fx.build(fx.options("master")).unwrap_err();
    assert!(matches!(
        find_build_error(&err),
        Some(BuildError::EmptyRepository { .. })
    ));
}

#[test]
fn unresolvable_provenance_aborts() {
    let fx = Fixture::new();
    let forged = TestRepo::new().expect("forged");
    forged
        .commit_file(
            "README.md",
            "x",
            "Deployment commit on 2020/01/01 00:00:00\n\nSource commit: 0123456789abcdef0123456789abcdef01234567\n",
        )
        .expect("commit");
    fx.remote.push_from(&forged, "release").expect("push");

    let err = fx.build(fx.options("release")).unwrap_err();
    match find_build_error(&err) {
        Some(BuildError::ProvenanceNotResolvable { hash, .. }) => {
            assert_eq!(hash, "0123456789abcdef0123456789abcdef01234567");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn new_source_tags_are_propagated_once() {
    let fx = Fixture::new();
    fx.source.tag_annotated("v1.0", "Release 1.0").expect("tag");
    let options = || BuildOptions {
        propagate_tags: true,
        ..fx.options("master")
    };

    let report = deployed(fx.build(options()).expect("first build"));
    assert_eq!(report.tags, TagStep::Applied(vec!["v1.0".to_string()]));
    assert_eq!(fx.remote.tags().expect("tags"), vec!["v1.0"]);

    fx.source
        .commit_file("docroot/new.php", "<?php", "Add page")
        .expect("commit");
    fx.source.tag("v1.1").expect("tag");
    let report = deployed(fx.build(options()).expect("second build"));
    assert_eq!(report.tags, TagStep::Applied(vec!["v1.1".to_string()]));
    assert_eq!(fx.remote.tags().expect("tags"), vec!["v1.0", "v1.1"]);

    assert_eq!(fx.build(options()).expect("third build"), BuildOutcome::NoChanges);
}

#[test]
fn manual_artefact_commit_does_not_turn_deployed_tags_into_conflicts() {
    let fx = Fixture::new();
    fx.source.tag("v1.0").expect("tag");
    let options = || BuildOptions {
        propagate_tags: true,
        ..fx.options("master")
    };
    let report = deployed(fx.build(options()).expect("first build"));
    assert_eq!(report.tags, TagStep::Applied(vec!["v1.0".to_string()]));

    let hotfix = TestRepo::new().expect("hotfix");
    hotfix
        .run(&["pull", "--quiet", fx.remote.url().as_str(), "master"])
        .expect("pull");
    hotfix
        .commit_file("hotfix.txt", "patched", "Hotfix on artefact")
        .expect("commit");
    fx.remote.push_from(&hotfix, "master").expect("push");

    fx.source
        .commit_file("docroot/new.php", "<?php", "Add page")
        .expect("commit");
    let report = deployed(fx.build(options()).expect("second build"));
    assert_eq!(report.tags, TagStep::NoneFound);
    assert_eq!(fx.remote.tags().expect("tags"), vec!["v1.0"]);
    assert_eq!(fx.remote.messages("master").expect("messages").len(), 4);
}

#[test]
fn conflicting_tag_aborts_without_pushing() {
    let fx = Fixture::new();
    let other = TestRepo::new().expect("other");
    other.commit_file("old.txt", "old", "Old release").expect("commit");
    other.tag("v1.0").expect("tag");
    fx.remote.push_from(&other, "legacy").expect("push");

    fx.source.tag("v1.0").expect("tag");
    let options = BuildOptions {
        propagate_tags: true,
        ..fx.options("master")
    };
    let err = fx.build(options).unwrap_err();
    match find_build_error(&err) {
        Some(BuildError::TagConflict { tags }) => assert_eq!(tags, &vec!["v1.0".to_string()]),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fx.remote.messages("master").expect("messages").len(), 1);
}

#[test]
fn tag_branch_filter_skips_tags_on_other_branches() {
    let fx = Fixture::new();
    fx.source.tag("v1.0").expect("tag");
    let options = BuildOptions {
        propagate_tags: true,
        tag_branch_filter: Some("production".to_string()),
        ..fx.options("master")
    };
    let report = deployed(fx.build(options).expect("build"));
    assert_eq!(
        report.tags,
        TagStep::Skipped {
            tags: vec!["v1.0".to_string()],
            filter: "production".to_string()
        }
    );
    assert!(fx.remote.tags().expect("tags").is_empty());
}

#[test]
fn artefact_dir_inside_source_is_not_copied_into_itself() {
    let fx = Fixture::new();
    let options = BuildOptions {
        artefact: Some(PathBuf::from("build/artefact")),
        ..fx.options("master")
    };
    deployed(fx.build(options).expect("build"));
    let files = fx.remote.files("master").expect("files");
    assert!(!files.iter().any(|f| f.starts_with("build/artefact")));
    assert!(files.contains(&"docroot/index.php".to_string()));
    assert!(fs::metadata(fx.source.path().join("build/artefact/.git")).is_ok());
}
