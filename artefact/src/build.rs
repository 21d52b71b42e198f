//! Orchestration for a single artefact build.
//!
//! Stages run strictly in order: prepare, diff, commit, tag, push. The
//! artefact directory is removed at the end when cleanup was requested, on
//! every exit path.

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{info, instrument};

use crate::context::RunContext;
use crate::core::message::{build_message, commits_for_message};
use crate::core::tags::new_tags;
use crate::core::types::CommitFilter;
use crate::io::git::Git;
use crate::io::history::{first_commit, list_commits};
use crate::io::mapping::{Exclusions, materialize};
use crate::io::sync_state::{latest_synced_commit, recorded_source_targets};
use crate::io::tags::{list_tags, tags_on_last_commit, tags_reachable_since};
use crate::io::workdir::{CleanupGuard, CwdGuard, clean_dir, prepare_dir};

/// Version-control metadata directory kept across builds.
const GIT_DIR: &str = ".git";

/// Result of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Nothing changed and no tags are pending; nothing was committed or pushed.
    NoChanges,
    Deployed(DeployReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    /// Message of the artefact commit, if one was made.
    pub commit_message: Option<String>,
    pub tags: TagStep,
    pub push: PushMode,
}

/// What happened to new source tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagStep {
    /// Tag propagation is turned off.
    Disabled,
    NoneFound,
    Applied(Vec<String>),
    /// The artefact branch did not match the tag branch filter.
    Skipped { tags: Vec<String>, filter: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMode {
    /// Deploy was not requested; `command` is what would have run.
    Simulated { command: String },
    Pushed,
}

/// Build the artefact described by `ctx` and push it (or simulate the push).
#[instrument(skip_all, fields(branch = %ctx.branch, artefact = %ctx.artefact.display()))]
pub fn run_build(ctx: &RunContext) -> Result<BuildOutcome> {
    let _cleanup = CleanupGuard::new(&ctx.artefact, ctx.cleanup);

    let source = Git::new(&ctx.source).with_identity(ctx.identity.clone());
    let artefact = prepare(ctx)?;

    let has_changes = artefact.has_changes()?;
    let pending_tags = if ctx.propagate_tags {
        find_new_tags(&source, &artefact)?
    } else {
        Vec::new()
    };
    if !has_changes && pending_tags.is_empty() {
        info!("no changes detected in the artefact, deployment will not proceed");
        return Ok(BuildOutcome::NoChanges);
    }

    let commit_message = if has_changes {
        commit_changes(&source, &artefact)?
    } else {
        None
    };

    let tags = if !ctx.propagate_tags {
        TagStep::Disabled
    } else if pending_tags.is_empty() {
        TagStep::NoneFound
    } else {
        add_tags(ctx, &artefact, pending_tags)?
    };

    let push = push(ctx, &artefact)?;
    Ok(BuildOutcome::Deployed(DeployReport {
        commit_message,
        tags,
        push,
    }))
}

/// Fresh artefact repository on the requested branch, filled from source.
#[instrument(skip_all)]
fn prepare(ctx: &RunContext) -> Result<Git> {
    prepare_dir(&ctx.artefact)?;
    info!(dir = %ctx.artefact.display(), "prepared artefact directory");

    {
        let _cwd = CwdGuard::enter(&ctx.artefact)?;
        let here = Git::new(".");
        here.init()?;
        here.add_remote(&ctx.remote_name, &ctx.remote)?;
    }
    info!(remote = %ctx.remote, name = %ctx.remote_name, "initialised artefact repository");

    let artefact = Git::new(&ctx.artefact).with_identity(ctx.identity.clone());
    let existing = artefact.find_existing_branch(
        &ctx.remote,
        &[ctx.branch.as_str(), ctx.default_branch.as_str()],
    )?;
    artefact.pull(&ctx.remote_name, &existing)?;
    info!(branch = %existing, "checked out code from remote branch");
    if artefact.current_branch()? != ctx.branch {
        artefact.checkout_new_branch(&ctx.branch)?;
        if existing != ctx.branch {
            info!(branch = %ctx.branch, from = %existing, "created branch from default branch");
        }
    }

    clean_dir(&ctx.artefact, &[GIT_DIR])?;
    let mut exclusions = Exclusions::new([GIT_DIR]);
    if ctx.artefact.starts_with(&ctx.source) {
        exclusions = exclusions.with_path(&ctx.artefact);
    }
    materialize(
        &ctx.source,
        &ctx.artefact,
        ctx.map_file.as_deref(),
        &exclusions,
    )?;
    Ok(artefact)
}

/// Source tags added since the last deployment that the artefact lacks.
#[instrument(skip_all)]
fn find_new_tags(source: &Git, artefact: &Git) -> Result<Vec<String>> {
    let baseline = latest_synced_commit(source, artefact)?;
    let source_tags = tags_reachable_since(source, &baseline.hash)?;
    let artefact_tags = recorded_source_targets(artefact, &list_tags(artefact)?)?;
    let top_tags = tags_on_last_commit(artefact)?;
    let tags = new_tags(&source_tags, &artefact_tags, &top_tags)?;
    info!(count = tags.len(), "resolved new tags");
    Ok(tags)
}

/// Stage and commit the artefact tree. Returns the message, or `None` when no
/// source commit is newer than the baseline.
#[instrument(skip_all)]
fn commit_changes(source: &Git, artefact: &Git) -> Result<Option<String>> {
    let baseline = latest_synced_commit(source, artefact)?;
    let since_baseline = list_commits(source, &CommitFilter::since(baseline.hash.as_str()))?;
    let first = first_commit(source)?;
    let Some(commits) = commits_for_message(&baseline, &since_baseline, &first.hash) else {
        info!(baseline = %baseline.hash, "no source commits since last artefact build, skipping commit");
        return Ok(None);
    };
    let head = since_baseline
        .last()
        .context("source history since baseline is empty")?;

    let message = build_message(&Local::now(), head, &commits);
    artefact.add_all()?;
    if !artefact.commit_staged(&message)? {
        info!("nothing staged, skipping commit");
        return Ok(None);
    }
    info!(source = %head.hash, commits = commits.len(), "committed files");
    Ok(Some(message))
}

#[instrument(skip_all, fields(count = tags.len()))]
fn add_tags(ctx: &RunContext, artefact: &Git, tags: Vec<String>) -> Result<TagStep> {
    if let Some(filter) = &ctx.tag_branch_filter {
        let current = artefact.current_branch()?;
        if *filter != current {
            info!(
                tags = %tags.join(", "),
                branch = %current,
                %filter,
                "skip adding tags as current branch did not meet tag filter"
            );
            return Ok(TagStep::Skipped {
                tags,
                filter: filter.clone(),
            });
        }
    }
    for tag in &tags {
        artefact.tag(tag)?;
    }
    info!(tags = %tags.join(", "), "added tags");
    Ok(TagStep::Applied(tags))
}

#[instrument(skip_all, fields(remote = %ctx.remote_name, branch = %ctx.branch))]
fn push(ctx: &RunContext, artefact: &Git) -> Result<PushMode> {
    if !ctx.deploy {
        let command = format!(
            "git {}",
            Git::push_args(&ctx.remote_name, &ctx.branch).join(" ")
        );
        info!(%command, "deploy not requested, push simulated");
        return Ok(PushMode::Simulated { command });
    }
    artefact.push(&ctx.remote_name, &ctx.branch)?;
    info!(remote = %ctx.remote, branch = %ctx.branch, "pushed code to remote");
    Ok(PushMode::Pushed)
}
