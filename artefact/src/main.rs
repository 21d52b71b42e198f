//! `artefact`: build a deployment artefact from a git source repository and
//! push it to a separate repository.

use std::path::PathBuf;

use anyhow::Result;
use artefact::build::{BuildOutcome, PushMode, TagStep, run_build};
use artefact::context::{BuildOptions, RunContext};
use artefact::error::find_build_error;
use artefact::exit_codes;
use artefact::io::git::Git;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "artefact",
    version,
    about = "Build an artefact from the source repository and push it to a remote repository"
)]
struct Cli {
    /// Remote repository: a git URI or a local path.
    remote: String,

    /// Branch to push the artefact to.
    branch: String,

    /// Root directory. Relative paths resolve against it. Defaults to the current directory.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Source directory to build from. Defaults to the root directory.
    #[arg(long)]
    src: Option<PathBuf>,

    /// Map file selecting which source paths go where in the artefact.
    #[arg(long)]
    map: Option<PathBuf>,

    /// Artefact working directory.
    #[arg(long)]
    artefact: Option<PathBuf>,

    /// Branch to start from when the target branch does not exist on the remote.
    #[arg(long = "git-remote-branch-default")]
    git_remote_branch_default: Option<String>,

    /// Only add tags when building this branch.
    #[arg(long = "git-tag-branch-filter")]
    git_tag_branch_filter: Option<String>,

    /// Push the artefact. Without it the push is only printed.
    #[arg(long)]
    deploy: bool,

    /// Remove the artefact directory when done.
    #[arg(long)]
    cleanup: bool,

    /// Copy new source tags onto the artefact.
    #[arg(long)]
    propagate_tags: bool,

    /// Configuration file. Defaults to `.artefact.toml` in the root directory.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl From<Cli> for BuildOptions {
    fn from(cli: Cli) -> Self {
        Self {
            remote: cli.remote,
            branch: cli.branch,
            root: cli.root,
            src: cli.src,
            map: cli.map,
            artefact: cli.artefact,
            default_branch: cli.git_remote_branch_default,
            tag_branch_filter: cli.git_tag_branch_filter,
            deploy: cli.deploy,
            cleanup: cli.cleanup,
            propagate_tags: cli.propagate_tags,
            config: cli.config,
        }
    }
}

fn main() {
    artefact::logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("{:#}", err);
            match find_build_error(&err) {
                Some(build_err) if build_err.is_invalid_input() => exit_codes::INVALID_INPUT,
                _ => exit_codes::FAILED,
            }
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<()> {
    Git::new(".").ensure_available()?;
    let ctx = RunContext::resolve(cli.into())?;
    println!("{}", ctx.banner());

    match run_build(&ctx)? {
        BuildOutcome::NoChanges => {
            println!("No changes detected in the result artefact. Deployment will not proceed.");
        }
        BuildOutcome::Deployed(report) => {
            match &report.commit_message {
                Some(message) => println!("Committed files:\n\n{}", message.trim_end()),
                None => println!("No new source commits, nothing committed."),
            }
            match &report.tags {
                TagStep::Disabled | TagStep::NoneFound => {}
                TagStep::Applied(tags) => println!("Added tag(s) '{}'", tags.join(", ")),
                TagStep::Skipped { tags, filter } => println!(
                    "Skip adding tag(s) '{}' as current branch '{}' did not meet tag filter '{}'",
                    tags.join(", "),
                    ctx.branch,
                    filter
                ),
            }
            match &report.push {
                PushMode::Simulated { command } => println!("Deploy would run: {command}"),
                PushMode::Pushed => println!(
                    "Pushed code to remote '{}' into branch '{}'",
                    ctx.remote, ctx.branch
                ),
            }
        }
    }
    if ctx.cleanup && !ctx.artefact.exists() {
        println!("Removed artefact directory '{}'", ctx.artefact.display());
    }
    Ok(())
}
