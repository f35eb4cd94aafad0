//! dx - keep a feature branch in sync with a shared integration branch
//!
//! CLI tool that replays a branch's own commits onto an integration branch
//! as a single sync commit, and resumes after conflicts.

use dxsync::{
    Error, Git, Result, SyncOutcome, SyncSession,
    cli::{Cli, Commands},
    commit::{new_change_id, trailer},
    resolve::{default_resolvers, resolve_all},
    sync::{TempBranch, resume_hint},
};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Set up logging; RUST_LOG overrides --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Version = cli.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let git = Git::open(&cli.config())?;

    match cli.command {
        Commands::Commit { message, change_id } => cmd_commit(&git, &message, change_id),
        Commands::Sync { target, cont } => cmd_sync(&git, target, cont),
        Commands::ResolveConflict => cmd_resolve_conflict(&git),
        Commands::Status => cmd_status(&git),
        Commands::Version => Ok(()),
    }
}

fn cmd_commit(git: &Git, message: &str, change_id: Option<String>) -> Result<()> {
    let change_id = change_id.unwrap_or_else(new_change_id);
    if change_id.is_empty() || change_id.contains(char::is_whitespace) {
        return Err(Error::Validation(format!(
            "change-id must be a single non-empty token, got {:?}",
            change_id
        )));
    }

    info!(message = %message, change_id = %change_id, "commit");
    git.commit(&[message, &trailer(&change_id)])?;

    println!("Committed with change-id: {}", change_id);
    Ok(())
}

fn cmd_sync(git: &Git, target: Option<String>, cont: bool) -> Result<()> {
    let session = if cont {
        SyncSession::prepare_continue(git)?
    } else {
        let target = target
            .ok_or_else(|| Error::Validation("sync requires a target branch".to_string()))?;
        SyncSession::prepare(git, &target)?
    };
    let source = session.source_branch().to_string();
    let target = session.target_branch().to_string();

    match session.run() {
        Ok(SyncOutcome::NothingToSync) => {
            println!("Nothing to sync: {} has no new commits for {}", source, target);
            Ok(())
        }
        Ok(SyncOutcome::Synced { commits, .. }) => {
            println!("Synced {} commit(s) from {} to {}", commits, source, target);
            Ok(())
        }
        Err(e) if e.is_conflict() => {
            print!("{}", resume_hint(&target));
            if let Ok(files) = git.conflicted_files() {
                for f in files {
                    println!("  conflicted: {}", f);
                }
            }
            Err(e)
        }
        Err(e) => Err(e),
    }
}

fn cmd_resolve_conflict(git: &Git) -> Result<()> {
    let files = git.conflicted_files()?;
    if files.is_empty() {
        println!("No conflicted files.");
        return Ok(());
    }

    let resolvers = default_resolvers();
    let applied = resolve_all(git, &resolvers, &files)?;
    if applied.is_empty() {
        println!("No resolver matched the conflicted files:");
        for f in &files {
            println!("  {}", f);
        }
        return Ok(());
    }

    for name in &applied {
        println!("Resolved with {}", name);
    }
    println!("Review and stage the results, then run 'dx sync --continue'.");
    Ok(())
}

fn cmd_status(git: &Git) -> Result<()> {
    println!("Trunk: {}", git.trunk());

    let current = match git.current_branch() {
        Ok(branch) => Some(branch),
        Err(Error::DetachedHead) => None,
        Err(e) => return Err(e),
    };

    match &current {
        Some(branch) => println!("Branch: {}", branch),
        None => println!("Branch: (detached)"),
    }

    if let Some(branch) = current.as_deref().filter(|b| TempBranch::is_temp_branch(b)) {
        match TempBranch::parse(branch) {
            Ok(temp) => {
                println!("\nSuspended sync: {} -> {}", temp.from, temp.to);
                if git.replay_in_progress()? {
                    println!("  cherry-pick in progress, resolve and run 'dx sync --continue'");
                } else {
                    println!("  no cherry-pick in progress");
                }
            }
            Err(e) => println!("\n{}", e),
        }
    }

    let leftovers: Vec<String> = git
        .local_branches()?
        .into_iter()
        .filter(|b| TempBranch::is_temp_branch(b) && current.as_deref() != Some(b.as_str()))
        .collect();
    if !leftovers.is_empty() {
        println!("\nOther temp branches:");
        for b in &leftovers {
            match TempBranch::parse(b) {
                Ok(temp) => println!("  {} ({} -> {})", b, temp.from, temp.to),
                Err(_) => println!("  {}", b),
            }
        }
    }

    Ok(())
}
