//! Sync - replaying a feature branch onto an integration branch
//!
//! A session either starts fresh (`dx sync <target>`) or resumes one that
//! stopped on a conflict (`dx sync --continue`). Both end the same way: the
//! pending commits are cherry-picked onto a temp branch forked from the
//! target, the temp branch is squash-merged into the target, and a single
//! sync commit listing every replayed message is written.
//!
//! Nothing is stored outside the repository. A suspended session is the
//! checked-out temp branch itself; its name says which pair it belongs to.

pub mod branch;
pub mod conflict;
pub mod teardown;

pub use branch::TempBranch;
pub use conflict::{ReplayFailure, classify, resume_hint};
pub use teardown::{CleanupAction, Teardown};

use crate::commit::{Commit, parse_log, pending_index, sync_message};
use crate::{Error, Git, Result};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Configuration for sync operations
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Directory inside the repository to operate on
    pub repo_dir: PathBuf,

    /// Remote the target branch is refreshed from
    pub remote: String,

    /// Shared trunk; detected from `trunk_candidates` when `None`
    pub trunk: Option<String>,

    /// Branch names tried, in order, when detecting the trunk
    pub trunk_candidates: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            repo_dir: PathBuf::from("."),
            remote: "origin".to_string(),
            trunk: None,
            trunk_candidates: vec!["main".to_string(), "master".to_string()],
        }
    }
}

impl SyncConfig {
    /// Create config for a specific repository directory
    pub fn with_repo_dir(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            ..Default::default()
        }
    }

    pub fn remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    pub fn trunk(mut self, trunk: Option<String>) -> Self {
        self.trunk = trunk;
        self
    }
}

/// How a session that did not fail ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Every commit on the source branch is already on the target
    NothingToSync,

    /// A sync commit was written on the target
    Synced {
        source: String,
        target: String,
        /// Sub-commits in the new sync commit
        commits: usize,
    },
}

/// One synchronization run
#[derive(Debug)]
pub struct SyncSession {
    git: Git,

    source_branch: String,
    target_branch: String,

    /// Source-only commits relative to the trunk, newest first
    current_commits: Vec<Commit>,

    /// What the target (or the temp branch, when resuming) already carries
    synced_commits: Vec<Commit>,

    /// Commits this session replayed before it was suspended, newest first
    replayed_commits: Vec<Commit>,

    /// Oldest index in `current_commits` still to replay
    pending_index: Option<usize>,

    temp_branch: Option<TempBranch>,

    /// Branch checked out again when the session ends
    restore_branch: String,

    resumed: bool,

    teardown: Teardown,
}

impl SyncSession {
    /// Start a fresh session syncing the checked-out branch into `target`.
    pub fn prepare(git: &Git, target: &str) -> Result<Self> {
        let source = git.current_branch()?;
        if source == target {
            return Err(Error::SameBranch(source));
        }

        let mut teardown = Teardown::new(git.clone());
        teardown.register(CleanupAction::RestoreBranch(source.clone()));

        refresh_from_remote(git, target, &source)?;

        info!(branch_to = %target, branch_from = %source, "syncing branch");
        let current_commits = commits_between(git, git.trunk(), &source)?;
        let synced_commits = commits_between(git, git.trunk(), target)?;
        let pending_index = pending_index(&current_commits, &synced_commits)?;

        let mut temp_branch = None;
        if pending_index.is_some() {
            let temp = TempBranch::new(target, &source);
            git.checkout_new(&temp.name, target)?;
            teardown.register(CleanupAction::DeleteBranch(temp.name.clone()));
            temp_branch = Some(temp);
        }

        Ok(Self {
            git: git.clone(),
            source_branch: source.clone(),
            target_branch: target.to_string(),
            current_commits,
            synced_commits,
            replayed_commits: Vec::new(),
            pending_index,
            temp_branch,
            restore_branch: source,
            resumed: false,
            teardown,
        })
    }

    /// Resume the session whose temp branch is checked out.
    pub fn prepare_continue(git: &Git) -> Result<Self> {
        let name = git.current_branch()?;
        let temp = TempBranch::parse(&name)?;
        let source = temp.from.clone();
        let target = temp.to.clone();

        let mut teardown = Teardown::new(git.clone());
        teardown.register(CleanupAction::RestoreBranch(source.clone()));

        info!(branch_to = %target, branch_from = %source, "continue syncing branch");
        if !git.replay_in_progress()? {
            teardown.suspend();
            return Err(Error::NoReplayInProgress(name));
        }
        let out = git.cherry_pick_continue()?;
        if !out.success {
            teardown.suspend();
            return Err(Error::ContinueFailed(out.combined()));
        }

        let current_commits = commits_between(git, git.trunk(), &source)?;
        let synced_commits = commits_between(git, git.trunk(), &temp.name)?;
        let replayed_commits = commits_between(git, &target, &temp.name)?;
        let pending_index = pending_index(&current_commits, &synced_commits)?;

        teardown.register(CleanupAction::DeleteBranch(temp.name.clone()));

        Ok(Self {
            git: git.clone(),
            source_branch: source.clone(),
            target_branch: target,
            current_commits,
            synced_commits,
            replayed_commits,
            pending_index,
            temp_branch: Some(temp),
            restore_branch: source,
            resumed: true,
            teardown,
        })
    }

    pub fn source_branch(&self) -> &str {
        &self.source_branch
    }

    pub fn target_branch(&self) -> &str {
        &self.target_branch
    }

    pub fn current_commits(&self) -> &[Commit] {
        &self.current_commits
    }

    pub fn synced_commits(&self) -> &[Commit] {
        &self.synced_commits
    }

    pub fn replayed_commits(&self) -> &[Commit] {
        &self.replayed_commits
    }

    pub fn pending_index(&self) -> Option<usize> {
        self.pending_index
    }

    pub fn temp_branch(&self) -> Option<&TempBranch> {
        self.temp_branch.as_ref()
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    /// Commits still to replay, oldest first
    pub fn pending_commits(&self) -> Vec<&Commit> {
        match self.pending_index {
            Some(i) => self.current_commits[..=i].iter().rev().collect(),
            None => Vec::new(),
        }
    }

    /// Replay the pending commits and write the sync commit.
    ///
    /// Returns [`Error::Conflict`] when a cherry-pick stops on a conflict;
    /// the temp branch then stays checked out for `dx sync --continue`.
    pub fn run(mut self) -> Result<SyncOutcome> {
        if self.pending_index.is_none() && !self.resumed {
            info!("no pending commits to sync");
            return Ok(SyncOutcome::NothingToSync);
        }
        let Some(temp) = self.temp_branch.clone() else {
            return Err(Error::Validation("sync session has no temp branch".to_string()));
        };

        let pending: Vec<Commit> = self.pending_commits().into_iter().cloned().collect();
        info!(
            first = ?self.pending_index,
            last = 0,
            count = pending.len(),
            "pending commit"
        );

        for commit in &pending {
            self.replay(commit)?;
        }

        self.complete(&temp, &pending)
    }

    fn replay(&mut self, commit: &Commit) -> Result<()> {
        let out = self.git.cherry_pick(&commit.hash)?;
        if out.success {
            debug!(hash = %commit.short_hash(), subject = %commit.subject(), "replayed");
            return Ok(());
        }

        let output = out.combined();
        match classify(&output) {
            ReplayFailure::Conflict => {
                info!(hash = %commit.short_hash(), "conflict, suspending session");
                self.teardown.suspend();
                Err(Error::Conflict {
                    target: self.target_branch.clone(),
                })
            }
            ReplayFailure::Fatal => {
                self.abandon_replay();
                Err(Error::Command {
                    command: format!("git cherry-pick {}", commit.hash),
                    output,
                })
            }
        }
    }

    /// Get off the temp branch after a fatal replay so teardown can delete it.
    fn abandon_replay(&self) {
        if let Ok(true) = self.git.replay_in_progress() {
            if let Err(e) = self.git.run(&["cherry-pick", "--abort"]) {
                warn!(error = %e, "cannot abort cherry-pick");
            }
        }
        if let Err(e) = self.git.checkout(&self.restore_branch) {
            warn!(branch = %self.restore_branch, error = %e, "cannot checkout branch");
        }
    }

    fn complete(&self, temp: &TempBranch, pending: &[Commit]) -> Result<SyncOutcome> {
        self.git.checkout(&self.target_branch)?;
        self.git.merge_squash(&temp.name)?;

        let messages = self
            .replayed_commits
            .iter()
            .rev()
            .chain(pending.iter())
            .map(|c| c.message.as_str());
        let (header, body) = sync_message(&self.source_branch, messages);
        self.git.commit(&[&header, &body])?;

        let commits = self.replayed_commits.len() + pending.len();
        info!(
            branch_to = %self.target_branch,
            branch_from = %self.source_branch,
            commits,
            "synced"
        );

        Ok(SyncOutcome::Synced {
            source: self.source_branch.clone(),
            target: self.target_branch.clone(),
            commits,
        })
    }
}

/// Reset the local `branch` to its remote tip, then return to `back_to`.
pub fn refresh_from_remote(git: &Git, branch: &str, back_to: &str) -> Result<()> {
    info!(branch = %branch, "try to reset the sync branch");
    git.fetch()?;
    git.checkout(branch)?;
    git.reset_hard(&format!("{}/{}", git.remote(), branch))?;
    git.checkout(back_to)?;
    Ok(())
}

/// Commits in `base..head`, newest first
pub fn commits_between(git: &Git, base: &str, head: &str) -> Result<Vec<Commit>> {
    let raw = git.log(base, head)?;
    Ok(parse_log(&raw))
}
