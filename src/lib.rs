//! dxsync - Keep a feature branch in sync with a shared integration branch
//!
//! This library replays a feature branch's own commits onto an integration
//! branch (for example `dev`) and squashes each run into a single "sync"
//! commit, remembering which logical changes already landed so that later
//! runs only carry the new ones.
//!
//! ## Core Concepts
//!
//! - **Change-id**: a trailer (`change-id: <token>`) written into a commit
//!   message when it is authored. Replays rewrite hashes but keep messages,
//!   so the change-id is the identity of a logical change.
//! - **Sync commit**: the aggregating commit written on the target branch.
//!   Its message lists every replayed commit, which is how a later run knows
//!   what is already there.
//! - **Temp branch**: the disposable branch a run replays onto. Its name
//!   encodes the `(target, source)` pair, so a run suspended on a conflict
//!   can be resumed with `dx sync --continue`.
//!
//! ## Commands
//!
//! - **commit**: commit with a fresh change-id trailer
//! - **sync**: start or resume a synchronization run
//! - **resolve-conflict**: apply manifest/lockfile auto-resolvers

pub mod cli;
pub mod commit;
pub mod git;
pub mod resolve;
pub mod sync;

pub use commit::{Commit, SubCommit};
pub use git::Git;
pub use sync::{SyncConfig, SyncOutcome, SyncSession};

/// Result type for dxsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in dxsync operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("`{command}` failed:\n{output}")]
    Command { command: String, output: String },

    #[error("main branch not found, looked for: {0}")]
    TrunkNotFound(String),

    #[error("HEAD is detached, check out a branch first")]
    DetachedHead,

    #[error("cannot sync branch with same branch: {0}")]
    SameBranch(String),

    #[error("code conflict while syncing to {target}")]
    Conflict { target: String },

    #[error("not a suspended sync branch: {name} ({reason})")]
    InvalidTempBranch { name: String, reason: String },

    #[error("no cherry-pick in progress on {0}, nothing to continue")]
    NoReplayInProgress(String),

    #[error("cannot continue cherry-pick:\n{0}")]
    ContinueFailed(String),

    #[error("commit {0} has no change-id trailer, re-commit it with `dx commit`")]
    MissingChangeId(String),

    #[error("files still conflicted, resolve them first\n{}", .0.join("\n"))]
    StillConflicted(Vec<String>),

    #[error("{resolver} resolver failed: {reason}")]
    Resolver { resolver: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Whether this is the one recoverable kind: a replay stopped on a
    /// content conflict and the session was suspended.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }
}
