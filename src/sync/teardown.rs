//! Teardown - putting the repository back on every exit path
//!
//! Actions are registered as the session acquires resources and run in
//! reverse order when the guard is dropped. Suspending the session keeps
//! the temp branch and leaves it checked out, which is where git's own
//! conflict workflow expects the user to be.

use crate::Git;
use tracing::{debug, warn};

/// One reversal step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupAction {
    /// Check the branch the user started on back out
    RestoreBranch(String),
    /// Delete a temp branch
    DeleteBranch(String),
}

impl CleanupAction {
    /// Whether a suspended session skips this step
    pub fn skipped_on_suspend(&self) -> bool {
        match self {
            CleanupAction::RestoreBranch(_) | CleanupAction::DeleteBranch(_) => true,
        }
    }

    fn apply(&self, git: &Git) -> crate::Result<()> {
        match self {
            CleanupAction::RestoreBranch(branch) => git.checkout(branch),
            CleanupAction::DeleteBranch(branch) => git.delete_branch(branch),
        }
    }
}

impl std::fmt::Display for CleanupAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleanupAction::RestoreBranch(b) => write!(f, "checkout {}", b),
            CleanupAction::DeleteBranch(b) => write!(f, "delete branch {}", b),
        }
    }
}

/// Scoped guard owning the registered cleanup actions
#[derive(Debug)]
pub struct Teardown {
    git: Git,
    actions: Vec<CleanupAction>,
    suspended: bool,
}

impl Teardown {
    pub fn new(git: Git) -> Self {
        Self {
            git,
            actions: Vec::new(),
            suspended: false,
        }
    }

    pub fn register(&mut self, action: CleanupAction) {
        debug!(action = %action, "registered cleanup");
        self.actions.push(action);
    }

    /// Keep the repository as it is for the user to resolve a conflict
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Actions that will run, in the order they will run
    pub fn planned(&self) -> Vec<&CleanupAction> {
        self.actions
            .iter()
            .rev()
            .filter(|a| !(self.suspended && a.skipped_on_suspend()))
            .collect()
    }

    /// Run the planned actions now. Failures are logged, not returned: the
    /// error that ended the session is the one worth reporting.
    pub fn run(&mut self) {
        let suspended = self.suspended;
        for action in std::mem::take(&mut self.actions).iter().rev() {
            if suspended && action.skipped_on_suspend() {
                debug!(action = %action, "skipped cleanup, session suspended");
                continue;
            }
            if let Err(e) = action.apply(&self.git) {
                warn!(action = %action, error = %e, "cleanup failed");
            }
        }
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.run();
    }
}
