//! Cargo: `Cargo.lock`

use super::{ConflictResolver, run_tool, still_conflicted};
use crate::{Error, Git, Result};

const CARGO_LOCK: &str = "Cargo.lock";
const CARGO_TOML: &str = "Cargo.toml";

/// Takes the target side of `Cargo.lock` and lets cargo add whatever the
/// replayed manifests need on top of it.
///
/// Cargo cannot read a lockfile with markers in it, so unlike yarn the
/// conflicted file is replaced before the tool runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct CargoLockResolver;

impl ConflictResolver for CargoLockResolver {
    fn name(&self) -> &'static str {
        "cargo lock"
    }

    fn detect(&self, files: &[String]) -> bool {
        files.iter().any(|f| f == CARGO_LOCK)
    }

    fn resolve(&self, git: &Git, files: &[String]) -> Result<()> {
        let root = git.root();
        let remaining = still_conflicted(root, files, |f| f.ends_with(CARGO_TOML))?;
        if !remaining.is_empty() {
            return Err(Error::StillConflicted(remaining));
        }

        let top_level = format!(":(top){}", CARGO_LOCK);
        git.run(&["checkout", "--ours", "--", &top_level])?;

        run_tool(self.name(), root, "cargo", &["update", "--workspace"])
    }
}
