//! Yarn: `yarn.lock`

use super::{ConflictResolver, file_still_conflicted, run_tool};
use crate::{Error, Git, Result};

const YARN_LOCK: &str = "yarn.lock";
const PACKAGE_JSON: &str = "package.json";

/// Re-runs `yarn`, which rewrites a conflicted lockfile from `package.json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct YarnLockResolver;

impl ConflictResolver for YarnLockResolver {
    fn name(&self) -> &'static str {
        "yarn lock"
    }

    fn detect(&self, files: &[String]) -> bool {
        files.iter().any(|f| f == YARN_LOCK)
    }

    fn resolve(&self, git: &Git, _files: &[String]) -> Result<()> {
        let root = git.root();
        let manifest = root.join(PACKAGE_JSON);
        if manifest.exists() && file_still_conflicted(&manifest)? {
            return Err(Error::StillConflicted(vec![PACKAGE_JSON.to_string()]));
        }

        run_tool(self.name(), root, "yarn", &[])
    }
}
