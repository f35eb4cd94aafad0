//! Go modules: `go.mod` / `go.sum`

use super::{ConflictResolver, run_tool, still_conflicted, strip_conflict_markers};
use crate::{Error, Git, Result};

const GO_MOD_FILES: [&str; 2] = ["go.mod", "go.sum"];

/// Keeps both sides of `go.mod`/`go.sum` and lets `go mod tidy` settle the
/// requirements.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoModResolver;

impl ConflictResolver for GoModResolver {
    fn name(&self) -> &'static str {
        "go mod"
    }

    fn detect(&self, files: &[String]) -> bool {
        files.iter().any(|f| GO_MOD_FILES.contains(&f.as_str()))
    }

    fn resolve(&self, git: &Git, files: &[String]) -> Result<()> {
        let root = git.root();

        // sources decide which requirements survive tidy
        let remaining = still_conflicted(root, files, |f| f.ends_with(".go"))?;
        if !remaining.is_empty() {
            return Err(Error::StillConflicted(remaining));
        }

        for file in files.iter().filter(|f| GO_MOD_FILES.contains(&f.as_str())) {
            let path = root.join(file);
            let content = std::fs::read_to_string(&path)?;
            std::fs::write(&path, strip_conflict_markers(&content))?;
        }

        run_tool(self.name(), root, "go", &["mod", "tidy"])
    }
}
