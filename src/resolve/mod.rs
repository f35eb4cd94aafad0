//! Resolve - automatic fixes for conflicts in generated files
//!
//! Lockfiles and module files conflict on almost every sync and are
//! regenerated rather than merged by hand. Each [`ConflictResolver`] knows
//! which paths it handles and how to regenerate them; `dx resolve-conflict`
//! runs every resolver whose detector matches the conflicted paths.

mod cargo;
mod gomod;
mod yarn;

pub use cargo::CargoLockResolver;
pub use gomod::GoModResolver;
pub use yarn::YarnLockResolver;

use crate::{Error, Git, Result};
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Line prefixes git writes around conflicting hunks
pub const CONFLICT_MARKERS: [&str; 3] = ["<<<<<<<", "=======", ">>>>>>>"];

/// An auto-resolution strategy for a family of files
pub trait ConflictResolver {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Whether any of the conflicted paths belongs to this resolver
    fn detect(&self, files: &[String]) -> bool;

    /// Regenerate the files this resolver owns. Results are left unstaged.
    fn resolve(&self, git: &Git, files: &[String]) -> Result<()>;
}

/// Every resolver shipped with dx, in the order they run
pub fn default_resolvers() -> Vec<Box<dyn ConflictResolver>> {
    vec![
        Box::new(GoModResolver),
        Box::new(YarnLockResolver),
        Box::new(CargoLockResolver),
    ]
}

/// Run each matching resolver; returns the names of those that ran.
pub fn resolve_all(
    git: &Git,
    resolvers: &[Box<dyn ConflictResolver>],
    files: &[String],
) -> Result<Vec<&'static str>> {
    let mut applied = Vec::new();
    for resolver in resolvers {
        if !resolver.detect(files) {
            debug!(resolver = resolver.name(), "not applicable");
            continue;
        }
        info!(resolver = resolver.name(), "detect conflict");
        resolver.resolve(git, files)?;
        applied.push(resolver.name());
    }
    Ok(applied)
}

/// Whether any line starts with a conflict marker
pub fn has_conflict_markers(content: &str) -> bool {
    content.lines().any(is_marker_line)
}

/// Drop marker lines, keeping both sides of every hunk
pub fn strip_conflict_markers(content: &str) -> String {
    content
        .split_inclusive('\n')
        .filter(|line| !is_marker_line(line))
        .collect()
}

fn is_marker_line(line: &str) -> bool {
    CONFLICT_MARKERS.iter().any(|m| line.starts_with(m))
}

/// Whether the file at `path` still has conflict markers
pub fn file_still_conflicted(path: &Path) -> Result<bool> {
    let content = std::fs::read_to_string(path)?;
    Ok(has_conflict_markers(&content))
}

/// Paths among `files` (relative to the repository root) that still carry
/// markers, restricted to those `filter` selects.
fn still_conflicted(
    root: &Path,
    files: &[String],
    filter: impl Fn(&str) -> bool,
) -> Result<Vec<String>> {
    let mut remaining = Vec::new();
    for f in files.iter().filter(|f| filter(f.as_str())) {
        if file_still_conflicted(&root.join(f))? {
            remaining.push(f.clone());
        }
    }
    Ok(remaining)
}

/// Run a package-manager command in the repository root
fn run_tool(resolver: &str, root: &Path, program: &str, args: &[&str]) -> Result<()> {
    info!(resolver, program, ?args, "run tool");
    let output = Command::new(program).args(args).current_dir(root).output()?;
    if !output.status.success() {
        let mut reason = String::from_utf8_lossy(&output.stdout).into_owned();
        reason.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(Error::Resolver {
            resolver: resolver.to_string(),
            reason: format!("`{} {}` failed:\n{}", program, args.join(" "), reason),
        });
    }
    Ok(())
}
