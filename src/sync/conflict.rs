//! Classify a failed replay

/// Marker git prints for every path it could not merge, e.g.
///
/// ```text
/// Auto-merging main
/// CONFLICT (add/add): Merge conflict in main
/// error: could not apply 7efd1d7... feat: client feature 1
/// hint: After resolving the conflicts, mark them with
/// ```
pub const CONFLICT_MARKER: &str = "CONFLICT";

/// What a failed cherry-pick means for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayFailure {
    /// Textual overlap the user can resolve; suspend
    Conflict,
    /// Anything else; abort
    Fatal,
}

/// Substring match on the combined output of the failed command.
pub fn classify(output: &str) -> ReplayFailure {
    if output.contains(CONFLICT_MARKER) {
        ReplayFailure::Conflict
    } else {
        ReplayFailure::Fatal
    }
}

/// Guidance printed when a run suspends
pub fn resume_hint(target: &str) -> String {
    format!(
        "CONFLICT: syncing commit to {}\n\
         hint: After resolving the conflicts, mark them with\n\
         hint: \"git add/rm <pathspec>\"\n\
         hint: \"dx sync --continue\"\n",
        target
    )
}
