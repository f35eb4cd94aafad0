//! Git - the version-control primitives the sync engine is built on
//!
//! Read-only questions (which branch is checked out, is a cherry-pick in
//! flight, which branches exist) are answered through `git2`. Everything
//! that mutates the repository, plus the log query, goes through the `git`
//! executable so that its conflict workflow (`CHERRY_PICK_HEAD`, markers in
//! the working tree, `--continue`) is exactly what the user expects.

use crate::{Error, Result, SyncConfig};
use git2::{BranchType, Repository, RepositoryState};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Output of one `git` invocation
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Whether the process exited successfully
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    /// Stdout followed by stderr, the text a user would have seen
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }
}

/// Handle on one repository, resolved once per invocation and passed to
/// everything that talks to git.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    root: PathBuf,
    git_dir: PathBuf,
    remote: String,
    trunk: String,
}

impl Git {
    /// Discover the repository containing `config.repo_dir` and resolve the
    /// shared trunk branch.
    pub fn open(config: &SyncConfig) -> Result<Self> {
        let repo = Repository::discover(&config.repo_dir)?;
        let git_dir = repo.path().to_path_buf();
        let root = repo
            .workdir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.repo_dir.clone());

        let trunk = match &config.trunk {
            Some(trunk) => trunk.clone(),
            None => detect_trunk(&repo, &config.trunk_candidates)?,
        };
        debug!(trunk = %trunk, git_dir = ?git_dir, "opened repository");

        Ok(Self {
            workdir: config.repo_dir.clone(),
            root,
            git_dir,
            remote: config.remote.clone(),
            trunk,
        })
    }

    /// Directory every `git` command runs in
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Top of the working tree; `git status --porcelain` paths are
    /// relative to it
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The shared trunk branch ranges are computed against
    pub fn trunk(&self) -> &str {
        &self.trunk
    }

    /// Remote the target branch is refreshed from
    pub fn remote(&self) -> &str {
        &self.remote
    }

    fn repo(&self) -> Result<Repository> {
        Ok(Repository::open(&self.git_dir)?)
    }

    /// Run `git` with `args`, capturing output whatever the exit status.
    pub fn exec(&self, args: &[&str]) -> Result<ExecOutput> {
        debug!(cmd = %command_line(args), "exec command");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()?;

        let out = ExecOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(success = out.success, result = %out.combined(), "exec result");
        Ok(out)
    }

    /// Run `git` with `args` and return stdout, failing with the combined
    /// output when the command does not succeed.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        let out = self.exec(args)?;
        if !out.success {
            return Err(Error::Command {
                command: command_line(args),
                output: out.combined(),
            });
        }
        Ok(out.stdout)
    }

    /// Name of the checked-out branch
    pub fn current_branch(&self) -> Result<String> {
        let repo = self.repo()?;
        let head = repo.head()?;
        if !head.is_branch() {
            return Err(Error::DetachedHead);
        }
        head.shorthand()
            .map(|s| s.to_string())
            .ok_or(Error::DetachedHead)
    }

    /// Whether a local branch with this name exists
    pub fn branch_exists(&self, name: &str) -> Result<bool> {
        let repo = self.repo()?;
        let exists = repo.find_branch(name, BranchType::Local).is_ok();
        Ok(exists)
    }

    /// Local branch names, in the order git2 lists them
    pub fn local_branches(&self) -> Result<Vec<String>> {
        let repo = self.repo()?;
        let mut names = Vec::new();
        for branch in repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Whether a cherry-pick is stopped waiting for `--continue`
    pub fn replay_in_progress(&self) -> Result<bool> {
        let repo = self.repo()?;
        Ok(matches!(
            repo.state(),
            RepositoryState::CherryPick | RepositoryState::CherryPickSequence
        ))
    }

    pub fn fetch(&self) -> Result<()> {
        self.run(&["fetch", &self.remote])?;
        Ok(())
    }

    pub fn checkout(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", branch])?;
        Ok(())
    }

    /// `git checkout -b <name> <start>`
    pub fn checkout_new(&self, name: &str, start: &str) -> Result<()> {
        self.run(&["checkout", "-b", name, start])?;
        Ok(())
    }

    pub fn reset_hard(&self, target: &str) -> Result<()> {
        self.run(&["reset", "--hard", target])?;
        Ok(())
    }

    /// Raw `%H%x00%B%x00` log of `base..head`, newest first
    pub fn log(&self, base: &str, head: &str) -> Result<String> {
        let range = format!("{}..{}", base, head);
        self.run(&["log", "--format=format:%H%x00%B%x00", &range])
    }

    /// Cherry-pick one commit. Failure is returned as output, not as an
    /// error, so the caller can classify it.
    pub fn cherry_pick(&self, hash: &str) -> Result<ExecOutput> {
        self.exec(&["cherry-pick", hash])
    }

    /// Continue a stopped cherry-pick without opening an editor
    pub fn cherry_pick_continue(&self) -> Result<ExecOutput> {
        self.exec(&["-c", "core.editor=true", "cherry-pick", "--continue"])
    }

    pub fn merge_squash(&self, branch: &str) -> Result<()> {
        self.run(&["merge", "--squash", branch])?;
        Ok(())
    }

    /// Commit the index; each paragraph becomes one `-m`.
    pub fn commit(&self, paragraphs: &[&str]) -> Result<()> {
        let mut args = vec!["commit", "--cleanup=whitespace"];
        for p in paragraphs {
            args.push("-m");
            args.push(*p);
        }
        self.run(&args)?;
        Ok(())
    }

    pub fn delete_branch(&self, name: &str) -> Result<()> {
        self.run(&["branch", "-D", name])?;
        Ok(())
    }

    /// Paths git reports as both-added or both-modified
    pub fn conflicted_files(&self) -> Result<Vec<String>> {
        let out = self.run(&["status", "--porcelain"])?;
        Ok(parse_conflicted_files(&out))
    }
}

/// Extract `AA`/`UU` entries from `git status --porcelain` output.
///
/// ```text
/// UU go.mod
/// AA go.sum
///  M README.md
/// ```
pub fn parse_conflicted_files(status: &str) -> Vec<String> {
    status
        .lines()
        .filter_map(|line| {
            let (xy, path) = line.split_at_checked(2)?;
            if xy != "AA" && xy != "UU" {
                return None;
            }
            let path = path.trim();
            (!path.is_empty()).then(|| path.to_string())
        })
        .collect()
}

fn detect_trunk(repo: &Repository, candidates: &[String]) -> Result<String> {
    candidates
        .iter()
        .find(|name| repo.find_branch(name, BranchType::Local).is_ok())
        .cloned()
        .ok_or_else(|| Error::TrunkNotFound(candidates.join(",")))
}

fn command_line(args: &[&str]) -> String {
    let mut line = String::from("git");
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}
