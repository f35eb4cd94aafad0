//! CLI integration tests
//!
//! These tests run the `dx` binary against a pair of temp git repositories:
//! a "server" acting as `origin` and a "client" cloned from it.

use assert_cmd::Command;
use dxsync::commit::parse_log;
use dxsync::{Commit, Git, SyncConfig, SyncOutcome, SyncSession};
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Server repo + client clone, both isolated from the user's git config
struct TestRepos {
    _root: TempDir,
    git_config: PathBuf,
    server: PathBuf,
    client: PathBuf,
}

impl TestRepos {
    fn new() -> Self {
        let root = TempDir::new().expect("failed to create temp dir");
        let git_config = root.path().join("gitconfig");
        let server = root.path().join("server");
        let client = root.path().join("client");
        std::fs::create_dir(&server).unwrap();

        let repos = Self {
            _root: root,
            git_config,
            server,
            client,
        };

        let server = repos.server.clone();
        repos.git(&server, &["init"]);
        repos.git(&server, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        repos.configure_identity(&server);
        repos.write(&server, "file", "this is main");
        repos.git(&server, &["add", "file"]);
        repos.git(&server, &["commit", "-m", "initial commit"]);
        repos.git(&server, &["checkout", "-b", "dev"]);
        repos.git(&server, &["checkout", "main"]);

        let client = repos.client.clone();
        repos.git(
            repos._root.path(),
            &["clone", server.to_str().unwrap(), client.to_str().unwrap()],
        );
        repos.git(&client, &["fetch", "origin", "dev:dev"]);
        repos.configure_identity(&client);

        repos
    }

    fn configure_identity(&self, dir: &Path) {
        self.git(dir, &["config", "--local", "user.name", "tester"]);
        self.git(dir, &["config", "--local", "user.email", "tester@example.com"]);
    }

    fn git(&self, dir: &Path, args: &[&str]) -> String {
        let output = std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_CONFIG_GLOBAL", &self.git_config)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .output()
            .expect("failed to run git");
        assert!(
            output.status.success(),
            "git {:?} failed:\nstdout: {}\nstderr: {}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    fn client_git(&self, args: &[&str]) -> String {
        self.git(&self.client, args)
    }

    fn server_git(&self, args: &[&str]) -> String {
        self.git(&self.server, args)
    }

    fn dx(&self) -> Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("dx");
        cmd.current_dir(&self.client);
        cmd.env("GIT_CONFIG_GLOBAL", &self.git_config);
        cmd.env("GIT_CONFIG_NOSYSTEM", "1");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    fn write(&self, dir: &Path, file: &str, content: &str) {
        std::fs::write(dir.join(file), content).expect("failed to write file");
    }

    fn append(&self, dir: &Path, file: &str, content: &str) {
        let mut existing = std::fs::read_to_string(dir.join(file)).unwrap_or_default();
        existing.push_str(content);
        self.write(dir, file, &existing);
    }

    /// Stage `file` with `content` in the client and commit through dx
    fn dx_commit(&self, file: &str, content: &str, message: &str) {
        self.write(&self.client, file, content);
        self.client_git(&["add", file]);
        self.dx()
            .args(["commit", "-m", message])
            .assert()
            .success()
            .stdout(predicate::str::contains("change-id"));
    }

    fn head_branch(&self) -> String {
        self.client_git(&["rev-parse", "--abbrev-ref", "HEAD"])
            .trim()
            .to_string()
    }

    /// Commits on `branch` that are not on main, newest first
    fn commits(&self, branch: &str) -> Vec<Commit> {
        let range = format!("main..{}", branch);
        let raw = self.client_git(&["log", "--format=format:%H%x00%B%x00", &range]);
        parse_log(&raw)
    }

    fn show(&self, rev_path: &str) -> String {
        self.client_git(&["show", rev_path])
    }

    fn temp_branches(&self) -> String {
        self.client_git(&["branch", "--list", "tmp-sync*"])
    }

    /// Commit `files` on the server's `dev`, each holding "server"
    fn server_adds_to_dev(&self, files: &[&str], message: &str) {
        self.server_git(&["checkout", "dev"]);
        for file in files {
            self.write(&self.server, file, "server");
            self.server_git(&["add", file]);
        }
        self.server_git(&["commit", "-m", message]);
        self.server_git(&["checkout", "main"]);
    }

    fn subjects(commit: &Commit) -> Vec<&str> {
        commit.sub_commits.iter().map(|s| s.subject()).collect()
    }

    /// Fork `dev` from a newer main on the server, as happens after a
    /// release resets the integration branch
    fn server_resets_dev_onto_new_main(&self) {
        self.write(&self.server, "feature1", "new feature");
        self.server_git(&["add", "feature1"]);
        self.server_git(&["commit", "-m", "feat: feature 1"]);
        self.server_git(&["checkout", "dev"]);
        self.server_git(&["reset", "--hard", "main"]);
        self.server_git(&["checkout", "main"]);
    }
}

#[test]
fn test_cli_commit_adds_change_id() {
    let repos = TestRepos::new();
    repos.client_git(&["checkout", "-b", "feature"]);

    repos.dx_commit("content", "hello world", "commit message");

    let log = repos.client_git(&["log", "-1", "--format=%B"]);
    assert!(log.starts_with("commit message"));
    assert!(log.contains("change-id: "), "missing change-id: {}", log);
}

#[test]
fn test_cli_commit_with_given_change_id() {
    let repos = TestRepos::new();
    repos.client_git(&["checkout", "-b", "feature"]);
    repos.write(&repos.client, "content", "hello");
    repos.client_git(&["add", "content"]);

    repos
        .dx()
        .args(["commit", "-m", "msg", "--change-id", "6700e097b63149da786409f7"])
        .assert()
        .success();

    let commits = repos.commits("feature");
    assert_eq!(commits[0].change_ids, vec!["6700e097b63149da786409f7"]);
}

#[test]
fn test_cli_sync_single_commit() {
    let repos = TestRepos::new();
    repos.client_git(&["checkout", "-b", "feature"]);
    repos.dx_commit("content", "hello world", "commit message");
    let change_id = repos.commits("feature")[0].change_ids[0].clone();

    repos
        .dx()
        .args(["--debug", "sync", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Synced 1 commit(s) from feature to dev"));

    assert_eq!(repos.head_branch(), "feature");
    let dev = repos.commits("dev");
    assert_eq!(dev.len(), 1);
    assert_eq!(dev[0].subject(), "sync from feature");
    assert_eq!(dev[0].sub_commits.len(), 1, "sub commits count is invalid");
    assert_eq!(dev[0].sub_commits[0].subject(), "commit message");
    assert_eq!(dev[0].change_ids, vec![change_id]);
    assert_eq!(repos.show("dev:content"), "hello world");
    assert!(repos.temp_branches().is_empty());
}

#[test]
fn test_cli_sync_twice_is_noop() {
    let repos = TestRepos::new();
    repos.client_git(&["checkout", "-b", "feature"]);
    repos.dx_commit("content", "hello world", "commit message");

    repos.dx().args(["sync", "dev"]).assert().success();
    repos.client_git(&["push", "origin", "dev"]);
    let dev_tip = repos.client_git(&["rev-parse", "dev"]);

    repos
        .dx()
        .args(["sync", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to sync"));

    assert_eq!(repos.client_git(&["rev-parse", "dev"]), dev_tip);
    assert_eq!(repos.head_branch(), "feature");
    assert!(repos.temp_branches().is_empty());
}

#[test]
fn test_cli_sync_feature_branch_outdated() {
    let repos = TestRepos::new();
    repos.client_git(&["checkout", "-b", "feature"]);
    repos.server_resets_dev_onto_new_main();
    repos.client_git(&["fetch", "origin"]);
    repos.client_git(&["checkout", "main"]);
    repos.client_git(&["merge", "--ff-only", "origin/main"]);
    repos.client_git(&["checkout", "feature"]);

    repos.dx_commit("content", "hello world", "commit message");
    repos.dx_commit("content", "update", "fix: update");

    repos.dx().args(["sync", "dev"]).assert().success();

    assert_eq!(repos.head_branch(), "feature");
    let dev = repos.commits("dev");
    assert_eq!(dev[0].change_ids.len(), 2, "change ids count is invalid");
    assert_eq!(dev[0].sub_commits.len(), 2, "sub commits count is invalid");
    assert_eq!(dev[0].sub_commits[0].subject(), "commit message");
    assert_eq!(dev[0].sub_commits[1].subject(), "fix: update");
    assert_eq!(repos.show("dev:content"), "update");
}

#[test]
fn test_cli_sync_nested_aggregation() {
    let repos = TestRepos::new();
    repos.client_git(&["checkout", "-b", "feature"]);
    repos.server_resets_dev_onto_new_main();

    repos.dx_commit("content", "hello world", "commit message");
    repos.dx_commit("content", "update\n", "fix: update");

    repos.dx().args(["sync", "dev"]).assert().success();
    repos.client_git(&["push", "origin", "dev"]);

    repos.append(&repos.client, "content", "fix bug\n");
    repos.client_git(&["add", "content"]);
    repos
        .dx()
        .args(["commit", "-m", "fix: fix bug"])
        .assert()
        .success();

    repos.dx().args(["sync", "dev"]).assert().success();

    assert_eq!(repos.head_branch(), "feature");
    let dev = repos.commits("dev");
    assert_eq!(dev[0].sub_commits.len(), 1, "new sub commits count is invalid");
    assert_eq!(dev[0].change_ids.len(), 1, "new change ids count is invalid");
    assert_eq!(dev[0].sub_commits[0].subject(), "fix: fix bug");
    assert_eq!(dev[1].sub_commits.len(), 2, "old sub commits count is invalid");
    assert_eq!(dev[1].change_ids.len(), 2, "old change ids count is invalid");
    assert_eq!(repos.show("dev:content"), "update\nfix bug\n");
}

#[test]
fn test_cli_sync_with_foreign_commit_on_target() {
    let repos = TestRepos::new();
    repos.client_git(&["checkout", "-b", "feature"]);
    repos.server_resets_dev_onto_new_main();

    repos.dx_commit("content", "hello world", "commit message");
    repos.dx_commit("content", "update\n", "fix: update");
    repos.dx().args(["sync", "dev"]).assert().success();
    repos.client_git(&["push", "origin", "dev"]);

    // someone else pushes to dev without dx
    repos.server_git(&["checkout", "dev"]);
    repos.write(&repos.server, "another_feature", "another feature without dx");
    repos.server_git(&["add", "another_feature"]);
    repos.server_git(&["commit", "-m", "feat: another feature without dx"]);
    repos.server_git(&["checkout", "main"]);

    repos.append(&repos.client, "content", "fix bug\n");
    repos.client_git(&["add", "content"]);
    repos
        .dx()
        .args(["commit", "-m", "fix: fix bug"])
        .assert()
        .success();

    repos.dx().args(["sync", "dev"]).assert().success();

    let dev = repos.commits("dev");
    assert_eq!(dev[0].sub_commits.len(), 1);
    assert_eq!(dev[0].change_ids.len(), 1);
    assert!(dev[1].sub_commits.is_empty(), "this is a commit without dx");
    assert!(dev[1].change_ids.is_empty(), "this is a commit without dx");
    assert_eq!(dev[2].sub_commits.len(), 2);
    assert_eq!(dev[2].change_ids.len(), 2);
    assert_eq!(repos.show("dev:content"), "update\nfix bug\n");
}

#[test]
fn test_cli_sync_compacts_unpushed_sync() {
    let repos = TestRepos::new();
    repos.client_git(&["checkout", "-b", "feature"]);
    repos.server_resets_dev_onto_new_main();

    repos.dx_commit("content", "hello world", "commit message");
    repos.dx_commit("content", "update\n", "fix: update");

    // first sync is never pushed, so the second one starts from origin/dev
    repos.dx().args(["sync", "dev"]).assert().success();

    repos.append(&repos.client, "content", "fix bug\n");
    repos.client_git(&["add", "content"]);
    repos
        .dx()
        .args(["commit", "-m", "fix: fix bug"])
        .assert()
        .success();

    repos.dx().args(["sync", "dev"]).assert().success();

    let dev = repos.commits("dev");
    assert_eq!(dev.len(), 2);
    assert_eq!(dev[0].subject(), "sync from feature");
    assert_eq!(dev[1].subject(), "feat: feature 1");
    assert_eq!(dev[0].sub_commits.len(), 3);
    assert_eq!(dev[0].change_ids.len(), 3);
    assert_eq!(repos.show("dev:content"), "update\nfix bug\n");
}

#[test]
fn test_cli_sync_refreshes_target_from_remote() {
    let repos = TestRepos::new();
    repos.server_git(&["checkout", "dev"]);
    repos.write(&repos.server, "srv_feature1", "srv_feature1");
    repos.server_git(&["add", "srv_feature1"]);
    repos.server_git(&["commit", "-m", "feat: server feature 1"]);
    repos.server_git(&["checkout", "main"]);

    repos.client_git(&["checkout", "-b", "client_feature1"]);
    repos.dx_commit("client_feature1", "client_feature1", "feat: client feature 1");

    repos.dx().args(["sync", "dev"]).assert().success();

    let dev = repos.commits("dev");
    assert_eq!(dev.len(), 2);
    assert_eq!(dev[0].subject(), "sync from client_feature1");
    assert_eq!(dev[1].subject(), "feat: server feature 1");
}

#[test]
fn test_cli_sync_conflict_then_continue() {
    let repos = TestRepos::new();
    repos.server_git(&["checkout", "dev"]);
    repos.write(&repos.server, "main", "srv_feature1");
    repos.server_git(&["add", "main"]);
    repos.server_git(&["commit", "-m", "feat: server feature 1"]);
    repos.server_git(&["checkout", "main"]);

    repos.client_git(&["checkout", "-b", "client_feature1"]);
    repos.dx_commit("main", "client_feature1", "feat: client feature 1");
    let change_id = repos.commits("client_feature1")[0].change_ids[0].clone();

    repos
        .dx()
        .args(["sync", "dev"])
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::contains("dx sync --continue"))
        .stderr(predicate::str::contains("code conflict"));

    assert!(!repos.temp_branches().is_empty());
    assert!(repos.head_branch().starts_with("tmp-sync-"));

    repos
        .dx()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Suspended sync: client_feature1 -> dev"));

    repos.write(&repos.client, "main", "resolved");
    repos.client_git(&["add", "main"]);

    repos
        .dx()
        .args(["sync", "--continue"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Synced 1 commit(s)"));

    assert_eq!(repos.head_branch(), "client_feature1");
    assert!(repos.temp_branches().is_empty());
    let dev = repos.commits("dev");
    assert_eq!(dev.len(), 2);
    assert_eq!(dev[0].subject(), "sync from client_feature1");
    assert_eq!(dev[0].sub_commits.len(), 1);
    assert_eq!(dev[0].sub_commits[0].subject(), "feat: client feature 1");
    assert_eq!(dev[0].change_ids, vec![change_id]);
    assert_eq!(repos.show("dev:main"), "resolved");
}

#[test]
fn test_cli_sync_suspends_twice_then_completes() {
    let repos = TestRepos::new();
    repos.server_adds_to_dev(&["c2", "c4"], "feat: server files");

    repos.client_git(&["checkout", "-b", "feature"]);
    repos.dx_commit("c1", "client", "c1 clean");
    repos.dx_commit("c2", "client", "c2 conflict");
    repos.dx_commit("c3", "client", "c3 clean");
    repos.dx_commit("c4", "client", "c4 conflict");
    repos.dx_commit("c5", "client", "c5 clean");

    repos
        .dx()
        .args(["sync", "dev"])
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::contains("conflicted: c2"));
    assert!(repos.head_branch().starts_with("tmp-sync-"));

    repos.write(&repos.client, "c2", "resolved");
    repos.client_git(&["add", "c2"]);

    // c3 replays cleanly, c4 stops the session again
    repos
        .dx()
        .args(["sync", "--continue"])
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::contains("conflicted: c4"));
    assert!(repos.head_branch().starts_with("tmp-sync-"));

    repos.write(&repos.client, "c4", "resolved");
    repos.client_git(&["add", "c4"]);

    repos
        .dx()
        .args(["sync", "--continue"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Synced 5 commit(s) from feature to dev"));

    assert_eq!(repos.head_branch(), "feature");
    assert!(repos.temp_branches().is_empty());
    let dev = repos.commits("dev");
    assert_eq!(dev.len(), 2);
    assert_eq!(dev[0].subject(), "sync from feature");
    assert_eq!(
        TestRepos::subjects(&dev[0]),
        vec!["c1 clean", "c2 conflict", "c3 clean", "c4 conflict", "c5 clean"]
    );
    assert_eq!(dev[0].change_ids.len(), 5);
    assert_eq!(repos.show("dev:c2"), "resolved");
    assert_eq!(repos.show("dev:c4"), "resolved");
    assert_eq!(repos.show("dev:c5"), "client");
}

#[test]
fn test_sync_session_resume_state() {
    let repos = TestRepos::new();
    repos.server_adds_to_dev(&["c2"], "feat: server file");

    repos.client_git(&["checkout", "-b", "feature"]);
    repos.dx_commit("c1", "client", "c1 clean");
    repos.dx_commit("c2", "client", "c2 conflict");
    repos.dx_commit("c3", "client", "c3 clean");

    repos.dx().args(["sync", "dev"]).assert().failure().code(2);
    repos.write(&repos.client, "c2", "resolved");
    repos.client_git(&["add", "c2"]);

    let git = Git::open(&SyncConfig::with_repo_dir(&repos.client)).unwrap();
    assert_eq!(git.workdir(), repos.client.as_path());
    assert_eq!(git.trunk(), "main");

    let session = SyncSession::prepare_continue(&git).unwrap();

    assert!(session.is_resumed());
    assert_eq!(session.source_branch(), "feature");
    assert_eq!(session.target_branch(), "dev");
    let temp = session.temp_branch().unwrap();
    assert_eq!((temp.to.as_str(), temp.from.as_str()), ("dev", "feature"));

    let current: Vec<&str> = session.current_commits().iter().map(|c| c.subject()).collect();
    assert_eq!(current, vec!["c3 clean", "c2 conflict", "c1 clean"]);
    let replayed: Vec<&str> = session.replayed_commits().iter().map(|c| c.subject()).collect();
    assert_eq!(replayed, vec!["c2 conflict", "c1 clean"]);
    let synced: Vec<&str> = session.synced_commits().iter().map(|c| c.subject()).collect();
    assert_eq!(synced, vec!["c2 conflict", "c1 clean", "feat: server file"]);
    assert_eq!(session.pending_index(), Some(0));
    let pending: Vec<&str> = session
        .pending_commits()
        .into_iter()
        .map(|c| c.subject())
        .collect();
    assert_eq!(pending, vec!["c3 clean"]);

    let outcome = session.run().unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::Synced {
            source: "feature".to_string(),
            target: "dev".to_string(),
            commits: 3,
        }
    );
    assert_eq!(repos.head_branch(), "feature");
    assert!(repos.temp_branches().is_empty());
    let dev = repos.commits("dev");
    assert_eq!(
        TestRepos::subjects(&dev[0]),
        vec!["c1 clean", "c2 conflict", "c3 clean"]
    );
}

#[test]
fn test_cli_sync_fatal_replay_cleans_up() {
    let repos = TestRepos::new();
    repos.client_git(&["checkout", "-b", "feature"]);
    repos.dx_commit("content", "hello world", "commit message");
    let synced_hash = repos.client_git(&["rev-parse", "HEAD"]).trim().to_string();

    repos.dx().args(["sync", "dev"]).assert().success();
    repos.client_git(&["push", "origin", "dev"]);

    // rewrite feature so a new commit sits below the already synced one;
    // replaying the synced commit again onto dev leaves nothing to commit
    repos.client_git(&["reset", "--hard", "main"]);
    repos.dx_commit("other", "new work", "feat: new work");
    repos.client_git(&["cherry-pick", &synced_hash]);

    repos
        .dx()
        .args(["sync", "dev"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("git cherry-pick"))
        .stdout(predicate::str::contains("dx sync --continue").not());

    assert_eq!(repos.head_branch(), "feature");
    assert!(repos.temp_branches().is_empty());
    assert!(repos.client_git(&["status", "--porcelain"]).is_empty());
    let dev = repos.commits("dev");
    assert_eq!(dev.len(), 1);
    assert_eq!(TestRepos::subjects(&dev[0]), vec!["commit message"]);
}

#[test]
fn test_cli_sync_rejects_same_branch() {
    let repos = TestRepos::new();
    repos.client_git(&["checkout", "dev"]);

    repos
        .dx()
        .args(["sync", "dev"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("same branch"));

    assert_eq!(repos.head_branch(), "dev");
}

#[test]
fn test_cli_continue_outside_sync_branch() {
    let repos = TestRepos::new();
    repos.client_git(&["checkout", "-b", "feature"]);

    repos
        .dx()
        .args(["sync", "--continue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a suspended sync branch"));
}

#[test]
fn test_cli_sync_argument_shapes() {
    let repos = TestRepos::new();

    repos.dx().arg("sync").assert().failure();
    repos
        .dx()
        .args(["sync", "dev", "--continue"])
        .assert()
        .failure();
}

#[test]
fn test_cli_sync_commit_without_change_id() {
    let repos = TestRepos::new();
    repos.client_git(&["checkout", "-b", "feature"]);
    repos.write(&repos.client, "content", "plain");
    repos.client_git(&["add", "content"]);
    repos.client_git(&["commit", "-m", "plain commit"]);

    repos
        .dx()
        .args(["sync", "dev"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no change-id"));

    assert_eq!(repos.head_branch(), "feature");
    assert!(repos.temp_branches().is_empty());
    assert!(repos.commits("dev").is_empty());
}

#[test]
fn test_cli_resolve_without_conflicts() {
    let repos = TestRepos::new();

    repos
        .dx()
        .arg("resolve")
        .assert()
        .success()
        .stdout(predicate::str::contains("No conflicted files"));
}

#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();

    assert_cmd::cargo::cargo_bin_cmd!("dx")
        .current_dir(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
