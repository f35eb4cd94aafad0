//! Commits as the sync engine sees them
//!
//! History is read with `git log --format=format:%H%x00%B%x00` and parsed
//! into [`Commit`] values. A commit whose message starts with
//! [`SYNC_HEADER`] is a sync commit: its body lists the messages of every
//! commit it aggregates, and those are parsed back into [`SubCommit`]s.

mod change_id;

pub use change_id::{ChangeIdSet, new_change_id, pending_index, trailer};

/// First-line prefix of every aggregating commit
pub const SYNC_HEADER: &str = "sync from ";

/// Optional marker line opening the sub-commit list
pub const COMMITS_MARKER: &str = "#commits";

/// Line separating sub-commit messages
pub const SUB_COMMIT_DELIMITER: &str = "---";

/// Trailer key carrying a change-id
pub const CHANGE_ID_KEY: &str = "change-id: ";

/// One commit from the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Hash assigned by git; changes whenever the commit is replayed
    pub hash: String,

    /// Full message text
    pub message: String,

    /// Provenance ids, at most one for a leaf commit, the ordered union of
    /// the sub-commits' ids for a sync commit
    pub change_ids: Vec<String>,

    /// Commits aggregated by a sync commit; empty for leaf commits
    pub sub_commits: Vec<SubCommit>,
}

/// A commit message reconstructed from a sync commit's body.
///
/// Sync commits are always built from leaf commits, so sub-commits never
/// nest further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubCommit {
    pub message: String,
    pub change_id: Option<String>,
}

impl Commit {
    /// Parse a single log record.
    pub fn parse(hash: impl Into<String>, message: impl Into<String>) -> Self {
        let hash = hash.into();
        let message = message.into();

        if let Some(source) = sync_source(&message) {
            let sub_commits = parse_sub_commits(&message);
            let change_ids = sub_commits
                .iter()
                .filter_map(|sc| sc.change_id.clone())
                .collect();
            tracing::trace!(hash = %hash, source = %source, "parsed sync commit");
            return Self {
                hash,
                message,
                change_ids,
                sub_commits,
            };
        }

        let change_ids = find_change_id(&message).into_iter().collect();
        Self {
            hash,
            message,
            change_ids,
            sub_commits: Vec::new(),
        }
    }

    /// Whether this is an aggregating sync commit
    pub fn is_sync(&self) -> bool {
        sync_source(&self.message).is_some()
    }

    /// First line of the message
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }

    /// Hash shortened for display
    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(8)]
    }
}

impl SubCommit {
    pub fn parse(message: impl Into<String>) -> Self {
        let message = message.into();
        let change_id = find_change_id(&message);
        Self { message, change_id }
    }

    /// First line of the message
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

/// Parse `%H%x00%B%x00` log output into commits, newest first.
///
/// `format:` puts a newline between records, so every field is stripped of
/// leading newlines. An empty range gives an empty vector.
pub fn parse_log(raw: &str) -> Vec<Commit> {
    let mut fields: Vec<&str> = raw
        .split('\0')
        .map(|f| f.trim_start_matches('\n'))
        .collect();
    // the last field follows the final NUL and is not part of a record
    fields.pop();

    fields
        .chunks_exact(2)
        .map(|record| Commit::parse(record[0], record[1]))
        .collect()
}

/// Branch named in a sync commit's header line
pub fn sync_source(message: &str) -> Option<&str> {
    let first = message.lines().next()?;
    first.strip_prefix(SYNC_HEADER).map(str::trim)
}

/// Split a sync commit's body back into the messages it aggregates.
fn parse_sub_commits(message: &str) -> Vec<SubCommit> {
    let mut lines = message.split_inclusive('\n');
    // header
    lines.next();

    let mut sub_commits = Vec::new();
    let mut current = String::new();
    let mut in_preamble = true;

    for line in lines {
        let bare = line.trim_end_matches(['\n', '\r']);
        if in_preamble {
            if bare.is_empty() || bare == COMMITS_MARKER {
                continue;
            }
            in_preamble = false;
        }
        if bare == SUB_COMMIT_DELIMITER {
            push_segment(&mut sub_commits, &mut current);
            continue;
        }
        current.push_str(line);
    }
    push_segment(&mut sub_commits, &mut current);

    sub_commits
}

fn push_segment(sub_commits: &mut Vec<SubCommit>, segment: &mut String) {
    let message = std::mem::take(segment);
    if !message.trim().is_empty() {
        sub_commits.push(SubCommit::parse(message));
    }
}

/// First `change-id: <token>` trailer in a message
fn find_change_id(message: &str) -> Option<String> {
    message.lines().find_map(|line| {
        let token = line.strip_prefix(CHANGE_ID_KEY)?.trim();
        (!token.is_empty()).then(|| token.to_string())
    })
}

/// Build the message of a sync commit: the header paragraph and the list of
/// aggregated messages, oldest first, each closed by a delimiter line.
pub fn sync_message<'a>(
    source_branch: &str,
    messages: impl IntoIterator<Item = &'a str>,
) -> (String, String) {
    let header = format!("{}{}", SYNC_HEADER, source_branch);
    let mut body = format!("{}\n", COMMITS_MARKER);
    for message in messages {
        body.push_str(message);
        if !message.ends_with('\n') {
            body.push('\n');
        }
        body.push_str(SUB_COMMIT_DELIMITER);
        body.push('\n');
    }
    (header, body)
}
