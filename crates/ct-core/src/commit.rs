//! Commits and projects mirrored from the remote host.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A commit as stored in the local mirror.
///
/// Commits are append-only: created once on first observation, never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Content-addressed identifier (the SHA).
    pub id: String,
    /// External id of the owning project.
    pub project_id: i64,
    /// Full commit message. The first line is the summary.
    pub message: String,
    /// Author-reported timestamp. Not monotonic across a project.
    pub authored_at: DateTime<Utc>,
    pub additions: u32,
    pub deletions: u32,
    pub files_changed: u32,
}

impl Commit {
    /// Returns the first line of the message.
    pub fn summary(&self) -> &str {
        first_line(&self.message)
    }

    /// Merge commits carry no work of their own and are noise for grouping.
    pub fn is_merge(&self) -> bool {
        let summary = self.summary();
        summary.starts_with("Merge pull request") || summary.starts_with("Merge branch")
    }
}

/// One remote repository tracked locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Stable id assigned by the remote host.
    pub external_id: i64,
    /// `owner/repo` display name.
    pub full_name: String,
    /// Instant before which the local mirror is known complete.
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Caller-supplied `owner/repo` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectRef {
    pub owner: String,
    pub repo: String,
}

impl ProjectRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for ProjectRef {
    type Err = InvalidProjectRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches(".git");
        let mut parts = trimmed.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
                Ok(Self::new(owner, repo))
            }
            _ => Err(InvalidProjectRef(s.to_string())),
        }
    }
}

/// Error for strings that are not `owner/repo`.
#[derive(Debug, Clone, Error)]
#[error("invalid project reference {0:?}: expected owner/repo")]
pub struct InvalidProjectRef(String);

/// Id and one-line summary handed to the feature classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub id: String,
    pub summary: String,
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or_default().trim_end()
}
