//! Commits command for listing the stored mirror of a project.

use std::io::Write;

use anyhow::Result;
use ct_core::{Commit, ProjectRef};
use ct_db::{CommitOrder, Database};
use serde::Serialize;

use super::util::{format_timestamp, refresh_project, runtime, sync_controller};
use crate::Config;

/// Commit as printed by `ct commits --json`.
#[derive(Debug, Serialize)]
struct CommitEntry<'a> {
    id: &'a str,
    summary: &'a str,
    message: &'a str,
    authored_at: String,
    additions: u32,
    deletions: u32,
    files_changed: u32,
}

impl<'a> From<&'a Commit> for CommitEntry<'a> {
    fn from(commit: &'a Commit) -> Self {
        Self {
            id: &commit.id,
            summary: commit.summary(),
            message: &commit.message,
            authored_at: format_timestamp(commit.authored_at),
            additions: commit.additions,
            deletions: commit.deletions,
            files_changed: commit.files_changed,
        }
    }
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    config: &Config,
    project: &ProjectRef,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let controller = sync_controller(config)?;
    let stored = runtime()?.block_on(refresh_project(&controller, db, project))?;
    let commits = db.list_commits(stored.external_id, CommitOrder::NewestFirst, limit)?;
    render(writer, &commits, json)
}

fn render<W: Write>(writer: &mut W, commits: &[Commit], json: bool) -> Result<()> {
    if json {
        let entries: Vec<CommitEntry<'_>> = commits.iter().map(CommitEntry::from).collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&entries)?)?;
        return Ok(());
    }

    if commits.is_empty() {
        writeln!(writer, "No commits stored.")?;
        return Ok(());
    }

    for commit in commits {
        let short = commit.id.get(..7).unwrap_or(&commit.id);
        writeln!(
            writer,
            "{short}  {}  +{} -{}  {}",
            format_timestamp(commit.authored_at),
            commit.additions,
            commit.deletions,
            commit.summary()
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, Utc};

    use insta::assert_snapshot;

    fn commit(id: &str, message: &str, at: &str) -> Commit {
        Commit {
            id: id.to_string(),
            project_id: 1,
            message: message.to_string(),
            authored_at: DateTime::parse_from_rfc3339(at)
                .unwrap()
                .with_timezone(&Utc),
            additions: 12,
            deletions: 3,
            files_changed: 2,
        }
    }

    fn render_to_string(commits: &[Commit], json: bool) -> String {
        let mut output = Vec::new();
        render(&mut output, commits, json).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn render_lists_summaries() {
        let commits = vec![
            commit(
                "0123456789abcdef",
                "Add login form\n\nWith validation",
                "2025-01-01T10:00:00Z",
            ),
            commit("abc", "Initial commit", "2025-01-01T09:00:00Z"),
        ];
        assert_snapshot!(render_to_string(&commits, false), @r"
        0123456  2025-01-01T10:00:00Z  +12 -3  Add login form
        abc  2025-01-01T09:00:00Z  +12 -3  Initial commit
        ");
    }

    #[test]
    fn render_reports_empty_store() {
        assert_eq!(render_to_string(&[], false), "No commits stored.\n");
    }

    #[test]
    fn render_json_includes_full_message() {
        let commits = vec![commit("abc", "Fix bug\n\nDetails", "2025-01-01T09:00:00Z")];
        let output = render_to_string(&commits, true);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value[0]["summary"], "Fix bug");
        assert_eq!(value[0]["message"], "Fix bug\n\nDetails");
        assert_eq!(value[0]["files_changed"], 2);
        assert_eq!(value[0]["authored_at"], "2025-01-01T09:00:00Z");
    }
}
