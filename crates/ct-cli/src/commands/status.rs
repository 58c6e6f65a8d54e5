//! Status command for showing synced projects and their watermarks.

use std::io::Write;

use anyhow::Result;

use ct_db::Database;

use super::util::format_timestamp;
use crate::Config;

pub fn run<W: Write>(writer: &mut W, db: &Database, config: &Config) -> Result<()> {
    let summaries = db.project_summaries()?;

    writeln!(writer, "Commit time tracker status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;

    if summaries.is_empty() {
        writeln!(writer, "No projects synced.")?;
        return Ok(());
    }

    writeln!(writer, "Projects:")?;
    for summary in summaries {
        let last_commit = summary
            .last_commit_at
            .map_or_else(|| "none".to_string(), format_timestamp);
        let synced = summary
            .project
            .last_sync_at
            .map_or_else(|| "never (full sync pending)".to_string(), format_timestamp);
        writeln!(
            writer,
            "- {}: {} commits, last commit {}, synced {}",
            summary.project.full_name, summary.commit_count, last_commit, synced
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, Utc};
    use ct_core::Commit;

    use insta::assert_snapshot;

    fn ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn render(db: &Database, config: &Config) -> String {
        let mut output = Vec::new();
        run(&mut output, db, config).unwrap();
        let output = String::from_utf8(output).unwrap();
        output.replace(&config.database_path.display().to_string(), "[TEMP]/ct.db")
    }

    #[test]
    fn status_command_reports_empty_database() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("ct.db"),
            ..Config::default()
        };
        let db = Database::open(&config.database_path).unwrap();

        assert_snapshot!(render(&db, &config), @r"
        Commit time tracker status
        Database: [TEMP]/ct.db
        No projects synced.
        ");
    }

    #[test]
    fn status_command_outputs_projects_and_watermarks() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("ct.db"),
            ..Config::default()
        };
        let mut db = Database::open(&config.database_path).unwrap();

        db.upsert_project(1, "octo/api").unwrap();
        db.upsert_project(2, "octo/web").unwrap();
        for (id, at) in [("a1", "2025-01-01T09:00:00Z"), ("a2", "2025-01-01T10:30:00Z")] {
            db.insert_commit(&Commit {
                id: id.to_string(),
                project_id: 1,
                message: "Add endpoint".to_string(),
                authored_at: ts(at),
                additions: 10,
                deletions: 2,
                files_changed: 1,
            })
            .unwrap();
        }
        db.set_watermark(1, ts("2025-01-02T00:00:00Z")).unwrap();

        assert_snapshot!(render(&db, &config), @r"
        Commit time tracker status
        Database: [TEMP]/ct.db
        Projects:
        - octo/api: 2 commits, last commit 2025-01-01T10:30:00Z, synced 2025-01-02T00:00:00Z
        - octo/web: 0 commits, last commit none, synced never (full sync pending)
        ");
    }
}
