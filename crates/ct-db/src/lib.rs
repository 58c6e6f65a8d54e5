//! Storage layer for the commit time tracker.
//!
//! Provides the local commit mirror and per-project sync watermarks using
//! `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A sync pass holds `&mut Database` for its duration. Overlapping passes use
//! separate connections to the same file; the commit primary key resolves
//! duplicate inserts, and watermark updates only ever move forward.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`). The fixed width ensures:
//! - Lexicographic ordering matches chronological ordering
//! - Human-readable values in the database
//! - Timezone-aware (always UTC)
//!
//! ## Append-only Commits
//!
//! Commits are inserted once and never updated or deleted. A second insert of
//! the same id is reported as [`InsertOutcome::AlreadyPresent`], not an error.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use ct_core::{Commit, Project};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

/// How long a connection waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for {record}: {timestamp}")]
    TimestampParse {
        record: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Result of inserting a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Another writer stored this id first.
    AlreadyPresent,
}

/// Ordering for commit listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOrder {
    OldestFirst,
    NewestFirst,
}

/// Commit count and newest commit per project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSummary {
    pub project: Project,
    pub commit_count: usize,
    pub last_commit_at: Option<DateTime<Utc>>,
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            -- Projects table: one row per remote repository
            -- external_id: repository id assigned by the remote host
            -- last_sync_at: watermark, NULL until a pass completes
            CREATE TABLE IF NOT EXISTS projects (
                external_id INTEGER PRIMARY KEY,
                full_name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_sync_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_projects_full_name ON projects(full_name);

            -- Commits table: append-only mirror of remote history
            -- id: commit SHA
            -- authored_at: RFC 3339 author timestamp
            CREATE TABLE IF NOT EXISTS commits (
                id TEXT PRIMARY KEY,
                project_id INTEGER NOT NULL,
                message TEXT NOT NULL,
                authored_at TEXT NOT NULL,
                additions INTEGER NOT NULL DEFAULT 0,
                deletions INTEGER NOT NULL DEFAULT 0,
                files_changed INTEGER NOT NULL DEFAULT 0,
                synced_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(external_id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_commits_project_authored ON commits(project_id, authored_at);
            ",
        )?;
        Ok(())
    }

    /// Creates the project or refreshes its display name.
    ///
    /// The watermark of an existing project is left untouched.
    pub fn upsert_project(&mut self, external_id: i64, full_name: &str) -> Result<Project, DbError> {
        let now = format_timestamp(Utc::now());
        self.conn.execute(
            "
            INSERT INTO projects (external_id, full_name, created_at, updated_at, last_sync_at)
            VALUES (?1, ?2, ?3, ?3, NULL)
            ON CONFLICT(external_id) DO UPDATE SET
                full_name = excluded.full_name,
                updated_at = excluded.updated_at
            ",
            params![external_id, full_name, now],
        )?;
        let last_sync_at = self.watermark(external_id)?;
        Ok(Project {
            external_id,
            full_name: full_name.to_string(),
            last_sync_at,
        })
    }

    /// Looks up a project by its remote id.
    pub fn project(&self, external_id: i64) -> Result<Option<Project>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT external_id, full_name, last_sync_at FROM projects WHERE external_id = ?1",
                [external_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        row.map(project_from_row).transpose()
    }

    /// Looks up a project by `owner/repo`, case-insensitively.
    pub fn project_by_name(&self, full_name: &str) -> Result<Option<Project>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT external_id, full_name, last_sync_at
                FROM projects
                WHERE full_name = ?1 COLLATE NOCASE
                ORDER BY updated_at DESC
                LIMIT 1
                ",
                [full_name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        row.map(project_from_row).transpose()
    }

    /// Lists all projects ordered by name.
    pub fn list_projects(&self) -> Result<Vec<Project>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT external_id, full_name, last_sync_at FROM projects ORDER BY full_name ASC",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        let mut projects = Vec::new();
        for row in rows {
            projects.push(project_from_row(row?)?);
        }
        Ok(projects)
    }

    /// Lists projects with their commit counts, ordered by name.
    pub fn project_summaries(&self) -> Result<Vec<ProjectSummary>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT p.external_id, p.full_name, p.last_sync_at, COUNT(c.id), MAX(c.authored_at)
            FROM projects p
            LEFT JOIN commits c ON c.project_id = p.external_id
            GROUP BY p.external_id
            ORDER BY p.full_name ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                (row.get(0)?, row.get(1)?, row.get(2)?),
                row.get::<_, i64>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;
        let mut summaries = Vec::new();
        for row in rows {
            let (project_row, count, last_commit_at) = row?;
            let project = project_from_row(project_row)?;
            let last_commit_at = last_commit_at
                .map(|value| parse_timestamp(&value, &project.full_name))
                .transpose()?;
            summaries.push(ProjectSummary {
                project,
                commit_count: usize::try_from(count).unwrap_or_default(),
                last_commit_at,
            });
        }
        Ok(summaries)
    }

    /// Returns the project's watermark, if a pass has ever completed.
    pub fn watermark(&self, project_id: i64) -> Result<Option<DateTime<Utc>>, DbError> {
        let value: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT last_sync_at FROM projects WHERE external_id = ?1",
                [project_id],
                |row| row.get(0),
            )
            .optional()?;
        value
            .flatten()
            .map(|value| parse_timestamp(&value, &format!("project {project_id}")))
            .transpose()
    }

    /// Advances the project's watermark to `at`.
    ///
    /// The watermark never moves backwards: if the stored value is already at
    /// or after `at`, nothing changes and `false` is returned.
    pub fn set_watermark(&mut self, project_id: i64, at: DateTime<Utc>) -> Result<bool, DbError> {
        let at = format_timestamp(at);
        let changed = self.conn.execute(
            "
            UPDATE projects
            SET last_sync_at = ?2, updated_at = ?2
            WHERE external_id = ?1 AND (last_sync_at IS NULL OR last_sync_at < ?2)
            ",
            params![project_id, at],
        )?;
        Ok(changed > 0)
    }

    /// Returns true when a commit with this id is already stored.
    pub fn commit_exists(&self, id: &str) -> Result<bool, DbError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM commits WHERE id = ?1)",
            [id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Inserts a commit, treating an existing id as already present.
    pub fn insert_commit(&mut self, commit: &Commit) -> Result<InsertOutcome, DbError> {
        let inserted = self.conn.execute(
            "
            INSERT OR IGNORE INTO commits
            (id, project_id, message, authored_at, additions, deletions, files_changed, synced_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                commit.id,
                commit.project_id,
                commit.message,
                format_timestamp(commit.authored_at),
                commit.additions,
                commit.deletions,
                commit.files_changed,
                format_timestamp(Utc::now()),
            ],
        )?;
        if inserted == 0 {
            tracing::debug!(commit = %commit.id, "commit already stored");
            Ok(InsertOutcome::AlreadyPresent)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    /// Lists a project's commits ordered by author timestamp then id.
    pub fn list_commits(
        &self,
        project_id: i64,
        order: CommitOrder,
        limit: Option<usize>,
    ) -> Result<Vec<Commit>, DbError> {
        let direction = match order {
            CommitOrder::OldestFirst => "ASC",
            CommitOrder::NewestFirst => "DESC",
        };
        let limit = limit
            .and_then(|limit| i64::try_from(limit).ok())
            .unwrap_or(-1);
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT id, project_id, message, authored_at, additions, deletions, files_changed
            FROM commits
            WHERE project_id = ?1
            ORDER BY authored_at {direction}, id {direction}
            LIMIT ?2
            "
        ))?;
        let rows = stmt.query_map(params![project_id, limit], |row| {
            Ok(CommitRow {
                id: row.get(0)?,
                project_id: row.get(1)?,
                message: row.get(2)?,
                authored_at: row.get(3)?,
                additions: row.get(4)?,
                deletions: row.get(5)?,
                files_changed: row.get(6)?,
            })
        })?;
        let mut commits = Vec::new();
        for row in rows {
            commits.push(row?.into_commit()?);
        }
        Ok(commits)
    }

    /// Counts stored commits for a project.
    pub fn commit_count(&self, project_id: i64) -> Result<usize, DbError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM commits WHERE project_id = ?1",
            [project_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

struct CommitRow {
    id: String,
    project_id: i64,
    message: String,
    authored_at: String,
    additions: u32,
    deletions: u32,
    files_changed: u32,
}

impl CommitRow {
    fn into_commit(self) -> Result<Commit, DbError> {
        let authored_at = parse_timestamp(&self.authored_at, &format!("commit {}", self.id))?;
        Ok(Commit {
            id: self.id,
            project_id: self.project_id,
            message: self.message,
            authored_at,
            additions: self.additions,
            deletions: self.deletions,
            files_changed: self.files_changed,
        })
    }
}

fn project_from_row(
    (external_id, full_name, last_sync_at): (i64, String, Option<String>),
) -> Result<Project, DbError> {
    let last_sync_at = last_sync_at
        .map(|value| parse_timestamp(&value, &full_name))
        .transpose()?;
    Ok(Project {
        external_id,
        full_name,
        last_sync_at,
    })
}

fn parse_timestamp(timestamp: &str, record: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            record: record.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
