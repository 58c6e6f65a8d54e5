//! Sync passes over a single project.
//!
//! # Pass Summary
//!
//! 1. Resolve the project on the remote host and upsert its record
//! 2. List commits (one page since the watermark, or every page for a full pass)
//! 3. Skip ids already in the store; fetch details for the rest in fixed-size
//!    concurrent batches, inserting each as it arrives
//! 4. Advance the watermark to the pass start time only when listing reached
//!    a short page and no detail fetch failed

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ct_core::{Commit, Project, ProjectRef, Tunables};
use ct_db::{Database, InsertOutcome};
use ct_github::{CommitDetail, GitHubError, HistoryClient, ListedCommit};
use tokio::task::JoinSet;

use crate::{SyncError, SyncMode, SyncPlan};

/// Settings for sync passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Commits requested per listing page.
    /// Default: 100.
    pub page_size: u32,

    /// Detail fetches in flight at once.
    /// Default: 10.
    pub detail_batch_size: usize,

    /// Watermarks younger than this skip the sync in [`SyncController::ensure_synced`].
    /// Default: 5 minutes.
    pub freshness_threshold: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&Tunables::default())
    }
}

impl From<&Tunables> for SyncSettings {
    fn from(tunables: &Tunables) -> Self {
        Self {
            page_size: tunables.page_size,
            detail_batch_size: tunables.detail_batch_size,
            freshness_threshold: tunables.freshness_threshold(),
        }
    }
}

/// A commit whose details could not be fetched during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailFailure {
    pub commit_id: String,
    pub reason: String,
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStats {
    /// The project as stored after the pass.
    pub project: Project,
    pub mode: SyncMode,
    /// Commits returned by the remote listing.
    pub total_fetched: usize,
    /// Commits newly stored by this pass.
    pub saved: usize,
    /// Commits that were already stored.
    pub skipped: usize,
    /// Detail fetches that failed. Those commits were not stored.
    pub failures: Vec<DetailFailure>,
    /// Why listing stopped early, if it did.
    pub interrupted: Option<String>,
    /// Listing stopped on a full page, so older history since the watermark
    /// may still be missing.
    pub more_pending: bool,
    pub watermark_advanced: bool,
    /// The project has no watermark, or history is known to be missing.
    pub needs_full_sync: bool,
}

impl SyncStats {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// True when listing reached the end of the requested history.
    pub const fn is_complete(&self) -> bool {
        self.interrupted.is_none() && !self.more_pending
    }

    /// True when some commits were not stored or listing stopped early.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty() || !self.is_complete()
    }
}

/// Result of [`SyncController::ensure_synced`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ensured {
    pub project: Project,
    /// `None` when the project was fresh and no pass ran.
    pub sync: Option<SyncStats>,
}

#[derive(Debug, Default)]
struct PassCounts {
    total_fetched: usize,
    saved: usize,
    skipped: usize,
    failures: Vec<DetailFailure>,
    interrupted: Option<String>,
}

/// Orchestrates the remote history client and the commit store.
///
/// No per-project lock is taken. Overlapping passes may fetch the same
/// details twice, but the store keeps one record per commit id and each
/// pass only advances the watermark to its own start time.
#[derive(Debug)]
pub struct SyncController<C> {
    client: Arc<C>,
    settings: SyncSettings,
}

impl<C> SyncController<C>
where
    C: HistoryClient + 'static,
{
    pub const fn new(client: Arc<C>, settings: SyncSettings) -> Self {
        Self { client, settings }
    }

    /// Sync the project if its watermark is missing or stale.
    ///
    /// An incremental pass that stops on a full page is followed by a full
    /// pass, and the stats of that last pass are returned.
    pub async fn ensure_synced(
        &self,
        db: &mut Database,
        project: &ProjectRef,
    ) -> Result<Ensured, SyncError> {
        let stored = db.project_by_name(&project.full_name())?;
        let plan = SyncPlan::decide(
            stored.as_ref().and_then(|stored| stored.last_sync_at),
            Utc::now(),
            self.settings.freshness_threshold,
        );
        let mode = match (stored, plan) {
            (Some(stored), SyncPlan::Fresh) => {
                tracing::debug!(project = %project, "watermark is fresh, serving from store");
                return Ok(Ensured {
                    project: stored,
                    sync: None,
                });
            }
            (_, SyncPlan::Incremental { since }) => {
                tracing::debug!(project = %project, %since, "watermark is stale");
                SyncMode::Incremental
            }
            (_, SyncPlan::Full | SyncPlan::Fresh) => SyncMode::Full,
        };
        let mut stats = self.sync_project(db, project, mode).await?;
        if stats.mode == SyncMode::Incremental && stats.more_pending {
            tracing::info!(project = %project, "incremental page was full, running a full pass");
            stats = self.sync_project(db, project, SyncMode::Full).await?;
        }
        Ok(Ensured {
            project: stats.project.clone(),
            sync: Some(stats),
        })
    }

    /// Run one sync pass.
    ///
    /// Failed detail fetches are recorded in the returned stats. Errors are
    /// returned only when the pass could make no progress: missing
    /// credentials, an unknown project, or a failed first page for a project
    /// that was never stored.
    pub async fn sync_project(
        &self,
        db: &mut Database,
        project: &ProjectRef,
        mode: SyncMode,
    ) -> Result<SyncStats, SyncError> {
        let remote = self
            .client
            .resolve_project(project)
            .await
            .map_err(|err| remote_error(err, project))?;
        let is_new = db.project(remote.id)?.is_none();
        let record = db.upsert_project(remote.id, &remote.full_name)?;

        let since = match mode {
            SyncMode::Incremental => record.last_sync_at,
            SyncMode::Full => None,
        };
        // Captured before listing so commits pushed mid-pass fall after it
        let started_at = Utc::now();
        tracing::info!(project = %remote.full_name, ?mode, ?since, "starting sync pass");

        let page_size = self.settings.page_size.max(1);
        let mut counts = PassCounts::default();
        let mut seen = HashSet::new();
        let mut exhausted = false;
        let mut page = 1;
        loop {
            let listed = match self
                .client
                .list_commits(project, since, page_size, page)
                .await
            {
                Ok(listed) => listed,
                Err(err) if err.is_auth() || err.is_not_found() => {
                    return Err(remote_error(err, project));
                }
                Err(err) if page == 1 && is_new => {
                    return Err(SyncError::Remote {
                        project: project.full_name(),
                        source: err,
                    });
                }
                Err(err) => {
                    tracing::warn!(page, error = %err, "listing failed, pass is incomplete");
                    counts.interrupted = Some(format!("listing page {page} failed: {err}"));
                    break;
                }
            };

            let listed_len = listed.len();
            counts.total_fetched += listed_len;
            let pending = filter_known(db, listed, &mut seen, &mut counts)?;
            self.store_details(db, project, remote.id, pending, &mut counts)
                .await?;

            if listed_len < page_size as usize {
                exhausted = true;
                break;
            }
            if mode == SyncMode::Incremental {
                break;
            }
            page += 1;
        }

        let clean = counts.failures.is_empty() && counts.interrupted.is_none();
        let watermark_advanced = if exhausted && clean {
            db.set_watermark(remote.id, started_at)?
        } else {
            false
        };
        let more_pending = !exhausted && counts.interrupted.is_none();
        let project = db.project(remote.id)?.unwrap_or(record);
        let needs_full_sync = project.last_sync_at.is_none() || more_pending;
        if more_pending {
            tracing::warn!(
                project = %project.full_name,
                "listing stopped on a full page, more history may be pending"
            );
        }

        tracing::info!(
            project = %project.full_name,
            fetched = counts.total_fetched,
            saved = counts.saved,
            skipped = counts.skipped,
            failed = counts.failures.len(),
            watermark_advanced,
            "sync pass finished"
        );

        Ok(SyncStats {
            project,
            mode,
            total_fetched: counts.total_fetched,
            saved: counts.saved,
            skipped: counts.skipped,
            failures: counts.failures,
            interrupted: counts.interrupted,
            more_pending,
            watermark_advanced,
            needs_full_sync,
        })
    }

    /// Fetch details in fixed-size batches and store each commit.
    ///
    /// Each batch is joined before the next starts.
    async fn store_details(
        &self,
        db: &mut Database,
        project: &ProjectRef,
        project_id: i64,
        pending: Vec<String>,
        counts: &mut PassCounts,
    ) -> Result<(), SyncError> {
        let batch_size = self.settings.detail_batch_size.max(1);
        for batch in pending.chunks(batch_size) {
            let mut outstanding: HashSet<&str> = batch.iter().map(String::as_str).collect();
            let mut tasks = JoinSet::new();
            for id in batch {
                let client = Arc::clone(&self.client);
                let project = project.clone();
                let id = id.clone();
                tasks.spawn(async move {
                    let result = client.get_commit_detail(&project, &id).await;
                    (id, result)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                let (id, result) = match joined {
                    Ok(output) => output,
                    Err(err) => {
                        tracing::warn!(error = %err, "detail task did not finish");
                        continue;
                    }
                };
                outstanding.remove(id.as_str());
                match result {
                    Ok(detail) => {
                        let commit = into_commit(detail, project_id);
                        match db.insert_commit(&commit)? {
                            InsertOutcome::Inserted => {
                                tracing::debug!(commit = %commit.id, "stored commit");
                                counts.saved += 1;
                            }
                            InsertOutcome::AlreadyPresent => counts.skipped += 1,
                        }
                    }
                    Err(err) => {
                        tracing::warn!(commit = %id, error = %err, "commit detail fetch failed");
                        counts.failures.push(DetailFailure {
                            commit_id: id,
                            reason: err.to_string(),
                        });
                    }
                }
            }

            for id in outstanding {
                counts.failures.push(DetailFailure {
                    commit_id: id.to_string(),
                    reason: "detail task did not finish".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Splits a listing page into ids that still need fetching.
///
/// Ids already stored, or already seen earlier in this pass, count as
/// skipped.
fn filter_known(
    db: &Database,
    listed: Vec<ListedCommit>,
    seen: &mut HashSet<String>,
    counts: &mut PassCounts,
) -> Result<Vec<String>, SyncError> {
    let mut pending = Vec::new();
    for commit in listed {
        if !seen.insert(commit.id.clone()) || db.commit_exists(&commit.id)? {
            tracing::debug!(commit = %commit.id, authored_at = ?commit.authored_at, "skipping known commit");
            counts.skipped += 1;
        } else {
            pending.push(commit.id);
        }
    }
    Ok(pending)
}

fn into_commit(detail: CommitDetail, project_id: i64) -> Commit {
    Commit {
        id: detail.id,
        project_id,
        message: detail.message,
        authored_at: detail.authored_at,
        additions: detail.additions,
        deletions: detail.deletions,
        files_changed: detail.files_changed,
    }
}

fn remote_error(err: GitHubError, project: &ProjectRef) -> SyncError {
    if err.is_auth() {
        SyncError::AuthenticationMissing(err)
    } else if err.is_not_found() {
        SyncError::RemoteNotFound {
            project: project.full_name(),
        }
    } else {
        SyncError::Remote {
            project: project.full_name(),
            source: err,
        }
    }
}
