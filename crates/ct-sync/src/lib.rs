//! Commit synchronization for the commit time tracker.
//!
//! Keeps the local commit store eventually consistent with remote history:
//! - [`SyncPlan`] decides whether a project is fresh, stale, or unsynced
//! - [`SyncController`] fetches new history, stores it idempotently, and
//!   advances the watermark only when a pass is provably complete

mod controller;
mod plan;

use ct_db::DbError;
use ct_github::GitHubError;
use thiserror::Error;

pub use controller::{DetailFailure, Ensured, SyncController, SyncSettings, SyncStats};
pub use plan::{SyncMode, SyncPlan};

/// Sync errors.
///
/// Only failures that leave the pass unable to make any progress are
/// errors. A failed commit detail fetch is recorded in [`SyncStats`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// No usable credential for the remote host.
    #[error("missing or rejected GitHub credentials")]
    AuthenticationMissing(#[source] GitHubError),
    /// The project does not exist on the remote host or is not visible.
    #[error("project {project} not found on the remote host")]
    RemoteNotFound { project: String },
    /// The remote host failed before any progress was made.
    #[error("remote history unavailable for {project}")]
    Remote {
        project: String,
        #[source]
        source: GitHubError,
    },
    /// The local store failed.
    #[error(transparent)]
    Store(#[from] DbError),
}
