//! Session-based work time attribution.
//!
//! Converts the commits of one unit of work into an estimate of actual work
//! time, discounting idle stretches between work sessions.
//!
//! # Algorithm Summary
//!
//! 1. Sort commits by author timestamp (ties broken by id)
//! 2. Elapsed time is the span from the first to the last commit
//! 3. Gaps shorter than the session gap count in full; longer gaps count as a
//!    fixed wrap-up allowance
//! 4. One more wrap-up allowance follows the final commit
//! 5. With more than one commit, the estimate is clamped to elapsed time

use chrono::{DateTime, Duration, Utc};

use crate::Commit;

/// Configuration for work time attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributionConfig {
    /// Gaps at or above this start a new work session.
    /// Default: 3 hours.
    pub session_gap: Duration,

    /// Credited after a session ends and after the last commit.
    /// Default: 30 minutes.
    pub wrap_up: Duration,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            session_gap: Duration::hours(3),
            wrap_up: Duration::minutes(30),
        }
    }
}

/// A commit that can take part in attribution.
///
/// This trait allows attribution to work with stored commits as well as
/// lighter test fixtures.
pub trait AttributableCommit {
    /// Returns the commit id, used to order commits with equal timestamps.
    fn id(&self) -> &str;

    /// Returns the author timestamp.
    fn authored_at(&self) -> DateTime<Utc>;
}

impl AttributableCommit for Commit {
    fn id(&self) -> &str {
        &self.id
    }

    fn authored_at(&self) -> DateTime<Utc> {
        self.authored_at
    }
}

/// Result of attributing one set of commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution<C> {
    /// Estimated hands-on time in seconds.
    pub actual_work_seconds: i64,

    /// Wall-clock span from first to last commit in seconds.
    pub total_elapsed_seconds: i64,

    /// Contributing commits, oldest first.
    pub commits: Vec<C>,
}

impl<C> Attribution<C> {
    fn empty() -> Self {
        Self {
            actual_work_seconds: 0,
            total_elapsed_seconds: 0,
            commits: Vec::new(),
        }
    }
}

/// Estimate the work time spent on a set of commits.
///
/// Input order does not matter: commits are sorted before gaps are measured,
/// so any permutation of the same set yields the same result.
pub fn attribute<C>(commits: &[C], config: &AttributionConfig) -> Attribution<C>
where
    C: AttributableCommit + Clone,
{
    if commits.is_empty() {
        return Attribution::empty();
    }

    let mut sorted = commits.to_vec();
    sorted.sort_by(|a, b| {
        a.authored_at()
            .cmp(&b.authored_at())
            .then_with(|| a.id().cmp(b.id()))
    });

    let (first, last) = match (sorted.first(), sorted.last()) {
        (Some(first), Some(last)) => (first.authored_at(), last.authored_at()),
        _ => return Attribution::empty(),
    };
    let total_elapsed = last - first;

    let mut actual = Duration::zero();
    for pair in sorted.windows(2) {
        let gap = pair[1].authored_at() - pair[0].authored_at();
        if gap < config.session_gap {
            actual += gap;
        } else {
            // Break between sessions
            actual += config.wrap_up;
        }
    }
    actual += config.wrap_up;

    // A lone commit keeps its wrap-up allowance even though nothing elapsed
    if sorted.len() > 1 {
        actual = actual.min(total_elapsed);
    }

    Attribution {
        actual_work_seconds: actual.num_seconds(),
        total_elapsed_seconds: total_elapsed.num_seconds(),
        commits: sorted,
    }
}
