//! Tunable thresholds shared by sync and attribution.

use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::AttributionConfig;

/// Largest page the GitHub listing endpoint serves.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Upper bound for attribution durations, so summing them cannot overflow.
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// A tunable whose value cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid tunable {field}: {reason}")]
pub struct InvalidTunable {
    pub field: &'static str,
    pub reason: String,
}

/// Tunables exposed through configuration.
///
/// Durations are stored as whole seconds so they read naturally in TOML and
/// environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tunables {
    /// A watermark younger than this is fresh and skips the sync.
    /// Default: 300 (5 minutes).
    pub freshness_threshold_secs: u64,

    /// Gaps at or above this split work sessions.
    /// Default: 10800 (3 hours).
    pub session_gap_secs: u64,

    /// Allowance for wrap-up after a session and after the last commit.
    /// Default: 1800 (30 minutes).
    pub wrap_up_secs: u64,

    /// Commits requested per listing page.
    pub page_size: u32,

    /// Commit details fetched concurrently per batch.
    pub detail_batch_size: usize,

    /// Oldest commits considered per analysis. Newer history beyond this
    /// is ignored.
    pub max_analysis_commits: usize,

    /// Per-request timeout for remote calls.
    pub request_timeout_secs: u64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            freshness_threshold_secs: 300,
            session_gap_secs: 3 * 60 * 60,
            wrap_up_secs: 30 * 60,
            page_size: 100,
            detail_batch_size: 10,
            max_analysis_commits: 200,
            request_timeout_secs: 30,
        }
    }
}

impl Tunables {
    pub const fn freshness_threshold(&self) -> Duration {
        Duration::from_secs(self.freshness_threshold_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check every value before it reaches sync or attribution.
    pub fn validate(&self) -> Result<(), InvalidTunable> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(InvalidTunable {
                field: "page_size",
                reason: format!("must be between 1 and {MAX_PAGE_SIZE}, got {}", self.page_size),
            });
        }
        if self.detail_batch_size == 0 {
            return Err(InvalidTunable {
                field: "detail_batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        self.attribution().map(|_| ())
    }

    pub fn attribution(&self) -> Result<AttributionConfig, InvalidTunable> {
        Ok(AttributionConfig {
            session_gap: seconds("session_gap_secs", self.session_gap_secs)?,
            wrap_up: seconds("wrap_up_secs", self.wrap_up_secs)?,
        })
    }
}

fn seconds(field: &'static str, value: u64) -> Result<TimeDelta, InvalidTunable> {
    i64::try_from(value)
        .ok()
        .filter(|_| value <= MAX_DURATION_SECS)
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| InvalidTunable {
            field,
            reason: format!("{value} seconds exceeds the limit of {MAX_DURATION_SECS}"),
        })
}
