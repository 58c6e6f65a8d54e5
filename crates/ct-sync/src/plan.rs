//! Deciding whether and how a project needs syncing.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// How far back a sync pass reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// One page of commits authored since the watermark.
    Incremental,
    /// Every page of history, with no lower time bound.
    Full,
}

/// What a read request should do before serving from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPlan {
    /// Watermark is within the freshness threshold.
    Fresh,
    /// Watermark is older than the threshold.
    Incremental { since: DateTime<Utc> },
    /// No watermark yet.
    Full,
}

impl SyncPlan {
    pub fn decide(
        watermark: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        freshness: Duration,
    ) -> Self {
        let Some(since) = watermark else {
            return Self::Full;
        };
        let freshness =
            chrono::Duration::from_std(freshness).unwrap_or_else(|_| chrono::Duration::MAX);
        if now - since > freshness {
            Self::Incremental { since }
        } else {
            Self::Fresh
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIVE_MINUTES: Duration = Duration::from_secs(300);

    fn ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn unsynced_project_needs_full_sync() {
        let plan = SyncPlan::decide(None, ts("2025-01-01T00:00:00Z"), FIVE_MINUTES);
        assert_eq!(plan, SyncPlan::Full);
    }

    #[test]
    fn recent_watermark_is_fresh() {
        let plan = SyncPlan::decide(
            Some(ts("2025-01-01T00:00:00Z")),
            ts("2025-01-01T00:04:59Z"),
            FIVE_MINUTES,
        );
        assert_eq!(plan, SyncPlan::Fresh);
    }

    #[test]
    fn watermark_exactly_at_threshold_is_fresh() {
        let plan = SyncPlan::decide(
            Some(ts("2025-01-01T00:00:00Z")),
            ts("2025-01-01T00:05:00Z"),
            FIVE_MINUTES,
        );
        assert_eq!(plan, SyncPlan::Fresh);
    }

    #[test]
    fn old_watermark_is_stale() {
        let since = ts("2025-01-01T00:00:00Z");
        let plan = SyncPlan::decide(Some(since), ts("2025-01-01T00:05:01Z"), FIVE_MINUTES);
        assert_eq!(plan, SyncPlan::Incremental { since });
    }

    #[test]
    fn watermark_in_the_future_is_fresh() {
        let plan = SyncPlan::decide(
            Some(ts("2025-01-02T00:00:00Z")),
            ts("2025-01-01T00:00:00Z"),
            FIVE_MINUTES,
        );
        assert_eq!(plan, SyncPlan::Fresh);
    }
}
