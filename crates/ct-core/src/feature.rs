//! Feature groups proposed by the classifier and their attributed time.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{Attribution, AttributionConfig, Commit, CommitSummary, attribute};

/// A named bag of commit ids believed to be one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGroup {
    pub name: String,
    pub commit_ids: Vec<String>,
}

/// Attribution for a single feature group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureAttribution {
    pub name: String,
    pub attribution: Attribution<Commit>,
}

impl FeatureAttribution {
    /// True when at least one of the group's ids resolved to a known commit.
    pub fn has_work(&self) -> bool {
        !self.attribution.commits.is_empty()
    }
}

/// Attribute each group against the supplied commit set.
///
/// Ids that are not in `commits` are dropped silently, and an id listed
/// twice in one group counts once. Groups may overlap or omit commits.
pub fn attribute_groups(
    groups: &[FeatureGroup],
    commits: &[Commit],
    config: &AttributionConfig,
) -> Vec<FeatureAttribution> {
    let by_id: HashMap<&str, &Commit> = commits.iter().map(|c| (c.id.as_str(), c)).collect();

    groups
        .iter()
        .map(|group| {
            let mut seen = HashSet::new();
            let resolved: Vec<Commit> = group
                .commit_ids
                .iter()
                .filter(|id| seen.insert(id.as_str()))
                .filter_map(|id| by_id.get(id.as_str()).map(|commit| (*commit).clone()))
                .collect();
            let dropped = group.commit_ids.len() - resolved.len();
            if dropped > 0 {
                tracing::debug!(group = %group.name, dropped, "dropped unknown or repeated commit ids");
            }
            FeatureAttribution {
                name: group.name.clone(),
                attribution: attribute(&resolved, config),
            }
        })
        .collect()
}

/// Prepare the classifier input from stored commits.
///
/// Commits are taken oldest first and truncated to `max` before merge commits
/// are removed; each message is reduced to its first line.
pub fn classifier_input(commits: &[Commit], max: usize) -> Vec<CommitSummary> {
    let mut ordered: Vec<&Commit> = commits.iter().collect();
    ordered.sort_by(|a, b| a.authored_at.cmp(&b.authored_at).then_with(|| a.id.cmp(&b.id)));
    ordered
        .into_iter()
        .take(max)
        .filter(|commit| !commit.is_merge())
        .map(|commit| CommitSummary {
            id: commit.id.clone(),
            summary: commit.summary().to_string(),
        })
        .collect()
}
