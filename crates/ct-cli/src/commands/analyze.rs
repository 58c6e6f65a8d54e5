//! Analyze command: group a project's commits into features and attribute
//! work time to each.
//!
//! Commits come from the local mirror after a freshness check. Up to
//! `max_analysis_commits` of the oldest non-merge commits are sent to the
//! classifier; the returned groups are resolved against every stored commit
//! and groups that resolve to nothing are left out.

use std::io::Write;

use anyhow::{Context, Result};
use ct_core::{Commit, FeatureAttribution, ProjectRef, Tunables, attribute_groups, classifier_input};
use ct_db::{CommitOrder, Database};
use ct_llm::FeatureClassifier;
use serde::Serialize;

use super::util::{
    format_duration, format_timestamp, llm_client, refresh_project, runtime, seconds_to_hours,
    sync_controller,
};
use crate::Config;

/// Feature as printed by `ct analyze --json`.
#[derive(Debug, Serialize)]
struct FeatureEntry<'a> {
    name: &'a str,
    actual_work_seconds: i64,
    total_elapsed_seconds: i64,
    actual_work_hours: f64,
    total_elapsed_hours: f64,
    commits: Vec<FeatureCommit<'a>>,
}

#[derive(Debug, Serialize)]
struct FeatureCommit<'a> {
    id: &'a str,
    summary: &'a str,
    authored_at: String,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    config: &Config,
    project: &ProjectRef,
    json: bool,
) -> Result<()> {
    let controller = sync_controller(config)?;
    let classifier = llm_client(config)?;
    let runtime = runtime()?;

    let stored = runtime.block_on(refresh_project(&controller, db, project))?;
    let commits = db.list_commits(stored.external_id, CommitOrder::OldestFirst, None)?;
    let features = runtime
        .block_on(analyze_commits(&classifier, &commits, &config.tunables))
        .with_context(|| format!("failed to classify commits of {project}"))?;
    render(writer, &features, json)
}

/// Classify stored commits and attribute time to each resulting feature.
///
/// Returns no features when there is nothing to classify.
pub async fn analyze_commits<F>(
    classifier: &F,
    commits: &[Commit],
    tunables: &Tunables,
) -> Result<Vec<FeatureAttribution>>
where
    F: FeatureClassifier + ?Sized,
{
    let config = tunables.attribution()?;
    let input = classifier_input(commits, tunables.max_analysis_commits);
    if input.is_empty() {
        tracing::debug!("no commits to classify");
        return Ok(Vec::new());
    }

    tracing::info!(commits = input.len(), "classifying commits");
    let groups = classifier.classify(&input).await?;
    let features: Vec<FeatureAttribution> =
        attribute_groups(&groups, commits, &config)
            .into_iter()
            .filter(FeatureAttribution::has_work)
            .collect();
    tracing::debug!(groups = groups.len(), kept = features.len(), "attributed feature groups");
    Ok(features)
}

fn render<W: Write>(writer: &mut W, features: &[FeatureAttribution], json: bool) -> Result<()> {
    if json {
        let entries: Vec<FeatureEntry<'_>> = features
            .iter()
            .map(|feature| FeatureEntry {
                name: &feature.name,
                actual_work_seconds: feature.attribution.actual_work_seconds,
                total_elapsed_seconds: feature.attribution.total_elapsed_seconds,
                actual_work_hours: seconds_to_hours(feature.attribution.actual_work_seconds),
                total_elapsed_hours: seconds_to_hours(feature.attribution.total_elapsed_seconds),
                commits: feature
                    .attribution
                    .commits
                    .iter()
                    .map(|commit| FeatureCommit {
                        id: &commit.id,
                        summary: commit.summary(),
                        authored_at: format_timestamp(commit.authored_at),
                    })
                    .collect(),
            })
            .collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&entries)?)?;
        return Ok(());
    }

    if features.is_empty() {
        writeln!(writer, "No features found.")?;
        return Ok(());
    }

    for feature in features {
        writeln!(
            writer,
            "{}: {} of work over {} ({} commits)",
            feature.name,
            format_duration(feature.attribution.actual_work_seconds),
            format_duration(feature.attribution.total_elapsed_seconds),
            feature.attribution.commits.len()
        )?;
    }
    Ok(())
}
