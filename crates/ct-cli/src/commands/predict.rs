//! Predict command: estimate a new feature's work time from the project's
//! analyzed history.

use std::io::Write;

use anyhow::{Context, Result, bail};
use ct_core::{FeatureAttribution, ProjectRef};
use ct_db::{CommitOrder, Database};
use ct_llm::{HistoricalFeature, Prediction, PredictionRequest};

use super::analyze::analyze_commits;
use super::util::{llm_client, refresh_project, runtime, seconds_to_hours, sync_controller};
use crate::Config;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    config: &Config,
    project: &ProjectRef,
    description: &str,
) -> Result<()> {
    if description.trim().is_empty() {
        bail!("feature description cannot be empty");
    }

    let controller = sync_controller(config)?;
    let client = llm_client(config)?;
    let runtime = runtime()?;

    let stored = runtime.block_on(refresh_project(&controller, db, project))?;
    let commits = db.list_commits(stored.external_id, CommitOrder::OldestFirst, None)?;
    let features = runtime
        .block_on(analyze_commits(&client, &commits, &config.tunables))
        .with_context(|| format!("failed to classify commits of {project}"))?;
    if features.is_empty() {
        bail!("{project} has no analyzable history to predict from");
    }

    let request = PredictionRequest {
        description: description.to_string(),
        history: history(&features),
    };
    let prediction = runtime
        .block_on(client.predict(&request))
        .context("failed to predict work time")?;
    render(writer, &prediction)
}

fn history(features: &[FeatureAttribution]) -> Vec<HistoricalFeature> {
    features
        .iter()
        .map(|feature| HistoricalFeature {
            name: feature.name.clone(),
            actual_work_hours: seconds_to_hours(feature.attribution.actual_work_seconds),
            total_elapsed_hours: seconds_to_hours(feature.attribution.total_elapsed_seconds),
        })
        .collect()
}

fn render<W: Write>(writer: &mut W, prediction: &Prediction) -> Result<()> {
    writeln!(writer, "Predicted work time: {:.1}h", prediction.predicted_hours)?;
    writeln!(writer, "Reason: {}", prediction.reason)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, Utc};
    use ct_core::{Commit, Tunables, attribute};

    use insta::assert_snapshot;

    #[test]
    fn history_converts_seconds_to_hours() {
        let at = |value: &str| {
            DateTime::parse_from_rfc3339(value)
                .unwrap()
                .with_timezone(&Utc)
        };
        let commits: Vec<Commit> = ["2025-01-01T09:00:00Z", "2025-01-01T11:00:00Z"]
            .iter()
            .enumerate()
            .map(|(idx, value)| Commit {
                id: format!("c{idx}"),
                project_id: 1,
                message: "Work".to_string(),
                authored_at: at(value),
                additions: 1,
                deletions: 1,
                files_changed: 1,
            })
            .collect();
        let features = vec![FeatureAttribution {
            name: "Search".to_string(),
            attribution: attribute(&commits, &Tunables::default().attribution().unwrap()),
        }];

        let history = history(&features);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].name, "Search");
        assert!((history[0].actual_work_hours - 2.0).abs() < f64::EPSILON);
        assert!((history[0].total_elapsed_hours - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn render_prints_hours_and_reason() {
        let prediction = Prediction {
            predicted_hours: 8.5,
            reason: "Similar to the login feature".to_string(),
        };
        let mut output = Vec::new();
        render(&mut output, &prediction).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Predicted work time: 8.5h
        Reason: Similar to the login feature
        ");
    }

    #[test]
    fn run_rejects_blank_description() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("ct.db"),
            ..Config::default()
        };
        let mut db = Database::open(&config.database_path).unwrap();
        let mut output = Vec::new();

        let err = run(
            &mut output,
            &mut db,
            &config,
            &ProjectRef::new("octo", "repo"),
            "   ",
        )
        .unwrap_err();
        assert!(err.to_string().contains("description"));
    }
}
