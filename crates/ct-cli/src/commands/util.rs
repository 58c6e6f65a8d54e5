//! Shared utilities for CLI commands.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use ct_core::{Project, ProjectRef};
use ct_db::Database;
use ct_github::GitHubClient;
use ct_sync::{SyncController, SyncError, SyncSettings};

use crate::Config;

/// Open the configured database, creating its directory if needed.
pub fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}

pub fn github_client(config: &Config) -> Result<GitHubClient> {
    let token = config
        .github_token()
        .ok_or_else(|| anyhow::anyhow!("missing GitHub token (set CT_GITHUB_TOKEN or GITHUB_TOKEN)"))?;
    GitHubClient::with_options(
        token,
        &config.github_api_url,
        config.tunables.request_timeout(),
    )
    .context("failed to create GitHub client")
}

pub fn llm_client(config: &Config) -> Result<ct_llm::Client> {
    let api_key = config
        .api_key()
        .ok_or_else(|| anyhow::anyhow!("missing Claude API key (set CT_API_KEY or config.toml)"))?;
    Ok(ct_llm::Client::new(api_key)
        .context("failed to create LLM client")?
        .with_model(config.model.clone()))
}

pub fn sync_controller(config: &Config) -> Result<SyncController<GitHubClient>> {
    let client = github_client(config)?;
    Ok(SyncController::new(
        Arc::new(client),
        SyncSettings::from(&config.tunables),
    ))
}

pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")
}

/// Bring the mirror up to date if it is stale, then return the stored project.
///
/// Missing credentials and unknown projects are errors. Any other sync
/// failure is logged and the stored data is served as-is.
pub async fn refresh_project(
    controller: &SyncController<GitHubClient>,
    db: &mut Database,
    project: &ProjectRef,
) -> Result<Project> {
    match controller.ensure_synced(db, project).await {
        Ok(ensured) => {
            if let Some(stats) = ensured.sync.as_ref().filter(|stats| stats.is_partial()) {
                tracing::warn!(
                    project = %project,
                    failed = stats.failed(),
                    complete = stats.is_complete(),
                    more_pending = stats.more_pending,
                    "sync was partial, serving stored commits"
                );
            }
            Ok(ensured.project)
        }
        Err(err @ (SyncError::AuthenticationMissing(_) | SyncError::RemoteNotFound { .. })) => {
            Err(err).with_context(|| format!("failed to sync {project}"))
        }
        Err(err) => {
            tracing::warn!(project = %project, error = %err, "sync failed, serving stored commits");
            match db.project_by_name(&project.full_name())? {
                Some(stored) => Ok(stored),
                None => bail!("{project} has never been synced: {err}"),
            }
        }
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[expect(
    clippy::cast_precision_loss,
    reason = "attributed seconds are far below f64 precision limits"
)]
pub fn seconds_to_hours(seconds: i64) -> f64 {
    seconds as f64 / 3600.0
}

/// Format a second count as `1h 30m`.
pub fn format_duration(seconds: i64) -> String {
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let minutes = minutes % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else {
        format!("{minutes}m")
    }
}
