//! Sync command for explicitly refreshing a project's commit mirror.

use std::io::Write;

use anyhow::{Context, Result};
use ct_core::ProjectRef;
use ct_db::Database;
use ct_sync::{SyncMode, SyncStats};

use super::util::{format_timestamp, runtime, sync_controller};
use crate::Config;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    config: &Config,
    project: &ProjectRef,
    full: bool,
) -> Result<()> {
    let controller = sync_controller(config)?;
    let mode = if full {
        SyncMode::Full
    } else {
        SyncMode::Incremental
    };
    let stats = runtime()?
        .block_on(controller.sync_project(db, project, mode))
        .with_context(|| format!("failed to sync {project}"))?;
    render(writer, &stats)
}

/// Write a human-readable summary of a sync pass.
pub fn render<W: Write>(writer: &mut W, stats: &SyncStats) -> Result<()> {
    let mode = match stats.mode {
        SyncMode::Incremental => "incremental",
        SyncMode::Full => "full",
    };
    writeln!(
        writer,
        "Synced {} ({mode}): {} fetched, {} saved, {} skipped, {} failed",
        stats.project.full_name,
        stats.total_fetched,
        stats.saved,
        stats.skipped,
        stats.failed()
    )?;

    for failure in &stats.failures {
        writeln!(writer, "  failed {}: {}", failure.commit_id, failure.reason)?;
    }
    if let Some(reason) = &stats.interrupted {
        writeln!(writer, "  incomplete: {reason}")?;
    }
    if stats.more_pending {
        writeln!(writer, "  more history pending since the watermark")?;
    }

    match stats.project.last_sync_at {
        Some(at) if stats.watermark_advanced => {
            writeln!(writer, "Watermark: {}", format_timestamp(at))?;
        }
        Some(at) => {
            writeln!(writer, "Watermark unchanged: {}", format_timestamp(at))?;
        }
        None => {
            writeln!(writer, "Watermark not set")?;
        }
    }
    if stats.needs_full_sync {
        writeln!(
            writer,
            "History may be incomplete; run `ct sync {} --full`",
            stats.project.full_name
        )?;
    }
    Ok(())
}
