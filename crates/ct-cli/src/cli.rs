//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ct_core::ProjectRef;

/// Commit time tracker.
///
/// Mirrors GitHub commit history locally, groups commits into features with
/// an LLM, and estimates the actual work time behind each feature.
#[derive(Debug, Parser)]
#[command(name = "ct", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sync commit history for a repository.
    Sync {
        /// Repository as owner/repo.
        project: ProjectRef,

        /// Walk the whole history instead of one page since the last sync.
        #[arg(long)]
        full: bool,
    },

    /// List stored commits, syncing first when the mirror is stale.
    Commits {
        /// Repository as owner/repo.
        project: ProjectRef,

        /// Maximum number of commits to show.
        #[arg(long)]
        limit: Option<usize>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Group commits into features and estimate the time spent on each.
    Analyze {
        /// Repository as owner/repo.
        project: ProjectRef,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Predict the work time of a new feature from a repository's history.
    Predict {
        /// Repository as owner/repo.
        project: ProjectRef,

        /// Description of the feature to estimate.
        description: String,
    },

    /// List repositories visible to the configured GitHub token.
    Repos {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show synced projects and their watermarks.
    Status,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_project_argument() {
        let cli = Cli::try_parse_from(["ct", "sync", "octo/repo", "--full"]).unwrap();
        match cli.command {
            Some(Commands::Sync { project, full }) => {
                assert_eq!(project, ProjectRef::new("octo", "repo"));
                assert!(full);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_project() {
        assert!(Cli::try_parse_from(["ct", "commits", "not-a-repo"]).is_err());
    }
}
