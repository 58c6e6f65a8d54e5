//! Core domain logic for the commit time tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Commits and projects mirrored from a remote host
//! - Attribution: estimating actual work time from commit timestamps
//! - Feature groups: resolving classifier output against known commits

mod attribution;
pub mod commit;
pub mod feature;
pub mod tunables;

pub use attribution::{AttributableCommit, Attribution, AttributionConfig, attribute};
pub use commit::{Commit, CommitSummary, InvalidProjectRef, Project, ProjectRef};
pub use feature::{FeatureAttribution, FeatureGroup, attribute_groups, classifier_input};
pub use tunables::{InvalidTunable, Tunables};
