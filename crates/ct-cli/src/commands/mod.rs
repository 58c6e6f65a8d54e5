//! CLI subcommand implementations.

pub mod analyze;
pub mod commits;
pub mod predict;
pub mod repos;
pub mod status;
pub mod sync;
mod util;

pub use util::open_database;
