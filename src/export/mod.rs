//! Report export
//!
//! Renders the pipeline results as Markdown (`report.md`) and as
//! machine-readable JSON (`report.json`).

mod report;

pub use report::{ModelLeaderboard, Report, RunSummary, SplitSummary};
