//! testmend Common Library
//!
//! The self-healing loop for browser test suites: run-result ingestion,
//! advisory diagnosis, report generation and report-driven patching.

pub mod advisory;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod patch;
pub mod report;
pub mod results;

// Re-export commonly used types
pub use advisory::{Advisor, AdvisoryError, HttpAdvisor};
pub use config::MendConfig;
pub use error::{Error, Result};
pub use patch::{ChangeLogEntry, PatchEngine, PatchOutcome, PatchSummary};
pub use report::{Report, ReportGenerator};
pub use results::{FailureRecord, RunResults};
