//! testmend CLI
//!
//! Command-line orchestration of the self-healing loop: run the suite,
//! write an auto-repair report, apply the fixes it calls for.

pub mod commands;
pub mod output;
pub mod runner;
