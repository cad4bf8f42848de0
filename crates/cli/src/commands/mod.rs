//! CLI Commands

pub mod analyze;
pub mod fix;
pub mod run;

/// How a command finished, mapped onto the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Work done (or nothing needed doing)
    Done,
    /// No report to patch from
    NoReport,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Done => 0,
            Outcome::NoReport => 2,
        }
    }
}
