use crate::config::Environment;
use std::fmt;

pub mod vercel;


pub use vercel::VercelCli;

/// Result of pushing one variable into one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The tool exited with status 0.
    Success,
    /// The tool exited non-zero; carries its trimmed stderr.
    ToolError(String),
    /// The tool did not exit in time and was killed.
    Timeout,
    /// The tool could not be started or fed its input.
    LaunchError(String),
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success)
    }
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallOutcome::Success => f.write_str("ok"),
            CallOutcome::ToolError(msg) | CallOutcome::LaunchError(msg) => f.write_str(msg),
            CallOutcome::Timeout => f.write_str("Timeout"),
        }
    }
}

/// A command-line tool that can store a variable in a platform environment.
///
/// Implementations never return errors: every failure is folded into the
/// returned [`CallOutcome`] so the caller can move on to the next pair.
pub trait EnvTool: Send + Sync {
    /// Stores `value` under `name` in `environment`, marked sensitive.
    fn add(&self, name: &str, value: &str, environment: Environment) -> CallOutcome;

    /// Returns the name of this tool for display purposes
    fn name(&self) -> &str;
}
