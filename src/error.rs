//! Error kinds shared by every sweep operation

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SweepError>;

#[derive(Error, Debug)]
pub enum SweepError {
    /// A settings directory, settings file, or template is missing
    #[error("could not find {what} at {}", .path.display())]
    NotFound { path: PathBuf, what: &'static str },
    /// Malformed settings, list syntax, or node marker
    #[error("could not parse {context}: {reason}")]
    Parse { context: String, reason: String },
    /// A queue job name or result file name that claims to belong to a leaf but does not parse
    #[error("malformed {context}: {reason}")]
    MalformedName { context: String, reason: String },
    /// A required setting is missing or has an unusable value
    #[error("invalid setting `{key}`: {reason}")]
    Validation { key: String, reason: String },
    /// The legacy settings format repeats a key inside one section
    #[error("duplicate setting `{key}` on line {line}")]
    DuplicateKey { key: String, line: usize },
    #[error("I/O error at {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("could not render template {}: {reason}", .path.display())]
    Template { path: PathBuf, reason: String },
    /// An external scheduler command could not be run or exited non-zero
    #[error("could not run command `{command}`: {reason}")]
    SchedulerUnavailable { command: String, reason: String },
    #[error("setup was cancelled by user")]
    UserCancelled,
    #[error("list variable `{variable}` contains an empty list")]
    EmptyList { variable: String },
    /// Another invocation holds the sweep lock
    #[error("sweep is locked by another invocation ({})", .path.display())]
    Locked { path: PathBuf },
}

impl SweepError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> SweepError {
        SweepError::Io { path: path.into(), source }
    }

    pub fn parse(context: impl Into<String>, reason: impl Into<String>) -> SweepError {
        SweepError::Parse { context: context.into(), reason: reason.into() }
    }

    pub fn malformed(context: impl Into<String>, reason: impl Into<String>) -> SweepError {
        SweepError::MalformedName { context: context.into(), reason: reason.into() }
    }

    pub fn validation(key: impl Into<String>, reason: impl Into<String>) -> SweepError {
        SweepError::Validation { key: key.into(), reason: reason.into() }
    }

    /// Settings problems abort a whole tree operation, whatever the walk error policy
    ///
    /// Malformed job or result names are local to one leaf and follow the policy.
    pub fn is_settings_error(&self) -> bool {
        matches!(
            self,
            SweepError::Parse { .. }
                | SweepError::Validation { .. }
                | SweepError::DuplicateKey { .. }
                | SweepError::EmptyList { .. }
                | SweepError::NotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_errors_are_fatal_but_scheduler_errors_are_not() {
        assert!(SweepError::validation("general.id", "missing").is_settings_error());
        assert!(SweepError::parse("list", "missing @[").is_settings_error());
        let unavailable = SweepError::SchedulerUnavailable { command: "sbatch".into(), reason: "gone".into() };
        assert!(!unavailable.is_settings_error());
        assert!(!SweepError::UserCancelled.is_settings_error());
        assert!(!SweepError::malformed("file name `results___x.csv`", "could not parse file number").is_settings_error());
    }

    #[test]
    fn display_names_the_path() {
        let err = SweepError::io("/tmp/sweep/slurm", io::Error::new(io::ErrorKind::Other, "disk full"));
        let message = err.to_string();
        assert!(message.contains("/tmp/sweep/slurm"));
        assert!(message.contains("disk full"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
