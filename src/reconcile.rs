//! Decide which runs of a leaf directory to submit or cancel
//!
//! Run state is never stored. Each call derives it from three sources: the scheduler queue (matched
//! by `{id}___{index}` job names), the result files in `results`, and the `n_sims` runs generated
//! at setup.

/// Submitted, completed and pending runs of a leaf
pub mod state;
/// Bounded submission loop
pub mod submit;
/// Bounded cancellation loop
pub mod cancel;

use std::path::PathBuf;

use thiserror::Error;

use crate::error::SweepError;

/// An operation that stopped early, with the number of jobs it had already acted on
#[derive(Error, Debug)]
#[error("in directory `{}` (after {count} jobs): {error}", .dir.display())]
pub struct Interrupted {
    /// Directory in which the error happened
    pub dir: PathBuf,
    pub count: usize,
    #[source]
    pub error: SweepError,
}

/// Number of jobs acted on, or how far an operation got before failing
pub type Progress = Result<usize, Interrupted>;
