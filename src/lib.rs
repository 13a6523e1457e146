//! Manage parameter-sweep simulation campaigns on a SLURM cluster
//!
//! A sweep root holds a `.glurmo` directory with `settings.json`, a script template and an sbatch
//! template. Setup expands list variables into a directory tree and renders per-run scripts at its
//! leaves; submit and cancel reconcile each leaf against the live queue and its result files.

pub mod error;
/// Typed settings, list variables, and the settings files
pub mod settings;
/// Scheduler commands, queue parsing, and job script rendering
pub mod slurm;
/// Directory tree expansion
pub mod sweep;
/// Per-leaf submit and cancel decisions
pub mod reconcile;
pub mod walk;
pub mod status;
