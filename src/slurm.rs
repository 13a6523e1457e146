//! Talk to SLURM and render job scripts from templates

/// Run squeue, sbatch and scancel
pub mod command;
/// Parse squeue output and job names
pub mod queue;
/// Read configuration templates and render them with sweep settings
pub mod job;
