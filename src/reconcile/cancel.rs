use std::path::Path;

use log::info;

use crate::error::SweepError;
use crate::reconcile::{Interrupted, Progress};
use crate::settings::Settings;
use crate::slurm::command::{CommandRunner, Slurm};
use crate::slurm::queue::{job_prefix, CancelState};

/// Cancel up to `quota` queued jobs of a leaf whose state is one of `states`
///
/// Jobs are taken in queue listing order. A failing scancel stops the loop; cancellations already
/// issued stay in effect.
pub fn cancel_leaf<R: CommandRunner>(
    leaf: &Path,
    settings: &Settings,
    quota: usize,
    states: &[CancelState],
    slurm: &Slurm<R>,
) -> Progress {
    let interrupted = |count: usize, error: SweepError| Interrupted { dir: leaf.to_path_buf(), count, error };

    let id = settings.id().map_err(|err| interrupted(0, err))?;
    let queue = slurm.current_jobs(&job_prefix(id)).map_err(|err| interrupted(0, err))?;

    let mut cancelled = 0;
    for record in queue.iter().filter(|record| states.iter().any(|state| state.matches(&record.state))) {
        if cancelled >= quota {
            break;
        }
        slurm.cancel(&record.job_id).map_err(|err| interrupted(cancelled, err))?;
        info!("Cancelled job {} ({}, {})", record.job_id, record.name, record.state);
        cancelled += 1;
    }

    Ok(cancelled)
}
