use std::io;
use std::path::Path;

use log::{info, warn};

use crate::error::{Result, SweepError};
use crate::reconcile::state::LeafState;
use crate::reconcile::{Interrupted, Progress};
use crate::settings::Settings;
use crate::slurm::command::{CommandRunner, Slurm, Submission};
use crate::slurm::job::{slurm_path, RESULTS_DIR};
use crate::slurm::queue::job_prefix;

/// Observe a leaf's runs against the live queue and its results directory
pub fn observe<R: CommandRunner>(leaf: &Path, settings: &Settings, slurm: &Slurm<R>) -> Result<LeafState> {
    let id = settings.id()?;
    let queue = slurm.current_jobs(&job_prefix(id))?;
    LeafState::observe(
        settings.n_sims()?,
        id,
        &queue,
        &leaf.join(RESULTS_DIR),
        settings.result_extension(),
    )
}

/// Submit up to `quota` pending runs of a leaf, lowest index first
///
/// Only submissions sbatch reports as accepted count toward the quota; rejected ones are logged and
/// skipped. Failing to run sbatch stops the loop, reporting the jobs already submitted.
pub fn submit_leaf<R: CommandRunner>(leaf: &Path, settings: &Settings, quota: usize, slurm: &Slurm<R>) -> Progress {
    let interrupted = |count: usize, error: SweepError| Interrupted { dir: leaf.to_path_buf(), count, error };

    let state = observe(leaf, settings, slurm).map_err(|err| interrupted(0, err))?;
    let pending = state.pending();
    info!(
        "{}: {} submitted, {} completed, {} pending",
        leaf.display(), state.submitted.len(), state.completed.len(), pending.len()
    );

    let mut submitted = 0;
    for index in pending {
        if submitted >= quota {
            break;
        }
        let script = slurm_path(leaf, index);
        if !script.is_file() {
            let missing = io::Error::new(io::ErrorKind::NotFound, "submission script is missing, rerun setup");
            return Err(interrupted(submitted, SweepError::io(script, missing)));
        }
        match slurm.submit(&script) {
            Ok(Submission::Accepted { job_id }) => {
                info!("Submitted run {} of {} as job {}", index, leaf.display(), job_id);
                submitted += 1;
            }
            Ok(Submission::Rejected { response }) => {
                warn!("Could not submit run {} of {}: {}", index, leaf.display(), response);
            }
            Err(err) => return Err(interrupted(submitted, err)),
        }
    }

    Ok(submitted)
}
