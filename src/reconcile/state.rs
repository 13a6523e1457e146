use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{Result, SweepError};
use crate::slurm::queue::{file_index, job_index, job_prefix, QueueRecord};

pub const RESULT_PREFIX: &str = "results___";

/// Where each run of a leaf stands at the moment of observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafState {
    pub n_sims: usize,
    /// Indices with a job in the scheduler queue
    pub submitted: BTreeSet<usize>,
    /// Indices with a result file
    pub completed: BTreeSet<usize>,
}

impl LeafState {
    pub fn observe(
        n_sims: usize,
        id: &str,
        queue: &[QueueRecord],
        results_dir: &Path,
        result_extension: &str,
    ) -> Result<LeafState> {
        Ok(LeafState {
            n_sims,
            submitted: submitted_indices(queue, id)?,
            completed: completed_indices(results_dir, result_extension)?,
        })
    }

    /// Runs neither queued nor completed, in ascending order
    pub fn pending(&self) -> Vec<usize> {
        (0..self.n_sims)
            .filter(|i| !self.submitted.contains(i) && !self.completed.contains(i))
            .collect()
    }

    /// Queued runs, excluding any that already have a result
    ///
    /// A job can finish between the queue snapshot and the results scan; completion wins.
    pub fn running(&self) -> BTreeSet<usize> {
        self.submitted.difference(&self.completed).copied().collect()
    }
}

/// Indices of queued jobs named `{id}___{index}`
///
/// Records are expected to be pre-filtered by the `{id}___` prefix; a record with that prefix whose
/// index does not parse is an error rather than being skipped.
pub fn submitted_indices(queue: &[QueueRecord], id: &str) -> Result<BTreeSet<usize>> {
    let prefix = job_prefix(id);
    queue.iter()
        .filter(|record| record.name.starts_with(&prefix))
        .map(|record| job_index(&record.name))
        .collect()
}

/// Indices with a `results___{index}{extension}` file in `results_dir`
///
/// Files without the `results___` prefix or with another extension are ignored. With an empty
/// extension any file after the index is accepted.
pub fn completed_indices(results_dir: &Path, result_extension: &str) -> Result<BTreeSet<usize>> {
    let entries = fs::read_dir(results_dir).map_err(|err| SweepError::io(results_dir, err))?;
    let mut completed = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|err| SweepError::io(results_dir, err))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(RESULT_PREFIX) || !name.ends_with(result_extension) {
            debug!("Ignoring {} in {}", name, results_dir.display());
            continue;
        }
        let index = file_index(&name)?;
        if !result_extension.is_empty() && name != format!("{}{}{}", RESULT_PREFIX, index, result_extension) {
            return Err(SweepError::malformed(
                format!("result file `{}`", name),
                format!("expected `{}{}{}`", RESULT_PREFIX, index, result_extension),
            ));
        }
        completed.insert(index);
    }
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::slurm::queue::JobState;

    fn record(job_id: &str, name: &str, state: JobState) -> QueueRecord {
        QueueRecord { job_id: job_id.to_string(), name: name.to_string(), state }
    }

    #[test]
    fn three_sources_reconcile_into_pending() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("results___1.csv"), "").unwrap();
        let queue = vec![
            record("1", "sim___0", JobState::Running),
            record("2", "sim___2", JobState::Pending),
        ];

        let state = LeafState::observe(4, "sim", &queue, dir.path(), ".csv").unwrap();

        assert_eq!(state.submitted, BTreeSet::from([0, 2]));
        assert_eq!(state.completed, BTreeSet::from([1]));
        assert_eq!(state.pending(), vec![3]);
    }

    #[test]
    fn completed_wins_over_submitted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("results___0.csv"), "").unwrap();
        let queue = vec![record("1", "sim___0", JobState::Running)];

        let state = LeafState::observe(2, "sim", &queue, dir.path(), ".csv").unwrap();

        assert_eq!(state.pending(), vec![1]);
        assert!(state.running().is_empty());
    }

    #[test]
    fn sibling_ids_sharing_a_prefix_do_not_match() {
        let queue = vec![
            record("1", "sim_1___0", JobState::Running),
            record("2", "sim_10___5", JobState::Running),
        ];
        assert_eq!(submitted_indices(&queue, "sim_1").unwrap(), BTreeSet::from([0]));
    }

    #[test]
    fn composite_ids_with_spaces_match_their_jobs() {
        let queue = crate::slurm::queue::parse_queue(
            "JOBID NAME STATE\n1 sim_low noise___2 RUNNING\n2 sim_high noise___0 PENDING\n",
        );
        assert_eq!(submitted_indices(&queue, "sim_low noise").unwrap(), BTreeSet::from([2]));
    }

    #[test]
    fn malformed_queued_name_is_an_error() {
        let queue = vec![record("1", "sim___zero", JobState::Running)];
        assert!(matches!(submitted_indices(&queue, "sim"), Err(SweepError::MalformedName { .. })));
    }

    #[test]
    fn other_files_in_results_are_ignored() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("results___3.csv"), "").unwrap();
        fs::write(dir.path().join("results___4.csv.tmp"), "").unwrap();
        fs::write(dir.path().join("README"), "").unwrap();

        assert_eq!(completed_indices(dir.path(), ".csv").unwrap(), BTreeSet::from([3]));
    }

    #[test]
    fn empty_extension_accepts_any_result_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("results___3.rds"), "").unwrap();
        fs::write(dir.path().join("results___5"), "").unwrap();

        assert_eq!(completed_indices(dir.path(), "").unwrap(), BTreeSet::from([3, 5]));
    }

    #[test]
    fn malformed_result_name_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("results___x.csv"), "").unwrap();
        assert!(matches!(completed_indices(dir.path(), ".csv"), Err(SweepError::MalformedName { .. })));
    }

    #[test]
    fn missing_results_directory_is_an_io_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("results");
        assert!(matches!(completed_indices(&missing, ".csv"), Err(SweepError::Io { .. })));
    }
}
