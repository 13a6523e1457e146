//! Apply a submit or cancel operation to every leaf of a sweep tree

use std::fmt;
use std::path::Path;

use clap::ValueEnum;
use log::{debug, warn};

use crate::error::SweepError;
use crate::reconcile::cancel::cancel_leaf;
use crate::reconcile::submit::submit_leaf;
use crate::reconcile::{Interrupted, Progress};
use crate::settings::load;
use crate::slurm::command::{CommandRunner, Slurm};
use crate::slurm::queue::CancelState;
use crate::sweep::node::{child_nodes, node_kind, NodeKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Submit up to `quota` pending runs in every leaf
    Submit { quota: usize },
    /// Cancel up to `quota` queued jobs in `states` in every leaf
    Cancel { quota: usize, states: Vec<CancelState> },
}

impl Operation {
    /// Submissions keep going past a failing leaf; cancellations stop at the first one
    pub fn default_policy(&self) -> ErrorPolicy {
        match self {
            Operation::Submit { .. } => ErrorPolicy::Continue,
            Operation::Cancel { .. } => ErrorPolicy::Abort,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operation::Submit { quota } => write!(f, "submit {}", quota),
            Operation::Cancel { quota, states } => {
                let states: Vec<String> = states.iter().map(CancelState::to_string).collect();
                write!(f, "cancel {} in state {}", quota, states.join("/"))
            }
        }
    }
}

/// What happens to the rest of the tree when one leaf fails
///
/// Settings errors abort the walk under either policy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ErrorPolicy {
    /// Log the failure, count what the leaf managed, carry on with its siblings
    Continue,
    /// Stop the whole walk at the first failing leaf
    Abort,
}

/// Walk the tree below `dir` depth first, applying `op` to each leaf with the full quota
///
/// The quota is per leaf, not shared: submitting 5 across ten leaves may submit 50 jobs. Sweep
/// directories are visited in directory listing order.
pub fn walk<R: CommandRunner>(dir: &Path, op: &Operation, policy: ErrorPolicy, slurm: &Slurm<R>) -> Progress {
    let interrupted = |error: SweepError| Interrupted { dir: dir.to_path_buf(), count: 0, error };

    match node_kind(dir).map_err(interrupted)? {
        NodeKind::Leaf => {
            let settings = load::load(dir).map_err(interrupted)?;
            debug!("Applying {} to leaf {}", op, dir.display());
            match op {
                Operation::Submit { quota } => submit_leaf(dir, &settings, *quota, slurm),
                Operation::Cancel { quota, states } => cancel_leaf(dir, &settings, *quota, states, slurm),
            }
        }
        NodeKind::Sweep => {
            let mut total = 0;
            for child in child_nodes(dir).map_err(interrupted)? {
                match walk(&child, op, policy, slurm) {
                    Ok(count) => total += count,
                    Err(failure) => {
                        total += failure.count;
                        if policy == ErrorPolicy::Abort || failure.error.is_settings_error() {
                            return Err(Interrupted { count: total, ..failure });
                        }
                        warn!("Failed to {} {}", op, failure);
                    }
                }
            }
            Ok(total)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::tempdir;

    use super::*;
    use crate::settings::tests::sample_settings;
    use crate::settings::Settings;
    use crate::slurm::command::tests::{fake_slurm, FakeRunner};
    use crate::slurm::job::tests::{write_templates, SCRIPT, SLURM};
    use crate::slurm::job::SLURM_DIR;
    use crate::sweep::confirm::AssumeYes;
    use crate::sweep::expand::expand;

    /// Root `sim` with `alpha` in 1, 2, 3 and four runs per leaf
    fn sweep_tree() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        write_templates(dir.path(), SCRIPT, SLURM);
        let base = sample_settings();
        let mut script = base.script().clone();
        script.insert("alpha".to_string(), "@[1,2,3]".to_string());
        let settings = Settings::new(base.general().clone(), script, base.slurm().clone());
        expand(dir.path(), &settings, false, &AssumeYes).unwrap();
        dir
    }

    fn leaf(root: &Path, value: &str) -> PathBuf {
        root.join(format!("alpha_{}", value))
    }

    #[test]
    fn quota_applies_to_each_leaf() {
        let dir = sweep_tree();
        let slurm = fake_slurm(FakeRunner::with_queue("JOBID NAME STATE\n"));

        let submitted = walk(dir.path(), &Operation::Submit { quota: 2 }, ErrorPolicy::Continue, &slurm).unwrap();

        assert_eq!(submitted, 6);
    }

    #[test]
    fn continue_policy_skips_a_broken_leaf() {
        let dir = sweep_tree();
        fs::remove_dir_all(leaf(dir.path(), "2").join(SLURM_DIR)).unwrap();
        let slurm = fake_slurm(FakeRunner::with_queue("JOBID NAME STATE\n"));

        let submitted = walk(dir.path(), &Operation::Submit { quota: 1 }, ErrorPolicy::Continue, &slurm).unwrap();

        assert_eq!(submitted, 2);
    }

    #[test]
    fn abort_policy_stops_at_the_first_broken_leaf() {
        let dir = sweep_tree();
        for value in ["1", "2", "3"] {
            fs::remove_dir_all(leaf(dir.path(), value).join(SLURM_DIR)).unwrap();
        }
        let slurm = fake_slurm(FakeRunner::with_queue("JOBID NAME STATE\n"));

        let failure = walk(dir.path(), &Operation::Submit { quota: 1 }, ErrorPolicy::Abort, &slurm).unwrap_err();

        assert_eq!(failure.count, 0);
        assert!(matches!(failure.error, SweepError::Io { .. }));
    }

    #[test]
    fn settings_errors_abort_even_when_continuing() {
        let dir = sweep_tree();
        fs::write(leaf(dir.path(), "2").join(".glurmo").join("settings.json"), "{ broken").unwrap();
        let slurm = fake_slurm(FakeRunner::with_queue("JOBID NAME STATE\n"));

        let failure = walk(dir.path(), &Operation::Submit { quota: 1 }, ErrorPolicy::Continue, &slurm).unwrap_err();

        assert!(failure.error.is_settings_error());
        assert_eq!(failure.dir, leaf(dir.path(), "2"));
    }

    #[test]
    fn malformed_result_name_skips_only_its_leaf() {
        let dir = sweep_tree();
        fs::write(leaf(dir.path(), "1").join("results").join("results___x.csv"), "").unwrap();
        let slurm = fake_slurm(FakeRunner::with_queue("JOBID NAME STATE\n"));

        let submitted = walk(dir.path(), &Operation::Submit { quota: 1 }, ErrorPolicy::Continue, &slurm).unwrap();

        assert_eq!(submitted, 2);
        assert_eq!(slurm.runner().calls_to("sbatch").len(), 2);
    }

    #[test]
    fn foreign_jobs_with_spaces_do_not_block_submission() {
        let dir = sweep_tree();
        let slurm = fake_slurm(FakeRunner::with_queue(
            "JOBID NAME STATE\n5 my job RUNNING\n6 sim_1___0 RUNNING\n",
        ));

        let submitted = walk(dir.path(), &Operation::Submit { quota: 4 }, ErrorPolicy::Continue, &slurm).unwrap();

        assert_eq!(submitted, 11);
    }

    #[test]
    fn cancel_walks_every_leaf() {
        let dir = sweep_tree();
        let slurm = fake_slurm(FakeRunner::with_queue(
            "JOBID NAME STATE\n1 sim_1___0 RUNNING\n2 sim_2___0 PENDING\n3 sim_3___1 PENDING\n4 sim_3___2 PENDING\n",
        ));
        let op = Operation::Cancel { quota: 1, states: vec![CancelState::Pending] };

        let cancelled = walk(dir.path(), &op, op.default_policy(), &slurm).unwrap();

        assert_eq!(cancelled, 2);
        let mut calls = slurm.runner().calls_to("scancel");
        calls.sort();
        assert_eq!(calls, vec![vec!["2".to_string()], vec!["3".to_string()]]);
    }

    #[test]
    fn default_policies_differ_by_operation() {
        assert_eq!(Operation::Submit { quota: 1 }.default_policy(), ErrorPolicy::Continue);
        assert_eq!(Operation::Cancel { quota: 1, states: vec![] }.default_policy(), ErrorPolicy::Abort);
    }
}
