//! Per-leaf progress of a sweep tree

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::reconcile::state::LeafState;
use crate::settings::load;
use crate::slurm::command::{CommandRunner, Slurm};
use crate::slurm::job::RESULTS_DIR;
use crate::slurm::queue::{job_index, job_prefix, JobState, QueueRecord};
use crate::sweep::node::{child_nodes, node_kind, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafStatus {
    pub dir: PathBuf,
    pub id: String,
    pub n_sims: usize,
    pub completed: usize,
    /// Queued jobs without a result yet, by scheduler state
    pub queued: BTreeMap<JobState, usize>,
    pub not_submitted: usize,
}

impl fmt::Display for LeafStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {} runs, {} completed", self.id, self.n_sims, self.completed)?;
        for (state, count) in &self.queued {
            write!(f, ", {} {}", count, state)?;
        }
        write!(f, ", {} not submitted", self.not_submitted)
    }
}

/// Status of every leaf below `root`, from a single queue snapshot
pub fn collect<R: CommandRunner>(root: &Path, slurm: &Slurm<R>) -> Result<Vec<LeafStatus>> {
    let queue = slurm.all_jobs()?;
    let mut leaves = Vec::new();
    collect_into(root, &queue, &mut leaves)?;
    Ok(leaves)
}

fn collect_into(dir: &Path, queue: &[QueueRecord], leaves: &mut Vec<LeafStatus>) -> Result<()> {
    match node_kind(dir)? {
        NodeKind::Sweep => {
            for child in child_nodes(dir)? {
                collect_into(&child, queue, leaves)?;
            }
        }
        NodeKind::Leaf => leaves.push(leaf_status(dir, queue)?),
    }
    Ok(())
}

fn leaf_status(dir: &Path, queue: &[QueueRecord]) -> Result<LeafStatus> {
    let settings = load::load(dir)?;
    let id = settings.id()?;
    let state = LeafState::observe(
        settings.n_sims()?,
        id,
        queue,
        &dir.join(RESULTS_DIR),
        settings.result_extension(),
    )?;

    let prefix = job_prefix(id);
    let mut queued = BTreeMap::new();
    for record in queue.iter().filter(|record| record.name.starts_with(&prefix)) {
        if state.completed.contains(&job_index(&record.name)?) {
            continue;
        }
        *queued.entry(record.state.clone()).or_insert(0) += 1;
    }

    Ok(LeafStatus {
        dir: dir.to_path_buf(),
        id: id.to_string(),
        n_sims: state.n_sims,
        completed: state.completed.len(),
        queued,
        not_submitted: state.pending().len(),
    })
}

/// Sum of queued jobs by state across leaves
pub fn totals(leaves: &[LeafStatus]) -> BTreeMap<JobState, usize> {
    let mut totals = BTreeMap::new();
    for leaf in leaves {
        for (state, count) in &leaf.queued {
            *totals.entry(state.clone()).or_insert(0) += count;
        }
    }
    totals
}
