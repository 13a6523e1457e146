use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{info, warn};

use glurmo::error::SweepError;
use glurmo::settings::load;
use glurmo::slurm::command::{Slurm, SlurmCommands, SystemRunner};
use glurmo::slurm::queue::CancelState;
use glurmo::status;
use glurmo::sweep::confirm::{AssumeYes, Confirm, TerminalConfirm};
use glurmo::sweep::expand::{cleanup_leaf_outputs, expand};
use glurmo::sweep::lock::SweepLock;
use glurmo::sweep::node::NodeKind;
use glurmo::walk::{walk, ErrorPolicy, Operation};

/// Set up, submit, cancel and monitor a parameter sweep on SLURM
#[derive(Parser, Debug)]
#[command(name = "glurmo", version, about)]
struct Args {
    /// Root directory of the sweep (contains .glurmo)
    sweep_dir: PathBuf,

    /// Expand list variables and render scripts for every run
    #[arg(long)]
    setup: bool,

    /// Submit up to N pending runs in every leaf directory
    #[arg(long, value_name = "N")]
    submit: Option<usize>,

    /// Cancel up to N queued jobs in every leaf directory
    #[arg(long, value_name = "N")]
    cancel: Option<usize>,

    /// Job states --cancel may target
    #[arg(long, value_enum, ignore_case = true, value_delimiter = ',', default_values_t = vec![CancelState::Pending, CancelState::Running], requires = "cancel")]
    cancel_state: Vec<CancelState>,

    /// Report completed, queued and unsubmitted runs per leaf
    #[arg(long)]
    status: bool,

    /// What to do when a leaf fails [default: continue for submit, abort for cancel]
    #[arg(long, value_enum)]
    on_error: Option<ErrorPolicy>,

    /// Do not ask before setting up in a non-empty directory
    #[arg(long, short = 'y')]
    yes: bool,

    #[arg(long, default_value = "squeue")]
    squeue: String,

    #[arg(long, default_value = "sbatch")]
    sbatch: String,

    #[arg(long, default_value = "scancel")]
    scancel: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let sweep_dir = args.sweep_dir.canonicalize()
        .with_context(|| format!("could not get absolute path to {}", args.sweep_dir.display()))?;
    info!("Managing {}", sweep_dir.display());

    if !args.setup && args.submit.is_none() && args.cancel.is_none() && !args.status {
        return Err(anyhow!("nothing to do: pass --setup, --submit, --cancel or --status"));
    }

    let commands = SlurmCommands { squeue: args.squeue.clone(), sbatch: args.sbatch.clone(), scancel: args.scancel.clone() };
    let slurm = Slurm::new(SystemRunner, commands);

    if args.setup {
        let confirm: &dyn Confirm = match args.yes {
            true => &AssumeYes,
            false => &TerminalConfirm,
        };
        run_setup(&sweep_dir, confirm)?;
    }

    if let Some(quota) = args.submit {
        let op = Operation::Submit { quota };
        let submitted = run_walk(&sweep_dir, &op, args.on_error, &slurm)?;
        println!("Successfully submitted {} jobs", submitted);
    }

    if let Some(quota) = args.cancel {
        let op = Operation::Cancel { quota, states: args.cancel_state.clone() };
        let cancelled = run_walk(&sweep_dir, &op, args.on_error, &slurm)?;
        println!("Successfully cancelled {} jobs", cancelled);
    }

    if args.status {
        let leaves = status::collect(&sweep_dir, &slurm)
            .with_context(|| format!("could not check status of {}", sweep_dir.display()))?;
        for leaf in &leaves {
            println!("{}", leaf);
        }
        let completed: usize = leaves.iter().map(|leaf| leaf.completed).sum();
        let not_submitted: usize = leaves.iter().map(|leaf| leaf.not_submitted).sum();
        let mut total = format!("total: {} leaves, {} completed", leaves.len(), completed);
        for (state, count) in status::totals(&leaves) {
            total.push_str(&format!(", {} {}", count, state));
        }
        println!("{}, {} not submitted", total, not_submitted);
    }

    Ok(())
}

fn run_setup(sweep_dir: &Path, confirm: &dyn Confirm) -> Result<()> {
    let settings = load::load(sweep_dir)
        .with_context(|| format!("could not load settings of {}", sweep_dir.display()))?;
    let _lock = SweepLock::acquire(sweep_dir)?;

    match expand(sweep_dir, &settings, true, confirm) {
        Ok(NodeKind::Leaf) => println!("Set up {} runs in {}", settings.n_sims()?, sweep_dir.display()),
        Ok(NodeKind::Sweep) => println!("Set up sweep in {}", sweep_dir.display()),
        Err(err) => {
            let root_is_leaf = settings.first_list_variable().is_none();
            if root_is_leaf && !matches!(err, SweepError::UserCancelled) {
                if let Err(cleanup_err) = cleanup_leaf_outputs(sweep_dir) {
                    warn!("Could not remove `scripts` and `slurm` in {}, please remove manually: {}", sweep_dir.display(), cleanup_err);
                }
            }
            return Err(anyhow!(err)).with_context(|| format!("setup of {} failed", sweep_dir.display()));
        }
    }
    Ok(())
}

fn run_walk(sweep_dir: &Path, op: &Operation, on_error: Option<ErrorPolicy>, slurm: &Slurm<SystemRunner>) -> Result<usize> {
    load::settings_dir(sweep_dir)?;
    let _lock = SweepLock::acquire(sweep_dir)?;
    let policy = on_error.unwrap_or_else(|| op.default_policy());
    info!("Running {} with {:?} policy", op, policy);

    walk(sweep_dir, op, policy, slurm)
        .map_err(|failure| {
            println!("Acted on {} jobs before stopping", failure.count);
            anyhow!(failure)
        })
        .with_context(|| format!("could not {} in {}", op, sweep_dir.display()))
}
