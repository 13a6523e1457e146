use std::path::Path;
use std::process::Command;

use log::{debug, info, warn};

use crate::error::{Result, SweepError};
use crate::slurm::queue::{parse_queue, QueueRecord, QUEUE_FORMAT};

/// Prefix of sbatch output when a job is accepted
pub const SUBMITTED_PREFIX: &str = "Submitted batch job";

/// Run an external program to completion and capture its standard output
///
/// Failing to start the program or a non-zero exit status is a [`SweepError::SchedulerUnavailable`].
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<String>;
}

/// Runs commands as child processes of this one, blocking until they exit
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<String> {
        let mut command = Command::new(program);
        let cmd = command.args(args);
        info!("Running {:?}", &cmd);

        let output = cmd.output().map_err(|err| SweepError::SchedulerUnavailable {
            command: describe(program, args),
            reason: err.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("{} exited with {}", program, output.status);
            return Err(SweepError::SchedulerUnavailable {
                command: describe(program, args),
                reason: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Scheduler programs to invoke, overridable from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlurmCommands {
    pub squeue: String,
    pub sbatch: String,
    pub scancel: String,
}

impl Default for SlurmCommands {
    fn default() -> Self {
        SlurmCommands {
            squeue: "squeue".to_string(),
            sbatch: "sbatch".to_string(),
            scancel: "scancel".to_string(),
        }
    }
}

/// How sbatch answered a submission that ran successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Accepted { job_id: String },
    Rejected { response: String },
}

/// The scheduler, seen through queue listing, submission and cancellation commands
pub struct Slurm<R> {
    runner: R,
    commands: SlurmCommands,
}

impl<R: CommandRunner> Slurm<R> {
    pub fn new(runner: R, commands: SlurmCommands) -> Slurm<R> {
        Slurm { runner, commands }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Every job of the calling user currently known to the scheduler, in queue listing order
    pub fn all_jobs(&self) -> Result<Vec<QueueRecord>> {
        let args = vec!["--me".to_string(), QUEUE_FORMAT.to_string()];
        let output = self.runner.run(&self.commands.squeue, &args)?;
        Ok(parse_queue(&output))
    }

    /// Queued jobs whose name starts with `prefix`, in queue listing order
    pub fn current_jobs(&self, prefix: &str) -> Result<Vec<QueueRecord>> {
        let jobs: Vec<QueueRecord> = self.all_jobs()?
            .into_iter()
            .filter(|job| job.name.starts_with(prefix))
            .collect();
        debug!("{} queued jobs match prefix {}", jobs.len(), prefix);
        Ok(jobs)
    }

    pub fn submit(&self, script: &Path) -> Result<Submission> {
        let args = vec![script.display().to_string()];
        let output = self.runner.run(&self.commands.sbatch, &args)?;
        let response = output.trim();
        match response.strip_prefix(SUBMITTED_PREFIX) {
            Some(job_id) => Ok(Submission::Accepted { job_id: job_id.trim().to_string() }),
            None => Ok(Submission::Rejected { response: response.to_string() }),
        }
    }

    pub fn cancel(&self, job_id: &str) -> Result<()> {
        let args = vec![job_id.to_string()];
        self.runner.run(&self.commands.scancel, &args)?;
        Ok(())
    }
}

fn describe(program: &str, args: &[String]) -> String {
    std::iter::once(program.to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<String>>()
        .join(" ")
}
