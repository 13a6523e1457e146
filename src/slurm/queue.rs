use std::fmt;

use clap::ValueEnum;
use log::warn;

use crate::error::{Result, SweepError};
use crate::settings::JOB_SEPARATOR;

/// squeue output columns: job id, job name, job state
pub const QUEUE_FORMAT: &str = "--format=%.18i %.200j %.12T";

/// Scheduler state of a queued job, as reported by squeue
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobState {
    Pending,
    Running,
    Other(String),
}

impl JobState {
    pub fn parse(state: &str) -> JobState {
        match state {
            "PENDING" => JobState::Pending,
            "RUNNING" => JobState::Running,
            other => JobState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "PENDING"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Other(state) => write!(f, "{}", state),
        }
    }
}

/// States a cancel request may target
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum CancelState {
    Pending,
    Running,
}

impl CancelState {
    pub fn matches(&self, state: &JobState) -> bool {
        matches!(
            (self, state),
            (CancelState::Pending, JobState::Pending) | (CancelState::Running, JobState::Running)
        )
    }
}

impl fmt::Display for CancelState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CancelState::Pending => write!(f, "PENDING"),
            CancelState::Running => write!(f, "RUNNING"),
        }
    }
}

/// One line of squeue output
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueRecord {
    pub job_id: String,
    pub name: String,
    pub state: JobState,
}

/// Parse squeue output, skipping the header row and blank lines
///
/// Lines may be wrapped in double quotes when the format string was quoted for a shell. The first
/// column is the job id and the last is the state; everything between them is the job name, which
/// may contain spaces. Lines too short to hold all three are skipped with a warning, since the
/// queue also lists jobs that belong to no sweep.
pub fn parse_queue(output: &str) -> Vec<QueueRecord> {
    output.lines()
        .skip(1)
        .map(|line| line.trim().trim_matches('"').trim())
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let record = parse_record(line);
            if record.is_none() {
                warn!("Skipping squeue line `{}`: expected job id, name and state", line);
            }
            record
        })
        .collect()
}

fn parse_record(line: &str) -> Option<QueueRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        [job_id, name @ .., state] if !name.is_empty() => Some(QueueRecord {
            job_id: job_id.to_string(),
            name: name.join(" "),
            state: JobState::parse(state),
        }),
        _ => None,
    }
}

/// Scheduler job name for index `index` of the directory with composite id `id`
pub fn job_name(id: &str, index: usize) -> String {
    format!("{}{}{}", id, JOB_SEPARATOR, index)
}

/// Prefix shared by every job name of the directory with composite id `id`
pub fn job_prefix(id: &str) -> String {
    format!("{}{}", id, JOB_SEPARATOR)
}

/// Index encoded in a job name of the form `{id}___{index}`
pub fn job_index(name: &str) -> Result<usize> {
    let parts: Vec<&str> = name.split(JOB_SEPARATOR).collect();
    match parts.as_slice() {
        [_, number] => number.parse::<usize>()
            .map_err(|_| SweepError::malformed(format!("job name `{}`", name), "could not parse job number")),
        _ => Err(SweepError::malformed(format!("job name `{}`", name), "malformed job name")),
    }
}

/// Index encoded in a result file name of the form `results___{index}{extension}`
///
/// Leading digits after the separator form the index; anything after them is the extension.
pub fn file_index(file_name: &str) -> Result<usize> {
    let (_, suffix) = file_name.split_once(JOB_SEPARATOR)
        .ok_or_else(|| SweepError::malformed(format!("file name `{}`", file_name), "missing `___` separator"))?;
    let digits: String = suffix.chars().take_while(char::is_ascii_digit).collect();
    digits.parse::<usize>()
        .map_err(|_| SweepError::malformed(format!("file name `{}`", file_name), "could not parse file number"))
}
