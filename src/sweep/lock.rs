use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{info, warn};

use crate::error::{Result, SweepError};
use crate::settings::SETTINGS_DIR;

pub const LOCK_FILE: &str = "lock";

/// Exclusive hold on a sweep tree for the duration of one operation
///
/// The lock is a file created with create-new semantics in the root's `.glurmo`, holding the pid and
/// acquisition time. It is removed on drop. A stale lock left by a killed process must be removed
/// by hand.
#[derive(Debug)]
pub struct SweepLock {
    path: PathBuf,
}

impl SweepLock {
    pub fn acquire(root: &Path) -> Result<SweepLock> {
        let path = root.join(SETTINGS_DIR).join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Err(SweepError::Locked { path }),
            Err(err) => return Err(SweepError::io(&path, err)),
        };
        writeln!(file, "pid {}\nacquired {}", std::process::id(), Utc::now().to_rfc3339())
            .map_err(|err| SweepError::io(&path, err))?;
        info!("Acquired sweep lock {}", path.display());
        Ok(SweepLock { path })
    }
}

impl Drop for SweepLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!("Could not remove sweep lock {}: {}", self.path.display(), err);
        }
    }
}
