use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Seek, SeekFrom, Write},
    path::PathBuf,
    process,
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::infrastructure::directories::ResolvedPaths;

const LOCK_FILENAME: &str = ".mailsweep.lock";

/// Advisory lock on the data directory so two daemons cannot rewrite the
/// same store files concurrently. Held for the process lifetime.
#[derive(Debug)]
pub struct InstanceGuard {
    file: File,
    path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    started_at: i64,
}

impl InstanceGuard {
    pub fn acquire(paths: &ResolvedPaths) -> Result<Self> {
        let lock_path = paths.data_dir.join(LOCK_FILENAME);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("failed to open lock file {}", lock_path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                let holder = fs::read_to_string(&lock_path)
                    .ok()
                    .and_then(|raw| serde_json::from_str::<LockInfo>(&raw).ok());
                return Err(match holder {
                    Some(info) => anyhow!(
                        "another mailsweep instance (pid {}) holds the data directory lock",
                        info.pid
                    ),
                    None => anyhow!("another mailsweep instance holds the data directory lock"),
                });
            }
            Err(err) => return Err(err.into()),
        }

        let info = LockInfo {
            pid: process::id(),
            started_at: Utc::now().timestamp_millis(),
        };
        let payload = serde_json::to_vec(&info)?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&payload)?;
        file.sync_all()?;

        tracing::info!(
            target: "lifecycle",
            pid = info.pid,
            path = %lock_path.display(),
            "acquired instance lock"
        );
        Ok(Self {
            file,
            path: lock_path,
        })
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != ErrorKind::NotFound {
                tracing::warn!(
                    target: "lifecycle",
                    path = %self.path.display(),
                    error = %err,
                    "failed to remove lock file on shutdown"
                );
            }
        }
    }
}
