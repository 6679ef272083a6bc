use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

use crate::config::DirectoryConfig;

const DOMAINS_FILE: &str = "spam-domains.json";
const CANDIDATES_FILE: &str = "spam-candidates.json";
const REVIEW_FILE: &str = "pending-review.json";

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub logs_dir: PathBuf,
    pub data_dir: PathBuf,
    pub domains_path: PathBuf,
    pub candidates_path: PathBuf,
    pub review_path: PathBuf,
}

/// Creates the data and log directories and resolves the three store file
/// paths. A write probe runs up front so a read-only data directory fails
/// at startup instead of on the first store save.
pub fn ensure_directories(cfg: &DirectoryConfig) -> Result<ResolvedPaths> {
    let logs_dir = ensure_dir(&cfg.logs_dir)?;
    let data_dir = ensure_dir(&cfg.data_dir)?;

    let probe = data_dir.join(".write-test");
    fs::write(&probe, b"ok")
        .with_context(|| format!("data dir {} is not writable", data_dir.display()))?;
    fs::remove_file(&probe)?;

    Ok(ResolvedPaths {
        logs_dir,
        domains_path: data_dir.join(DOMAINS_FILE),
        candidates_path: data_dir.join(CANDIDATES_FILE),
        review_path: data_dir.join(REVIEW_FILE),
        data_dir,
    })
}

fn ensure_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    if !dir.exists() {
        fs::create_dir_all(&dir).with_context(|| format!("failed to create directory {path}"))?;
    }
    Ok(dir.canonicalize().unwrap_or(dir))
}
