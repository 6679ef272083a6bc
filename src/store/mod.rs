use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

pub mod candidates;
pub mod domains;
pub mod review;

pub use candidates::CandidateQueue;
pub use domains::DomainRegistry;
pub use review::ReviewQueue;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write store file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize store document: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Loads a store document, treating a missing, unreadable, or malformed
/// file as the empty default. Corruption costs the store its contents but
/// never the process its startup.
pub(crate) fn load_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return T::default(),
        Err(err) => {
            tracing::warn!(
                target: "store",
                path = %path.display(),
                error = %err,
                "failed to read store file; starting empty"
            );
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(doc) => doc,
        Err(err) => {
            tracing::warn!(
                target: "store",
                path = %path.display(),
                error = %err,
                "malformed store document; starting empty"
            );
            T::default()
        }
    }
}

/// Replaces the store file atomically: serialize to a temp file in the same
/// directory, fsync, rename over the target. A crash mid-save leaves either
/// the old document or the new one, never a truncated file.
pub(crate) fn save_atomic<T: Serialize>(path: &Path, doc: &T) -> StoreResult<()> {
    let io_err = |source: io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new(),
    }
    .map_err(io_err)?;

    let payload = serde_json::to_vec_pretty(doc)?;
    tmp.write_all(&payload).map_err(io_err)?;
    tmp.write_all(b"\n").map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}
