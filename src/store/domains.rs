use std::path::PathBuf;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::domain::{normalize_domain, SpamDomain};

use super::{load_or_default, save_atomic, StoreResult};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DomainsDoc {
    domains: Vec<SpamDomain>,
}

/// Durable set of confirmed-spam sender domains, backed by one flat JSON
/// document. All mutation happens under the store lock with a whole-file
/// atomic rewrite; matching is case-insensitive, stored casing upper.
pub struct DomainRegistry {
    path: PathBuf,
    entries: Mutex<Vec<SpamDomain>>,
}

impl DomainRegistry {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc: DomainsDoc = load_or_default(&path);
        Self {
            path,
            entries: Mutex::new(doc.domains),
        }
    }

    /// Adds a domain to the blocklist. Returns `false` without touching the
    /// file when the domain is already present under any casing.
    pub fn add(&self, domain: &str, reason: Option<&str>) -> StoreResult<bool> {
        let key = normalize_domain(domain);
        let mut entries = self.entries.lock();
        if entries.iter().any(|e| e.domain.eq_ignore_ascii_case(&key)) {
            return Ok(false);
        }

        let mut next = entries.clone();
        next.push(SpamDomain {
            domain: key,
            added_at: Utc::now(),
            reason: reason.map(str::to_string),
        });
        let doc = DomainsDoc { domains: next };
        save_atomic(&self.path, &doc)?;
        *entries = doc.domains;
        Ok(true)
    }

    pub fn contains(&self, domain: &str) -> bool {
        let key = normalize_domain(domain);
        self.entries
            .lock()
            .iter()
            .any(|e| e.domain.eq_ignore_ascii_case(&key))
    }

    /// Administrative removal; the triage pipeline itself never calls this.
    pub fn remove(&self, domain: &str) -> StoreResult<bool> {
        let key = normalize_domain(domain);
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        next.retain(|e| !e.domain.eq_ignore_ascii_case(&key));
        if next.len() == entries.len() {
            return Ok(false);
        }
        let doc = DomainsDoc { domains: next };
        save_atomic(&self.path, &doc)?;
        *entries = doc.domains;
        Ok(true)
    }

    /// Snapshot in insertion order.
    pub fn list(&self) -> Vec<SpamDomain> {
        self.entries.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.entries.lock().len()
    }
}
