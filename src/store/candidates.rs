use std::{collections::HashMap, path::PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::domain::{normalize_domain, SpamCandidate};

use super::{load_or_default, save_atomic, StoreResult};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CandidatesDoc {
    candidates: Vec<SpamCandidate>,
}

/// Durable queue of individually-suspicious messages awaiting a
/// domain-level decision. Keyed by `message_id`; duplicate adds are
/// rejected so re-running a batch cannot double-record evidence.
pub struct CandidateQueue {
    path: PathBuf,
    entries: Mutex<Vec<SpamCandidate>>,
}

impl CandidateQueue {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc: CandidatesDoc = load_or_default(&path);
        Self {
            path,
            entries: Mutex::new(doc.candidates),
        }
    }

    /// Records a candidate. Returns `false` when its `message_id` is
    /// already queued. The confidence score is clamped into [0, 1] here so
    /// no caller can persist an out-of-range value.
    pub fn add(&self, mut candidate: SpamCandidate) -> StoreResult<bool> {
        candidate.confidence_score = clamp_confidence(candidate.confidence_score);
        candidate.sender_domain = normalize_domain(&candidate.sender_domain);

        let mut entries = self.entries.lock();
        if entries.iter().any(|c| c.message_id == candidate.message_id) {
            return Ok(false);
        }

        let mut next = entries.clone();
        next.push(candidate);
        let doc = CandidatesDoc { candidates: next };
        save_atomic(&self.path, &doc)?;
        *entries = doc.candidates;
        Ok(true)
    }

    pub fn remove(&self, message_id: &str) -> StoreResult<bool> {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        next.retain(|c| c.message_id != message_id);
        if next.len() == entries.len() {
            return Ok(false);
        }
        let doc = CandidatesDoc { candidates: next };
        save_atomic(&self.path, &doc)?;
        *entries = doc.candidates;
        Ok(true)
    }

    /// Purges every candidate whose sender domain matches, case-insensitive.
    /// Idempotent; the approval sweep re-runs this safely.
    pub fn remove_for_domain(&self, domain: &str) -> StoreResult<usize> {
        let key = normalize_domain(domain);
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        next.retain(|c| !c.sender_domain.eq_ignore_ascii_case(&key));
        let removed = entries.len() - next.len();
        if removed == 0 {
            return Ok(0);
        }
        let doc = CandidatesDoc { candidates: next };
        save_atomic(&self.path, &doc)?;
        *entries = doc.candidates;
        Ok(removed)
    }

    pub fn remove_all(&self) -> StoreResult<()> {
        let mut entries = self.entries.lock();
        let doc = CandidatesDoc::default();
        save_atomic(&self.path, &doc)?;
        entries.clear();
        Ok(())
    }

    pub fn list(&self) -> Vec<SpamCandidate> {
        self.entries.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Groups queued candidates by normalized sender domain so the
    /// orchestrator can act on all evidence for a domain at once.
    pub fn group_by_domain(&self) -> HashMap<String, Vec<SpamCandidate>> {
        let entries = self.entries.lock();
        let mut groups: HashMap<String, Vec<SpamCandidate>> = HashMap::new();
        for candidate in entries.iter() {
            groups
                .entry(normalize_domain(&candidate.sender_domain))
                .or_default()
                .push(candidate.clone());
        }
        groups
    }
}

fn clamp_confidence(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn queue(dir: &tempfile::TempDir) -> CandidateQueue {
        CandidateQueue::open(dir.path().join("spam-candidates.json"))
    }

    fn candidate(message_id: &str, sender: &str, score: f64) -> SpamCandidate {
        let sender_domain = crate::domain::domain_of(sender).unwrap_or_default();
        SpamCandidate {
            message_id: message_id.to_string(),
            sender_email: sender.to_string(),
            sender_domain,
            subject: "You won".to_string(),
            spam_reason: "lottery scam".to_string(),
            confidence_score: score,
            received_at: Utc::now(),
            identified_at: Utc::now(),
        }
    }

    #[test]
    fn duplicate_message_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(&dir);
        assert!(q.add(candidate("m1", "a@spam.com", 0.4)).unwrap());
        assert!(!q.add(candidate("m1", "a@spam.com", 0.9)).unwrap());
        assert_eq!(q.count(), 1);
        assert_eq!(q.list()[0].confidence_score, 0.4);
    }

    #[test]
    fn confidence_is_clamped_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(&dir);
        q.add(candidate("hi", "a@x.com", 1.5)).unwrap();
        q.add(candidate("lo", "b@x.com", -0.5)).unwrap();
        q.add(candidate("nan", "c@x.com", f64::NAN)).unwrap();
        let by_id: HashMap<_, _> = q
            .list()
            .into_iter()
            .map(|c| (c.message_id.clone(), c.confidence_score))
            .collect();
        assert_eq!(by_id["hi"], 1.0);
        assert_eq!(by_id["lo"], 0.0);
        assert_eq!(by_id["nan"], 0.0);
    }

    #[test]
    fn groups_by_domain_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(&dir);
        q.add(candidate("m1", "a@Spam.Com", 0.5)).unwrap();
        q.add(candidate("m2", "b@SPAM.COM", 0.6)).unwrap();
        q.add(candidate("m3", "c@other.org", 0.7)).unwrap();
        let groups = q.group_by_domain();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["SPAM.COM"].len(), 2);
        assert_eq!(groups["OTHER.ORG"].len(), 1);
    }

    #[test]
    fn remove_for_domain_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(&dir);
        q.add(candidate("m1", "a@spam.com", 0.5)).unwrap();
        q.add(candidate("m2", "b@spam.com", 0.6)).unwrap();
        q.add(candidate("m3", "c@keep.org", 0.7)).unwrap();
        assert_eq!(q.remove_for_domain("spam.com").unwrap(), 2);
        assert_eq!(q.remove_for_domain("spam.com").unwrap(), 0);
        assert_eq!(q.count(), 1);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spam-candidates.json");
        {
            let q = CandidateQueue::open(&path);
            q.add(candidate("m1", "a@spam.com", 0.5)).unwrap();
        }
        let q = CandidateQueue::open(&path);
        assert_eq!(q.count(), 1);
        assert_eq!(q.list()[0].sender_domain, "SPAM.COM");
    }

    #[test]
    fn remove_then_remove_all() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(&dir);
        q.add(candidate("m1", "a@spam.com", 0.5)).unwrap();
        q.add(candidate("m2", "b@spam.com", 0.5)).unwrap();
        assert!(q.remove("m1").unwrap());
        assert!(!q.remove("m1").unwrap());
        q.remove_all().unwrap();
        assert_eq!(q.count(), 0);
    }
}
