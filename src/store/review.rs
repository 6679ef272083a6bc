use std::path::PathBuf;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::domain::{normalize_domain, PendingReviewDomain, ReviewSample, MAX_REVIEW_SAMPLES};

use super::{load_or_default, save_atomic, StoreResult};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ReviewDoc {
    pending_domains: Vec<PendingReviewDomain>,
}

/// Durable queue of domains flagged for human approval. Each entry keeps a
/// monotonic occurrence counter and a bounded evidence sample so the review
/// file stays small no matter how noisy a domain gets.
pub struct ReviewQueue {
    path: PathBuf,
    entries: Mutex<Vec<PendingReviewDomain>>,
}

impl ReviewQueue {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc: ReviewDoc = load_or_default(&path);
        Self {
            path,
            entries: Mutex::new(doc.pending_domains),
        }
    }

    /// Records one occurrence of a flagged domain. Returns `true` when the
    /// entry was newly created, `false` when an existing entry was updated.
    /// `email_count` always increments; a sample is appended only while the
    /// cap leaves room and the message id has not been sampled before.
    pub fn add_or_update(
        &self,
        domain: &str,
        message_id: &str,
        sender: &str,
        subject: &str,
        reason: &str,
    ) -> StoreResult<bool> {
        let key = normalize_domain(domain);
        let now = Utc::now();
        let sample = ReviewSample {
            message_id: message_id.to_string(),
            sender: sender.to_string(),
            subject: subject.to_string(),
            reason: reason.to_string(),
        };

        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        let created = match next
            .iter_mut()
            .find(|e| e.domain.eq_ignore_ascii_case(&key))
        {
            Some(entry) => {
                entry.email_count += 1;
                entry.last_seen = now;
                let seen = entry.samples.iter().any(|s| s.message_id == message_id);
                if entry.samples.len() < MAX_REVIEW_SAMPLES && !seen {
                    entry.samples.push(sample);
                }
                false
            }
            None => {
                next.push(PendingReviewDomain {
                    domain: key,
                    email_count: 1,
                    first_seen: now,
                    last_seen: now,
                    samples: vec![sample],
                });
                true
            }
        };

        let doc = ReviewDoc {
            pending_domains: next,
        };
        save_atomic(&self.path, &doc)?;
        *entries = doc.pending_domains;
        Ok(created)
    }

    /// Takes a pending entry out of the queue, returning it when present.
    pub fn remove(&self, domain: &str) -> StoreResult<Option<PendingReviewDomain>> {
        let key = normalize_domain(domain);
        let mut entries = self.entries.lock();
        let position = entries
            .iter()
            .position(|e| e.domain.eq_ignore_ascii_case(&key));
        let Some(position) = position else {
            return Ok(None);
        };

        let mut next = entries.clone();
        let removed = next.remove(position);
        let doc = ReviewDoc {
            pending_domains: next,
        };
        save_atomic(&self.path, &doc)?;
        *entries = doc.pending_domains;
        Ok(Some(removed))
    }

    /// Removes any of the given domains that are pending; unknown domains
    /// are ignored. Returns how many entries were actually removed.
    pub fn remove_many(&self, domains: &[String]) -> StoreResult<usize> {
        if domains.is_empty() {
            return Ok(0);
        }
        let keys: Vec<String> = domains.iter().map(|d| normalize_domain(d)).collect();

        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        next.retain(|e| !keys.iter().any(|k| e.domain.eq_ignore_ascii_case(k)));
        let removed = entries.len() - next.len();
        if removed == 0 {
            return Ok(0);
        }
        let doc = ReviewDoc {
            pending_domains: next,
        };
        save_atomic(&self.path, &doc)?;
        *entries = doc.pending_domains;
        Ok(removed)
    }

    pub fn clear_all(&self) -> StoreResult<()> {
        let mut entries = self.entries.lock();
        let doc = ReviewDoc::default();
        save_atomic(&self.path, &doc)?;
        entries.clear();
        Ok(())
    }

    pub fn is_pending(&self, domain: &str) -> bool {
        let key = normalize_domain(domain);
        self.entries
            .lock()
            .iter()
            .any(|e| e.domain.eq_ignore_ascii_case(&key))
    }

    pub fn list(&self) -> Vec<PendingReviewDomain> {
        self.entries.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(dir: &tempfile::TempDir) -> ReviewQueue {
        ReviewQueue::open(dir.path().join("pending-review.json"))
    }

    fn record(q: &ReviewQueue, domain: &str, message_id: &str) -> bool {
        q.add_or_update(domain, message_id, "bulk@x.com", "Buy now", "bulk mailer")
            .unwrap()
    }

    #[test]
    fn first_occurrence_creates_entry() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(&dir);
        assert!(record(&q, "x.com", "m1"));
        let entry = &q.list()[0];
        assert_eq!(entry.domain, "X.COM");
        assert_eq!(entry.email_count, 1);
        assert_eq!(entry.samples.len(), 1);
        assert_eq!(entry.first_seen, entry.last_seen);
    }

    #[test]
    fn samples_cap_at_two_while_count_grows() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(&dir);
        for i in 0..5 {
            record(&q, "x.com", &format!("m{i}"));
        }
        let entry = &q.list()[0];
        assert_eq!(entry.email_count, 5);
        assert_eq!(entry.samples.len(), MAX_REVIEW_SAMPLES);
        assert!(entry.last_seen >= entry.first_seen);
    }

    #[test]
    fn repeated_message_id_never_duplicates_sample() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(&dir);
        assert!(record(&q, "x.com", "m1"));
        assert!(!record(&q, "x.com", "m1"));
        let entry = &q.list()[0];
        assert_eq!(entry.email_count, 2);
        assert_eq!(entry.samples.len(), 1);
    }

    #[test]
    fn update_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(&dir);
        record(&q, "x.com", "m1");
        assert!(!record(&q, "X.COM", "m2"));
        assert_eq!(q.count(), 1);
        assert!(q.is_pending("x.CoM"));
    }

    #[test]
    fn remove_returns_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(&dir);
        record(&q, "x.com", "m1");
        let removed = q.remove("X.com").unwrap().unwrap();
        assert_eq!(removed.domain, "X.COM");
        assert!(q.remove("x.com").unwrap().is_none());
        assert_eq!(q.count(), 0);
    }

    #[test]
    fn remove_many_with_empty_input_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(&dir);
        record(&q, "x.com", "m1");
        record(&q, "y.com", "m2");
        assert_eq!(q.remove_many(&[]).unwrap(), 0);
        assert_eq!(q.count(), 2);
    }

    #[test]
    fn remove_many_tolerates_unknown_domains() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(&dir);
        record(&q, "x.com", "m1");
        record(&q, "y.com", "m2");
        let removed = q
            .remove_many(&["x.com".to_string(), "missing.org".to_string()])
            .unwrap();
        assert_eq!(removed, 1);
        assert!(q.is_pending("y.com"));
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending-review.json");
        {
            let q = ReviewQueue::open(&path);
            q.add_or_update("x.com", "m1", "a@x.com", "Subj", "looks bulk")
                .unwrap();
            q.add_or_update("x.com", "m2", "b@x.com", "Subj2", "looks bulk")
                .unwrap();
        }
        let q = ReviewQueue::open(&path);
        let entry = &q.list()[0];
        assert_eq!(entry.email_count, 2);
        assert_eq!(entry.samples.len(), 2);
    }
}
