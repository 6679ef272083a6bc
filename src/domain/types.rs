use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sender domain confirmed as spam. Append-mostly: entries are only
/// removed through explicit administration, never by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpamDomain {
    pub domain: String,
    pub added_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A single message flagged as probable spam, waiting for a domain-level
/// decision. `received_at` is when the mailbox got the message,
/// `identified_at` when the classifier flagged it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpamCandidate {
    pub message_id: String,
    pub sender_email: String,
    pub sender_domain: String,
    pub subject: String,
    pub spam_reason: String,
    pub confidence_score: f64,
    pub received_at: DateTime<Utc>,
    pub identified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSample {
    pub message_id: String,
    pub sender: String,
    pub subject: String,
    pub reason: String,
}

/// A domain waiting for a human verdict, with up to [`MAX_REVIEW_SAMPLES`]
/// evidence messages. `email_count` keeps growing after the sample cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReviewDomain {
    pub domain: String,
    pub email_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub samples: Vec<ReviewSample>,
}

pub const MAX_REVIEW_SAMPLES: usize = 2;

/// One unseen message as reported by the mail bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub id: String,
    pub sender: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDetail {
    pub id: String,
    pub sender: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

/// Classifier outcome for one message. Routing in the orchestrator is an
/// exhaustive match over this enum.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    KnownSpam,
    Legitimate,
    Candidate { confidence: f64, reason: String },
    FlagDomain { reason: String },
}

/// Counters the classifier reports about its own batch, extracted from the
/// `BATCH_STATS:` sentinel or the free-text fallback. Advisory only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub processed: u64,
    pub junked: u64,
    pub candidates: u64,
    pub inbox_empty: bool,
}

/// Counters the orchestrator observes itself while routing one batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOutcome {
    pub processed: u64,
    pub moved_to_junk: u64,
    pub candidates: u64,
    pub flagged: u64,
    pub legitimate: u64,
    pub errors: u64,
}

/// Run-level totals across all batches until termination.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub batches: u64,
    pub processed: u64,
    pub moved_to_junk: u64,
    pub candidates: u64,
    pub flagged: u64,
    pub legitimate: u64,
    pub errors: u64,
    pub inbox_was_empty: bool,
}

impl RunSummary {
    pub fn absorb(&mut self, batch: &BatchOutcome) {
        self.batches += 1;
        self.processed += batch.processed;
        self.moved_to_junk += batch.moved_to_junk;
        self.candidates += batch.candidates;
        self.flagged += batch.flagged;
        self.legitimate += batch.legitimate;
        self.errors += batch.errors;
    }
}

/// Result of committing a human-approved domain: the registry add plus the
/// mailbox sweep of its queued candidates.
#[derive(Debug, Clone)]
pub struct ApprovalSummary {
    pub domain: String,
    pub moved_count: u64,
    pub error_count: u64,
}

/// Canonical form for domain keys: trimmed, upper-cased. Matching is
/// case-insensitive everywhere; this is the stored casing.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_uppercase()
}

/// Extracts the normalized domain of an email address, if it has one.
pub fn domain_of(email: &str) -> Option<String> {
    let (_, domain) = email.trim().rsplit_once('@')?;
    if domain.is_empty() {
        return None;
    }
    Some(normalize_domain(domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_uppercases_and_trims() {
        assert_eq!(normalize_domain("  spam.com "), "SPAM.COM");
        assert_eq!(normalize_domain("Spam.Com."), "SPAM.COM");
    }

    #[test]
    fn domain_of_extracts_after_last_at() {
        assert_eq!(domain_of("a@b@spam.com"), Some("SPAM.COM".to_string()));
        assert_eq!(domain_of("noat"), None);
        assert_eq!(domain_of("trailing@"), None);
    }
}
