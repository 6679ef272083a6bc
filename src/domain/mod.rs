pub mod types;

pub use types::{
    domain_of, normalize_domain, ApprovalSummary, BatchOutcome, BatchStats, MessageDetail,
    MessageSummary, PendingReviewDomain, ReviewSample, RunSummary, SpamCandidate, SpamDomain,
    Verdict, MAX_REVIEW_SAMPLES,
};
