use std::{
    collections::HashSet,
    sync::Arc,
};

use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;

use crate::{
    classifier::Classifier,
    config::PipelineConfig,
    domain::{
        domain_of, normalize_domain, ApprovalSummary, BatchOutcome, MessageSummary, RunSummary,
        SpamCandidate, Verdict,
    },
    infrastructure::shutdown::ShutdownListener,
    mail::MailTransport,
    store::{CandidateQueue, DomainRegistry, ReviewQueue},
};

use super::reply::{parse_batch_stats, parse_fetch_reply, parse_verdicts, ParsedVerdict};

/// Drives the triage pipeline: fetch a batch of unseen messages, classify
/// them, route each verdict into mailbox moves and store writes, repeat
/// until the inbox is empty, the batch cap is hit, or shutdown fires.
///
/// All collaborators are injected so independent pipelines (and tests) can
/// run against their own mailboxes and stores.
pub struct Orchestrator {
    mail: Arc<dyn MailTransport>,
    classifier: Arc<dyn Classifier>,
    registry: Arc<DomainRegistry>,
    candidates: Arc<CandidateQueue>,
    review: Arc<ReviewQueue>,
    config: PipelineConfig,
    /// Message IDs already routed by this orchestrator instance. Not
    /// persisted: a restart reclassifies anything still unseen in the
    /// mailbox, which is safe because all routing writes are idempotent.
    seen: Mutex<HashSet<String>>,
}

impl Orchestrator {
    pub fn new(
        mail: Arc<dyn MailTransport>,
        classifier: Arc<dyn Classifier>,
        registry: Arc<DomainRegistry>,
        candidates: Arc<CandidateQueue>,
        review: Arc<ReviewQueue>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            mail,
            classifier,
            registry,
            candidates,
            review,
            config,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Runs batches until termination. Sequential on purpose: one
    /// classifier call per batch, one message routed at a time, so the
    /// counters and the dedup set never need cross-message synchronization.
    pub async fn run_scan(&self, shutdown: &mut ShutdownListener) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for _ in 0..self.config.max_batches {
            if shutdown.is_triggered() {
                tracing::info!(target: "pipeline", "shutdown requested; ending scan");
                break;
            }

            // FETCHING
            let exclude: Vec<String> = self.seen.lock().iter().cloned().collect();
            let raw = tokio::select! {
                res = self.mail.list_unseen(self.config.batch_size, &exclude) => res,
                _ = shutdown.notified() => {
                    tracing::info!(target: "pipeline", "shutdown during fetch; ending scan");
                    break;
                }
            };
            let raw = match raw {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::error!(target: "pipeline", error = %err, "fetch failed; ending scan");
                    summary.errors += 1;
                    break;
                }
            };

            let fetched = parse_fetch_reply(&raw);
            if fetched.inbox_empty {
                tracing::info!(target: "pipeline", "inbox is empty; scan complete");
                summary.inbox_was_empty = true;
                break;
            }
            let batch: Vec<MessageSummary> = {
                let seen = self.seen.lock();
                fetched
                    .messages
                    .into_iter()
                    .filter(|m| !seen.contains(&m.id))
                    .collect()
            };
            if batch.is_empty() {
                tracing::warn!(
                    target: "pipeline",
                    reply = %raw.chars().take(120).collect::<String>(),
                    "fetch reply contained no usable messages; ending scan"
                );
                summary.errors += 1;
                break;
            }

            // CLASSIFYING
            let known: Vec<String> = self.registry.list().into_iter().map(|d| d.domain).collect();
            let pending: Vec<String> = self.review.list().into_iter().map(|d| d.domain).collect();
            let reply = tokio::select! {
                res = self.classifier.classify_batch(&batch, &known, &pending) => res,
                _ = shutdown.notified() => {
                    tracing::info!(target: "pipeline", "shutdown during classification; ending scan");
                    break;
                }
            };
            let reply = match reply {
                Ok(reply) => reply,
                Err(err) => {
                    tracing::error!(
                        target: "pipeline",
                        error = %err,
                        batch_len = batch.len(),
                        "classification failed; ending scan"
                    );
                    summary.errors += 1;
                    break;
                }
            };

            let reported = parse_batch_stats(&reply);
            let verdicts = parse_verdicts(&reply);

            // ROUTING
            let mut outcome = BatchOutcome::default();
            for message in &batch {
                if shutdown.is_triggered() {
                    tracing::info!(target: "pipeline", "shutdown mid-batch; remaining messages left for next run");
                    break;
                }
                self.route_message(message, verdicts.get(&message.id), &mut outcome)
                    .await;
            }

            tracing::info!(
                target: "pipeline",
                processed = outcome.processed,
                moved_to_junk = outcome.moved_to_junk,
                candidates = outcome.candidates,
                flagged = outcome.flagged,
                errors = outcome.errors,
                reported_processed = reported.processed,
                reported_junked = reported.junked,
                reported_candidates = reported.candidates,
                "batch complete"
            );
            summary.absorb(&outcome);

            if shutdown.is_triggered() {
                break;
            }
        }

        tracing::info!(
            target: "pipeline",
            batches = summary.batches,
            processed = summary.processed,
            moved_to_junk = summary.moved_to_junk,
            candidates = summary.candidates,
            flagged = summary.flagged,
            errors = summary.errors,
            inbox_was_empty = summary.inbox_was_empty,
            "scan finished"
        );
        Ok(summary)
    }

    /// Routes one message. Every failure is counted and contained; the
    /// batch always moves on to the next message.
    async fn route_message(
        &self,
        message: &MessageSummary,
        parsed: Option<&ParsedVerdict>,
        outcome: &mut BatchOutcome,
    ) {
        let Some(parsed) = parsed else {
            tracing::warn!(
                target: "pipeline",
                message_id = %message.id,
                "classifier returned no verdict for message"
            );
            outcome.errors += 1;
            if !self.config.retry_failed_classifications {
                self.seen.lock().insert(message.id.clone());
            }
            return;
        };

        let mut routing_failed = false;
        match &parsed.verdict {
            Verdict::KnownSpam => {
                match self
                    .mail
                    .move_to_folder(&message.id, &self.config.junk_folder)
                    .await
                {
                    Ok(()) => outcome.moved_to_junk += 1,
                    Err(err) => {
                        tracing::warn!(
                            target: "pipeline",
                            message_id = %message.id,
                            error = %err,
                            "failed to move known spam to junk"
                        );
                        outcome.errors += 1;
                    }
                }
            }
            Verdict::Legitimate => outcome.legitimate += 1,
            Verdict::Candidate { confidence, reason } => {
                match self.record_candidate(message, parsed, *confidence, reason) {
                    Ok(newly_added) => {
                        if newly_added {
                            outcome.candidates += 1;
                        } else {
                            tracing::debug!(
                                target: "pipeline",
                                message_id = %message.id,
                                "candidate already recorded"
                            );
                        }
                    }
                    Err(err) => {
                        tracing::error!(
                            target: "pipeline",
                            message_id = %message.id,
                            error = %err,
                            "failed to record candidate"
                        );
                        outcome.errors += 1;
                        routing_failed = true;
                    }
                }
            }
            Verdict::FlagDomain { reason } => {
                match self.flag_domain(message, parsed, reason) {
                    Ok(Some(created)) => {
                        outcome.flagged += 1;
                        if created {
                            tracing::info!(
                                target: "pipeline",
                                message_id = %message.id,
                                "new domain queued for human review"
                            );
                        }
                    }
                    Ok(None) => {
                        tracing::warn!(
                            target: "pipeline",
                            message_id = %message.id,
                            sender = %message.sender,
                            "cannot flag domain: sender has no usable domain"
                        );
                        outcome.errors += 1;
                    }
                    Err(err) => {
                        tracing::error!(
                            target: "pipeline",
                            message_id = %message.id,
                            error = %err,
                            "failed to update review queue"
                        );
                        outcome.errors += 1;
                        routing_failed = true;
                    }
                }
            }
        }

        outcome.processed += 1;
        // A store-write failure counts as an unrouted message when retries
        // are enabled, same as a missing verdict.
        if !(routing_failed && self.config.retry_failed_classifications) {
            self.seen.lock().insert(message.id.clone());
        }
    }

    fn record_candidate(
        &self,
        message: &MessageSummary,
        parsed: &ParsedVerdict,
        confidence: f64,
        reason: &str,
    ) -> Result<bool> {
        let now = Utc::now();
        let sender_domain = parsed
            .domain
            .as_deref()
            .map(normalize_domain)
            .or_else(|| domain_of(&message.sender))
            .unwrap_or_default();
        let added = self.candidates.add(SpamCandidate {
            message_id: message.id.clone(),
            sender_email: message.sender.clone(),
            sender_domain,
            subject: message.subject.clone(),
            spam_reason: reason.to_string(),
            confidence_score: confidence,
            received_at: message.received_at.unwrap_or(now),
            identified_at: now,
        })?;
        Ok(added)
    }

    /// Returns `Ok(None)` when no domain can be derived for the sender.
    fn flag_domain(
        &self,
        message: &MessageSummary,
        parsed: &ParsedVerdict,
        reason: &str,
    ) -> Result<Option<bool>> {
        let Some(domain) = parsed
            .domain
            .as_deref()
            .map(normalize_domain)
            .or_else(|| domain_of(&message.sender))
        else {
            return Ok(None);
        };
        let created = self.review.add_or_update(
            &domain,
            &message.id,
            &message.sender,
            &message.subject,
            reason,
        )?;
        Ok(Some(created))
    }

    /// Commits a human-approved domain: registry add (idempotent), review
    /// entry consumed, queued candidates swept to junk and purged. The
    /// registry add is never rolled back on move failures; blocking the
    /// domain takes priority over mailbox cleanup, and the purge is
    /// idempotent if a crash splits the two store writes.
    pub async fn approve_domain(&self, domain: &str) -> Result<ApprovalSummary> {
        let key = normalize_domain(domain);

        let newly_blocked = self.registry.add(&key, Some("approved from review queue"))?;
        if !newly_blocked {
            tracing::debug!(target: "pipeline", domain = %key, "domain was already blocked");
        }
        if self.review.remove(&key)?.is_some() {
            tracing::info!(target: "pipeline", domain = %key, "review entry consumed by approval");
        }

        let mut moved_count = 0u64;
        let mut error_count = 0u64;
        let matching = self.candidates.group_by_domain().remove(&key).unwrap_or_default();
        for candidate in &matching {
            match self
                .mail
                .move_to_folder(&candidate.message_id, &self.config.junk_folder)
                .await
            {
                Ok(()) => moved_count += 1,
                Err(err) => {
                    tracing::warn!(
                        target: "pipeline",
                        domain = %key,
                        message_id = %candidate.message_id,
                        error = %err,
                        "approval sweep could not move candidate to junk"
                    );
                    error_count += 1;
                }
            }
        }

        // Candidates are handled either way; failures were reported above.
        let purged = self.candidates.remove_for_domain(&key)?;
        tracing::info!(
            target: "pipeline",
            domain = %key,
            moved = moved_count,
            errors = error_count,
            purged,
            "approval sweep complete"
        );

        Ok(ApprovalSummary {
            domain: key,
            moved_count,
            error_count,
        })
    }

    /// Drops a pending-review entry without blocking the domain. Returns
    /// `false` when the domain was not pending.
    pub fn reject_domain(&self, domain: &str) -> Result<bool> {
        let removed = self.review.remove(domain)?;
        if let Some(entry) = &removed {
            tracing::info!(
                target: "pipeline",
                domain = %entry.domain,
                email_count = entry.email_count,
                "pending domain rejected"
            );
        }
        Ok(removed.is_some())
    }

    #[cfg(test)]
    fn seen_ids(&self) -> HashSet<String> {
        self.seen.lock().clone()
    }
}
