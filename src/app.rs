use std::sync::Arc;

use anyhow::Result;
use reqwest::Client;
use tokio::time::sleep;

use crate::{
    classifier::LlmClassifier,
    config::AppConfig,
    domain::ApprovalSummary,
    infrastructure::{directories::ResolvedPaths, shutdown::Shutdown},
    mail::HttpMailClient,
    pipeline::Orchestrator,
    store::{CandidateQueue, DomainRegistry, ReviewQueue},
};

pub struct MailsweepApp {
    orchestrator: Arc<Orchestrator>,
    shutdown: Shutdown,
    config: Arc<AppConfig>,
}

impl MailsweepApp {
    pub fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let config = Arc::new(config);

        let http_client = Client::builder()
            .user_agent(format!("mailsweep/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mail = Arc::new(HttpMailClient::new(http_client.clone(), config.mail.clone()));
        let classifier = Arc::new(LlmClassifier::new(http_client, config.llm.clone()));

        let registry = Arc::new(DomainRegistry::open(&paths.domains_path));
        let candidates = Arc::new(CandidateQueue::open(&paths.candidates_path));
        let review = Arc::new(ReviewQueue::open(&paths.review_path));
        tracing::info!(
            target: "app",
            blocked_domains = registry.count(),
            queued_candidates = candidates.count(),
            pending_review = review.count(),
            "stores loaded"
        );

        let orchestrator = Arc::new(Orchestrator::new(
            mail,
            classifier,
            registry,
            candidates,
            review,
            config.pipeline.clone(),
        ));

        Ok(Self {
            orchestrator,
            shutdown,
            config,
        })
    }

    /// Entry point for out-of-band human decisions: block the domain and
    /// sweep its queued candidates to junk.
    pub async fn approve_domain(&self, domain: &str) -> Result<ApprovalSummary> {
        let summary = self.orchestrator.approve_domain(domain).await?;
        tracing::info!(
            target: "app",
            domain = %summary.domain,
            moved = summary.moved_count,
            errors = summary.error_count,
            "domain approved"
        );
        Ok(summary)
    }

    /// Runs scan cycles until shutdown: one full run (batches until the
    /// inbox is empty or the cap is hit), then an interval sleep.
    pub async fn run(self) -> Result<()> {
        tracing::info!(target: "app", "mailsweep daemon started");
        let mut listener = self.shutdown.subscribe();

        loop {
            if listener.is_triggered() {
                break;
            }

            match self.orchestrator.run_scan(&mut listener).await {
                Ok(summary) => {
                    tracing::info!(
                        target: "app",
                        batches = summary.batches,
                        processed = summary.processed,
                        moved_to_junk = summary.moved_to_junk,
                        candidates = summary.candidates,
                        flagged = summary.flagged,
                        errors = summary.errors,
                        "scan cycle finished"
                    );
                }
                Err(err) => {
                    tracing::error!(target: "app", error = %err, "scan cycle failed");
                }
            }

            tokio::select! {
                _ = sleep(self.config.pipeline.scan_interval) => {}
                _ = listener.notified() => break,
            }
        }

        tracing::info!(target: "app", "mailsweep daemon stopped");
        Ok(())
    }
}
