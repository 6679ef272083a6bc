use anyhow::Result;
use async_trait::async_trait;

use crate::domain::MessageSummary;

pub mod client;
pub mod prompt;

pub use client::LlmClassifier;

/// The LLM classification collaborator. Takes one batch of messages plus
/// current registry/review snapshots and returns the model's raw reply
/// text; verdict and stats extraction happen in the pipeline's parsers.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify_batch(
        &self,
        messages: &[MessageSummary],
        known_domains: &[String],
        pending_domains: &[String],
    ) -> Result<String>;
}
