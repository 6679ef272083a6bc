use anyhow::Result;
use async_trait::async_trait;

use crate::domain::MessageDetail;

pub mod http;

pub use http::HttpMailClient;

/// Capability surface of the mailbox collaborator. The orchestrator only
/// needs `list_unseen` and `move_to_folder`; the rest of the surface exists
/// for administrative tooling and stays thin.
///
/// `list_unseen` and `search` return the bridge's raw reply: a JSON array
/// of message summaries from a REST bridge, or a natural-language sentence
/// from an agent-backed bridge. Interpretation lives in the pipeline's
/// reply parser.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn list_unseen(&self, max_results: usize, exclude_ids: &[String]) -> Result<String>;

    async fn read(&self, message_id: &str) -> Result<MessageDetail>;

    async fn move_to_folder(&self, message_id: &str, folder: &str) -> Result<()>;

    async fn delete(&self, message_id: &str) -> Result<()>;

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;

    async fn search(&self, query: &str, max_results: usize) -> Result<String>;
}
