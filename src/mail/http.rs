use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::{config::MailBridgeConfig, domain::MessageDetail};

use super::MailTransport;

/// Mail bridge client: thin bindings over the bridge's REST surface, one
/// method per capability, bearer-authenticated.
#[derive(Clone)]
pub struct HttpMailClient {
    http: Client,
    config: MailBridgeConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListUnseenRequest<'a> {
    max_results: usize,
    exclude_ids: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MoveRequest<'a> {
    folder: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
}

impl HttpMailClient {
    pub fn new(http: Client, config: MailBridgeConfig) -> Self {
        Self { http, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

#[async_trait]
impl MailTransport for HttpMailClient {
    async fn list_unseen(&self, max_results: usize, exclude_ids: &[String]) -> Result<String> {
        let reply = self
            .http
            .post(self.url("/messages/unseen"))
            .bearer_auth(&self.config.token)
            .timeout(self.config.request_timeout)
            .json(&ListUnseenRequest {
                max_results,
                exclude_ids,
            })
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
            .context("mail bridge returned an unreadable unseen-messages reply")?;
        Ok(reply)
    }

    async fn read(&self, message_id: &str) -> Result<MessageDetail> {
        let detail = self
            .http
            .get(self.url(&format!("/messages/{message_id}")))
            .bearer_auth(&self.config.token)
            .timeout(self.config.request_timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("failed to decode message {message_id}"))?;
        Ok(detail)
    }

    async fn move_to_folder(&self, message_id: &str, folder: &str) -> Result<()> {
        self.http
            .post(self.url(&format!("/messages/{message_id}/move")))
            .bearer_auth(&self.config.token)
            .timeout(self.config.request_timeout)
            .json(&MoveRequest { folder })
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("failed to move message {message_id} to {folder}"))?;
        Ok(())
    }

    async fn delete(&self, message_id: &str) -> Result<()> {
        self.http
            .delete(self.url(&format!("/messages/{message_id}")))
            .bearer_auth(&self.config.token)
            .timeout(self.config.request_timeout)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("failed to delete message {message_id}"))?;
        Ok(())
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        self.http
            .post(self.url("/messages/send"))
            .bearer_auth(&self.config.token)
            .timeout(self.config.request_timeout)
            .json(&SendRequest { to, subject, body })
            .send()
            .await?
            .error_for_status()
            .context("failed to send message via mail bridge")?;
        Ok(())
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<String> {
        let reply = self
            .http
            .post(self.url("/messages/search"))
            .bearer_auth(&self.config.token)
            .timeout(self.config.request_timeout)
            .json(&SearchRequest { query, max_results })
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
            .context("mail bridge returned an unreadable search reply")?;
        Ok(reply)
    }
}
