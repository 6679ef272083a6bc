use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{config::LlmConfig, domain::MessageSummary};

use super::{prompt, Classifier};

/// Chat-completions classifier client. One request per batch; the reply's
/// message content is returned verbatim for the pipeline to parse.
#[derive(Clone)]
pub struct LlmClassifier {
    http: Client,
    config: LlmConfig,
}

impl LlmClassifier {
    pub fn new(http: Client, config: LlmConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify_batch(
        &self,
        messages: &[MessageSummary],
        known_domains: &[String],
        pending_domains: &[String],
    ) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .context("LLM_API_KEY must be configured for spam classification")?;

        let user_prompt = prompt::build_batch_prompt(messages, known_domains, pending_domains);
        let request = build_request(&self.config, &user_prompt);
        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        extract_content(response).await
    }
}

fn build_request(config: &LlmConfig, prompt: &str) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: vec![
            ChatMessage {
                role: "system".into(),
                content: prompt::SYSTEM_PROMPT.into(),
            },
            ChatMessage {
                role: "user".into(),
                content: prompt.to_string(),
            },
        ],
        temperature: 0.2,
        top_p: 1.0,
        max_tokens: config.max_tokens,
    }
}

async fn extract_content(response: reqwest::Response) -> Result<String> {
    let completion: ChatCompletionResponse = response.json().await?;
    let choice = completion
        .choices
        .into_iter()
        .next()
        .context("classifier response did not contain any choices")?;

    choice
        .message
        .and_then(|msg| msg.content)
        .context("classifier response missing message content")
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    top_p: f32,
    max_tokens: i32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatCompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}
