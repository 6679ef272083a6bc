use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mail: MailBridgeConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
}

/// Connection settings for the REST mail bridge the pipeline talks to.
#[derive(Debug, Clone)]
pub struct MailBridgeConfig {
    pub base_url: String,
    pub token: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: i32,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub max_batches: u64,
    pub junk_folder: String,
    pub scan_interval: Duration,
    /// When true, a message whose classification failed stays out of the
    /// dedup set so the next batch retries it.
    pub retry_failed_classifications: bool,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
}
