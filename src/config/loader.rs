use std::env;
use std::time::Duration;

use super::env::{
    AppConfig, ConfigError, DirectoryConfig, LlmConfig, LoggingConfig, MailBridgeConfig,
    PipelineConfig,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mail = MailBridgeConfig {
            base_url: env::var("MAIL_BRIDGE_URL")
                .map_err(|_| ConfigError::Missing("MAIL_BRIDGE_URL"))?
                .trim_end_matches('/')
                .to_string(),
            token: env::var("MAIL_BRIDGE_TOKEN")
                .map_err(|_| ConfigError::Missing("MAIL_BRIDGE_TOKEN"))?,
            request_timeout: Duration::from_millis(parse_num("MAIL_REQUEST_TIMEOUT_MS", 30_000)),
        };

        let llm = LlmConfig {
            api_url: env::var("LLM_API_URL")
                .unwrap_or_else(|_| "https://api.cerebras.ai/v1/chat/completions".to_string()),
            api_key: env::var("LLM_API_KEY").ok().filter(|v| !v.is_empty()),
            model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-oss-120b".to_string()),
            max_tokens: parse_num("LLM_MAX_TOKENS", 2048),
        };

        let pipeline = PipelineConfig {
            batch_size: parse_num("BATCH_SIZE", 10usize).max(1),
            max_batches: parse_num("MAX_BATCHES", 20u64).max(1),
            junk_folder: env::var("JUNK_FOLDER").unwrap_or_else(|_| "Junk Email".to_string()),
            scan_interval: Duration::from_secs(parse_num("SCAN_INTERVAL_SECS", 300)),
            retry_failed_classifications: parse_bool("RETRY_FAILED_CLASSIFICATIONS", true),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        Ok(Self {
            mail,
            llm,
            pipeline,
            directories,
            logging,
        })
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}
