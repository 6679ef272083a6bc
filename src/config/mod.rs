pub mod env;
mod loader;

pub use env::{
    AppConfig, DirectoryConfig, LlmConfig, LoggingConfig, MailBridgeConfig, PipelineConfig,
};
pub use loader::load_config;
