//! App-level wiring tests: `MailsweepApp::initialize` against real store
//! files, driving the human-approval entry point without touching the
//! mail bridge (the approved domain has no queued candidates).

use std::time::Duration;

use mailsweep::app::MailsweepApp;
use mailsweep::config::{
    AppConfig, DirectoryConfig, LlmConfig, LoggingConfig, MailBridgeConfig, PipelineConfig,
};
use mailsweep::infrastructure::directories::ensure_directories;
use mailsweep::infrastructure::shutdown::Shutdown;
use mailsweep::store::{DomainRegistry, ReviewQueue};

fn test_app_config(dir: &std::path::Path) -> AppConfig {
    AppConfig {
        mail: MailBridgeConfig {
            base_url: "http://127.0.0.1:0".to_string(),
            token: "test-token".to_string(),
            request_timeout: Duration::from_secs(1),
        },
        llm: LlmConfig {
            api_url: "http://127.0.0.1:0".to_string(),
            api_key: None,
            model: "test-model".to_string(),
            max_tokens: 64,
        },
        pipeline: PipelineConfig {
            batch_size: 5,
            max_batches: 1,
            junk_folder: "Junk Email".to_string(),
            scan_interval: Duration::from_secs(1),
            retry_failed_classifications: true,
        },
        directories: DirectoryConfig {
            logs_dir: dir.join("logs").display().to_string(),
            data_dir: dir.join("data").display().to_string(),
        },
        logging: LoggingConfig {
            level: "warn".to_string(),
        },
    }
}

#[tokio::test]
async fn approving_through_the_app_blocks_and_persists_the_domain() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_app_config(dir.path());
    let paths = ensure_directories(&config.directories).unwrap();

    // A prior scan left the domain awaiting a decision.
    {
        let review = ReviewQueue::open(&paths.review_path);
        review
            .add_or_update(
                "bulk.biz",
                "m1",
                "promo@bulk.biz",
                "Last chance!",
                "bulk promotional sender",
            )
            .unwrap();
    }

    let app = MailsweepApp::initialize(config, paths.clone(), Shutdown::new()).unwrap();
    let summary = app.approve_domain("bulk.biz").await.unwrap();

    assert_eq!(summary.domain, "BULK.BIZ");
    assert_eq!(summary.moved_count, 0);
    assert_eq!(summary.error_count, 0);

    // Outcome survives the app: fresh handles see the block and the
    // consumed review entry.
    let registry = DomainRegistry::open(&paths.domains_path);
    assert!(registry.contains("bulk.biz"));
    let review = ReviewQueue::open(&paths.review_path);
    assert!(!review.is_pending("bulk.biz"));
}
