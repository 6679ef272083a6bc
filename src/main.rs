use anyhow::Result;
use mailsweep::{
    app::MailsweepApp,
    config,
    infrastructure::{directories, instance_guard::InstanceGuard, logging, shutdown},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config.logging, &paths)?;

    let _guard = InstanceGuard::acquire(&paths)?;

    let shutdown = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let app = MailsweepApp::initialize(config, paths, shutdown)?;
    app.run().await
}
