use std::sync::mpsc;

use anyhow::Context;
use clap::Parser;
use mailcatch::{Config, MockServer};
use tracing::warn;

fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_logging(&config.loglevel);

    let server = MockServer::new(config);
    server.start().context("failed to start servers")?;

    // Block until SIGINT/SIGTERM
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("failed to install signal handler")?;
    let _ = rx.recv();

    warn!("caught shutdown signal, exiting...");
    server.close().context("failed to shut down cleanly")?;
    Ok(())
}

fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
