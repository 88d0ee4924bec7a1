//! # Chat Outbox
//!
//! Entry point of the outbox worker. Initializes:
//! - Configuration loading
//! - Tracing/logging subsystem
//! - Storage backend (PostgreSQL or in-memory)
//! - Push transport (Redis or logging)
//! - Outbox processor and admin HTTP server

use anyhow::Result;
use tracing::info;

use chat_outbox::config::Settings;
use chat_outbox::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;
    chat_outbox::telemetry::init_tracing(settings.is_json_logging());

    info!(
        environment = %settings.environment,
        polling_interval_seconds = settings.outbox.polling_interval_seconds,
        batch_size = settings.outbox.batch_size,
        max_retry_count = settings.outbox.max_retry_count,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;
    info!("Outbox worker ready");
    application.run_until_stopped().await?;

    info!("Outbox worker stopped");
    Ok(())
}
