use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use mailbridge::assistant::ReqwestTransport;
use mailbridge::config::BridgeConfig;
use mailbridge::pipeline::{MailBridge, StaticNotifications};
use mailbridge::storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only replies.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = BridgeConfig::from_env().context("Failed to load configuration")?;

    let event = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read event file {path}"))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read event from stdin")?;
            buf
        }
    };
    let notifications = StaticNotifications::from_ses_json(&event)?;
    info!(records = notifications.len(), "Notification event loaded");

    let transport = ReqwestTransport::new(&config.base_url, config.http_timeout)
        .context("Failed to create HTTP transport")?;
    let blobs = storage::connect(&config.blob_store).await;

    let bridge = MailBridge::new(
        Arc::from(blobs),
        Arc::new(transport),
        config.assistant.clone(),
        &config.bucket,
    )
    .with_poll_policy(config.poll)
    .with_conversation_timeout(config.conversation_timeout);

    let replies = bridge.run(&notifications).await?;
    for reply in &replies {
        println!("[{}] {} <{}>", reply.message_id, reply.subject, reply.from);
        println!("{}", reply.reply);
        println!();
    }
    info!(replies = replies.len(), "Batch complete");

    Ok(())
}
