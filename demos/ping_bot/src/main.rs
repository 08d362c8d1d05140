//! Ping Bot Example
//!
//! Answers the `/ping` slash command, then sends a followup carrying a button
//! whose custom id is generated at runtime. Pressing the button within the
//! custom-id lifetime answers once more; afterwards the id is gone.
//!
//! The bot also logs every message it can see.
//!
//! # Usage
//!
//! ```bash
//! TETHER_GATEWAY__TOKEN=... TETHER_GATEWAY__APPLICATION_ID=... \
//!     cargo run --package ping-bot -- --profile dev
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use serde_json::{Value, json};
use tether::prelude::*;
use tracing::info;

#[derive(Debug, Parser)]
#[command(about = "A slash-command ping bot")]
struct Args {
    /// Configuration file to load instead of searching.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (`tether.{profile}.toml`).
    #[arg(short, long)]
    profile: Option<String>,
}

// ============================================================================
// Callbacks
// ============================================================================

/// `/ping`: respond, then offer a button that pings again.
async fn ping(ctx: InteractionContext, _raw: Value, client: Client) -> Result<()> {
    ctx.respond(MessagePayload::text("Pong! 🏓")).await?;

    let custom_id = client.dispatcher().register_component(ping_again, false);
    let mut followup = MessagePayload::text("Want another one?").ephemeral(true);
    followup.components = vec![json!({
        "type": 1,
        "components": [{
            "type": 2,
            "style": 1,
            "label": "Ping again",
            "custom_id": custom_id,
        }]
    })];
    ctx.followup(followup).await?;
    Ok(())
}

async fn ping_again(ctx: InteractionContext) -> Result<()> {
    ctx.respond(MessagePayload::text("Pong again!")).await?;
    Ok(())
}

async fn log_message(event: Arc<GatewayEvent>) {
    if let Some(message) = event.message() {
        let author = message
            .author
            .as_ref()
            .map_or("unknown", |user| user.username.as_str());
        info!(
            channel = %message.channel_id,
            author,
            "{}",
            message.content
        );
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    if let Some(profile) = &args.profile {
        loader = loader.profile(profile);
    }
    let config = loader.load()?;
    init_from_config(&config.logging);

    let client = TetherClient::from_config(&config)?;
    client.register_global_command("ping", ping, None);
    client.register_event_handler(EventKind::MessageCreate, log_message);

    client.run().await?;
    Ok(())
}
