//! PlantMama bot binary.
//!
//! Start the bot with:
//! ```bash
//! TELEGRAM_BOT_TOKEN=xxx OPENAI_API_KEY=yyy cargo run -p plantmama-telegram
//! ```

use std::sync::Arc;

use clap::Parser;
use plantmama_agent::PlantCareAgent;
use plantmama_core::{config, init_logging, Settings};
use plantmama_persistence::DataStore;
use plantmama_telegram::{TelegramBot, TelegramError};

/// PlantMama - plant care assistant for Telegram
#[derive(Parser, Debug)]
#[command(name = "plantmama")]
#[command(about = "Telegram bot that diagnoses plants from photos and gives care advice")]
struct Args {
    /// Use webhook mode (requires TELEGRAM_WEBHOOK_URL)
    #[arg(short, long)]
    webhook: bool,

    /// Webhook port (default: TELEGRAM_WEBHOOK_PORT or 8443)
    #[arg(short, long)]
    port: Option<u16>,

    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Validate settings and storage, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    config::load_env_files();
    let mut settings = Settings::from_env()?;
    init_logging(&settings, args.verbose);

    if let Err(e) = config::ensure_all_dirs() {
        tracing::warn!(error = %e, "Failed to create all directories");
    }

    let store = Arc::new(DataStore::new(&settings.data_dir));
    store.health_check()?;

    if args.check {
        println!("Settings and storage OK");
        println!("   Data: {}", settings.data_dir.display());
        println!("   Uploads: {}", settings.upload_dir.display());
        println!("   Model: {}", settings.openai_model);
        return Ok(());
    }

    if let Some(port) = args.port {
        settings.telegram_webhook_port = port;
    }
    if args.webhook && !settings.uses_webhook() {
        return Err(TelegramError::WebhookFailed(
            "--webhook requires TELEGRAM_WEBHOOK_URL".to_string(),
        )
        .into());
    }
    let mode = if settings.uses_webhook() { "webhook" } else { "polling" };

    let agent = Arc::new(PlantCareAgent::new(&settings, Arc::clone(&store))?);
    let bot = TelegramBot::new(settings, agent, store)?;

    match bot.get_me().await {
        Ok(username) => {
            tracing::info!(username = %username, "Bot initialized successfully");
            println!("\n🌿 PlantMama");
            println!("   Bot: @{}", username);
            println!("   Mode: {}", mode);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get bot info");
            return Err(e.into());
        }
    }

    println!("   Press Ctrl+C to stop\n");

    bot.run().await?;

    Ok(())
}
