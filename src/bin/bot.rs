//! Chat bot entry point
//!
//! Loads a JSON command document and runs it against a chat transport.
//! Settings can come from:
//! - bot.yaml (or the file named by CONFIG_FILE)
//! - Environment variables (BOT_*)

use anyhow::{Context, Result};
use dotenvy::dotenv;
use log::{error, info};

use chatbot_loader::config::BotSettings;
use chatbot_loader::loader;
use chatbot_loader::runtime::Runtime;
use chatbot_loader::transport::{console, irc, TransportKind};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let settings = BotSettings::auto_load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&settings.log_level),
    )
    .init();

    info!("Starting chat bot ({:?} transport)...", settings.transport);

    // Load errors are fatal and reported here, never to chat
    let bot = loader::load_file(&settings.commands_file)
        .with_context(|| format!("Failed to load commands from {}", settings.commands_file))?
        .with_prefix(settings.command_prefix.clone());
    info!("Loaded {} command(s)", bot.command_count());

    let mut runtime = Runtime::new(bot);
    for user in settings.approved_users()? {
        runtime.bot_mut().approve_user(user);
    }

    let connection = match settings.transport {
        TransportKind::Irc => {
            let irc_settings = settings.irc_settings()?;
            let connection = irc::connect(&irc_settings).await?;
            if let Some(host) = settings.channel_host() {
                runtime.bot_mut().approve_user(host);
            }
            connection
        }
        TransportKind::Console => {
            info!("Reading chat from stdin as 'user: text' lines");
            console::connect()
        }
    };

    tokio::select! {
        result = runtime.run(connection, settings.join_message.as_deref()) => {
            if let Err(e) = &result {
                error!("Dispatch loop failed: {e}");
            }
            result
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Received Ctrl+C, shutting down..."),
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
            Ok(())
        }
    }
}
