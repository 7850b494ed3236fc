//! Main Telegram bot implementation.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use teloxide::dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use teloxide::utils::command::BotCommands;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use plantmama_agent::PlantAssistant;
use plantmama_core::Settings;
use plantmama_models::Reminder;
use plantmama_persistence::DataStore;

use crate::error::{Result, TelegramError};
use crate::handlers::{
    handle_command, handle_message, handle_photo, handle_unknown_command, reminder_notification,
    Command,
};
use crate::state::{create_shared_state, BotState};

/// How often due reminders are checked.
const REMINDER_POLL_INTERVAL_SECS: u64 = 30;

/// The PlantMama Telegram bot.
pub struct TelegramBot {
    /// The teloxide bot instance.
    bot: Bot,
    /// Shared state across handlers.
    state: Arc<BotState>,
}

impl TelegramBot {
    /// Create a bot from settings, an assistant and the store.
    pub fn new(
        settings: Settings,
        agent: Arc<dyn PlantAssistant>,
        store: Arc<DataStore>,
    ) -> Result<Self> {
        if settings.telegram_bot_token.trim().is_empty() {
            return Err(TelegramError::NoToken);
        }
        let bot = Bot::new(&settings.telegram_bot_token);
        let state = create_shared_state(settings, agent, store);
        Ok(Self { bot, state })
    }

    /// Get the bot's username.
    pub async fn get_me(&self) -> Result<String> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| TelegramError::BotStartFailed(e.to_string()))?;
        Ok(me.username().to_string())
    }

    /// Start in webhook mode when a webhook URL is configured, else poll.
    pub async fn run(&self) -> Result<()> {
        match self.state.settings.telegram_webhook_url.clone() {
            Some(url) => {
                self.start_webhook(&url, self.state.settings.telegram_webhook_port)
                    .await
            }
            None => self.start_polling().await,
        }
    }

    /// Start the bot in long-polling mode.
    pub async fn start_polling(&self) -> Result<()> {
        info!("Starting Telegram bot in polling mode...");
        self.prepare().await;

        Dispatcher::builder(self.bot.clone(), schema(Arc::clone(&self.state)))
            .default_handler(|upd| async move {
                debug!(update_id = ?upd.id, "Unhandled update");
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        info!("Bot stopped");
        Ok(())
    }

    /// Start the bot behind a webhook served on `port`.
    pub async fn start_webhook(&self, url: &str, port: u16) -> Result<()> {
        let url: url::Url = url
            .parse()
            .map_err(|e: url::ParseError| TelegramError::WebhookFailed(e.to_string()))?;
        let address = SocketAddr::from(([0, 0, 0, 0], port));
        info!(url = %url, port, "Starting Telegram bot in webhook mode...");

        let listener = webhooks::axum(self.bot.clone(), webhooks::Options::new(address, url))
            .await
            .map_err(|e| TelegramError::WebhookFailed(e.to_string()))?;
        self.prepare().await;

        Dispatcher::builder(self.bot.clone(), schema(Arc::clone(&self.state)))
            .default_handler(|upd| async move {
                debug!(update_id = ?upd.id, "Unhandled update");
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("An error from the webhook listener"),
            )
            .await;

        info!("Bot stopped");
        Ok(())
    }

    /// Register the command menu and start reminder delivery.
    async fn prepare(&self) {
        if let Err(e) = self.bot.set_my_commands(Command::bot_commands()).await {
            warn!(error = %e, "Failed to register bot commands");
        }

        let bot = self.bot.clone();
        let store = Arc::clone(&self.state.store);
        tokio::spawn(async move {
            reminder_loop(bot, store).await;
        });

        info!("Bot is running! Send /start to begin.");
    }
}

/// Update routing: commands, unknown commands, photos, then plain text.
fn schema(state: Arc<BotState>) -> UpdateHandler<teloxide::RequestError> {
    let state_for_commands = Arc::clone(&state);
    let state_for_photos = Arc::clone(&state);
    let state_for_messages = Arc::clone(&state);

    dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                    let state = Arc::clone(&state_for_commands);
                    info!(chat_id = %msg.chat.id, command = ?cmd, "Command received");
                    async move { handle_command(bot, msg, cmd, state).await }
                }),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.text().is_some_and(|t| t.starts_with('/')))
                .endpoint(|bot: Bot, msg: Message| async move {
                    handle_unknown_command(bot, msg).await
                }),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.photo().is_some())
                .endpoint(move |bot: Bot, msg: Message| {
                    let state = Arc::clone(&state_for_photos);
                    info!(chat_id = %msg.chat.id, "Photo received");
                    async move { handle_photo(bot, msg, state).await }
                }),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.text().is_some())
                .endpoint(move |bot: Bot, msg: Message| {
                    let state = Arc::clone(&state_for_messages);
                    debug!(chat_id = %msg.chat.id, "Text message received");
                    async move { handle_message(bot, msg, state).await }
                }),
        )
}

/// Due reminders paired with the chat they go to.
///
/// Reminders whose owner is unknown are skipped with a warning.
pub fn due_reminders(store: &DataStore, now: DateTime<Utc>) -> Result<Vec<(ChatId, Reminder)>> {
    let due = store.reminders.due(now)?;
    if due.is_empty() {
        return Ok(Vec::new());
    }

    let chats: HashMap<_, _> = store
        .users
        .list()?
        .into_iter()
        .map(|u| (u.id, u.telegram_id))
        .collect();

    Ok(due
        .into_iter()
        .filter_map(|reminder| match chats.get(&reminder.user_id) {
            Some(&telegram_id) => Some((ChatId(telegram_id), reminder)),
            None => {
                warn!(reminder_id = %reminder.id, user_id = %reminder.user_id, "Reminder owner not found");
                None
            }
        })
        .collect())
}

/// Background task delivering due reminders.
async fn reminder_loop(bot: Bot, store: Arc<DataStore>) {
    let mut poll_interval = interval(Duration::from_secs(REMINDER_POLL_INTERVAL_SECS));

    loop {
        poll_interval.tick().await;

        let now = Utc::now();
        let due = match due_reminders(&store, now) {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "Failed to load due reminders");
                continue;
            }
        };

        for (chat_id, reminder) in due {
            if let Err(e) = bot
                .send_message(chat_id, reminder_notification(&reminder))
                .await
            {
                // Stays pending, retried next tick.
                warn!(chat_id = %chat_id, reminder_id = %reminder.id, error = %e, "Failed to send reminder");
                continue;
            }
            match store.reminders.mark_sent(&reminder, now) {
                Ok(_) => info!(chat_id = %chat_id, reminder_id = %reminder.id, "Reminder sent"),
                Err(e) => {
                    error!(reminder_id = %reminder.id, error = %e, "Failed to mark reminder sent")
                }
            }
        }
    }
}
