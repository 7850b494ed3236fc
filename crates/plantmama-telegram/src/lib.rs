//! Telegram bot front end for PlantMama.
//!
//! Users talk to the bot in a private chat: photos go to the plant care
//! agent for diagnosis, text goes to the agent as a question, and a few
//! commands read the user's plants and reminders straight from the store.
//!
//! # Environment Variables
//!
//! Required:
//! - `TELEGRAM_BOT_TOKEN`: Bot token from @BotFather
//! - `OPENAI_API_KEY`: key for the chat completions endpoint
//!
//! Optional:
//! - `TELEGRAM_WEBHOOK_URL`: public URL; enables webhook mode
//! - `TELEGRAM_WEBHOOK_PORT`: webhook listener port (default: 8443)
//! - `MAX_IMAGE_SIZE`, `RATE_LIMIT_PER_USER`, `RATE_LIMIT_WINDOW`
//!
//! # Commands
//!
//! - `/start` - Welcome message
//! - `/help` - How to use the bot
//! - `/my_plants` - List saved plants
//! - `/add_plant <name>` - Save a plant
//! - `/reminders` - Pending reminders
//! - `/cancel_reminder <n>` - Cancel the n-th pending reminder

pub mod bot;
pub mod error;
pub mod handlers;
pub mod state;

pub use bot::{due_reminders, TelegramBot};
pub use error::{Result, TelegramError};
pub use handlers::{split_message, Command, TELEGRAM_MESSAGE_LIMIT};
pub use state::{create_shared_state, BotState, RateLimiter};
