//! Command, photo and text handlers for the Telegram bot.

use std::sync::Arc;

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ParseMode, PhotoSize};
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info, warn};

use plantmama_agent::UserRef;
use plantmama_core::validators;
use plantmama_models::{Plant, Reminder, UserProfile};

use crate::state::BotState;

/// Maximum length of one Telegram message.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

const STORAGE_ERROR_REPLY: &str =
    "⚠️ Не удалось получить данные. Пожалуйста, попробуйте позже.";

/// Bot commands that can be invoked with /.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "snake_case", description = "Доступные команды:")]
pub enum Command {
    #[command(description = "начать работу с PlantMama")]
    Start,

    #[command(description = "как пользоваться ботом")]
    Help,

    #[command(description = "список ваших растений")]
    MyPlants,

    #[command(description = "добавить растение: /add_plant <название>")]
    AddPlant(String),

    #[command(description = "ваши напоминания")]
    Reminders,

    #[command(description = "отменить напоминание: /cancel_reminder <номер>")]
    CancelReminder(String),
}

/// Profile of the sender as the agent sees it.
pub fn user_ref(user: &teloxide::types::User) -> UserRef {
    UserRef::new(user.id.0 as i64).with_profile(UserProfile {
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()),
        last_name: user.last_name.clone(),
        language_code: user.language_code.clone(),
    })
}

/// Escape HTML special characters for Telegram HTML mode.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn welcome_text(first_name: &str) -> String {
    format!(
        "Привет, {}! 🌿\n\n\
        Я — <b>PlantMama</b>, ваш помощник по уходу за комнатными растениями.\n\n\
        <b>Что я умею:</b>\n\
        📸 диагностировать растение по фото\n\
        🔍 определять вид растения\n\
        💧 составлять график полива и подкормки\n\
        🐛 подсказывать, как бороться с вредителями\n\
        ⏰ напоминать о поливе и пересадке\n\n\
        Просто пришлите фото растения или задайте вопрос.\n\
        Команды: /help",
        html_escape(first_name)
    )
}

pub fn help_text() -> String {
    "<b>Как пользоваться PlantMama</b> 🌱\n\n\
    📸 <b>Фото</b>: пришлите снимок растения, можно с подписью о проблеме. \
    Я оценю его состояние и дам рекомендации.\n\
    💬 <b>Вопрос</b>: напишите, что вас беспокоит, например \
    «почему желтеют листья у монстеры?».\n\n\
    <b>Команды:</b>\n\
    /start начать работу\n\
    /help эта справка\n\
    /my_plants список ваших растений\n\
    /add_plant &lt;название&gt; добавить растение\n\
    /reminders ваши напоминания\n\
    /cancel_reminder &lt;номер&gt; отменить напоминание\n\n\
    Совет: для точной диагностики снимайте при дневном свете, \
    чтобы были видны листья с обеих сторон."
        .to_string()
}

/// `/my_plants` body.
pub fn format_plant_list(plants: &[Plant]) -> String {
    if plants.is_empty() {
        return "У вас пока нет растений. 🌱\n\n\
            Добавьте первое: /add_plant Монстера\n\
            или просто пришлите фото."
            .to_string();
    }

    let mut out = format!("<b>Ваши растения ({}):</b>\n", plants.len());
    for (i, plant) in plants.iter().enumerate() {
        out.push_str(&format!("\n{}. 🌿 <b>{}</b>", i + 1, html_escape(plant.display_name())));
        if let Some(species) = &plant.species {
            out.push_str(&format!(" <i>({})</i>", html_escape(species)));
        }
        let health = plant
            .health_score
            .map(|s| format!("{:.1}/10", s))
            .unwrap_or_else(|| "нет данных".to_string());
        let watered = plant
            .last_watered
            .map(|t| t.format("%d.%m.%Y").to_string())
            .unwrap_or_else(|| "не отмечен".to_string());
        out.push_str(&format!(
            "\n   Здоровье: {} · Полив: {}",
            health, watered
        ));
    }
    out
}

/// `/reminders` body, numbered for `/cancel_reminder`.
pub fn format_reminder_list(reminders: &[Reminder]) -> String {
    if reminders.is_empty() {
        return "Активных напоминаний нет. ⏰\n\n\
            Попросите меня, например: «напомни полить фикус в субботу утром»."
            .to_string();
    }

    let mut out = "<b>Ваши напоминания:</b>\n".to_string();
    for (i, reminder) in reminders.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. {} {} ({} UTC)",
            i + 1,
            reminder.kind.emoji(),
            html_escape(&reminder.title),
            reminder.scheduled_at.format("%d.%m.%Y %H:%M")
        ));
    }
    out.push_str("\n\nОтменить: /cancel_reminder &lt;номер&gt;");
    out
}

/// Text delivered when a reminder fires.
pub fn reminder_notification(reminder: &Reminder) -> String {
    let mut text = format!("⏰ Напоминание: {} {}", reminder.kind.emoji(), reminder.title);
    if let Some(description) = &reminder.description {
        text.push_str("\n\n");
        text.push_str(description);
    }
    text
}

/// Split `text` into chunks of at most `limit` characters, on line
/// boundaries where possible.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { line_len + 1 };

        if current_len + needed > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Send a plain-text reply, split to Telegram's size limit.
async fn send_reply(bot: &Bot, chat_id: ChatId, text: &str) -> ResponseResult<()> {
    for chunk in split_message(text, TELEGRAM_MESSAGE_LIMIT) {
        bot.send_message(chat_id, chunk).await?;
    }
    Ok(())
}

async fn send_html(bot: &Bot, chat_id: ChatId, text: String) -> ResponseResult<()> {
    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn send_rate_limited(bot: &Bot, chat_id: ChatId, state: &BotState) -> ResponseResult<()> {
    bot.send_message(
        chat_id,
        format!(
            "⏳ Слишком много запросов. Пожалуйста, подождите немного \
             (лимит: {} сообщений за {} сек.).",
            state.settings.rate_limit_per_user,
            state.rate_limiter.window_secs()
        ),
    )
    .await?;
    Ok(())
}

/// Handle the /start command.
pub async fn handle_start(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = user_ref(from);

    if let Err(e) = state.store.users.get_or_create(user.telegram_id, &user.profile) {
        error!(telegram_id = user.telegram_id, error = %e, "Failed to register user");
    }

    send_html(&bot, msg.chat.id, welcome_text(&from.first_name)).await?;
    info!(chat_id = %msg.chat.id, username = ?from.username, "User started bot");
    Ok(())
}

/// Handle the /help command.
pub async fn handle_help(bot: Bot, msg: Message) -> ResponseResult<()> {
    send_html(&bot, msg.chat.id, help_text()).await
}

/// Handle the /my_plants command.
pub async fn handle_my_plants(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = user_ref(from);

    let plants = state
        .store
        .users
        .get_or_create(user.telegram_id, &user.profile)
        .and_then(|u| state.store.plants.list(&u.id));
    match plants {
        Ok(plants) => send_html(&bot, msg.chat.id, format_plant_list(&plants)).await,
        Err(e) => {
            error!(telegram_id = user.telegram_id, error = %e, "Failed to list plants");
            bot.send_message(msg.chat.id, STORAGE_ERROR_REPLY).await?;
            Ok(())
        }
    }
}

/// Handle the /add_plant command.
pub async fn handle_add_plant(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    name: String,
) -> ResponseResult<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = user_ref(from);
    let name = name.trim();

    if name.is_empty() {
        send_html(
            &bot,
            msg.chat.id,
            "Укажите название растения.\n\n<b>Пример:</b> <code>/add_plant Монстера</code>"
                .to_string(),
        )
        .await?;
        return Ok(());
    }
    if let Err(e) = validators::validate_plant_name(name) {
        bot.send_message(msg.chat.id, format!("⚠️ {}", e)).await?;
        return Ok(());
    }

    let result = state
        .store
        .users
        .get_or_create(user.telegram_id, &user.profile)
        .and_then(|owner| {
            if let Some(existing) = state.store.plants.find_by_name(&owner.id, name)? {
                return Ok((existing, false));
            }
            let plant = Plant::new(owner.id.clone(), name);
            state.store.plants.save(&plant)?;
            Ok((plant, true))
        });

    match result {
        Ok((plant, true)) => {
            info!(plant_id = %plant.id, telegram_id = user.telegram_id, "Plant added via command");
            send_html(
                &bot,
                msg.chat.id,
                format!(
                    "✅ Растение <b>{}</b> добавлено!\n\n\
                    Пришлите его фото, и я оценю его состояние.",
                    html_escape(&plant.name)
                ),
            )
            .await
        }
        Ok((plant, false)) => {
            send_html(
                &bot,
                msg.chat.id,
                format!("🌿 Растение <b>{}</b> уже есть в вашем списке.", html_escape(&plant.name)),
            )
            .await
        }
        Err(e) => {
            error!(telegram_id = user.telegram_id, error = %e, "Failed to add plant");
            bot.send_message(msg.chat.id, STORAGE_ERROR_REPLY).await?;
            Ok(())
        }
    }
}

fn pending_reminders(state: &BotState, user: &UserRef) -> plantmama_persistence::Result<Vec<Reminder>> {
    let owner = state
        .store
        .users
        .get_or_create(user.telegram_id, &user.profile)?;
    state.store.reminders.pending(&owner.id)
}

/// Handle the /reminders command.
pub async fn handle_reminders(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = user_ref(from);

    match pending_reminders(&state, &user) {
        Ok(reminders) => send_html(&bot, msg.chat.id, format_reminder_list(&reminders)).await,
        Err(e) => {
            error!(telegram_id = user.telegram_id, error = %e, "Failed to list reminders");
            bot.send_message(msg.chat.id, STORAGE_ERROR_REPLY).await?;
            Ok(())
        }
    }
}

/// Handle the /cancel_reminder command.
pub async fn handle_cancel_reminder(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    arg: String,
) -> ResponseResult<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = user_ref(from);

    let Some(index) = arg.trim().parse::<usize>().ok().filter(|n| *n >= 1) else {
        bot.send_message(
            msg.chat.id,
            "Укажите номер напоминания из списка /reminders, например: /cancel_reminder 1",
        )
        .await?;
        return Ok(());
    };

    let result = pending_reminders(&state, &user).and_then(|reminders| {
        match reminders.get(index - 1) {
            Some(reminder) => {
                let cancelled = state.store.reminders.cancel(&reminder.user_id, &reminder.id)?;
                Ok(cancelled.then(|| reminder.title.clone()))
            }
            None => Ok(None),
        }
    });

    match result {
        Ok(Some(title)) => {
            info!(telegram_id = user.telegram_id, index, "Reminder cancelled");
            bot.send_message(msg.chat.id, format!("🗑 Напоминание «{}» отменено.", title))
                .await?;
        }
        Ok(None) => {
            bot.send_message(
                msg.chat.id,
                format!("Напоминание №{} не найдено. Посмотрите список: /reminders", index),
            )
            .await?;
        }
        Err(e) => {
            error!(telegram_id = user.telegram_id, error = %e, "Failed to cancel reminder");
            bot.send_message(msg.chat.id, STORAGE_ERROR_REPLY).await?;
        }
    }
    Ok(())
}

/// Largest photo size Telegram offers.
fn largest_photo(photos: &[PhotoSize]) -> Option<&PhotoSize> {
    photos.iter().max_by_key(|p| u64::from(p.width) * u64::from(p.height))
}

async fn download_photo(bot: &Bot, photo: &PhotoSize) -> crate::Result<Vec<u8>> {
    let file = bot.get_file(photo.file.id.clone()).await?;
    let mut data = Vec::new();
    bot.download_file(&file.path, &mut data).await?;
    Ok(data)
}

/// Handle a photo message.
pub async fn handle_photo(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let (Some(photos), Some(from)) = (msg.photo(), msg.from.as_ref()) else {
        return Ok(());
    };
    let user = user_ref(from);

    if !state.rate_limiter.check(user.telegram_id).await {
        return send_rate_limited(&bot, msg.chat.id, &state).await;
    }

    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;

    let Some(photo) = largest_photo(photos) else {
        return Ok(());
    };
    if let Err(e) =
        validators::validate_image_size(u64::from(photo.file.size), state.settings.max_image_size)
    {
        bot.send_message(msg.chat.id, format!("⚠️ {}", e)).await?;
        return Ok(());
    }

    let data = match download_photo(&bot, photo).await {
        Ok(data) => data,
        Err(e) => {
            error!(telegram_id = user.telegram_id, error = %e, "Failed to download photo");
            bot.send_message(
                msg.chat.id,
                "⚠️ Не удалось загрузить фото. Пожалуйста, попробуйте отправить его ещё раз.",
            )
            .await?;
            return Ok(());
        }
    };
    debug!(telegram_id = user.telegram_id, bytes = data.len(), "Photo downloaded");

    let reply = state
        .agent
        .analyze_plant_image(&data, &user, msg.caption())
        .await;
    send_reply(&bot, msg.chat.id, &reply).await
}

/// Handle a non-command text message.
pub async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let (Some(text), Some(from)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };
    let user = user_ref(from);

    if !state.rate_limiter.check(user.telegram_id).await {
        return send_rate_limited(&bot, msg.chat.id, &state).await;
    }

    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;

    let reply = state.agent.process_message(text, &user, None, None).await;
    send_reply(&bot, msg.chat.id, &reply).await
}

/// Reply to a `/command` that did not parse.
pub async fn handle_unknown_command(bot: Bot, msg: Message) -> ResponseResult<()> {
    if let Some(text) = msg.text() {
        let command = text.split_whitespace().next().unwrap_or(text);
        warn!(command = %command, "Unknown command");
        bot.send_message(
            msg.chat.id,
            format!(
                "Неизвестная команда: {}\n\nИспользуйте /help, чтобы увидеть список команд.",
                command
            ),
        )
        .await?;
    }
    Ok(())
}

/// Dispatch a parsed command.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => handle_start(bot, msg, state).await,
        Command::Help => handle_help(bot, msg).await,
        Command::MyPlants => handle_my_plants(bot, msg, state).await,
        Command::AddPlant(name) => handle_add_plant(bot, msg, state, name).await,
        Command::Reminders => handle_reminders(bot, msg, state).await,
        Command::CancelReminder(arg) => handle_cancel_reminder(bot, msg, state, arg).await,
    }
}
