//! The PlantMama conversational agent.
//!
//! [`PlantCareAgent`] keeps one open session per user, replays its recent
//! messages to the model and runs the tool-calling loop until the model
//! answers in plain text.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, trace, warn};

use plantmama_core::image::{self as image_ops, ImageError, ImageProcessor};
use plantmama_core::{validators, Season, Settings};
use plantmama_models::{ChatMessage as StoredMessage, ChatRole, User};
use plantmama_persistence::DataStore;

use crate::client::{ChatClient, ChatMessage, ChatTool};
use crate::config::ModelConfig;
use crate::context::{AttachedImage, ToolContext, UserRef};
use crate::error::{AgentError, Result};
use crate::tool::{ToolDefinition, ToolResult};
use crate::tools;

/// Maximum model turns per message.
const MAX_TOOL_ITERATIONS: u32 = 5;

/// Stored messages replayed as conversation history.
const HISTORY_LIMIT: usize = 10;

/// Reply when anything fails while handling a message.
pub const ERROR_REPLY: &str =
    "I'm sorry, I encountered an error processing your request. Please try again.";

/// Reply when the model finished without any text.
pub const FALLBACK_REPLY: &str = "Извините, я не смог обработать ваш запрос. \
Пожалуйста, попробуйте ещё раз — например, отправьте фото растения или уточните, \
в чём нужна помощь. Я здесь, чтобы помочь! 🌿";

const IMAGE_REQUEST: &str = "Please analyze this plant image and provide a diagnosis.";

const IMAGE_NOTE: &str = "[User has uploaded an image for analysis] \
Use diagnose_plant_photo to assess plant health or identify_plant_species to \
determine the species of the attached photo.";

/// PlantMama persona.
pub const SYSTEM_PROMPT: &str = "Ты — PlantMama, заботливый и знающий помощник по уходу \
за комнатными растениями.

Твой стиль:
- дружелюбный и поддерживающий, без лишней фамильярности;
- научно точный: опирайся на ботанику и фитопатологию, не выдумывай факты;
- практичный: давай конкретные шаги, которые пользователь может сделать сегодня;
- адаптируйся к опыту пользователя: новичку объясняй проще, опытному — подробнее.

Когда пользователь присылает фото, используй инструменты diagnose_plant_photo и \
identify_plant_species. Анализ фото излагай кратко: состояние, вероятные причины, \
что делать дальше. Для советов по уходу используй generate_care_instructions, \
recommend_fertilizers, recommend_tools, get_pest_treatment, get_plant_encyclopedia \
и calculate_watering_schedule. Добавляй новые растения через add_plant, отмечай \
полив и подкормку через record_care, ставь напоминания через schedule_reminder.

Отвечай на языке пользователя (по умолчанию на русском). Будь краток: не больше \
нескольких абзацев, используй списки для шагов.";

/// Front door the bot talks to.
#[async_trait]
pub trait PlantAssistant: Send + Sync {
    /// Answer a text message, optionally with an already processed photo.
    ///
    /// Never fails; errors become an apology.
    async fn process_message(
        &self,
        message: &str,
        user: &UserRef,
        image: Option<&AttachedImage>,
        context: Option<serde_json::Value>,
    ) -> String;

    /// Validate, store and diagnose a raw photo.
    async fn analyze_plant_image(
        &self,
        image: &[u8],
        user: &UserRef,
        caption: Option<&str>,
    ) -> String;
}

/// Final text of one tool loop plus the tokens it cost.
struct LoopOutcome {
    text: Option<String>,
    tokens: u32,
}

/// Tool-calling plant care agent.
pub struct PlantCareAgent {
    client: ChatClient,
    config: ModelConfig,
    vision_config: ModelConfig,
    aux_config: ModelConfig,
    store: Arc<DataStore>,
    processor: ImageProcessor,
    upload_dir: PathBuf,
    max_image_size: u64,
    tools: Vec<ToolDefinition>,
}

impl PlantCareAgent {
    /// Create an agent talking to the endpoint configured in `settings`.
    pub fn new(settings: &Settings, store: Arc<DataStore>) -> Result<Self> {
        let client = ChatClient::from_settings(settings)?;
        Ok(Self::with_client(settings, store, client))
    }

    /// Create an agent with an explicit client.
    pub fn with_client(settings: &Settings, store: Arc<DataStore>, client: ChatClient) -> Self {
        let tools = tools::definitions();
        info!(
            model = %settings.openai_model,
            tools = tools.len(),
            "PlantCare agent initialized"
        );
        Self {
            client,
            config: ModelConfig::agent(settings).with_system_prompt(SYSTEM_PROMPT),
            vision_config: ModelConfig::vision(settings),
            aux_config: ModelConfig::auxiliary(settings),
            store,
            processor: ImageProcessor::new(),
            upload_dir: settings.upload_dir.clone(),
            max_image_size: settings.max_image_size,
            tools,
        }
    }

    /// Registered tool definitions.
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// The backing store.
    pub fn store(&self) -> &DataStore {
        &self.store
    }

    async fn handle_message(
        &self,
        message: &str,
        user_ref: &UserRef,
        image: Option<&AttachedImage>,
        context: Option<serde_json::Value>,
    ) -> Result<String> {
        let text = validators::sanitize_user_input(message);
        let user = self
            .store
            .users
            .get_or_create(user_ref.telegram_id, &user_ref.profile)?;
        let session = self.store.sessions.current_or_open(&user.id)?;
        let history = self.store.sessions.messages(&session.id)?;

        let mut stored = StoredMessage::new(session.id.clone(), ChatRole::User, text.as_str());
        if let Some(image) = image {
            stored = stored.with_image(image.path_string());
        }
        self.store.sessions.append_message(&user.id, &stored)?;

        let messages = self.build_messages(&user, &history, &text, image, context.as_ref())?;
        let ctx = ToolContext {
            store: &self.store,
            client: &self.client,
            vision_config: &self.vision_config,
            aux_config: &self.aux_config,
            user: &user,
            session_id: &session.id,
            image,
        };
        let outcome = self.run_tool_loop(&ctx, messages).await?;

        let reply = outcome
            .text
            .unwrap_or_else(|| FALLBACK_REPLY.to_string());
        let answer = StoredMessage::new(session.id.clone(), ChatRole::Assistant, reply.as_str())
            .with_tokens(outcome.tokens);
        let session = self.store.sessions.append_message(&user.id, &answer)?;

        info!(
            user_id = %user.id,
            session_id = %session.id,
            tokens = outcome.tokens,
            session_tokens = session.tokens_used,
            "Message processed"
        );
        Ok(reply)
    }

    fn build_messages(
        &self,
        user: &User,
        history: &[StoredMessage],
        text: &str,
        image: Option<&AttachedImage>,
        context: Option<&serde_json::Value>,
    ) -> Result<Vec<ChatMessage>> {
        let mut messages = vec![ChatMessage::system(self.context_note(user, context)?)];

        let skip = history.len().saturating_sub(HISTORY_LIMIT);
        for past in &history[skip..] {
            match past.role {
                ChatRole::User => messages.push(ChatMessage::user(&past.content)),
                ChatRole::Assistant => messages.push(ChatMessage::assistant(&past.content)),
                ChatRole::System => {}
            }
        }

        match image {
            Some(attached) => {
                let body = if text.is_empty() {
                    IMAGE_NOTE.to_string()
                } else {
                    format!("{}\n\n{}", text, IMAGE_NOTE)
                };
                messages.push(ChatMessage::user_with_image(
                    body,
                    attached.image.mime_type(),
                    &attached.image.bytes,
                ));
            }
            None => messages.push(ChatMessage::user(text)),
        }
        Ok(messages)
    }

    /// Date, season, the user's name and plants, plus caller context.
    fn context_note(&self, user: &User, context: Option<&serde_json::Value>) -> Result<String> {
        let season = Season::current();
        let mut note = format!(
            "Сегодня {}, сезон: {}.\nПользователь: {}.",
            Utc::now().format("%Y-%m-%d"),
            season.russian_name(),
            user.display_name()
        );

        let plants = self.store.plants.list(&user.id)?;
        if plants.is_empty() {
            note.push_str("\nУ пользователя пока нет сохранённых растений.");
        } else {
            note.push_str("\nРастения пользователя (имя — plant_id):");
            for plant in &plants {
                note.push_str(&format!("\n- {} — {}", plant.display_name(), plant.id));
                if let Some(species) = &plant.species {
                    note.push_str(&format!(" ({})", species));
                }
            }
        }

        if let Some(extra) = context {
            note.push_str(&format!("\nДополнительный контекст: {}", extra));
        }
        Ok(note)
    }

    async fn run_tool_loop(
        &self,
        ctx: &ToolContext<'_>,
        mut messages: Vec<ChatMessage>,
    ) -> Result<LoopOutcome> {
        let chat_tools: Vec<ChatTool> = self.tools.iter().map(ChatTool::from_definition).collect();
        let mut tokens = 0;

        for iteration in 1..=MAX_TOOL_ITERATIONS {
            trace!(iteration, "Tool loop iteration");

            let response = self
                .client
                .chat(&self.config, messages.clone(), Some(chat_tools.clone()))
                .await?;
            tokens += response.total_tokens();

            if !response.has_tool_calls() {
                let text = response
                    .text()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string);
                return Ok(LoopOutcome { text, tokens });
            }

            let raw_calls = response.raw_tool_calls().to_vec();
            debug!(count = raw_calls.len(), "Received tool calls");
            let assistant_content = response.message().and_then(|m| m.content.clone());
            messages.push(ChatMessage::assistant_with_tools(
                assistant_content,
                raw_calls.clone(),
            ));

            for raw in &raw_calls {
                let result = match raw.to_tool_call() {
                    Ok(call) => match tools::execute(ctx, &call).await {
                        Ok(result) => result,
                        Err(e) => {
                            warn!(tool = %call.name, error = %e, "Tool execution failed");
                            ToolResult::error(&call.id, e.to_string())
                        }
                    },
                    Err(e) => {
                        warn!(tool = %raw.function.name, error = %e, "Malformed tool arguments");
                        ToolResult::error(&raw.id, e.to_string())
                    }
                };
                messages.push(ChatMessage::tool(&result.tool_call_id, result.content));
            }
        }

        Err(AgentError::MaxIterationsExceeded(MAX_TOOL_ITERATIONS))
    }

    /// Size check, plausibility gate, normalization and storage.
    ///
    /// Decoding and encoding run on the blocking pool.
    async fn prepare_image(&self, data: &[u8]) -> std::result::Result<AttachedImage, String> {
        validators::validate_image_size(data.len() as u64, self.max_image_size)
            .map_err(|e| e.to_string())?;

        let processor = self.processor.clone();
        let upload_dir = self.upload_dir.clone();
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || prepare_upload(&processor, &upload_dir, &data))
            .await
            .map_err(|e| e.to_string())?
    }
}

/// Validate, normalize and store one photo.
fn prepare_upload(
    processor: &ImageProcessor,
    upload_dir: &Path,
    data: &[u8],
) -> std::result::Result<AttachedImage, String> {
    let (processed, features) = processor
        .validate_plant_image(data)
        .map_err(|e| e.to_string())?;
    debug!(
        brightness = features.brightness,
        green_ratio = features.green_ratio,
        "Image passed validation"
    );

    let path = match image_ops::save_upload(upload_dir, &processed.bytes) {
        Ok(path) => Some(path),
        Err(e @ ImageError::Io { .. }) => {
            warn!(error = %e, "Failed to store upload, continuing without it");
            None
        }
        Err(e) => return Err(e.to_string()),
    };
    Ok(AttachedImage::new(processed, path))
}

#[async_trait]
impl PlantAssistant for PlantCareAgent {
    async fn process_message(
        &self,
        message: &str,
        user: &UserRef,
        image: Option<&AttachedImage>,
        context: Option<serde_json::Value>,
    ) -> String {
        match self.handle_message(message, user, image, context).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(telegram_id = user.telegram_id, error = %e, "Failed to process message");
                ERROR_REPLY.to_string()
            }
        }
    }

    async fn analyze_plant_image(
        &self,
        image: &[u8],
        user: &UserRef,
        caption: Option<&str>,
    ) -> String {
        let attached = match self.prepare_image(image).await {
            Ok(attached) => attached,
            Err(reason) => {
                warn!(telegram_id = user.telegram_id, reason = %reason, "Rejected plant image");
                return format!(
                    "Не получилось обработать фото: {}. Пожалуйста, пришлите чёткий снимок \
                     растения при хорошем освещении. 🌿",
                    reason
                );
            }
        };

        let mut message = IMAGE_REQUEST.to_string();
        if let Some(caption) = caption.map(str::trim).filter(|c| !c.is_empty()) {
            message.push_str(&format!("\n\nAdditional information: {}", caption));
        }
        self.process_message(&message, user, Some(&attached), None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plantmama_models::{Plant, SessionId};

    fn agent(dir: &std::path::Path) -> PlantCareAgent {
        let settings = Settings::for_tests(dir);
        let store = Arc::new(DataStore::new(&settings.data_dir));
        PlantCareAgent::with_client(&settings, store, ChatClient::new("key", "http://localhost:1"))
    }

    #[test]
    fn test_registers_all_tools() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent(dir.path());
        assert_eq!(agent.tools().len(), tools::definitions().len());
        assert_eq!(agent.config.system_prompt.as_deref(), Some(SYSTEM_PROMPT));
    }

    #[test]
    fn test_history_is_limited() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent(dir.path());
        let user = User::new(1);
        let session_id = SessionId::new();
        let history: Vec<_> = (0..15)
            .map(|i| {
                let role = if i % 2 == 0 { ChatRole::User } else { ChatRole::Assistant };
                StoredMessage::new(session_id.clone(), role, format!("m{}", i))
            })
            .collect();

        let messages = agent
            .build_messages(&user, &history, "hello", None, None)
            .unwrap();

        // context note + 10 history + current
        assert_eq!(messages.len(), 12);
        assert_eq!(messages[1].text().as_deref(), Some("m5"));
        assert_eq!(messages[11].text().as_deref(), Some("hello"));
    }

    #[test]
    fn test_context_note_lists_plants() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent(dir.path());
        let user = User::new(7);
        let plant = Plant::new(user.id.clone(), "Фикус").with_species("Ficus lyrata");
        agent.store.plants.save(&plant).unwrap();

        let note = agent
            .context_note(&user, Some(&serde_json::json!({"source": "test"})))
            .unwrap();
        assert!(note.contains("Фикус"));
        assert!(note.contains(plant.id.as_str()));
        assert!(note.contains("Ficus lyrata"));
        assert!(note.contains("\"source\""));
    }

    #[tokio::test]
    async fn test_rejects_garbage_image() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent(dir.path());
        let reply = agent
            .analyze_plant_image(b"not an image", &UserRef::new(3), None)
            .await;
        assert!(reply.starts_with("Не получилось обработать фото"));
    }

    #[test]
    fn test_prepare_upload_stores_normalized_photo() {
        use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};

        let dir = tempfile::tempdir().unwrap();
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(24, 24, Rgb([40u8, 150, 50])))
            .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let attached = prepare_upload(&ImageProcessor::new(), dir.path(), &png).unwrap();
        assert_eq!(attached.image.mime_type(), "image/jpeg");
        let path = attached.path.unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(std::fs::read(path).unwrap(), attached.image.bytes);

        let err = prepare_upload(&ImageProcessor::new(), dir.path(), b"nope").unwrap_err();
        assert!(!err.is_empty());
    }
}
