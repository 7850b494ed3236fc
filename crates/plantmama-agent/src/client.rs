//! Client for OpenAI-compatible chat completions with tool calling.
//!
//! Supports plain text and multimodal (text + image) user messages, tool
//! definitions with automatic tool choice, and JSON-object response mode.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::ModelConfig;
use crate::error::{AgentError, Result};
use crate::tool::{ToolCall, ToolDefinition};

/// Chat completions client.
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// Create a client for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a client from loaded settings.
    pub fn from_settings(settings: &plantmama_core::Settings) -> Result<Self> {
        if settings.openai_api_key.trim().is_empty() {
            return Err(AgentError::Configuration(
                "OPENAI_API_KEY is empty".to_string(),
            ));
        }
        Ok(Self::new(&settings.openai_api_key, &settings.openai_base_url))
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Send a chat completion request.
    ///
    /// A system prompt in `config` is prepended to `messages`.
    pub async fn chat(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ChatTool>>,
    ) -> Result<ChatResponse> {
        let mut all_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(prompt) = &config.system_prompt {
            all_messages.push(ChatMessage::system(prompt));
        }
        all_messages.extend(messages);

        let tools = tools.filter(|t| !t.is_empty());
        let request = ChatRequest {
            model: config.model.clone(),
            messages: all_messages,
            tool_choice: tools.as_ref().map(|_| "auto".to_string()),
            tools,
            max_tokens: Some(config.max_tokens),
            temperature: Some(config.temperature),
            response_format: config.json_mode.then(ResponseFormat::json_object),
        };

        trace!(model = %request.model, messages = request.messages.len(), "Sending chat request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::ModelInvocation(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::ModelInvocation(format!(
                "API error {}: {}",
                status, text
            )));
        }

        let response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::ResponseParse(format!("Failed to parse response: {}", e)))?;

        debug!(
            model = %config.model,
            tokens = response.total_tokens(),
            tool_calls = response.has_tool_calls(),
            "Chat response received"
        );

        Ok(response)
    }

    /// Single request that must answer with a JSON object, decoded as `T`.
    pub async fn complete_json<T: serde::de::DeserializeOwned>(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> Result<T> {
        let response = self.chat(config, messages, None).await?;
        let text = response
            .text()
            .ok_or_else(|| AgentError::ResponseParse("empty model response".to_string()))?;
        parse_json_reply(text)
    }
}

/// Decode a JSON reply, tolerating a surrounding Markdown code fence.
pub fn parse_json_reply<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(body)
        .map_err(|e| AgentError::ResponseParse(format!("model did not return valid JSON: {}", e)))
}

/// Chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,

    /// Conversation messages.
    pub messages: Vec<ChatMessage>,

    /// Available tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ChatTool>>,

    /// `"auto"` whenever tools are offered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,

    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature for generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Structured output mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

/// `{"type": "json_object"}`.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            format_type: "json_object".to_string(),
        }
    }
}

/// Message content: plain text or a list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenated text of the content.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Whether an image part is present.
    pub fn has_image(&self) -> bool {
        matches!(self, Self::Parts(parts) if parts.iter().any(|p| matches!(p, ContentPart::ImageUrl { .. })))
    }
}

/// One part of a multimodal message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Image reference, usually a `data:` URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Inline image as a base64 `data:` URL.
    pub fn image(mime_type: &str, bytes: &[u8]) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl {
                url: data_url(mime_type, bytes),
                detail: None,
            },
        }
    }
}

/// `data:{mime};base64,{payload}`.
pub fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, BASE64.encode(bytes))
}

/// A message in the chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: String,

    /// Content of the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,

    /// Tool calls made by the assistant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,

    /// Tool call ID for tool result messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text_message(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(MessageContent::Text(content.into())),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::text_message("system", content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::text_message("user", content)
    }

    /// Create a user message carrying text and one inline image.
    pub fn user_with_image(text: impl Into<String>, mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(MessageContent::Parts(vec![
                ContentPart::text(text),
                ContentPart::image(mime_type, bytes),
            ])),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text_message("assistant", content)
    }

    /// Create an assistant message with tool calls.
    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ChatToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.map(MessageContent::Text),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Create a tool result message.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(MessageContent::Text(content.into())),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Text of the message, if any.
    pub fn text(&self) -> Option<String> {
        self.content.as_ref().map(MessageContent::text)
    }
}

/// Tool call in a chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatToolCall {
    /// Unique identifier for this tool call.
    pub id: String,

    /// Type of the tool call (always "function").
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,

    /// Function details.
    pub function: ChatToolFunction,
}

fn function_type() -> String {
    "function".to_string()
}

impl ChatToolCall {
    /// Convert from internal ToolCall type.
    pub fn from_tool_call(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            call_type: function_type(),
            function: ChatToolFunction {
                name: call.name.clone(),
                arguments: call.arguments.to_string(),
            },
        }
    }

    /// Convert to internal ToolCall type.
    ///
    /// Empty argument strings decode as an empty object.
    pub fn to_tool_call(&self) -> Result<ToolCall> {
        let raw = self.function.arguments.trim();
        let arguments: serde_json::Value = if raw.is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_str(raw).map_err(|e| {
                AgentError::ResponseParse(format!("Invalid tool arguments JSON: {}", e))
            })?
        };

        Ok(ToolCall::with_id(&self.id, &self.function.name, arguments))
    }
}

/// Function details in a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatToolFunction {
    /// Name of the function to call.
    pub name: String,

    /// JSON-encoded arguments.
    pub arguments: String,
}

/// Tool definition for the API.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTool {
    /// Type of the tool (always "function").
    #[serde(rename = "type")]
    pub tool_type: String,

    /// Function definition.
    pub function: ToolDefinition,
}

impl ChatTool {
    /// Create from internal ToolDefinition.
    pub fn from_definition(def: &ToolDefinition) -> Self {
        Self {
            tool_type: function_type(),
            function: def.clone(),
        }
    }
}

/// Chat completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Unique identifier for this completion.
    #[serde(default)]
    pub id: String,

    /// Completion choices.
    #[serde(default)]
    pub choices: Vec<ChatChoice>,

    /// Token usage information.
    pub usage: Option<ChatUsage>,
}

impl ChatResponse {
    /// Get the first choice's message.
    pub fn message(&self) -> Option<&ResponseMessage> {
        self.choices.first().map(|c| &c.message)
    }

    /// Text of the first choice, if non-empty.
    pub fn text(&self) -> Option<&str> {
        self.message()
            .and_then(|m| m.content.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Check if the response has tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.message()
            .and_then(|m| m.tool_calls.as_ref())
            .is_some_and(|calls| !calls.is_empty())
    }

    /// Raw tool calls from the response.
    pub fn raw_tool_calls(&self) -> &[ChatToolCall] {
        self.message()
            .and_then(|m| m.tool_calls.as_deref())
            .unwrap_or_default()
    }

    /// Get tool calls from the response, skipping ones with broken arguments.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.raw_tool_calls()
            .iter()
            .filter_map(|c| c.to_tool_call().ok())
            .collect()
    }

    /// Total tokens reported by the server, zero if absent.
    pub fn total_tokens(&self) -> u32 {
        self.usage.as_ref().map_or(0, |u| u.total_tokens)
    }
}

/// A choice in the completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    /// Index of this choice.
    #[serde(default)]
    pub index: u32,

    /// The message for this choice.
    pub message: ResponseMessage,

    /// Finish reason (stop, tool_calls, length, etc.).
    pub finish_reason: Option<String>,
}

/// Message in a completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    /// Role (always "assistant" for responses).
    #[serde(default)]
    pub role: String,

    /// Text content of the response.
    pub content: Option<String>,

    /// Tool calls the model wants to make.
    pub tool_calls: Option<Vec<ChatToolCall>>,
}

/// Token usage information.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatUsage {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Tokens in the completion.
    #[serde(default)]
    pub completion_tokens: u32,

    /// Total tokens used.
    #[serde(default)]
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_message_constructors() {
        let system = ChatMessage::system("You are helpful.");
        assert_eq!(system.role, "system");
        assert_eq!(system.text(), Some("You are helpful.".to_string()));

        let tool = ChatMessage::tool("call-123", "result");
        assert_eq!(tool.role, "tool");
        assert_eq!(tool.tool_call_id, Some("call-123".to_string()));
    }

    #[test]
    fn test_user_with_image_serializes_parts() {
        let msg = ChatMessage::user_with_image("What is this?", "image/jpeg", b"abc");
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["content"][0], json!({"type": "text", "text": "What is this?"}));
        assert_eq!(value["content"][1]["type"], "image_url");
        assert_eq!(value["content"][1]["image_url"]["url"], "data:image/jpeg;base64,YWJj");
        assert!(msg.content.unwrap().has_image());
    }

    #[test]
    fn test_chat_tool_call_conversion() {
        let tool_call = ToolCall::with_id("call-1", "add_plant", json!({"name": "Ficus"}));

        let chat_call = ChatToolCall::from_tool_call(&tool_call);
        assert_eq!(chat_call.call_type, "function");

        let converted = chat_call.to_tool_call().unwrap();
        assert_eq!(converted, tool_call);
    }

    #[test]
    fn test_empty_arguments_decode_as_object() {
        let call = ChatToolCall {
            id: "c".into(),
            call_type: "function".into(),
            function: ChatToolFunction {
                name: "list_reminders".into(),
                arguments: "".into(),
            },
        };
        assert_eq!(call.to_tool_call().unwrap().arguments, json!({}));
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage::user("Hello")],
            tools: Some(vec![ChatTool::from_definition(&ToolDefinition::new(
                "list_reminders",
                "List reminders",
                json!({"type": "object", "properties": {}}),
            ))]),
            tool_choice: Some("auto".into()),
            max_tokens: Some(500),
            temperature: Some(0.3),
            response_format: Some(ResponseFormat::json_object()),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["tool_choice"], "auto");
        assert_eq!(value["tools"][0]["type"], "function");
        assert_eq!(value["tools"][0]["function"]["name"], "list_reminders");
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["content"], "Hello");
    }

    #[test]
    fn test_response_with_tool_calls() {
        let json = r#"{
            "id": "chatcmpl-456",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call-1",
                        "type": "function",
                        "function": {
                            "name": "get_pest_treatment",
                            "arguments": "{\"pest\": \"aphids\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;

        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert!(response.has_tool_calls());
        assert_eq!(response.total_tokens(), 15);
        assert_eq!(response.text(), None);

        let tool_calls = response.tool_calls();
        assert_eq!(tool_calls[0].name, "get_pest_treatment");
        assert_eq!(tool_calls[0].get_string_arg("pest").unwrap(), "aphids");
    }

    #[test]
    fn test_parse_json_reply() {
        #[derive(Deserialize)]
        struct Schedule {
            frequency_days: u32,
        }

        let plain: Schedule = parse_json_reply(r#"{"frequency_days": 5}"#).unwrap();
        assert_eq!(plain.frequency_days, 5);

        let fenced: Schedule =
            parse_json_reply("```json\n{\"frequency_days\": 9}\n```").unwrap();
        assert_eq!(fenced.frequency_days, 9);

        assert!(parse_json_reply::<Schedule>("water twice a week").is_err());
    }
}
