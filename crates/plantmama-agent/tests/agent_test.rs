//! Agent tool loop against a mocked chat completions endpoint.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plantmama_agent::{PlantAssistant, PlantCareAgent, UserRef, ERROR_REPLY, FALLBACK_REPLY};
use plantmama_core::Settings;
use plantmama_models::{ChatRole, Plant, Severity, UserProfile};
use plantmama_persistence::DataStore;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TELEGRAM_ID: i64 = 4242;

struct Harness {
    _dir: TempDir,
    server: MockServer,
    store: Arc<DataStore>,
    agent: PlantCareAgent,
}

async fn harness() -> Harness {
    let dir = tempdir().unwrap();
    let server = MockServer::start().await;

    let mut settings = Settings::for_tests(dir.path());
    settings.openai_base_url = server.uri();
    let store = Arc::new(DataStore::new(&settings.data_dir));
    let agent = PlantCareAgent::new(&settings, store.clone()).unwrap();

    Harness {
        _dir: dir,
        server,
        store,
        agent,
    }
}

fn text_reply(content: Option<&str>) -> Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 20, "completion_tokens": 10, "total_tokens": 30}
    })
}

fn tool_reply(name: &str, arguments: Value) -> Value {
    json!({
        "id": "chatcmpl-0",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": name, "arguments": arguments.to_string()}
                }]
            },
            "finish_reason": "tool_calls"
        }],
        "usage": {"prompt_tokens": 15, "completion_tokens": 5, "total_tokens": 20}
    })
}

async fn mount_once(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

fn leaf_photo() -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(ImageBuffer::from_pixel(64, 64, Rgb([40, 150, 50])))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn user() -> UserRef {
    UserRef::new(TELEGRAM_ID).with_profile(UserProfile {
        first_name: Some("Vera".into()),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_plain_answer_is_persisted() {
    let h = harness().await;
    mount_once(&h.server, text_reply(Some("Поливайте раз в неделю."))).await;

    let reply = h
        .agent
        .process_message("Как поливать фикус?", &user(), None, None)
        .await;
    assert_eq!(reply, "Поливайте раз в неделю.");

    let user = h.store.users.load(TELEGRAM_ID).unwrap();
    assert_eq!(user.first_name.as_deref(), Some("Vera"));

    let session = h.store.sessions.current(&user.id).unwrap().unwrap();
    assert_eq!(session.messages_count, 2);
    assert_eq!(session.tokens_used, 30);

    let messages = h.store.sessions.messages(&session.id).unwrap();
    assert_eq!(messages[0].role, ChatRole::User);
    assert_eq!(messages[0].content, "Как поливать фикус?");
    assert_eq!(messages[1].role, ChatRole::Assistant);
    assert_eq!(messages[1].tokens_used, 30);
}

#[tokio::test]
async fn test_tool_call_then_answer() {
    let h = harness().await;
    mount_once(&h.server, tool_reply("add_plant", json!({"name": "Монстера"}))).await;
    mount_once(&h.server, text_reply(Some("Монстера добавлена!"))).await;

    let reply = h
        .agent
        .process_message("Добавь мою монстеру", &user(), None, None)
        .await;
    assert_eq!(reply, "Монстера добавлена!");

    let user = h.store.users.load(TELEGRAM_ID).unwrap();
    let plants = h.store.plants.list(&user.id).unwrap();
    assert_eq!(plants.len(), 1);
    assert_eq!(plants[0].name, "Монстера");

    let session = h.store.sessions.current(&user.id).unwrap().unwrap();
    assert_eq!(session.plant_ids, vec![plants[0].id.clone()]);

    let requests = h.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
    let tool_message = second["messages"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["role"] == "tool")
        .unwrap();
    assert_eq!(tool_message["tool_call_id"], "call_1");
    assert!(tool_message["content"].as_str().unwrap().contains("plant_id"));
}

#[tokio::test]
async fn test_unknown_tool_is_reported_to_model() {
    let h = harness().await;
    mount_once(&h.server, tool_reply("water_the_cat", json!({}))).await;
    mount_once(&h.server, text_reply(Some("Я не умею этого делать."))).await;

    let reply = h.agent.process_message("Полей кота", &user(), None, None).await;
    assert_eq!(reply, "Я не умею этого делать.");

    let requests = h.server.received_requests().await.unwrap();
    let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
    let last = second["messages"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["role"], "tool");
    assert!(last["content"].as_str().unwrap().contains("\"error\""));
    assert!(last["content"].as_str().unwrap().contains("water_the_cat"));
}

#[tokio::test]
async fn test_empty_answer_uses_fallback() {
    let h = harness().await;
    mount_once(&h.server, text_reply(None)).await;

    let reply = h.agent.process_message("...", &user(), None, None).await;
    assert_eq!(reply, FALLBACK_REPLY);
}

#[tokio::test]
async fn test_server_error_becomes_apology() {
    let h = harness().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&h.server)
        .await;

    let reply = h.agent.process_message("Привет", &user(), None, None).await;
    assert_eq!(reply, ERROR_REPLY);
}

#[tokio::test]
async fn test_endless_tool_calls_hit_the_limit() {
    let h = harness().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(tool_reply("list_reminders", json!({}))),
        )
        .mount(&h.server)
        .await;

    let reply = h.agent.process_message("Напоминания?", &user(), None, None).await;
    assert_eq!(reply, ERROR_REPLY);
    assert_eq!(h.server.received_requests().await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_photo_diagnosis_is_saved_for_plant() {
    let h = harness().await;
    let owner = h.store.users.get_or_create(TELEGRAM_ID, &UserProfile::default()).unwrap();
    let plant = Plant::new(owner.id.clone(), "Монстера");
    h.store.plants.save(&plant).unwrap();

    // Vision calls are the only ones in JSON mode.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("json_object"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply(Some(
            r#"{"health_score": 6, "issues": ["yellow leaves"], "severity": "moderate",
                "confidence": 0.8, "recommendations": ["water less"]}"#,
        ))))
        .mount(&h.server)
        .await;
    mount_once(
        &h.server,
        tool_reply("diagnose_plant_photo", json!({"plant_id": "монстера"})),
    )
    .await;
    mount_once(&h.server, text_reply(Some("Лёгкий перелив, сократите полив."))).await;

    let reply = h
        .agent
        .analyze_plant_image(&leaf_photo(), &user(), Some("Листья желтеют"))
        .await;
    assert_eq!(reply, "Лёгкий перелив, сократите полив.");

    let diagnosis = h.store.diagnoses.latest(&plant.id).unwrap().unwrap();
    assert_eq!(diagnosis.health_score, 6.0);
    assert_eq!(diagnosis.severity, Severity::Moderate);
    assert_eq!(diagnosis.issues, vec!["yellow leaves".to_string()]);
    assert!(diagnosis.image_path.is_some());

    let updated = h.store.plants.load(&owner.id, &plant.id).unwrap();
    assert_eq!(updated.health_score, Some(6.0));

    let session = h.store.sessions.current(&owner.id).unwrap().unwrap();
    let messages = h.store.sessions.messages(&session.id).unwrap();
    assert!(messages[0].has_image);
    assert!(messages[0]
        .content
        .starts_with("Please analyze this plant image and provide a diagnosis."));
    assert!(messages[0]
        .content
        .ends_with("Additional information: Листья желтеют"));

    let requests = h.server.received_requests().await.unwrap();
    let first: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let body = first.to_string();
    assert!(body.contains("data:image/jpeg;base64,"));
    assert!(body.contains("[User has uploaded an image for analysis]"));
}

#[tokio::test]
async fn test_absurd_watering_interval_is_clamped() {
    let h = harness().await;
    let owner = h.store.users.get_or_create(TELEGRAM_ID, &UserProfile::default()).unwrap();
    let mut plant = Plant::new(owner.id.clone(), "Фикус");
    plant.record_watering(chrono::Utc::now());
    h.store.plants.save(&plant).unwrap();

    // Schedule calls are the only ones in JSON mode here.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("json_object"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply(Some(
            r#"{"frequency_days": 4294967295, "amount_ml": 250, "indicators": []}"#,
        ))))
        .mount(&h.server)
        .await;
    mount_once(
        &h.server,
        tool_reply(
            "calculate_watering_schedule",
            json!({"plant_id": "Фикус", "pot_size": "medium", "humidity": 40}),
        ),
    )
    .await;
    mount_once(&h.server, text_reply(Some("Поливайте раз в год."))).await;

    let reply = h
        .agent
        .process_message("Когда поливать фикус?", &user(), None, None)
        .await;
    assert_eq!(reply, "Поливайте раз в год.");

    let requests = h.server.received_requests().await.unwrap();
    let last: Value = serde_json::from_slice(&requests.last().unwrap().body).unwrap();
    let tool_message = last["messages"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["role"] == "tool")
        .unwrap();
    let content: Value = serde_json::from_str(tool_message["content"].as_str().unwrap()).unwrap();
    assert_eq!(content["frequency_days"], 365);
    assert_eq!(content["amount_ml"], 250);
}

#[tokio::test]
async fn test_saved_session_is_closed_and_next_message_opens_new_one() {
    let h = harness().await;
    mount_once(
        &h.server,
        tool_reply("save_user_session", json!({"summary": "Обсудили полив"})),
    )
    .await;
    mount_once(&h.server, text_reply(Some("Сессия сохранена."))).await;
    mount_once(&h.server, text_reply(Some("Снова здравствуйте!"))).await;

    let reply = h.agent.process_message("Сохрани, пожалуйста", &user(), None, None).await;
    assert_eq!(reply, "Сессия сохранена.");

    let owner = h.store.users.load(TELEGRAM_ID).unwrap();
    let sessions = h.store.sessions.list(&owner.id).unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(!sessions[0].is_open());
    assert_eq!(sessions[0].summary.as_deref(), Some("Обсудили полив"));

    let reply = h.agent.process_message("Привет снова", &user(), None, None).await;
    assert_eq!(reply, "Снова здравствуйте!");

    let sessions = h.store.sessions.list(&owner.id).unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions[1].is_open());
    assert_ne!(sessions[1].id, sessions[0].id);
}
