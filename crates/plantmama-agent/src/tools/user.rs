//! The user's plants, care log, session and reminders.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use plantmama_core::validators;
use plantmama_models::{Plant, PlantId, Reminder, ReminderKind};

use super::required;
use crate::context::ToolContext;
use crate::error::{AgentError, Result};
use crate::tool::{ToolCall, ToolDefinition, ToolResult};

/// One plant with its diagnosis history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantRecord {
    pub plant_id: PlantId,
    pub name: String,
    pub species: Option<String>,
    pub nickname: Option<String>,
    pub added_date: DateTime<Utc>,
    pub last_watered: Option<DateTime<Utc>>,
    pub last_fertilized: Option<DateTime<Utc>>,
    pub health_score: Option<f32>,
    pub last_diagnosis: Option<DateTime<Utc>>,
    pub health_history: Vec<serde_json::Value>,
}

pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "add_plant",
            "Register a new plant in the user's collection",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Plant name"},
                    "species": {"type": "string"},
                    "nickname": {"type": "string"},
                    "location": {"type": "string", "description": "Where the plant stands"},
                    "pot_size": {"type": "string", "enum": ["small", "medium", "large", "extra large", "xl"]}
                },
                "required": ["name"]
            }),
        ),
        ToolDefinition::new(
            "record_care",
            "Record that the user watered or fertilized one of their plants",
            json!({
                "type": "object",
                "properties": {
                    "plant_id": {"type": "string", "description": "Id or name of the plant"},
                    "action": {"type": "string", "enum": ["watered", "fertilized"]}
                },
                "required": ["plant_id", "action"]
            }),
        ),
        ToolDefinition::new(
            "save_user_session",
            "Save and close the current consultation with an optional summary",
            json!({
                "type": "object",
                "properties": {
                    "plant_ids": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Plants discussed in this session"
                    },
                    "summary": {"type": "string", "description": "Short summary of the consultation"}
                }
            }),
        ),
        ToolDefinition::new(
            "get_user_plant_history",
            "Get the user's plants with care dates and diagnosis history",
            json!({
                "type": "object",
                "properties": {}
            }),
        ),
        ToolDefinition::new(
            "schedule_reminder",
            "Schedule a care reminder that the bot will send to the user",
            json!({
                "type": "object",
                "properties": {
                    "reminder_type": {
                        "type": "string",
                        "description": "watering, fertilizing, pruning, repotting, misting or other"
                    },
                    "scheduled_time": {
                        "type": "string",
                        "description": "RFC 3339 date-time in the future, e.g. 2025-06-01T09:00:00+03:00"
                    },
                    "title": {"type": "string"},
                    "plant_id": {"type": "string", "description": "Id or name of the plant"},
                    "description": {"type": "string"}
                },
                "required": ["reminder_type", "scheduled_time"]
            }),
        ),
        ToolDefinition::new(
            "list_reminders",
            "List the user's pending reminders",
            json!({
                "type": "object",
                "properties": {}
            }),
        ),
    ]
}

fn require_plant(ctx: &ToolContext<'_>, call: &ToolCall, key: &str) -> Result<Plant> {
    ctx.find_plant(key)?.ok_or_else(|| {
        AgentError::tool(
            &call.name,
            format!("no plant '{}' in the user's collection", key),
        )
    })
}

pub(super) fn add_plant(ctx: &ToolContext<'_>, call: &ToolCall) -> Result<ToolResult> {
    let name = required(call, "name")?.trim();
    validators::validate_plant_name(name)
        .map_err(|e| AgentError::invalid_args(&call.name, e.to_string()))?;

    if let Some(existing) = ctx.store.plants.find_by_name(&ctx.user.id, name)? {
        return Ok(ToolResult::json(
            &call.id,
            &json!({
                "plant_id": existing.id,
                "name": existing.name,
                "already_exists": true,
            }),
        ));
    }

    let mut plant = Plant::new(ctx.user.id.clone(), name);
    plant.species = call.get_optional_string_arg("species").map(str::to_string);
    plant.nickname = call.get_optional_string_arg("nickname").map(str::to_string);
    plant.location = call.get_optional_string_arg("location").map(str::to_string);
    plant.pot_size = call
        .get_optional_string_arg("pot_size")
        .filter(|s| validators::validate_pot_size(s))
        .map(str::to_lowercase);
    if let Some(image) = ctx.image {
        plant.photo_path = image.path_string();
    }

    ctx.store.plants.save(&plant)?;
    ctx.link_plant_to_session(&plant.id)?;
    info!(plant_id = %plant.id, user_id = %ctx.user.id, "Plant added");

    Ok(ToolResult::json(
        &call.id,
        &json!({
            "plant_id": plant.id,
            "name": plant.name,
            "species": plant.species,
            "already_exists": false,
        }),
    ))
}

pub(super) fn record_care(ctx: &ToolContext<'_>, call: &ToolCall) -> Result<ToolResult> {
    let key = required(call, "plant_id")?;
    let action = required(call, "action")?.to_lowercase();
    let mut plant = require_plant(ctx, call, key)?;
    let now = Utc::now();

    match action.as_str() {
        "watered" | "watering" | "water" => plant.record_watering(now),
        "fertilized" | "fertilizing" | "fertilize" | "fed" => plant.record_fertilizing(now),
        other => {
            return Err(AgentError::invalid_args(
                &call.name,
                format!("unknown action '{}', expected watered or fertilized", other),
            ))
        }
    }
    ctx.store.plants.save(&plant)?;
    ctx.link_plant_to_session(&plant.id)?;

    Ok(ToolResult::json(
        &call.id,
        &json!({
            "plant_id": plant.id,
            "last_watered": plant.last_watered,
            "last_fertilized": plant.last_fertilized,
        }),
    ))
}

pub(super) fn save_user_session(ctx: &ToolContext<'_>, call: &ToolCall) -> Result<ToolResult> {
    let mut plant_ids = Vec::new();
    for key in call.get_string_list_arg("plant_ids") {
        if let Some(plant) = ctx.find_plant(&key)? {
            plant_ids.push(plant.id);
        }
    }
    let summary = call.get_optional_string_arg("summary").map(str::to_string);

    let session = ctx
        .store
        .sessions
        .update(&ctx.user.id, ctx.session_id, move |session| {
            for id in plant_ids {
                session.add_plant(id);
            }
            if summary.is_some() {
                session.summary = summary;
            }
            session.end();
        })?;
    info!(session_id = %session.id, plants = session.plant_ids.len(), "Session saved");

    Ok(ToolResult::json(
        &call.id,
        &json!({
            "session_id": session.id,
            "messages_count": session.messages_count,
            "plant_ids": session.plant_ids,
            "ended": !session.is_open(),
        }),
    ))
}

pub(super) fn get_user_plant_history(
    ctx: &ToolContext<'_>,
    call: &ToolCall,
) -> Result<ToolResult> {
    let mut records = Vec::new();
    for plant in ctx.store.plants.list(&ctx.user.id)? {
        let diagnoses = ctx.store.diagnoses.list(&plant.id)?;
        records.push(PlantRecord {
            last_diagnosis: diagnoses.first().map(|d| d.created_at),
            health_history: diagnoses
                .iter()
                .map(|d| {
                    json!({
                        "date": d.created_at.to_rfc3339(),
                        "health_score": d.health_score,
                        "severity": d.severity,
                        "issues": d.issues,
                    })
                })
                .collect(),
            plant_id: plant.id,
            name: plant.name,
            species: plant.species,
            nickname: plant.nickname,
            added_date: plant.added_at,
            last_watered: plant.last_watered,
            last_fertilized: plant.last_fertilized,
            health_score: plant.health_score,
        });
    }
    Ok(ToolResult::json(&call.id, &records))
}

/// Parse an RFC 3339 time, or a naive `YYYY-MM-DD[T ]HH:MM[:SS]` taken as UTC.
pub(crate) fn parse_schedule_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub(super) fn schedule_reminder(ctx: &ToolContext<'_>, call: &ToolCall) -> Result<ToolResult> {
    let kind = ReminderKind::parse(required(call, "reminder_type")?);
    let raw_time = required(call, "scheduled_time")?;
    let scheduled_at = parse_schedule_time(raw_time).ok_or_else(|| {
        AgentError::invalid_args(
            &call.name,
            format!("scheduled_time '{}' is not an RFC 3339 date-time", raw_time),
        )
    })?;
    if scheduled_at <= Utc::now() {
        return Err(AgentError::invalid_args(
            &call.name,
            "scheduled_time must be in the future",
        ));
    }

    let plant = match call.get_optional_string_arg("plant_id") {
        Some(key) => Some(require_plant(ctx, call, key)?),
        None => None,
    };

    let title = match (call.get_optional_string_arg("title"), &plant) {
        (Some(title), _) => title.to_string(),
        (None, Some(plant)) => format!("{} {}: {}", kind.emoji(), kind, plant.display_name()),
        (None, None) => format!("{} {}", kind.emoji(), kind),
    };

    let mut reminder = Reminder::new(ctx.user.id.clone(), kind, title, scheduled_at);
    if let Some(plant) = &plant {
        reminder = reminder.for_plant(plant.id.clone());
    }
    if let Some(description) = call.get_optional_string_arg("description") {
        reminder = reminder.with_description(description);
    }
    ctx.store.reminders.save(&reminder)?;
    info!(reminder_id = %reminder.id, scheduled_at = %reminder.scheduled_at, "Reminder scheduled");

    Ok(ToolResult::json(
        &call.id,
        &json!({
            "reminder_id": reminder.id,
            "title": reminder.title,
            "scheduled_at": reminder.scheduled_at.to_rfc3339(),
        }),
    ))
}

pub(super) fn list_reminders(ctx: &ToolContext<'_>, call: &ToolCall) -> Result<ToolResult> {
    let reminders: Vec<_> = ctx
        .store
        .reminders
        .pending(&ctx.user.id)?
        .into_iter()
        .map(|r| {
            json!({
                "reminder_id": r.id,
                "type": r.kind.to_string(),
                "title": r.title,
                "scheduled_at": r.scheduled_at.to_rfc3339(),
                "plant_id": r.plant_id,
            })
        })
        .collect();
    Ok(ToolResult::json(&call.id, &reminders))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{call, payload, Fixture};
    use chrono::{Duration, TimeZone};
    use plantmama_models::{Diagnosis, Severity};

    fn add(fx: &Fixture, name: &str) -> PlantId {
        let result = add_plant(&fx.ctx(), &call("add_plant", json!({"name": name}))).unwrap();
        serde_json::from_value(payload(&result)["plant_id"].clone()).unwrap()
    }

    #[test]
    fn test_parse_schedule_time() {
        let expected = Utc.with_ymd_and_hms(2030, 1, 2, 6, 0, 0).unwrap();
        assert_eq!(parse_schedule_time("2030-01-02T09:00:00+03:00"), Some(expected));
        assert_eq!(parse_schedule_time("2030-01-02 06:00"), Some(expected));
        assert_eq!(parse_schedule_time("2030-01-02T06:00:00"), Some(expected));
        assert_eq!(parse_schedule_time("tomorrow morning"), None);
    }

    #[test]
    fn test_add_plant_is_idempotent_by_name() {
        let fx = Fixture::new();
        let first = add(&fx, "Фикус");

        let again = add_plant(&fx.ctx(), &call("add_plant", json!({"name": "фикус"}))).unwrap();
        let again = payload(&again);
        assert_eq!(again["already_exists"], true);
        assert_eq!(again["plant_id"], first.as_str());
        assert_eq!(fx.store.plants.list(&fx.user.id).unwrap().len(), 1);

        let bad = add_plant(&fx.ctx(), &call("add_plant", json!({"name": "<script>"})));
        assert!(matches!(bad, Err(AgentError::InvalidArguments { .. })));
    }

    #[test]
    fn test_record_care() {
        let fx = Fixture::new();
        let id = add(&fx, "Монстера");

        let result = record_care(
            &fx.ctx(),
            &call("record_care", json!({"plant_id": "Монстера", "action": "Watered"})),
        )
        .unwrap();
        assert!(!payload(&result)["last_watered"].is_null());
        let plant = fx.store.plants.load(&fx.user.id, &id).unwrap();
        assert!(plant.last_watered.is_some());
        assert!(plant.last_fertilized.is_none());

        record_care(
            &fx.ctx(),
            &call("record_care", json!({"plant_id": id.as_str(), "action": "fertilized"})),
        )
        .unwrap();
        assert!(fx.store.plants.load(&fx.user.id, &id).unwrap().last_fertilized.is_some());

        let unknown_action = record_care(
            &fx.ctx(),
            &call("record_care", json!({"plant_id": id.as_str(), "action": "sang"})),
        );
        assert!(matches!(unknown_action, Err(AgentError::InvalidArguments { .. })));

        let unknown_plant = record_care(
            &fx.ctx(),
            &call("record_care", json!({"plant_id": "Кактус", "action": "watered"})),
        );
        assert!(matches!(unknown_plant, Err(AgentError::ToolExecution { .. })));
    }

    #[test]
    fn test_save_session_ends_it() {
        let fx = Fixture::new();
        let id = add(&fx, "Алоэ");

        let result = save_user_session(
            &fx.ctx(),
            &call(
                "save_user_session",
                json!({"plant_ids": ["Алоэ", "missing"], "summary": "Полив раз в 2 недели"}),
            ),
        )
        .unwrap();
        let result = payload(&result);
        assert_eq!(result["ended"], true);
        assert_eq!(result["plant_ids"], json!([id.as_str()]));

        let saved = fx.store.sessions.load(&fx.user.id, &fx.session_id).unwrap();
        assert!(!saved.is_open());
        assert_eq!(saved.summary.as_deref(), Some("Полив раз в 2 недели"));

        assert!(fx.store.sessions.current(&fx.user.id).unwrap().is_none());
        let next = fx.store.sessions.current_or_open(&fx.user.id).unwrap();
        assert_ne!(next.id, fx.session_id);
    }

    #[test]
    fn test_plant_history_includes_diagnoses() {
        let fx = Fixture::new();
        let id = add(&fx, "Фиалка");
        add(&fx, "Кактус");
        let diagnosis = Diagnosis::new(id.clone(), 4.0, Severity::Moderate, 0.7)
            .with_issues(vec!["brown spots".into()]);
        fx.store.diagnoses.save(&diagnosis).unwrap();

        let result = get_user_plant_history(&fx.ctx(), &call("get_user_plant_history", json!({})))
            .unwrap();
        let records: Vec<PlantRecord> = serde_json::from_str(&result.content).unwrap();
        assert_eq!(records.len(), 2);

        let violet = records.iter().find(|r| r.plant_id == id).unwrap();
        assert_eq!(violet.health_history.len(), 1);
        assert_eq!(violet.health_history[0]["issues"], json!(["brown spots"]));
        assert_eq!(violet.last_diagnosis, Some(diagnosis.created_at));

        let cactus = records.iter().find(|r| r.plant_id != id).unwrap();
        assert!(cactus.health_history.is_empty());
        assert!(cactus.last_diagnosis.is_none());
    }

    #[test]
    fn test_schedule_and_list_reminders() {
        let fx = Fixture::new();
        let id = add(&fx, "Фикус");
        let when = (Utc::now() + Duration::days(2)).to_rfc3339();

        let past = schedule_reminder(
            &fx.ctx(),
            &call(
                "schedule_reminder",
                json!({"reminder_type": "watering", "scheduled_time": "2001-01-01T09:00:00Z"}),
            ),
        );
        assert!(matches!(past, Err(AgentError::InvalidArguments { .. })));

        let garbled = schedule_reminder(
            &fx.ctx(),
            &call(
                "schedule_reminder",
                json!({"reminder_type": "watering", "scheduled_time": "soon"}),
            ),
        );
        assert!(matches!(garbled, Err(AgentError::InvalidArguments { .. })));

        let result = schedule_reminder(
            &fx.ctx(),
            &call(
                "schedule_reminder",
                json!({"reminder_type": "watering", "scheduled_time": when, "plant_id": "Фикус"}),
            ),
        )
        .unwrap();
        let title = payload(&result)["title"].as_str().unwrap().to_string();
        assert!(title.ends_with(": Фикус"));

        let listed = list_reminders(&fx.ctx(), &call("list_reminders", json!({}))).unwrap();
        let listed = payload(&listed);
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["title"], title);
        assert_eq!(listed[0]["plant_id"], id.as_str());
    }
}
