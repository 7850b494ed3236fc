//! Reference information and watering schedules from the auxiliary model.
//!
//! Both tools degrade gracefully: if the model call fails or returns bad JSON
//! the local skeleton or default schedule is returned instead.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use plantmama_core::{knowledge, validators, Season};

use super::required;
use crate::client::ChatMessage;
use crate::context::ToolContext;
use crate::error::{AgentError, Result};
use crate::tool::{ToolCall, ToolDefinition, ToolResult};

const ENCYCLOPEDIA_PROMPT: &str = "Ты — бот-энциклопедия по комнатным растениям. \
Тебе дано частичное описание растения (в JSON) с некоторыми полями. \
Твоя задача — дополнить недостающие текстовые поля и поля watering_schedule, \
вернув строго JSON точно по той же схеме: common_name, scientific_name, family, origin, \
description, difficulty (easy|medium|hard), watering, lighting, fertilizing, \
temperature_range, propagation, pet_friendly (true|false), \
watering_schedule {frequency_days, amount_ml, indicators}. Никакого дополнительного текста.";

const WATERING_PROMPT: &str = "Ты — бот, рассчитывающий расписание полива для дома. \
Тебе даны растение, размер горшка (pot_size), процент влажности почвы (humidity) и текущий сезон. \
Верни строго JSON:\n\
{\n  \"frequency_days\": <целое число>,\n  \"amount_ml\": <целое число>,\n  \
\"indicators\": [\"строка1\", \"строка2\"]\n}\nНикакого дополнительного текста.";

/// Longest watering interval accepted from the model.
const MAX_FREQUENCY_DAYS: u32 = 365;

/// How often and how much to water.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WateringSchedule {
    pub frequency_days: u32,
    pub amount_ml: u32,
    #[serde(default)]
    pub indicators: Vec<String>,
}

impl Default for WateringSchedule {
    fn default() -> Self {
        Self {
            frequency_days: 7,
            amount_ml: 200,
            indicators: vec![
                "Сухая поверхность почвы".to_string(),
                "Листья поникли".to_string(),
            ],
        }
    }
}

/// Reference card for a plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantInfo {
    pub common_name: String,
    pub scientific_name: String,
    pub family: String,
    pub origin: String,
    pub description: String,
    pub difficulty: String,
    pub watering: String,
    pub lighting: String,
    pub fertilizing: String,
    pub temperature_range: String,
    pub propagation: String,
    pub pet_friendly: bool,
    pub watering_schedule: WateringSchedule,
}

impl PlantInfo {
    /// Defaults for every field, overlaid with the built-in reference entry.
    pub fn skeleton(plant_name: &str) -> Self {
        let unknown = "Неизвестно".to_string();
        let mut info = Self {
            common_name: plant_name.to_string(),
            scientific_name: unknown.clone(),
            family: unknown.clone(),
            origin: unknown,
            description: "Нет доступной информации.".to_string(),
            difficulty: "medium".to_string(),
            watering: String::new(),
            lighting: String::new(),
            fertilizing: String::new(),
            temperature_range: String::new(),
            propagation: String::new(),
            pet_friendly: false,
            watering_schedule: WateringSchedule {
                indicators: Vec::new(),
                ..Default::default()
            },
        };

        if let Some(local) = knowledge::plant_info(plant_name) {
            info.common_name = local.common_name.to_string();
            info.scientific_name = local.scientific_name.to_string();
            info.family = local.family.to_string();
            info.origin = local.origin.to_string();
            info.watering = local.care.water.to_string();
            info.lighting = local.care.light.to_string();
            info.fertilizing = local.care.fertilizer.to_string();
            info.temperature_range = local.care.temperature.to_string();
        }
        info
    }
}

pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "get_plant_encyclopedia",
            "Look up reference information about a plant species: origin, difficulty, \
             watering, light, fertilizing, temperature, propagation, pet safety",
            json!({
                "type": "object",
                "properties": {
                    "plant_name": {"type": "string", "description": "Common or scientific name"}
                },
                "required": ["plant_name"]
            }),
        ),
        ToolDefinition::new(
            "calculate_watering_schedule",
            "Calculate how often and how much to water a plant and when to water next",
            json!({
                "type": "object",
                "properties": {
                    "plant_id": {
                        "type": "string",
                        "description": "Id or name of the user's plant, or a species name"
                    },
                    "pot_size": {
                        "type": "string",
                        "enum": ["small", "medium", "large", "extra large", "xl"]
                    },
                    "humidity": {
                        "type": "number",
                        "description": "Soil or air humidity, percent"
                    }
                },
                "required": ["plant_id", "pot_size", "humidity"]
            }),
        ),
    ]
}

pub(super) async fn get_plant_encyclopedia(
    ctx: &ToolContext<'_>,
    call: &ToolCall,
) -> Result<ToolResult> {
    let plant_name = required(call, "plant_name")?;
    let skeleton = PlantInfo::skeleton(plant_name);
    let season = Season::current();

    let user_prompt = format!(
        "Частичные данные:\n{}\nТекущий сезон: {}.\n\nДополни их и верни полный JSON.",
        serde_json::to_string(&skeleton)?,
        season.russian_name()
    );
    let messages = vec![
        ChatMessage::system(ENCYCLOPEDIA_PROMPT),
        ChatMessage::user(user_prompt),
    ];

    let info = match ctx.client.complete_json::<PlantInfo>(ctx.aux_config, messages).await {
        Ok(info) => {
            info!(plant = %plant_name, "Encyclopedia entry completed by model");
            info
        }
        Err(e) => {
            warn!(plant = %plant_name, error = %e, "Encyclopedia lookup failed, using local data");
            skeleton
        }
    };

    Ok(ToolResult::json(&call.id, &info))
}

/// When the next watering is due, or `None` if the date is out of range.
pub fn next_watering(
    last_watered: Option<DateTime<Utc>>,
    frequency_days: u32,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    last_watered
        .unwrap_or(now)
        .checked_add_signed(Duration::days(i64::from(frequency_days)))
}

pub(super) async fn calculate_watering_schedule(
    ctx: &ToolContext<'_>,
    call: &ToolCall,
) -> Result<ToolResult> {
    let plant_key = required(call, "plant_id")?;
    let pot_size = required(call, "pot_size")?;
    if !validators::validate_pot_size(pot_size) {
        return Err(AgentError::invalid_args(
            &call.name,
            "pot_size must be one of: small, medium, large, extra large, xl",
        ));
    }
    let humidity = call.get_f64_arg("humidity").ok_or_else(|| {
        AgentError::invalid_args(&call.name, "humidity must be a number")
    })?;

    let plant = ctx.find_plant(plant_key)?;
    let label = match &plant {
        Some(p) => match &p.species {
            Some(species) => format!("{} ({})", p.display_name(), species),
            None => p.display_name().to_string(),
        },
        None => plant_key.to_string(),
    };

    let aux = ctx.aux_config.clone().with_max_tokens(500);
    let messages = vec![
        ChatMessage::system(WATERING_PROMPT),
        ChatMessage::user(format!(
            "Растение: {}.\nРазмер горшка: {}.\nВлажность почвы: {}.\nСезон: {}.\n\nСформируй JSON.",
            label,
            pot_size,
            humidity,
            Season::current().russian_name()
        )),
    ];

    let mut schedule = match ctx.client.complete_json::<WateringSchedule>(&aux, messages).await {
        Ok(schedule) => schedule,
        Err(e) => {
            warn!(plant = %label, error = %e, "Watering schedule failed, using default");
            WateringSchedule::default()
        }
    };
    schedule.frequency_days = schedule.frequency_days.clamp(1, MAX_FREQUENCY_DAYS);

    let now = Utc::now();
    let last_watered = plant.as_ref().and_then(|p| p.last_watered);
    let next = match next_watering(last_watered, schedule.frequency_days, now) {
        Some(next) => next,
        None => {
            warn!(plant = %label, "Watering date out of range, using default schedule");
            schedule = WateringSchedule::default();
            next_watering(None, schedule.frequency_days, now).unwrap_or(now)
        }
    };

    Ok(ToolResult::json(
        &call.id,
        &json!({
            "plant": label,
            "plant_id": plant.as_ref().map(|p| p.id.clone()),
            "frequency_days": schedule.frequency_days,
            "amount_ml": schedule.amount_ml,
            "indicators": schedule.indicators,
            "next_watering": next.to_rfc3339(),
        }),
    ))
}
