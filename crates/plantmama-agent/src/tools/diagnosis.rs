//! Photo diagnosis and species identification via the vision model.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use plantmama_models::{Diagnosis, Severity};

use crate::client::ChatMessage;
use crate::context::{AttachedImage, ToolContext};
use crate::error::{AgentError, Result};
use crate::tool::{ToolCall, ToolDefinition, ToolResult};

const DIAGNOSIS_PROMPT: &str = "Ты — фитопатолог. Оцени состояние растения на фото. \
Верни строго JSON:\n\
{\n  \"health_score\": <число от 1 до 10>,\n  \"issues\": [\"...\"],\n  \
\"severity\": \"mild\"|\"moderate\"|\"severe\",\n  \"confidence\": <число от 0 до 1>,\n  \
\"recommendations\": [\"...\"]\n}\nНикакого дополнительного текста.";

const IDENTIFY_PROMPT: &str = "Ты — ботаник. Определи вид растения на фото. \
Верни строго JSON:\n\
{\n  \"species\": \"...\",\n  \"common_name\": \"...\",\n  \"scientific_name\": \"...\",\n  \
\"confidence\": <число от 0 до 1>,\n  \"alternatives\": [\"...\"]\n}\nНикакого дополнительного текста.";

/// Structured health assessment returned by the vision model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub health_score: f32,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

fn default_severity() -> String {
    "mild".to_string()
}

fn default_confidence() -> f32 {
    0.5
}

/// Species identification returned by the vision model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantIdentification {
    pub species: String,
    #[serde(default)]
    pub common_name: String,
    #[serde(default)]
    pub scientific_name: String,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "diagnose_plant_photo",
            "Analyze the photo the user attached to this message and diagnose plant health. \
             Returns health_score (1-10), issues, severity, confidence and recommendations. \
             Pass plant_id (id or name of one of the user's plants) to save the diagnosis.",
            json!({
                "type": "object",
                "properties": {
                    "plant_id": {
                        "type": "string",
                        "description": "Id or name of the user's plant shown in the photo"
                    },
                    "notes": {
                        "type": "string",
                        "description": "Extra context from the user: location, age, recent changes"
                    }
                }
            }),
        ),
        ToolDefinition::new(
            "identify_plant_species",
            "Identify the plant species in the photo attached to this message",
            json!({
                "type": "object",
                "properties": {}
            }),
        ),
    ]
}

fn attached_image<'a>(ctx: &ToolContext<'a>, call: &ToolCall) -> Result<&'a AttachedImage> {
    ctx.image.ok_or_else(|| {
        AgentError::tool(
            &call.name,
            "no photo is attached to this message; ask the user to send one",
        )
    })
}

fn vision_messages(system: &str, text: String, image: &AttachedImage) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system),
        ChatMessage::user_with_image(text, image.image.mime_type(), &image.image.bytes),
    ]
}

pub(super) async fn diagnose_plant_photo(
    ctx: &ToolContext<'_>,
    call: &ToolCall,
) -> Result<ToolResult> {
    let image = attached_image(ctx, call)?;
    let notes = call.get_optional_string_arg("notes");
    let plant = match call.get_optional_string_arg("plant_id") {
        Some(key) => ctx.find_plant(key)?,
        None => None,
    };

    let mut text = "Проведи диагностику растения на фото.".to_string();
    if let Some(plant) = &plant {
        text.push_str(&format!(
            "\nРастение: {}{}",
            plant.name,
            plant
                .species
                .as_deref()
                .map(|s| format!(" ({})", s))
                .unwrap_or_default()
        ));
    }
    if let Some(notes) = notes {
        text.push_str(&format!("\nКомментарий пользователя: {}", notes));
    }

    let result: DiagnosisResult = ctx
        .client
        .complete_json(ctx.vision_config, vision_messages(DIAGNOSIS_PROMPT, text, image))
        .await
        .map_err(|e| AgentError::tool(&call.name, e.to_string()))?;

    let saved_for = match plant {
        Some(mut plant) => {
            let mut diagnosis = Diagnosis::new(
                plant.id.clone(),
                result.health_score,
                Severity::parse_lenient(&result.severity),
                result.confidence,
            )
            .with_issues(result.issues.clone())
            .with_recommendations(result.recommendations.clone());
            diagnosis.image_path = image.path_string();
            diagnosis.notes = notes.map(str::to_string);

            ctx.store.diagnoses.save(&diagnosis)?;
            plant.apply_diagnosis(&diagnosis);
            ctx.store.plants.save(&plant)?;
            ctx.link_plant_to_session(&plant.id)?;

            info!(
                plant_id = %plant.id,
                health_score = diagnosis.health_score,
                severity = %diagnosis.severity,
                "Diagnosis saved"
            );
            Some(plant.id)
        }
        None => None,
    };

    Ok(ToolResult::json(
        &call.id,
        &json!({
            "diagnosis": result,
            "saved_for_plant": saved_for,
        }),
    ))
}

pub(super) async fn identify_plant_species(
    ctx: &ToolContext<'_>,
    call: &ToolCall,
) -> Result<ToolResult> {
    let image = attached_image(ctx, call)?;

    let identification: PlantIdentification = ctx
        .client
        .complete_json(
            ctx.vision_config,
            vision_messages(IDENTIFY_PROMPT, "Какое это растение?".to_string(), image),
        )
        .await
        .map_err(|e| AgentError::tool(&call.name, e.to_string()))?;

    info!(species = %identification.species, confidence = identification.confidence, "Plant identified");
    Ok(ToolResult::json(&call.id, &identification))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{call, Fixture};
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use plantmama_core::ImageProcessor;

    fn leaf() -> AttachedImage {
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(16, 16, Rgb([40u8, 150, 50])))
            .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        AttachedImage::new(ImageProcessor::new().process(&png).unwrap(), None)
    }

    #[test]
    fn test_diagnosis_result_defaults() {
        let result: DiagnosisResult = serde_json::from_str(r#"{"health_score": 4}"#).unwrap();
        assert_eq!(result.severity, "mild");
        assert_eq!(result.confidence, 0.5);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_identification_requires_species() {
        assert!(serde_json::from_str::<PlantIdentification>(r#"{"common_name": "x"}"#).is_err());
        let id: PlantIdentification =
            serde_json::from_str(r#"{"species": "Ficus lyrata", "confidence": 0.9}"#).unwrap();
        assert!(id.alternatives.is_empty());
    }

    #[test]
    fn test_definitions() {
        let defs = definitions();
        assert_eq!(defs[0].name, "diagnose_plant_photo");
        assert_eq!(defs[1].name, "identify_plant_species");
    }

    #[tokio::test]
    async fn test_photo_tools_need_an_image() {
        let fx = Fixture::new();

        let diagnose = diagnose_plant_photo(&fx.ctx(), &call("diagnose_plant_photo", json!({}))).await;
        match diagnose {
            Err(AgentError::ToolExecution { message, .. }) => assert!(message.contains("no photo")),
            other => panic!("unexpected result: {:?}", other),
        }

        let identify =
            identify_plant_species(&fx.ctx(), &call("identify_plant_species", json!({}))).await;
        assert!(matches!(identify, Err(AgentError::ToolExecution { .. })));
    }

    #[tokio::test]
    async fn test_vision_failure_is_a_tool_error() {
        let fx = Fixture::new();
        let plant = plantmama_models::Plant::new(fx.user.id.clone(), "Фикус");
        fx.store.plants.save(&plant).unwrap();
        let image = leaf();
        let ctx = fx.ctx_with_image(Some(&image));

        let identify = identify_plant_species(&ctx, &call("identify_plant_species", json!({}))).await;
        assert!(matches!(identify, Err(AgentError::ToolExecution { .. })));

        let diagnose = diagnose_plant_photo(
            &ctx,
            &call("diagnose_plant_photo", json!({"plant_id": "Фикус"})),
        )
        .await;
        assert!(matches!(diagnose, Err(AgentError::ToolExecution { .. })));
        assert!(fx.store.diagnoses.latest(&plant.id).unwrap().is_none());
    }
}
