//! Care instructions, fertilizer and tool recommendations, pest treatments.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::json;

use plantmama_core::knowledge::{self, SpeciesInfo};
use plantmama_core::Season;

use super::required;
use crate::context::ToolContext;
use crate::error::Result;
use crate::tool::{ToolCall, ToolDefinition, ToolResult};

/// Personalized care instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareInstructions {
    pub plant: String,
    pub season: Season,
    pub watering: String,
    pub lighting: String,
    pub temperature: String,
    pub humidity: String,
    pub soil: String,
    pub seasonal_tips: Vec<String>,
}

impl CareInstructions {
    /// Instructions for a plant with no reference entry.
    fn generic(plant: &str, season: Season) -> Self {
        Self {
            plant: plant.to_string(),
            season,
            watering: "Water when top 2 inches of soil are dry (approximately twice a week)".into(),
            lighting: "Bright, indirect light. Avoid direct sunlight.".into(),
            temperature: "65-80°F (18-27°C)".into(),
            humidity: "50-60% humidity preferred".into(),
            soil: "Well-draining potting mix with perlite".into(),
            seasonal_tips: Vec::new(),
        }
    }

    fn from_species(plant: &str, season: Season, info: &SpeciesInfo) -> Self {
        Self {
            plant: plant.to_string(),
            season,
            watering: info.care.water.into(),
            lighting: info.care.light.into(),
            temperature: info.care.temperature.into(),
            humidity: info.care.humidity.into(),
            soil: info.care.soil.into(),
            seasonal_tips: Vec::new(),
        }
    }
}

/// A fertilizer product suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FertilizerRecommendation {
    pub name: String,
    pub npk_ratio: String,
    pub frequency: String,
    pub amount: String,
    pub organic: bool,
    pub price_range: String,
}

/// A gardening tool suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecommendation {
    pub tool_name: String,
    pub purpose: String,
    pub price_range: String,
    pub brand_suggestions: Vec<String>,
    pub purchase_links: Vec<String>,
}

impl ToolRecommendation {
    fn new(name: &str, purpose: &str, price: &str, brands: &[&str], shops: &[&str]) -> Self {
        Self {
            tool_name: name.into(),
            purpose: purpose.into(),
            price_range: price.into(),
            brand_suggestions: brands.iter().map(|s| s.to_string()).collect(),
            purchase_links: shops.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "generate_care_instructions",
            "Generate care instructions (watering, light, temperature, humidity, soil, \
             seasonal tips) for a plant, adjusted for the season and known issues",
            json!({
                "type": "object",
                "properties": {
                    "plant": {
                        "type": "string",
                        "description": "Species, common name, or id/name of one of the user's plants"
                    },
                    "season": {
                        "type": "string",
                        "enum": ["spring", "summer", "fall", "autumn", "winter"],
                        "description": "Season; defaults to the current one"
                    },
                    "issues": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Problems found by a diagnosis"
                    }
                },
                "required": ["plant"]
            }),
        ),
        ToolDefinition::new(
            "recommend_fertilizers",
            "Recommend fertilizers for a plant type, soil condition and season",
            json!({
                "type": "object",
                "properties": {
                    "plant_type": {"type": "string", "description": "Plant type or species"},
                    "soil_condition": {"type": "string", "description": "Current soil condition"},
                    "season": {"type": "string", "description": "Season; defaults to the current one"}
                },
                "required": ["plant_type"]
            }),
        ),
        ToolDefinition::new(
            "recommend_tools",
            "Recommend gardening tools for a care task",
            json!({
                "type": "object",
                "properties": {
                    "care_task": {
                        "type": "string",
                        "description": "pruning, watering, repotting, pest control or cleaning"
                    },
                    "plant_size": {
                        "type": "string",
                        "enum": ["small", "medium", "large"]
                    }
                },
                "required": ["care_task"]
            }),
        ),
        ToolDefinition::new(
            "get_pest_treatment",
            "Get treatment options for a houseplant pest (aphids, spider mites, fungus gnats)",
            json!({
                "type": "object",
                "properties": {
                    "pest": {"type": "string", "description": "Pest name"}
                },
                "required": ["pest"]
            }),
        ),
    ]
}

fn season_arg(call: &ToolCall) -> Season {
    call.get_optional_string_arg("season")
        .map(Season::parse_or_spring)
        .unwrap_or_else(Season::current)
}

/// Tips for issues reported by a diagnosis.
fn issue_tips(issues: &[String], species: Option<&SpeciesInfo>) -> Vec<String> {
    let mut tips = Vec::new();
    for issue in issues {
        let lower = issue.to_lowercase();

        // Species-specific advice first: "Yellow leaves: Overwatering ..."
        if let Some(info) = species {
            for &known in info.common_issues {
                let symptom = known.split(':').next().unwrap_or(known).to_lowercase();
                let first_word = symptom.split_whitespace().next().unwrap_or_default();
                if first_word.len() >= 3
                    && lower.split_whitespace().any(|w| w.starts_with(first_word))
                {
                    tips.push(format!("Known issue for {}: {}", info.common_name, known));
                }
            }
        }

        let generic = if lower.contains("yellow") || lower.contains("жёлт") || lower.contains("желт") {
            Some("Yellowing leaves: check drainage and let the topsoil dry before watering")
        } else if lower.contains("brown") || lower.contains("коричн") {
            Some("Brown tips or spots: raise humidity and water with filtered water")
        } else if lower.contains("pest") || lower.contains("mite") || lower.contains("aphid") || lower.contains("вредит") {
            Some("Pests: isolate the plant and use get_pest_treatment for a treatment plan")
        } else if lower.contains("droop") || lower.contains("wilt") || lower.contains("вял") {
            Some("Drooping: check soil moisture, both dry and soggy soil cause wilting")
        } else if lower.contains("nutrient") || lower.contains("pale") {
            Some("Nutrient deficiency: feed with a balanced fertilizer at half strength")
        } else {
            None
        };
        if let Some(tip) = generic {
            tips.push(tip.to_string());
        }
    }
    let mut seen = HashSet::new();
    tips.retain(|tip| seen.insert(tip.clone()));
    tips
}

pub(super) fn generate_care_instructions(
    ctx: &ToolContext<'_>,
    call: &ToolCall,
) -> Result<ToolResult> {
    let plant_arg = required(call, "plant")?;
    let season = season_arg(call);
    let issues = call.get_string_list_arg("issues");

    // A user's plant resolves to its species for the reference lookup.
    let lookup = match ctx.find_plant(plant_arg)? {
        Some(plant) => plant
            .species
            .clone()
            .or(plant.scientific_name.clone())
            .unwrap_or(plant.name),
        None => plant_arg.to_string(),
    };

    let species = knowledge::plant_info(&lookup);
    let mut instructions = match species {
        Some(info) => CareInstructions::from_species(&lookup, season, info),
        None => CareInstructions::generic(&lookup, season),
    };
    instructions.seasonal_tips = knowledge::seasonal_care(season).lines();
    instructions.seasonal_tips.extend(issue_tips(&issues, species));

    Ok(ToolResult::json(&call.id, &instructions))
}

pub(super) fn recommend_fertilizers(call: &ToolCall) -> Result<ToolResult> {
    let plant_type = required(call, "plant_type")?;
    let soil_condition = call.get_optional_string_arg("soil_condition");
    let season = season_arg(call);
    let guide = knowledge::fertilizer_guide(season);

    let (synthetic_freq, organic_freq) = if season.is_dormant() {
        (guide.frequency().to_string(), guide.frequency().to_string())
    } else {
        (
            "Every 2 weeks during growing season".to_string(),
            "Weekly during summer".to_string(),
        )
    };

    let recommendations = vec![
        FertilizerRecommendation {
            name: "Balanced Liquid Fertilizer".into(),
            npk_ratio: "10-10-10".into(),
            frequency: synthetic_freq,
            amount: "1/4 strength of package directions".into(),
            organic: false,
            price_range: "budget".into(),
        },
        FertilizerRecommendation {
            name: "Organic Compost Tea".into(),
            npk_ratio: "3-2-2".into(),
            frequency: organic_freq,
            amount: "Dilute 1:5 with water".into(),
            organic: true,
            price_range: "medium".into(),
        },
    ];

    let mut notes = Vec::new();
    if let Some(soil) = soil_condition {
        let soil = soil.to_lowercase();
        if soil.contains("salt") || soil.contains("crust") {
            notes.push("Flush the soil with plenty of water before the next feeding");
        }
        if soil.contains("old") || soil.contains("depleted") || soil.contains("compact") {
            notes.push("Consider repotting into fresh mix in spring");
        }
    }

    Ok(ToolResult::json(
        &call.id,
        &json!({
            "plant_type": plant_type,
            "season": season,
            "guide": guide,
            "recommendations": recommendations,
            "notes": notes,
        }),
    ))
}

fn tools_for_task(task: &str) -> Vec<ToolRecommendation> {
    let task = task.trim().to_lowercase().replace(['_', '-'], " ");
    let shops = ["Amazon", "Local garden center"];
    let shears = ToolRecommendation::new(
        "Pruning Shears",
        "Clean cuts for pruning and deadheading",
        "$15-40",
        &["Fiskars", "Felco", "Corona"],
        &shops,
    );
    let meter = ToolRecommendation::new(
        "Moisture Meter",
        "Check soil moisture levels accurately",
        "$10-25",
        &["XLUX", "Sonkir", "Dr.meter"],
        &["Amazon", "Home Depot"],
    );

    if task.contains("prun") || task.contains("trim") {
        vec![
            shears,
            ToolRecommendation::new(
                "Precision Snips",
                "Small cuts on delicate stems and leaves",
                "$10-20",
                &["Fiskars", "Chikamasa"],
                &shops,
            ),
        ]
    } else if task.contains("water") {
        vec![
            ToolRecommendation::new(
                "Long-Spout Watering Can",
                "Water the soil directly without wetting the leaves",
                "$15-35",
                &["Haws", "Bloem"],
                &shops,
            ),
            meter,
        ]
    } else if task.contains("repot") {
        vec![
            ToolRecommendation::new(
                "Potting Trowel",
                "Scoop and fill potting mix",
                "$8-20",
                &["Fiskars", "Radius Garden"],
                &shops,
            ),
            ToolRecommendation::new(
                "Pot With Drainage Holes",
                "Prevents waterlogged roots",
                "$5-30",
                &["Bloem", "Lechuza"],
                &shops,
            ),
        ]
    } else if task.contains("pest") {
        vec![
            ToolRecommendation::new(
                "Pump Sprayer",
                "Apply neem oil or insecticidal soap evenly",
                "$10-25",
                &["Chapin", "Solo"],
                &shops,
            ),
            ToolRecommendation::new(
                "Yellow Sticky Traps",
                "Catch and monitor flying pests",
                "$5-12",
                &["Garsum", "Trappify"],
                &shops,
            ),
        ]
    } else if task.contains("clean") || task.contains("dust") {
        vec![ToolRecommendation::new(
            "Microfiber Leaf Cloth",
            "Remove dust so leaves can photosynthesize",
            "$5-15",
            &["Leaf Shine Mitt", "E-Cloth"],
            &shops,
        )]
    } else {
        vec![shears, meter]
    }
}

pub(super) fn recommend_tools(call: &ToolCall) -> Result<ToolResult> {
    let task = required(call, "care_task")?;
    let mut tools = tools_for_task(task);

    if call
        .get_optional_string_arg("plant_size")
        .is_some_and(|s| s.eq_ignore_ascii_case("large"))
    {
        tools.push(ToolRecommendation::new(
            "Support Stake or Moss Pole",
            "Keeps tall or climbing plants upright",
            "$10-30",
            &["Mkono", "Bloem"],
            &["Amazon", "Local garden center"],
        ));
    }

    Ok(ToolResult::json(&call.id, &tools))
}

pub(super) fn get_pest_treatment(call: &ToolCall) -> Result<ToolResult> {
    let pest = required(call, "pest")?;
    let treatments = knowledge::pest_solutions(pest);

    if treatments.is_empty() {
        return Ok(ToolResult::json(
            &call.id,
            &json!({
                "pest": pest,
                "treatments": [],
                "note": "No stored treatment for this pest",
                "known_pests": knowledge::known_pests(),
            }),
        ));
    }

    Ok(ToolResult::json(
        &call.id,
        &json!({ "pest": pest, "treatments": treatments }),
    ))
}
